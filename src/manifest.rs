//! YAML scene manifest: which model to show, which pattern atlas to
//! stylize it with, and the animation flag.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneManifest {
    #[serde(default)]
    pub name: Option<String>,
    pub model: ModelEntry,
    pub pattern: PatternEntry,
    #[serde(default = "default_animate")]
    pub animate: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    pub path: PathBuf,
    /// Optional color texture applied across every mesh of the model.
    #[serde(default)]
    pub color_texture: Option<PathBuf>,
    /// Base rotation in radians, applied underneath the animated transform.
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "default_scale_z")]
    pub scale_z: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternEntry {
    pub path: PathBuf,
}

fn default_animate() -> bool {
    true
}

fn default_scale_z() -> f32 {
    1.0
}

pub fn load_and_validate_manifest(path: &Path) -> Result<SceneManifest> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let mut manifest: SceneManifest = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })?;

    validate_manifest(&mut manifest, path)?;
    Ok(manifest)
}

fn validate_manifest(manifest: &mut SceneManifest, manifest_path: &Path) -> Result<()> {
    if manifest.model.scale_z <= 0.0 {
        bail!("model scale_z must be > 0, got {}", manifest.model.scale_z);
    }

    let manifest_dir = manifest_path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    manifest.model.path =
        resolve_and_validate_asset_path(&manifest_dir, &manifest.model.path, "model.path")?;
    if let Some(texture) = &manifest.model.color_texture {
        let resolved =
            resolve_and_validate_asset_path(&manifest_dir, texture, "model.color_texture")?;
        manifest.model.color_texture = Some(resolved);
    }
    manifest.pattern.path =
        resolve_and_validate_asset_path(&manifest_dir, &manifest.pattern.path, "pattern.path")?;

    Ok(())
}

fn resolve_and_validate_asset_path(
    manifest_dir: &Path,
    source_path: &Path,
    field_name: &str,
) -> Result<PathBuf> {
    let resolved = if source_path.is_absolute() {
        source_path.to_path_buf()
    } else {
        manifest_dir.join(source_path)
    };

    if !resolved.exists() {
        bail!("{} does not exist: {}", field_name, resolved.display());
    }

    if !resolved.is_file() {
        bail!("{} is not a file: {}", field_name, resolved.display());
    }

    Ok(resolved)
}
