use std::fs;
use std::path::Path;

use tempfile::tempdir;

use amv::manifest::load_and_validate_manifest;

fn write_manifest(path: &Path, yaml: &str) {
    fs::write(path, yaml).expect("manifest should write");
}

fn touch(path: &Path) {
    fs::write(path, b"stub").expect("asset file should write");
}

#[test]
fn valid_manifest_resolves_relative_asset_paths() {
    let dir = tempdir().expect("tempdir should create");
    touch(&dir.path().join("globe.glb"));
    touch(&dir.path().join("rgb-tex.jpg"));
    touch(&dir.path().join("pat-strip.png"));
    let manifest_path = dir.path().join("scene.yaml");
    write_manifest(
        &manifest_path,
        r#"
name: globe
model:
  path: globe.glb
  color_texture: rgb-tex.jpg
  rotation: [-0.7, 0.2, 0.0]
pattern:
  path: pat-strip.png
"#,
    );

    let manifest = load_and_validate_manifest(&manifest_path).expect("manifest should load");
    assert_eq!(manifest.name.as_deref(), Some("globe"));
    assert_eq!(manifest.model.path, dir.path().join("globe.glb"));
    assert_eq!(
        manifest.model.color_texture.as_deref(),
        Some(dir.path().join("rgb-tex.jpg").as_path())
    );
    assert_eq!(manifest.pattern.path, dir.path().join("pat-strip.png"));
    assert!(manifest.animate, "animation should default to on");
    assert!((manifest.model.scale_z - 1.0).abs() < f32::EPSILON);
    assert!((manifest.model.rotation[0] + 0.7).abs() < 1e-6);
}

#[test]
fn absolute_asset_paths_are_kept_as_is() {
    let dir = tempdir().expect("tempdir should create");
    let model_path = dir.path().join("m.glb");
    let pattern_path = dir.path().join("p.png");
    touch(&model_path);
    touch(&pattern_path);
    let manifest_path = dir.path().join("scene.yaml");
    write_manifest(
        &manifest_path,
        &format!(
            "model:\n  path: {}\npattern:\n  path: {}\nanimate: false\n",
            model_path.display(),
            pattern_path.display()
        ),
    );

    let manifest = load_and_validate_manifest(&manifest_path).expect("manifest should load");
    assert_eq!(manifest.model.path, model_path);
    assert_eq!(manifest.pattern.path, pattern_path);
    assert!(!manifest.animate);
}

#[test]
fn missing_pattern_file_names_the_field() {
    let dir = tempdir().expect("tempdir should create");
    touch(&dir.path().join("m.glb"));
    let manifest_path = dir.path().join("scene.yaml");
    write_manifest(
        &manifest_path,
        r#"
model:
  path: m.glb
pattern:
  path: nope.png
"#,
    );

    let error = load_and_validate_manifest(&manifest_path).expect_err("load should fail");
    let message = format!("{error:#}");
    assert!(
        message.contains("pattern.path does not exist"),
        "unexpected error: {message}"
    );
}

#[test]
fn unknown_fields_are_rejected() {
    let dir = tempdir().expect("tempdir should create");
    let manifest_path = dir.path().join("scene.yaml");
    write_manifest(
        &manifest_path,
        r#"
model:
  path: m.glb
pattern:
  path: p.png
frames: 10
"#,
    );

    let error = load_and_validate_manifest(&manifest_path).expect_err("load should fail");
    let message = format!("{error:#}");
    assert!(
        message.contains("unknown field"),
        "unexpected error: {message}"
    );
}

#[test]
fn non_positive_scale_z_is_rejected() {
    let dir = tempdir().expect("tempdir should create");
    let manifest_path = dir.path().join("scene.yaml");
    write_manifest(
        &manifest_path,
        r#"
model:
  path: m.glb
  scale_z: 0.0
pattern:
  path: p.png
"#,
    );

    let error = load_and_validate_manifest(&manifest_path).expect_err("load should fail");
    let message = format!("{error:#}");
    assert!(
        message.contains("scale_z must be > 0"),
        "unexpected error: {message}"
    );
}

#[test]
fn yaml_parse_errors_carry_a_location() {
    let dir = tempdir().expect("tempdir should create");
    let manifest_path = dir.path().join("scene.yaml");
    write_manifest(&manifest_path, "model: [broken\n");

    let error = load_and_validate_manifest(&manifest_path).expect_err("load should fail");
    let message = format!("{error:#}");
    assert!(
        message.contains("line "),
        "parse error should point at a location: {message}"
    );
}

#[test]
fn directory_asset_path_is_rejected() {
    let dir = tempdir().expect("tempdir should create");
    fs::create_dir(dir.path().join("m.glb")).expect("dir should create");
    touch(&dir.path().join("p.png"));
    let manifest_path = dir.path().join("scene.yaml");
    write_manifest(
        &manifest_path,
        r#"
model:
  path: m.glb
pattern:
  path: p.png
"#,
    );

    let error = load_and_validate_manifest(&manifest_path).expect_err("load should fail");
    let message = format!("{error:#}");
    assert!(
        message.contains("model.path is not a file"),
        "unexpected error: {message}"
    );
}
