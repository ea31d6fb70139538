//! Asset loading: glTF models (pre-normalized) and image textures, loaded
//! on background threads so the render loop never blocks. Every request
//! carries a generation number; completions for superseded requests are
//! dropped on receipt.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Mat3, Mat4, Vec3};
use image::ImageReader;

use crate::manifest::ModelEntry;
use crate::scene::{normalize_node, MeshData, SceneNode, Transform};

/// Decoded RGBA8 image.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Model ready for upload: normalized scene graph plus the optional color
/// texture applied across its meshes.
#[derive(Debug)]
pub struct LoadedModel {
    pub root: SceneNode,
    pub color_texture: Option<ImageData>,
}

pub fn load_image(path: &Path) -> Result<ImageData> {
    let image = ImageReader::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .decode()
        .with_context(|| format!("failed to decode image {}", path.display()))?
        .to_rgba8();

    Ok(ImageData {
        width: image.width(),
        height: image.height(),
        pixels: image.into_raw(),
    })
}

/// Imports a glTF model, bakes node matrices into the vertices, and
/// normalizes the result (centered at the origin, smallest bounding-box
/// extent scaled to 2).
pub fn load_model(entry: &ModelEntry) -> Result<LoadedModel> {
    let (document, buffers, _images) = gltf::import(&entry.path)
        .with_context(|| format!("failed to import model {}", entry.path.display()))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("model {} contains no scenes", entry.path.display()))?;

    let mut mesh_nodes = Vec::new();
    for node in scene.nodes() {
        collect_meshes(&node, Mat4::IDENTITY, &buffers, &mut mesh_nodes);
    }
    if mesh_nodes.is_empty() {
        bail!("model {} contains no triangle meshes", entry.path.display());
    }

    let base = SceneNode {
        transform: Transform {
            position: Vec3::ZERO,
            rotation: Vec3::from_array(entry.rotation),
            scale: Vec3::new(1.0, 1.0, entry.scale_z),
        },
        mesh: None,
        children: mesh_nodes,
    };
    let mut root = SceneNode {
        transform: Transform::IDENTITY,
        mesh: None,
        children: vec![base],
    };
    normalize_node(&mut root);

    let color_texture = match &entry.color_texture {
        Some(path) => Some(load_image(path)?),
        None => None,
    };

    Ok(LoadedModel {
        root,
        color_texture,
    })
}

fn collect_meshes(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<SceneNode>,
) {
    let matrix = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            if let Some(data) = read_primitive(&primitive, buffers, matrix) {
                out.push(SceneNode::with_mesh(data));
            }
        }
    }

    for child in node.children() {
        collect_meshes(&child, matrix, buffers, out);
    }
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
    matrix: Mat4,
) -> Option<MeshData> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()?
        .map(|p| matrix.transform_point3(Vec3::from_array(p)).to_array())
        .collect();
    if positions.is_empty() {
        return None;
    }

    let normal_matrix = normal_matrix_for(matrix);
    let normals: Vec<[f32; 3]> = match reader.read_normals() {
        Some(iter) => iter
            .map(|n| {
                (normal_matrix * Vec3::from_array(n))
                    .normalize_or_zero()
                    .to_array()
            })
            .collect(),
        None => vec![[0.0; 3]; positions.len()],
    };

    let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
        Some(coords) => coords.into_f32().collect(),
        None => vec![[0.0; 2]; positions.len()],
    };

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let base_color = primitive
        .material()
        .pbr_metallic_roughness()
        .base_color_factor();

    Some(MeshData {
        positions,
        normals,
        uvs,
        indices,
        base_color,
    })
}

fn normal_matrix_for(matrix: Mat4) -> Mat3 {
    let linear = Mat3::from_mat4(matrix);
    if linear.determinant().abs() <= f32::EPSILON {
        return linear;
    }
    linear.inverse().transpose()
}

/// A completed background load, tagged with its request generation.
pub enum LoadEvent {
    Model {
        generation: u64,
        result: Result<LoadedModel>,
    },
    Pattern {
        generation: u64,
        result: Result<ImageData>,
    },
}

/// Spawns loads on background threads and hands completed results back to
/// the render loop without ever blocking it.
pub struct AssetLoader {
    tx: Sender<LoadEvent>,
    rx: Receiver<LoadEvent>,
    model_generation: u64,
    pattern_generation: u64,
}

impl AssetLoader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            model_generation: 0,
            pattern_generation: 0,
        }
    }

    /// Starts a model load. Any in-flight model load is superseded.
    pub fn request_model(&mut self, entry: ModelEntry) -> u64 {
        self.model_generation += 1;
        let generation = self.model_generation;
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = load_model(&entry);
            let _ = tx.send(LoadEvent::Model { generation, result });
        });
        generation
    }

    /// Starts a pattern texture load. Any in-flight pattern load is
    /// superseded.
    pub fn request_pattern(&mut self, path: PathBuf) -> u64 {
        self.pattern_generation += 1;
        let generation = self.pattern_generation;
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = load_image(&path);
            let _ = tx.send(LoadEvent::Pattern { generation, result });
        });
        generation
    }

    /// Drains completed loads. Results from superseded requests are
    /// silently dropped.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            if self.is_current(&event) {
                events.push(event);
            }
        }
        events
    }

    fn is_current(&self, event: &LoadEvent) -> bool {
        match event {
            LoadEvent::Model { generation, .. } => *generation == self.model_generation,
            LoadEvent::Pattern { generation, .. } => *generation == self.pattern_generation,
        }
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_test_png(dir: &Path) -> PathBuf {
        let path = dir.join("pattern.png");
        let image = image::RgbaImage::from_pixel(8, 4, image::Rgba([10, 200, 30, 255]));
        image.save(&path).expect("write test png");
        path
    }

    #[test]
    fn load_image_reports_dimensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_test_png(dir.path());

        let loaded = load_image(&path).expect("load");
        assert_eq!((loaded.width, loaded.height), (8, 4));
        assert_eq!(loaded.pixels.len(), 8 * 4 * 4);
        assert_eq!(&loaded.pixels[0..4], &[10, 200, 30, 255]);
    }

    #[test]
    fn load_image_missing_file_is_an_error() {
        let error = load_image(Path::new("/nonexistent/missing.png")).unwrap_err();
        assert!(format!("{error:#}").contains("missing.png"));
    }

    #[test]
    fn superseded_pattern_loads_are_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_test_png(dir.path());

        let mut loader = AssetLoader::new();
        loader.request_pattern(path.clone());
        let latest = loader.request_pattern(path);

        let mut seen = Vec::new();
        for _ in 0..500 {
            for event in loader.poll() {
                if let LoadEvent::Pattern { generation, .. } = event {
                    seen.push(generation);
                }
            }
            if !seen.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        assert!(!seen.is_empty(), "no pattern load completed in time");
        assert!(seen.iter().all(|generation| *generation == latest));
    }

    #[test]
    fn normal_matrix_preserves_direction_under_uniform_scale() {
        let matrix = Mat4::from_scale(Vec3::splat(3.0));
        let transformed = (normal_matrix_for(matrix) * Vec3::Y).normalize_or_zero();
        assert!((transformed - Vec3::Y).length() < 1e-5);
    }
}
