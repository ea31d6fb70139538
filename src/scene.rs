//! CPU-side scene graph: transforms, mesh data, bounds, and model
//! normalization.

use glam::{Mat4, Vec3};

use crate::constants::MODEL_NORMALIZED_MIN_EXTENT;

/// Position, Euler rotation (radians, applied X then Y then Z), and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_scale(self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Triangle mesh in model space, indices always present.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub base_color: [f32; 4],
}

impl MeshData {
    pub fn aabb(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        for position in &self.positions {
            bounds.extend(Vec3::from_array(*position));
        }
        bounds
    }
}

/// One node of the scene graph. The viewer mutates exactly one root
/// transform per tick; everything below it is fixed after load.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub transform: Transform,
    pub mesh: Option<MeshData>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn with_mesh(mesh: MeshData) -> Self {
        Self {
            transform: Transform::IDENTITY,
            mesh: Some(mesh),
            children: Vec::new(),
        }
    }

    /// Bounds of this node's mesh and children in the node's local space,
    /// ignoring the node's own transform.
    pub fn content_aabb(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        if let Some(mesh) = &self.mesh {
            extend_transformed(&mut bounds, Mat4::IDENTITY, mesh);
        }
        for child in &self.children {
            child.accumulate_aabb(child.transform.matrix(), &mut bounds);
        }
        bounds
    }

    fn accumulate_aabb(&self, world: Mat4, bounds: &mut Aabb) {
        if let Some(mesh) = &self.mesh {
            extend_transformed(bounds, world, mesh);
        }
        for child in &self.children {
            child.accumulate_aabb(world * child.transform.matrix(), bounds);
        }
    }

    /// Visits every mesh in the subtree with its matrix relative to this
    /// node's parent (this node's own transform included).
    pub fn visit_meshes(&self, parent: Mat4, visit: &mut impl FnMut(Mat4, &MeshData)) {
        let world = parent * self.transform.matrix();
        if let Some(mesh) = &self.mesh {
            visit(world, mesh);
        }
        for child in &self.children {
            child.visit_meshes(world, visit);
        }
    }
}

fn extend_transformed(bounds: &mut Aabb, matrix: Mat4, mesh: &MeshData) {
    for position in &mesh.positions {
        bounds.extend(matrix.transform_point3(Vec3::from_array(*position)));
    }
}

/// Scale and center chosen by [`normalize_node`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub scale: f32,
    pub center: Vec3,
}

/// Centers the node's content at the origin and scales it so the smallest
/// bounding-box extent equals [`MODEL_NORMALIZED_MIN_EXTENT`]. Degenerate
/// content (empty, or flat along an axis) is left untouched.
pub fn normalize_node(node: &mut SceneNode) -> Normalization {
    let bounds = node.content_aabb();
    if bounds.is_empty() {
        return Normalization {
            scale: 1.0,
            center: Vec3::ZERO,
        };
    }

    let size = bounds.size();
    let min_extent = size.x.min(size.y).min(size.z);
    if min_extent <= f32::EPSILON {
        return Normalization {
            scale: 1.0,
            center: bounds.center(),
        };
    }

    let scale = MODEL_NORMALIZED_MIN_EXTENT / min_extent;
    let center = bounds.center();
    node.transform.scale = Vec3::splat(scale);
    node.transform.position = -center * scale;

    Normalization { scale, center }
}
