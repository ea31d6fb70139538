//! Offscreen scene pass: renders the model into a half-resolution
//! color+depth target that the pattern pass then samples.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::assets::{ImageData, LoadedModel};
use crate::constants::OFFSCREEN_SCALE;

const SCENE_WGSL: &str = include_str!("../shaders/wgsl/scene.wgsl");

/// Offscreen color format. Half-float keeps the scene pass output linear
/// and avoids banding in the luminance buckets downstream.
pub const OFFSCREEN_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Offscreen target dimensions for a viewport.
pub fn offscreen_dimensions(viewport_width: u32, viewport_height: u32) -> (u32, u32) {
    (
        (viewport_width as f32 * OFFSCREEN_SCALE).floor() as u32,
        (viewport_height as f32 * OFFSCREEN_SCALE).floor() as u32,
    )
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ModelUniform {
    model: [[f32; 4]; 4],
    base_color: [f32; 4],
    textured: u32,
    _padding: [u32; 3],
}

/// Color + depth textures at the reduced resolution. Replaced wholesale on
/// viewport resize; the previous textures drop with the old value.
pub struct OffscreenTarget {
    width: u32,
    height: u32,
    _color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

impl OffscreenTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        assert!(
            width > 0 && height > 0,
            "offscreen target must have non-zero dimensions"
        );

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("amv-offscreen-color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("amv-offscreen-depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            width,
            height,
            _color: color,
            color_view,
            depth_view,
        }
    }

    /// Recreates the target when the dimensions changed. Returns whether
    /// a reallocation happened (bind groups referencing the old color view
    /// must then be rebuilt).
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        *self = Self::new(device, width, height);
        true
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    relative_matrix: Mat4,
    base_color: [f32; 4],
    textured: u32,
}

/// GPU-resident model: one draw per mesh, with the mesh's matrix relative
/// to the animated root baked in at upload time.
pub struct GpuModel {
    meshes: Vec<GpuMesh>,
    _color_texture: wgpu::Texture,
}

impl GpuModel {
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

pub struct ScenePass {
    pipeline: wgpu::RenderPipeline,
    model_bind_group_layout: wgpu::BindGroupLayout,
    scene_bind_group: wgpu::BindGroup,
    scene_uniform_buffer: wgpu::Buffer,
    color_sampler: wgpu::Sampler,
}

impl ScenePass {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("amv-scene"),
            source: wgpu::ShaderSource::Wgsl(SCENE_WGSL.into()),
        });

        let scene_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("amv-scene-globals-bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
        let model_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("amv-scene-model-bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("amv-scene-layout"),
            bind_group_layouts: &[&scene_bind_group_layout, &model_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("amv-scene-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: OFFSCREEN_COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let scene_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("amv-scene-globals"),
            contents: bytemuck::bytes_of(&SceneUniform {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("amv-scene-globals-bg"),
            layout: &scene_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_uniform_buffer.as_entire_binding(),
            }],
        });

        let color_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("amv-model-color-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            pipeline,
            model_bind_group_layout,
            scene_bind_group,
            scene_uniform_buffer,
            color_sampler,
        })
    }

    /// Uploads a loaded model: interleaved vertex/index buffers per mesh
    /// plus the shared color texture (1x1 white when the model has none).
    pub fn upload_model(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        model: &LoadedModel,
    ) -> GpuModel {
        let textured = u32::from(model.color_texture.is_some());
        let color_texture = match &model.color_texture {
            Some(image) => upload_rgba_texture(device, queue, image, "amv-model-color"),
            None => upload_rgba_texture(
                device,
                queue,
                &ImageData {
                    width: 1,
                    height: 1,
                    pixels: vec![255; 4],
                },
                "amv-model-color-fallback",
            ),
        };
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut meshes = Vec::new();
        model.root.visit_meshes(Mat4::IDENTITY, &mut |matrix, mesh| {
            let vertices: Vec<Vertex> = (0..mesh.positions.len())
                .map(|index| Vertex {
                    position: mesh.positions[index],
                    normal: mesh.normals.get(index).copied().unwrap_or([0.0; 3]),
                    uv: mesh.uvs.get(index).copied().unwrap_or([0.0; 2]),
                })
                .collect();

            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("amv-mesh-vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("amv-mesh-indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("amv-mesh-uniform"),
                contents: bytemuck::bytes_of(&ModelUniform {
                    model: matrix.to_cols_array_2d(),
                    base_color: mesh.base_color,
                    textured,
                    _padding: [0; 3],
                }),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("amv-mesh-bg"),
                layout: &self.model_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&color_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.color_sampler),
                    },
                ],
            });

            meshes.push(GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
                uniform_buffer,
                bind_group,
                relative_matrix: matrix,
                base_color: mesh.base_color,
                textured,
            });
        });

        GpuModel {
            meshes,
            _color_texture: color_texture,
        }
    }

    /// Encodes the offscreen pass: clears the target, then draws every
    /// mesh under the animated root transform. Runs with the current
    /// tick's pose; an absent model still clears the target.
    pub fn render(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &OffscreenTarget,
        view_proj: Mat4,
        root_matrix: Mat4,
        model: Option<&GpuModel>,
    ) {
        queue.write_buffer(
            &self.scene_uniform_buffer,
            0,
            bytemuck::bytes_of(&SceneUniform {
                view_proj: view_proj.to_cols_array_2d(),
            }),
        );
        if let Some(model) = model {
            for mesh in &model.meshes {
                queue.write_buffer(
                    &mesh.uniform_buffer,
                    0,
                    bytemuck::bytes_of(&ModelUniform {
                        model: (root_matrix * mesh.relative_matrix).to_cols_array_2d(),
                        base_color: mesh.base_color,
                        textured: mesh.textured,
                        _padding: [0; 3],
                    }),
                );
            }
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("amv-scene-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let Some(model) = model else {
            return;
        };

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.scene_bind_group, &[]);
        for mesh in &model.meshes {
            pass.set_bind_group(1, &mesh.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

pub(crate) fn upload_rgba_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &ImageData,
    label: &str,
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );
    texture
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_uniform_is_64_bytes() {
        assert_eq!(
            std::mem::size_of::<SceneUniform>(),
            64,
            "SceneUniform must match the WGSL struct"
        );
    }

    #[test]
    fn model_uniform_is_96_bytes() {
        assert_eq!(
            std::mem::size_of::<ModelUniform>(),
            96,
            "ModelUniform must match the WGSL struct"
        );
    }

    #[test]
    fn vertex_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn offscreen_dimensions_halve_and_floor() {
        assert_eq!(offscreen_dimensions(800, 600), (400, 300));
        assert_eq!(offscreen_dimensions(801, 601), (400, 300));
        assert_eq!(offscreen_dimensions(1, 1), (0, 0));
    }

    #[test]
    fn scene_wgsl_declares_entry_points_and_structs() {
        assert!(SCENE_WGSL.contains("fn vs_main"));
        assert!(SCENE_WGSL.contains("fn fs_main"));
        assert!(SCENE_WGSL.contains("struct SceneUniform"));
        assert!(SCENE_WGSL.contains("struct ModelUniform"));
    }
}
