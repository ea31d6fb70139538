//! Full-resolution pattern pass. Quantizes the offscreen scene into a
//! cell grid, buckets each cell's brightness into one of the atlas
//! strips, and tiles the selected glyph across the cell.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};

use crate::assets::ImageData;
use crate::constants::{
    BACKGROUND_COLOR, INTENSITY_FLOOR, PATTERN_ATLAS_WIDTH_PX, PATTERN_STRIP_WIDTH_PX,
    TARGET_CELLS_HORIZONTAL,
};
use crate::scene_pass::upload_rgba_texture;

const PATTERN_WGSL_BODY: &str = include_str!("../shaders/wgsl/pattern.wgsl");

/// Assembles the pattern shader source: atlas constants first, body after.
pub fn pattern_shader_source() -> String {
    format!(
        "const BACKGROUND_COLOR: vec3<f32> = vec3<f32>({r:?}, {g:?}, {b:?});\n\
         const STRIP_WIDTH_PX: f32 = {strip:?};\n\
         const ATLAS_WIDTH_PX: f32 = {atlas:?};\n\
         const INTENSITY_FLOOR: f32 = {floor:?};\n\n{body}",
        r = BACKGROUND_COLOR[0],
        g = BACKGROUND_COLOR[1],
        b = BACKGROUND_COLOR[2],
        strip = PATTERN_STRIP_WIDTH_PX,
        atlas = PATTERN_ATLAS_WIDTH_PX,
        floor = INTENSITY_FLOOR,
        body = PATTERN_WGSL_BODY,
    )
}

/// Cell edge length in physical pixels for a viewport width.
pub fn cell_size_for_width(viewport_width: u32) -> f32 {
    viewport_width as f32 / TARGET_CELLS_HORIZONTAL as f32
}

/// Rec. 709 luminance of a linear RGB triple.
pub fn rec709_luminance(rgb: [f32; 3]) -> f32 {
    rgb[0] * 0.2126 + rgb[1] * 0.7152 + rgb[2] * 0.0722
}

/// Atlas strip selected for a luminance value. Mirrors the bucketing in
/// the fragment shader so the mapping stays testable on the CPU.
pub fn strip_index_for_luma(luma: f32) -> u32 {
    let strip_count = PATTERN_ATLAS_WIDTH_PX / PATTERN_STRIP_WIDTH_PX;
    (luma * strip_count).floor().clamp(0.0, strip_count - 1.0) as u32
}

/// Clear color used when the pass has nothing to draw yet.
pub fn background_clear_color() -> wgpu::Color {
    wgpu::Color {
        r: BACKGROUND_COLOR[0] as f64,
        g: BACKGROUND_COLOR[1] as f64,
        b: BACKGROUND_COLOR[2] as f64,
        a: 1.0,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PatternUniforms {
    output_resolution: [f32; 2],
    cell_size_px: f32,
    _padding: f32,
}

struct PatternTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct PatternPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    scene_sampler: wgpu::Sampler,
    pattern_sampler: wgpu::Sampler,
    pattern: Option<PatternTexture>,
    bind_group: Option<wgpu::BindGroup>,
}

impl PatternPass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Result<Self> {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("amv-pattern"),
            source: wgpu::ShaderSource::Wgsl(pattern_shader_source().into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("amv-pattern-bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("amv-pattern-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("amv-pattern-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("amv-pattern-uniforms"),
            size: std::mem::size_of::<PatternUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let scene_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("amv-pattern-scene-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        // Glyph strips tile across cells and must keep hard texel edges.
        let pattern_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("amv-pattern-atlas-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            scene_sampler,
            pattern_sampler,
            pattern: None,
            bind_group: None,
        })
    }

    /// Installs a new glyph atlas. The previous texture is released only
    /// after the replacement exists, and the stale bind group is dropped
    /// so no draw can sample the old atlas.
    pub fn set_pattern(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &ImageData) {
        let texture = upload_rgba_texture(device, queue, image, "amv-pattern-atlas");
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.pattern = Some(PatternTexture {
            _texture: texture,
            view,
        });
        self.bind_group = None;
    }

    /// Rebuilds the bind group against the current offscreen color view.
    /// Call after the offscreen target is reallocated or the atlas swapped.
    pub fn rebind(&mut self, device: &wgpu::Device, scene_view: &wgpu::TextureView) {
        let Some(pattern) = &self.pattern else {
            self.bind_group = None;
            return;
        };
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("amv-pattern-bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scene_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.scene_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&pattern.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.pattern_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        }));
    }

    /// Encodes the surface pass. Uniforms are refreshed from the current
    /// viewport every frame; without a bound atlas the pass only clears
    /// the surface to the background color.
    pub fn render(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        surface_width: u32,
        surface_height: u32,
    ) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&PatternUniforms {
                output_resolution: [surface_width as f32, surface_height as f32],
                cell_size_px: cell_size_for_width(surface_width),
                _padding: 0.0,
            }),
        );

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("amv-pattern-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(background_clear_color()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let Some(bind_group) = &self.bind_group else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_uniforms_is_16_bytes() {
        assert_eq!(
            std::mem::size_of::<PatternUniforms>(),
            16,
            "PatternUniforms must match the WGSL struct"
        );
    }

    #[test]
    fn cell_size_divides_width_into_target_cells() {
        assert!((cell_size_for_width(1500) - 10.0).abs() < 1e-6);
        assert!((cell_size_for_width(800) - 800.0 / 150.0).abs() < 1e-6);
        assert!((cell_size_for_width(150) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn luminance_weights_sum_to_one() {
        assert!((rec709_luminance([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!(rec709_luminance([0.0, 0.0, 0.0]).abs() < 1e-6);
    }

    #[test]
    fn strip_index_buckets_and_clamps() {
        assert_eq!(strip_index_for_luma(0.0), 0);
        assert_eq!(strip_index_for_luma(0.1), 0);
        assert_eq!(strip_index_for_luma(0.5), 3);
        assert_eq!(strip_index_for_luma(0.99), 5);
        assert_eq!(strip_index_for_luma(1.0), 5);
        assert_eq!(strip_index_for_luma(1.5), 5);
    }

    #[test]
    fn shader_source_embeds_atlas_constants() {
        let source = pattern_shader_source();
        assert!(source.contains("const STRIP_WIDTH_PX: f32 = 64.0;"));
        assert!(source.contains("const ATLAS_WIDTH_PX: f32 = 384.0;"));
        assert!(source.contains("const INTENSITY_FLOOR: f32 = 0.01;"));
        assert!(source.contains("const BACKGROUND_COLOR: vec3<f32>"));
        assert!(source.contains("fn vs_main"));
        assert!(source.contains("fn fs_main"));
    }

    #[test]
    fn clear_color_matches_background() {
        let color = background_clear_color();
        assert!((color.r - 250.0 / 255.0).abs() < 1e-6);
        assert!((color.g - 250.0 / 255.0).abs() < 1e-6);
        assert!((color.b - 250.0 / 255.0).abs() < 1e-6);
        assert!((color.a - 1.0).abs() < 1e-12);
    }
}
