//! Interactive viewer window. Owns the event loop, the GPU surface, the
//! two render passes, and the background asset loader, and drives one
//! fixed-order tick per display refresh.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event as WinitEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::assets::{AssetLoader, LoadEvent};
use crate::camera::OrthographicCamera;
use crate::manifest::{load_and_validate_manifest, SceneManifest};
use crate::motion::{MotionConfig, MotionController};
use crate::pattern_pass::PatternPass;
use crate::scene::Transform;
use crate::scene_pass::{offscreen_dimensions, GpuModel, OffscreenTarget, ScenePass};

const INITIAL_WINDOW_SIZE: PhysicalSize<u32> = PhysicalSize::new(1280, 720);

#[derive(Debug, Clone, Copy)]
pub struct ViewArgs {
    pub no_animate: bool,
}

/// Adapter, device, and queue shared by both passes.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn for_surface(
        instance: wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(surface),
            })
            .await
            .ok_or_else(|| anyhow!("no compatible GPU adapter found"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("amv-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to request GPU device")?;
        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

/// Latest pointer position normalized to [-1, 1] on both axes, origin at the
/// window top-left (so the window center maps to zero). `None` after the
/// pointer leaves the window.
#[derive(Debug, Clone, Copy, Default)]
struct PointerState {
    normalized: Option<Vec2>,
}

impl PointerState {
    fn moved(&mut self, position: PhysicalPosition<f64>, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.normalized = Some(Vec2::new(
            (position.x / size.width as f64) as f32 * 2.0 - 1.0,
            (position.y / size.height as f64) as f32 * 2.0 - 1.0,
        ));
    }

    fn left(&mut self) {
        self.normalized = None;
    }
}

pub fn run_view(manifest_path: &Path, args: ViewArgs) -> Result<()> {
    let manifest_path = canonical_manifest_path(manifest_path);
    let mut manifest = load_and_validate_manifest(&manifest_path)?;

    let event_loop = EventLoop::new().context("failed to create view event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(window_title(&manifest, &manifest_path))
            .with_inner_size(INITIAL_WINDOW_SIZE)
            .build(&event_loop)
            .context("failed to create viewer window")?,
    );

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance
        .create_surface(window.clone())
        .context("failed to create wgpu surface")?;
    let gpu = pollster::block_on(GpuContext::for_surface(instance, &surface)).with_context(
        || {
            format!(
                "failed to initialize WGPU context for {}",
                manifest_path.display()
            )
        },
    )?;

    let caps = surface.get_capabilities(&gpu.adapter);
    let format = pick_surface_format(&caps.formats);
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

    let initial_size = window.inner_size();
    let mut surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: initial_size.width.max(1),
        height: initial_size.height.max(1),
        // Fifo paces the always-redraw loop at the display refresh rate.
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&gpu.device, &surface_config);

    let scene_pass = ScenePass::new(&gpu.device)?;
    let mut pattern_pass = PatternPass::new(&gpu.device, surface_config.format)?;
    let (off_width, off_height) =
        offscreen_dimensions(surface_config.width, surface_config.height);
    let mut offscreen =
        OffscreenTarget::new(&gpu.device, off_width.max(1), off_height.max(1));
    let mut targets_dirty = true;

    let camera = OrthographicCamera::model_viewer();
    let mut motion = MotionController::new(MotionConfig {
        animate: manifest.animate && !args.no_animate,
        ..MotionConfig::default()
    });
    let mut pointer = PointerState::default();
    let started = Instant::now();

    let mut loader = AssetLoader::new();
    loader.request_model(manifest.model.clone());
    loader.request_pattern(manifest.pattern.path.clone());
    let mut gpu_model: Option<GpuModel> = None;

    let (watch_tx, watch_rx) = mpsc::channel::<()>();
    let watched_manifest = manifest_path.to_path_buf();
    let watcher_manifest = watched_manifest.clone();
    let mut watcher =
        notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if should_reload(&event) && event_targets_manifest(&event, &watcher_manifest) {
                    let _ = watch_tx.send(());
                }
            }
            Err(error) => {
                eprintln!("[amv] view: file watcher error: {error}");
            }
        })
        .context("failed to create file watcher")?;
    let watch_root = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    watcher
        .watch(&watch_root, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", watch_root.display()))?;

    let adapter_info = gpu.adapter.get_info();
    eprintln!(
        "[amv] view: model {} pattern {}",
        manifest.model.path.display(),
        manifest.pattern.path.display()
    );
    eprintln!("[amv] Controls: move pointer to tilt, Space toggle animation, Esc quit");
    eprintln!(
        "[amv] State: animation {}",
        if motion.animate() { "on" } else { "off" }
    );
    eprintln!(
        "[amv] Backend: {} ({:?})",
        adapter_info.name, adapter_info.backend
    );

    let manifest_path = watched_manifest;
    event_loop
        .run(move |event, target| {
            target.set_control_flow(ControlFlow::Wait);

            match event {
                WinitEvent::WindowEvent { window_id, event } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested => target.exit(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state == ElementState::Pressed && !event.repeat {
                                handle_keyboard_event(event.physical_key, &mut motion, target);
                            }
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            pointer.moved(position, window.inner_size());
                        }
                        WindowEvent::CursorLeft { .. } => {
                            pointer.left();
                        }
                        WindowEvent::RedrawRequested => {
                            render_tick(
                                &surface,
                                &gpu,
                                &surface_config,
                                &mut offscreen,
                                &scene_pass,
                                &mut pattern_pass,
                                &mut targets_dirty,
                                &camera,
                                &mut motion,
                                pointer,
                                started,
                                gpu_model.as_ref(),
                            );
                        }
                        WindowEvent::Resized(size) => {
                            if size.width > 0 && size.height > 0 {
                                surface_config.width = size.width;
                                surface_config.height = size.height;
                                surface.configure(&gpu.device, &surface_config);
                            }
                        }
                        _ => {}
                    }
                }
                WinitEvent::AboutToWait => {
                    let mut manifest_dirty = false;
                    while watch_rx.try_recv().is_ok() {
                        manifest_dirty = true;
                    }
                    if manifest_dirty {
                        try_reload_manifest(
                            &manifest_path,
                            args,
                            &mut manifest,
                            &mut loader,
                            &mut motion,
                        );
                    }

                    for load in loader.poll() {
                        match load {
                            LoadEvent::Model { result, .. } => match result {
                                Ok(loaded) => {
                                    let uploaded =
                                        scene_pass.upload_model(&gpu.device, &gpu.queue, &loaded);
                                    eprintln!(
                                        "[amv] view: model ready ({} mesh(es))",
                                        uploaded.mesh_count()
                                    );
                                    gpu_model = Some(uploaded);
                                }
                                Err(error) => {
                                    eprintln!("[amv] view: model load error: {error:#}");
                                }
                            },
                            LoadEvent::Pattern { result, .. } => match result {
                                Ok(image) => {
                                    eprintln!(
                                        "[amv] view: pattern ready ({}x{})",
                                        image.width, image.height
                                    );
                                    pattern_pass.set_pattern(&gpu.device, &gpu.queue, &image);
                                    targets_dirty = true;
                                }
                                Err(error) => {
                                    eprintln!("[amv] view: pattern load error: {error:#}");
                                }
                            },
                        }
                    }

                    window.request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|error| anyhow!("view event loop terminated: {error}"))
}

/// One tick: refresh targets, advance the pose, then encode the scene
/// pass followed by the pattern pass into a single submission.
fn render_tick(
    surface: &wgpu::Surface<'_>,
    gpu: &GpuContext,
    surface_config: &wgpu::SurfaceConfiguration,
    offscreen: &mut OffscreenTarget,
    scene_pass: &ScenePass,
    pattern_pass: &mut PatternPass,
    targets_dirty: &mut bool,
    camera: &OrthographicCamera,
    motion: &mut MotionController,
    pointer: PointerState,
    started: Instant,
    model: Option<&GpuModel>,
) {
    if surface_config.width == 0 || surface_config.height == 0 {
        return;
    }
    let (off_width, off_height) =
        offscreen_dimensions(surface_config.width, surface_config.height);
    if off_width == 0 || off_height == 0 {
        return;
    }
    if offscreen.resize(&gpu.device, off_width, off_height) {
        *targets_dirty = true;
    }
    if *targets_dirty {
        pattern_pass.rebind(&gpu.device, &offscreen.color_view);
        *targets_dirty = false;
    }

    let frame = match surface.get_current_texture() {
        Ok(frame) => frame,
        Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
            surface.configure(&gpu.device, surface_config);
            return;
        }
        Err(wgpu::SurfaceError::Timeout) => {
            return;
        }
        Err(wgpu::SurfaceError::OutOfMemory) => {
            eprintln!("[amv] view: surface out of memory");
            return;
        }
    };

    let view = frame
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let pose = motion.update(started.elapsed().as_secs_f32(), pointer.normalized);
    let root_matrix = Transform {
        position: pose.position,
        rotation: pose.rotation,
        scale: Vec3::ONE,
    }
    .matrix();

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("amv-frame"),
        });
    scene_pass.render(
        &gpu.queue,
        &mut encoder,
        offscreen,
        camera.view_projection(),
        root_matrix,
        model,
    );
    pattern_pass.render(
        &gpu.queue,
        &mut encoder,
        &view,
        surface_config.width,
        surface_config.height,
    );
    gpu.queue.submit(Some(encoder.finish()));
    frame.present();
}

/// Re-reads the manifest after a change on disk. A manifest that fails
/// validation leaves the running scene untouched.
fn try_reload_manifest(
    manifest_path: &Path,
    args: ViewArgs,
    manifest: &mut SceneManifest,
    loader: &mut AssetLoader,
    motion: &mut MotionController,
) {
    let next = match load_and_validate_manifest(manifest_path) {
        Ok(next) => next,
        Err(error) => {
            eprintln!("[amv] view: reload parse error: {error:#}");
            return;
        }
    };

    if next.model != manifest.model {
        loader.request_model(next.model.clone());
    }
    if next.pattern != manifest.pattern {
        loader.request_pattern(next.pattern.path.clone());
    }
    motion.set_animate(next.animate && !args.no_animate);
    *manifest = next;

    eprintln!(
        "[amv] view: reloaded {} (animation {})",
        manifest_path.display(),
        if motion.animate() { "on" } else { "off" }
    );
}

fn handle_keyboard_event(
    key: PhysicalKey,
    motion: &mut MotionController,
    target: &winit::event_loop::EventLoopWindowTarget<()>,
) {
    match key {
        PhysicalKey::Code(KeyCode::Space) => {
            motion.set_animate(!motion.animate());
            eprintln!(
                "[amv] view: animation {}",
                if motion.animate() { "on" } else { "off" }
            );
        }
        PhysicalKey::Code(KeyCode::Escape) => target.exit(),
        _ => {}
    }
}

fn window_title(manifest: &SceneManifest, path: &Path) -> String {
    match &manifest.name {
        Some(name) => format!("AMV - {name}"),
        None => format!("AMV - {}", path.display()),
    }
}

fn should_reload(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) | EventKind::Any
    )
}

fn event_targets_manifest(event: &Event, manifest_path: &Path) -> bool {
    if event.paths.is_empty() {
        return true;
    }

    event.paths.iter().any(|path| {
        path == manifest_path
            || std::fs::canonicalize(path)
                .map(|resolved| resolved == manifest_path)
                .unwrap_or(false)
    })
}

fn canonical_manifest_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> wgpu::TextureFormat {
    formats
        .iter()
        .copied()
        .find(|format| format.is_srgb())
        .unwrap_or_else(|| formats[0])
}
