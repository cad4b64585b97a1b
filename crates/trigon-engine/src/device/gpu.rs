use std::sync::Arc;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::surface::{self, SurfaceErrorAction};
use super::GpuInit;

/// Owns the wgpu device, queue and the window's configured surface.
///
/// The surface holds an `Arc` of the window, so a `Gpu` keeps its window
/// alive and carries no borrow.
pub struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Set while the window has zero area; the surface is left unconfigured.
    suspended: bool,
}

/// Represents a single acquired frame.
///
/// Short-lived: holding the surface texture blocks acquisition of the next one.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

impl Gpu {
    /// Creates a GPU context bound to a window.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let GpuInit {
            prefer_srgb,
            present_mode,
            required_features,
            required_limits,
            desired_maximum_frame_latency,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!(
            "adapter: {} ({:?}, driver {} {})",
            info.name,
            info.backend,
            info.driver,
            info.driver_info
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("trigon device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps, prefer_srgb)
            .context("no supported surface formats")?;
        log::debug!("surface format: {:?}", format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency,
        };

        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            suspended: false,
        })
    }

    /// Returns the active surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Reconfigures the surface after a resize.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.suspended = !surface::resize_config(&mut self.config, new_size);
        if !self.suspended {
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Acquires the next surface texture and creates an encoder.
    ///
    /// `Ok(None)` while the window is minimized.
    pub fn begin_frame(&self) -> std::result::Result<Option<GpuFrame>, wgpu::SurfaceError> {
        if self.suspended {
            return Ok(None);
        }

        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("trigon frame encoder"),
            });

        Ok(Some(GpuFrame {
            surface_texture,
            view,
            encoder,
        }))
    }

    /// Submits the recorded commands and presents the frame.
    pub fn submit(&self, frame: GpuFrame) {
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        drop(frame.view);
        frame.surface_texture.present();
    }

    /// Converts a `SurfaceError` into a loop action, reconfiguring if needed.
    pub fn handle_surface_error(&mut self, err: wgpu::SurfaceError) -> SurfaceErrorAction {
        let action = surface::error_action(&err);
        match action {
            SurfaceErrorAction::Reconfigured if !self.suspended => {
                self.surface.configure(&self.device, &self.config);
            }
            SurfaceErrorAction::Fatal => log::error!("surface error: {}", err),
            _ => log::debug!("surface error: {}", err),
        }
        action
    }
}
