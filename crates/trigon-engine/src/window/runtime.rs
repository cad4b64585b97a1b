use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, FrameCtx};
use crate::device::{Gpu, GpuInit};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "Hello World".to_string(),
            initial_size: LogicalSize::new(640.0, 480.0),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window, runs `app` until it exits or the window closes.
    ///
    /// Returns the error from `App::on_start` or window/GPU creation, if any.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct WindowEntry {
    window: Arc<Window>,
    gpu: Gpu,
}

struct AppState<A: App> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    entry: Option<WindowEntry>,
    started: bool,
    frame_index: u64,
    failure: Option<anyhow::Error>,
}

impl<A: App> AppState<A> {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            entry: None,
            started: false,
            frame_index: 0,
            failure: None,
        }
    }

    fn create_window_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let gpu = pollster::block_on(Gpu::new(window.clone(), self.gpu_init.clone()))
            .context("GPU initialization failed")?;

        Ok(WindowEntry { window, gpu })
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let entry = self.create_window_entry(event_loop)?;
        self.app.on_start(&entry.gpu).context("application failed to start")?;
        self.started = true;
        entry.window.request_redraw();
        self.entry = Some(entry);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure = Some(err);
        self.shutdown(event_loop);
    }

    /// Lets the app release its driver objects, then drops the GPU and window.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(entry) = self.entry.take() {
            if self.started {
                self.app.on_exit(&entry.gpu);
                self.started = false;
            }
            log::debug!("closing window after {} frame(s)", self.frame_index);
        }
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else { return };

        let mut ctx = FrameCtx {
            window: &entry.window,
            gpu: &mut entry.gpu,
            frame_index: self.frame_index,
        };
        let control = self.app.on_frame(&mut ctx);
        self.frame_index = self.frame_index.wrapping_add(1);

        if control == AppControl::Exit {
            self.shutdown(event_loop);
        }
    }
}

impl<A: App> ApplicationHandler for AppState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.failure.is_some() {
            return;
        }

        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        // Continuous redraw, like a classic poll/draw/swap loop.
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(entry) = &self.entry {
            entry.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(entry) = self.entry.as_mut() else { return };
        if entry.window.id() != window_id {
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.shutdown(event_loop);
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(new_size) => {
                entry.gpu.resize(new_size);
                entry.window.request_redraw();
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                let new_size = entry.window.inner_size();
                entry.gpu.resize(new_size);
                entry.window.request_redraw();
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn exiting(&mut self, event_loop: &ActiveEventLoop) {
        self.shutdown(event_loop);
    }
}
