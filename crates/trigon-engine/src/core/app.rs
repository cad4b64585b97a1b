use anyhow::Result;
use winit::event::WindowEvent;

use crate::device::Gpu;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by [`crate::window::Runtime`].
pub trait App {
    /// Called once after the window and GPU exist, before the first frame.
    ///
    /// An error stops the loop and is returned from `Runtime::run`.
    fn on_start(&mut self, gpu: &Gpu) -> Result<()> {
        let _ = gpu;
        Ok(())
    }

    /// Called for window events.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called once per rendered frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl;

    /// Called once before the GPU is torn down. Release driver objects here.
    fn on_exit(&mut self, gpu: &Gpu) {
        let _ = gpu;
    }
}
