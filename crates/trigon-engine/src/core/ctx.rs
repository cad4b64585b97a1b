use winit::window::Window;

use crate::device::{Gpu, SurfaceErrorAction};

use super::app::AppControl;

/// Per-frame context passed to `core::App::on_frame`.
pub struct FrameCtx<'a> {
    pub window: &'a Window,
    pub gpu: &'a mut Gpu,
    /// Monotonic count of frames handed to the app.
    pub frame_index: u64,
}

impl FrameCtx<'_> {
    /// Clears the surface to `clear`, records `draw` into the same pass, then
    /// presents the frame.
    pub fn render<F>(&mut self, clear: wgpu::Color, draw: F) -> AppControl
    where
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        let mut frame = match self.gpu.begin_frame() {
            Ok(Some(f)) => f,
            Ok(None) => return AppControl::Continue,
            Err(err) => {
                if self.gpu.handle_surface_error(err) == SurfaceErrorAction::Fatal {
                    return AppControl::Exit;
                }
                return AppControl::Continue;
            }
        };

        // The pass borrows the encoder; it must end before submit() takes the frame.
        {
            let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("trigon main pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            draw(&mut rpass);
        }

        self.window.pre_present_notify();
        self.gpu.submit(frame);

        AppControl::Continue
    }
}
