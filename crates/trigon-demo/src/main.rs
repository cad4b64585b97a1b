use anyhow::{Context, Result};
use trigon_engine::backend::WgpuGraphics;
use trigon_engine::core::{App, AppControl, FrameCtx};
use trigon_engine::device::{Gpu, GpuInit};
use trigon_engine::logging::{init_logging, LoggingConfig};
use trigon_engine::render::TriangleRenderer;
use trigon_engine::window::{Runtime, RuntimeConfig};
use trigon_shader::{LinkedProgram, ProgramBuilder};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{Key, NamedKey};

const SHADER_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/res/shaders/basic.shader");

struct Scene {
    graphics: WgpuGraphics,
    program: LinkedProgram,
    triangle: TriangleRenderer,
}

/// Draws one red triangle on black until the window closes or Escape is hit.
#[derive(Default)]
struct TriangleApp {
    scene: Option<Scene>,
}

impl App for TriangleApp {
    fn on_start(&mut self, gpu: &Gpu) -> Result<()> {
        let graphics = WgpuGraphics::new(gpu.device().clone(), gpu.surface_format());

        let program = ProgramBuilder::new()
            .build_file(&graphics, SHADER_PATH)
            .with_context(|| format!("failed to build {SHADER_PATH}"))?;

        let triangle = match TriangleRenderer::new(gpu, &graphics, &program) {
            Ok(t) => t,
            Err(err) => {
                program.destroy(&graphics);
                return Err(err);
            }
        };

        log::info!("program {:?} ready, stages {:?}", program.handle(), program.stages());
        self.scene = Some(Scene { graphics, program, triangle });
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => AppControl::Exit,
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl {
        let Some(scene) = &self.scene else {
            return AppControl::Exit;
        };
        ctx.render(wgpu::Color::BLACK, |rpass| scene.triangle.draw(rpass))
    }

    fn on_exit(&mut self, _gpu: &Gpu) {
        if let Some(Scene { graphics, program, triangle }) = self.scene.take() {
            drop(triangle);
            program.destroy(&graphics);

            let (stages, programs) = graphics.live_objects();
            if stages + programs > 0 {
                log::warn!("{stages} stage(s) and {programs} program(s) still alive at exit");
            }
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(RuntimeConfig::default(), GpuInit::default(), TriangleApp::default())
        .context("trigon runtime error")
}
