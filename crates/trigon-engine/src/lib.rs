//! Trigon engine crate.
//!
//! Window + GPU runtime, and a wgpu-backed [`trigon_shader::GraphicsApi`] so
//! programs built from `#shader` files can be drawn.
//!
//! Startup order for an app:
//! 1. [`logging::init_logging`]
//! 2. [`window::Runtime::run`] with a [`core::App`]
//! 3. In `App::on_start`, wrap the device in [`backend::WgpuGraphics`] and
//!    build programs with `trigon_shader::ProgramBuilder`.

pub mod backend;
pub mod core;
pub mod device;
pub mod logging;
pub mod render;
pub mod window;
