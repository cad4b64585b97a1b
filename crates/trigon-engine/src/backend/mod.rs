//! Driver implementations of `trigon_shader::GraphicsApi`.
//!
//! Stages are GLSL, compiled and reflected through naga, and linked into
//! wgpu render pipelines.

mod graphics;
pub mod reflect;

pub use graphics::WgpuGraphics;
pub use reflect::VertexLayout;
