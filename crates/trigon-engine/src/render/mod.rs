//! GPU rendering.
//!
//! Renderers take a program built by `trigon_shader::ProgramBuilder`, own the
//! buffers they feed it, and record draws into a caller-provided pass.
//!
//! Convention:
//! - CPU geometry is in normalized device coordinates (+Y up).

mod triangle;

pub use triangle::{TriangleRenderer, Vertex, TRIANGLE};
