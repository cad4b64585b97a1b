//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the single window, and wires them to the
//! GPU layer and the app callbacks.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
