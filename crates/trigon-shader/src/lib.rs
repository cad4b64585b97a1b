//! Shader source splitting and program building for **trigon**.
//!
//! A shader file holds every stage of one program, each introduced by a
//! `#shader <stage>` marker line. [`split`] turns that text into a
//! [`ShaderSource`]; [`ProgramBuilder`] compiles, links and validates it
//! against any driver that implements [`GraphicsApi`].
//!
//! This crate only depends on the `log` facade so it can be exercised
//! without a window or GPU.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`api`] | `GraphicsApi`, `StageHandle`, `ProgramHandle`, log readers |
//! | [`error`] | `BuildError`, `Object` |
//! | [`program`] | `ProgramBuilder`, `LinkedProgram`, `Validation` |
//! | [`source`] | `ShaderSource`, `split`, `load_file` |
//! | [`stage`] | `StageKind` |
//!
//! # Quick start
//!
//! ```rust
//! use trigon_shader::{split, StageKind};
//!
//! let src = split("\
//! #shader vertex
//! void main() { gl_Position = vec4(0.0); }
//! #shader fragment
//! void main() {}
//! ");
//!
//! assert_eq!(src.len(), 2);
//! assert!(src.get(StageKind::Vertex).unwrap().starts_with("void main()"));
//! ```

pub mod api;
pub mod error;
pub mod program;
pub mod source;
pub mod stage;

#[cfg(test)]
mod fake;

pub use api::{GraphicsApi, ProgramHandle, StageHandle};
pub use error::{BuildError, Object};
pub use program::{LinkedProgram, ProgramBuilder, Validation};
pub use source::{load_file, split, ShaderSource};
pub use stage::StageKind;
