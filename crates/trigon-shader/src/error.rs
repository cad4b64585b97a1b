use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::stage::StageKind;

/// Native object kind that the driver refused to create.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Object {
    Stage(StageKind),
    Program,
}

/// Failure while loading shader source or building a program.
///
/// Driver diagnostics are carried verbatim so a human can find the faulty line.
#[derive(Debug)]
pub enum BuildError {
    /// The source file could not be read.
    Io { path: PathBuf, source: io::Error },
    /// A required stage has no `#shader` section.
    MissingStage(StageKind),
    /// The driver returned no handle for a new object.
    CreateFailed(Object),
    /// The driver rejected a stage's source.
    CompileFailed { stage: StageKind, log: String },
    /// The driver rejected linking the compiled stages.
    LinkFailed { log: String },
    /// Post-link validation flagged the program (strict validation only).
    ValidateFailed { log: String },
}

impl BuildError {
    /// The stage this error is tagged with, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            BuildError::MissingStage(kind) => Some(*kind),
            BuildError::CreateFailed(Object::Stage(kind)) => Some(*kind),
            BuildError::CompileFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Driver-provided diagnostic text, if any.
    pub fn log(&self) -> Option<&str> {
        match self {
            BuildError::CompileFailed { log, .. }
            | BuildError::LinkFailed { log }
            | BuildError::ValidateFailed { log } => Some(log),
            _ => None,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Io { path, source } => {
                write!(f, "failed to read shader source {}: {}", path.display(), source)
            }
            BuildError::MissingStage(kind) => {
                write!(f, "shader source has no `#shader {}` section", kind)
            }
            BuildError::CreateFailed(Object::Stage(kind)) => {
                write!(f, "driver failed to create a {} shader object", kind)
            }
            BuildError::CreateFailed(Object::Program) => {
                f.write_str("driver failed to create a program object")
            }
            BuildError::CompileFailed { stage, log } => {
                write!(f, "failed to compile {} shader:\n{}", stage, log)
            }
            BuildError::LinkFailed { log } => write!(f, "failed to link program:\n{}", log),
            BuildError::ValidateFailed { log } => {
                write!(f, "program failed validation:\n{}", log)
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
