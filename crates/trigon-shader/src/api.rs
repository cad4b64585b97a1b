use std::num::NonZeroU32;

use crate::stage::StageKind;

/// Driver handle of a shader-stage object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StageHandle(pub NonZeroU32);

/// Driver handle of a program object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProgramHandle(pub NonZeroU32);

/// The slice of a graphics driver that program building consumes.
///
/// Methods take `&self`: the driver is a current context, not a value the
/// builder owns. Implementations that keep bookkeeping use interior
/// mutability.
///
/// Logs follow the query-then-read protocol: `*_log_len` reports the number
/// of bytes needed, `read_*_log` fills at most `buf.len()` bytes and returns
/// how many were written.
pub trait GraphicsApi {
    /// Creates an empty stage object. `None` if the driver refused.
    fn create_stage(&self, kind: StageKind) -> Option<StageHandle>;
    fn delete_stage(&self, stage: StageHandle);
    fn set_stage_source(&self, stage: StageHandle, source: &str);
    fn compile_stage(&self, stage: StageHandle);
    fn stage_compile_status(&self, stage: StageHandle) -> bool;
    fn stage_log_len(&self, stage: StageHandle) -> usize;
    fn read_stage_log(&self, stage: StageHandle, buf: &mut [u8]) -> usize;

    /// Creates an empty program object. `None` if the driver refused.
    fn create_program(&self) -> Option<ProgramHandle>;
    fn delete_program(&self, program: ProgramHandle);
    fn attach_stage(&self, program: ProgramHandle, stage: StageHandle);
    fn detach_stage(&self, program: ProgramHandle, stage: StageHandle);
    fn link_program(&self, program: ProgramHandle);
    fn program_link_status(&self, program: ProgramHandle) -> bool;
    fn validate_program(&self, program: ProgramHandle);
    fn program_validate_status(&self, program: ProgramHandle) -> bool;
    fn program_log_len(&self, program: ProgramHandle) -> usize;
    fn read_program_log(&self, program: ProgramHandle, buf: &mut [u8]) -> usize;
}

/// Reads a stage's info log into a buffer sized from the driver's report.
pub fn stage_log<G: GraphicsApi + ?Sized>(api: &G, stage: StageHandle) -> String {
    read_log(api.stage_log_len(stage), |buf| api.read_stage_log(stage, buf))
}

/// Reads a program's info log into a buffer sized from the driver's report.
pub fn program_log<G: GraphicsApi + ?Sized>(api: &G, program: ProgramHandle) -> String {
    read_log(api.program_log_len(program), |buf| api.read_program_log(program, buf))
}

fn read_log(len: usize, read: impl FnOnce(&mut [u8]) -> usize) -> String {
    if len == 0 {
        return String::new();
    }
    let mut buf = vec![0u8; len];
    let written = read(&mut buf).min(len);
    buf.truncate(written);
    // Drivers may count a trailing NUL.
    while buf.last() == Some(&0) {
        buf.pop();
    }
    String::from_utf8_lossy(&buf).into_owned()
}
