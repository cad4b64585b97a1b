//! Counting in-memory driver for tests.
//!
//! "Compiles" by checking for a `main` function and balanced braces, and
//! "links" by matching fragment `in` declarations against vertex `out`
//! declarations by name and type. Every call is counted so tests can assert
//! that creates and deletes balance on each path.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::api::{GraphicsApi, ProgramHandle, StageHandle};
use crate::stage::StageKind;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    /// Every trait call, of any kind.
    pub calls: usize,
    pub stages_created: usize,
    pub stages_deleted: usize,
    pub programs_created: usize,
    pub programs_deleted: usize,
    /// Deletes of handles that were never created or already deleted.
    pub unknown_deletes: usize,
    pub links: usize,
    pub validations: usize,
}

struct Stage {
    kind: StageKind,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Default)]
struct Program {
    attached: Vec<StageHandle>,
    linked: bool,
    validated: bool,
    log: String,
}

#[derive(Default)]
pub struct FakeGraphics {
    next_id: Cell<u32>,
    counters: Cell<Counters>,
    stages: RefCell<HashMap<StageHandle, Stage>>,
    programs: RefCell<HashMap<ProgramHandle, Program>>,
    log_reads: RefCell<Vec<(usize, usize)>>,

    refuse_programs: Cell<bool>,
    refuse_stage: Cell<Option<StageKind>>,
    validation_failure: RefCell<Option<String>>,
}

impl FakeGraphics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> Counters {
        self.counters.get()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.borrow().len()
    }

    pub fn attached_count(&self, program: ProgramHandle) -> usize {
        self.programs
            .borrow()
            .get(&program)
            .map_or(0, |p| p.attached.len())
    }

    /// `(advertised length, buffer length)` for every log read.
    pub fn log_reads(&self) -> Vec<(usize, usize)> {
        self.log_reads.borrow().clone()
    }

    pub fn refuse_programs(&self) {
        self.refuse_programs.set(true);
    }

    pub fn refuse_stage(&self, kind: StageKind) {
        self.refuse_stage.set(Some(kind));
    }

    pub fn fail_validation(&self, log: &str) {
        *self.validation_failure.borrow_mut() = Some(log.to_string());
    }

    fn count(&self, f: impl FnOnce(&mut Counters)) {
        let mut c = self.counters.get();
        c.calls += 1;
        f(&mut c);
        self.counters.set(c);
    }

    fn next_id(&self) -> NonZeroU32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        NonZeroU32::new(id).unwrap()
    }

    fn copy_log(&self, log: &str, buf: &mut [u8]) -> usize {
        // Advertised length includes a NUL terminator, as GL drivers do.
        self.log_reads.borrow_mut().push((log.len() + 1, buf.len()));
        let bytes: Vec<u8> = log.bytes().chain(std::iter::once(0)).collect();
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        n
    }
}

fn compile_log(source: &str) -> Option<String> {
    if !source.contains("void main") {
        return Some("0:1: error: no function `main` found".to_string());
    }
    let mut depth = 0i32;
    for (idx, line) in source.lines().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Some(format!("0:{}: error: unexpected '}}'", idx + 1));
            }
        }
    }
    if depth != 0 {
        let last = source.lines().count();
        return Some(format!("0:{}: error: unexpected end of file, expected '}}'", last));
    }
    None
}

/// `(type, name)` of `qualifier` declarations such as `layout(location = 0) in vec3 v_color;`.
fn io_decls<'s>(source: &'s str, qualifier: &str) -> Vec<(&'s str, &'s str)> {
    source
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = match line.strip_prefix("layout") {
                Some(rest) => rest.split_once(')')?.1.trim(),
                None => line,
            };
            let mut words = line.trim_end_matches(';').split_whitespace();
            if words.next()? != qualifier {
                return None;
            }
            Some((words.next()?, words.next()?))
        })
        .collect()
}

impl GraphicsApi for FakeGraphics {
    fn create_stage(&self, kind: StageKind) -> Option<StageHandle> {
        if self.refuse_stage.get() == Some(kind) {
            self.count(|_| {});
            return None;
        }
        self.count(|c| c.stages_created += 1);
        let handle = StageHandle(self.next_id());
        self.stages.borrow_mut().insert(
            handle,
            Stage { kind, source: String::new(), compiled: false, log: String::new() },
        );
        Some(handle)
    }

    fn delete_stage(&self, stage: StageHandle) {
        let known = self.stages.borrow_mut().remove(&stage).is_some();
        self.count(|c| {
            if known {
                c.stages_deleted += 1;
            } else {
                c.unknown_deletes += 1;
            }
        });
    }

    fn set_stage_source(&self, stage: StageHandle, source: &str) {
        self.count(|_| {});
        if let Some(s) = self.stages.borrow_mut().get_mut(&stage) {
            s.source = source.to_string();
        }
    }

    fn compile_stage(&self, stage: StageHandle) {
        self.count(|_| {});
        if let Some(s) = self.stages.borrow_mut().get_mut(&stage) {
            match compile_log(&s.source) {
                Some(log) => {
                    s.compiled = false;
                    s.log = log;
                }
                None => {
                    s.compiled = true;
                    s.log.clear();
                }
            }
        }
    }

    fn stage_compile_status(&self, stage: StageHandle) -> bool {
        self.count(|_| {});
        self.stages.borrow().get(&stage).is_some_and(|s| s.compiled)
    }

    fn stage_log_len(&self, stage: StageHandle) -> usize {
        self.count(|_| {});
        self.stages
            .borrow()
            .get(&stage)
            .map_or(0, |s| if s.log.is_empty() { 0 } else { s.log.len() + 1 })
    }

    fn read_stage_log(&self, stage: StageHandle, buf: &mut [u8]) -> usize {
        self.count(|_| {});
        let log = self.stages.borrow().get(&stage).map(|s| s.log.clone()).unwrap_or_default();
        self.copy_log(&log, buf)
    }

    fn create_program(&self) -> Option<ProgramHandle> {
        if self.refuse_programs.get() {
            self.count(|_| {});
            return None;
        }
        self.count(|c| c.programs_created += 1);
        let handle = ProgramHandle(self.next_id());
        self.programs.borrow_mut().insert(handle, Program::default());
        Some(handle)
    }

    fn delete_program(&self, program: ProgramHandle) {
        let known = self.programs.borrow_mut().remove(&program).is_some();
        self.count(|c| {
            if known {
                c.programs_deleted += 1;
            } else {
                c.unknown_deletes += 1;
            }
        });
    }

    fn attach_stage(&self, program: ProgramHandle, stage: StageHandle) {
        self.count(|_| {});
        if let Some(p) = self.programs.borrow_mut().get_mut(&program) {
            p.attached.push(stage);
        }
    }

    fn detach_stage(&self, program: ProgramHandle, stage: StageHandle) {
        self.count(|_| {});
        if let Some(p) = self.programs.borrow_mut().get_mut(&program) {
            p.attached.retain(|s| *s != stage);
        }
    }

    fn link_program(&self, program: ProgramHandle) {
        self.count(|c| c.links += 1);
        let stages = self.stages.borrow();
        let mut programs = self.programs.borrow_mut();
        let Some(p) = programs.get_mut(&program) else { return };

        let mut errors = Vec::new();
        let find = |kind| {
            p.attached
                .iter()
                .filter_map(|h| stages.get(h))
                .find(|s| s.kind == kind && s.compiled)
        };
        match (find(StageKind::Vertex), find(StageKind::Fragment)) {
            (Some(vs), Some(fs)) => {
                let outputs = io_decls(&vs.source, "out");
                for (ty, name) in io_decls(&fs.source, "in") {
                    if !outputs.contains(&(ty, name)) {
                        errors.push(format!(
                            "error: fragment input `{}` ({}) is not written by the vertex shader",
                            name, ty
                        ));
                    }
                }
            }
            _ => errors.push("error: program needs a compiled vertex and fragment shader".to_string()),
        }

        p.linked = errors.is_empty();
        p.log = errors.join("\n");
    }

    fn program_link_status(&self, program: ProgramHandle) -> bool {
        self.count(|_| {});
        self.programs.borrow().get(&program).is_some_and(|p| p.linked)
    }

    fn validate_program(&self, program: ProgramHandle) {
        self.count(|c| c.validations += 1);
        let failure = self.validation_failure.borrow().clone();
        if let Some(p) = self.programs.borrow_mut().get_mut(&program) {
            match failure {
                Some(log) => {
                    p.validated = false;
                    p.log = log;
                }
                None => p.validated = p.linked,
            }
        }
    }

    fn program_validate_status(&self, program: ProgramHandle) -> bool {
        self.count(|_| {});
        self.programs.borrow().get(&program).is_some_and(|p| p.validated)
    }

    fn program_log_len(&self, program: ProgramHandle) -> usize {
        self.count(|_| {});
        self.programs
            .borrow()
            .get(&program)
            .map_or(0, |p| if p.log.is_empty() { 0 } else { p.log.len() + 1 })
    }

    fn read_program_log(&self, program: ProgramHandle, buf: &mut [u8]) -> usize {
        self.count(|_| {});
        let log = self.programs.borrow().get(&program).map(|p| p.log.clone()).unwrap_or_default();
        self.copy_log(&log, buf)
    }
}
