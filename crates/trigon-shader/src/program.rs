use std::path::Path;

use crate::api::{program_log, stage_log, GraphicsApi, ProgramHandle, StageHandle};
use crate::error::{BuildError, Object};
use crate::source::{load_file, ShaderSource};
use crate::stage::StageKind;

// ── LinkedProgram ─────────────────────────────────────────────────────────

/// Outcome of post-link validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Passed,
    /// The driver flagged the program. It is still linked and usable.
    Failed(String),
}

impl Validation {
    pub fn passed(&self) -> bool {
        matches!(self, Validation::Passed)
    }
}

/// A linked program ready to be bound for drawing.
///
/// The caller owns the driver handle and must release it with
/// [`LinkedProgram::destroy`] on the same API it was built with.
#[derive(Debug)]
#[must_use = "a linked program must be destroyed explicitly"]
pub struct LinkedProgram {
    handle: ProgramHandle,
    stages: Vec<StageKind>,
    validation: Validation,
}

impl LinkedProgram {
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Stages linked into this program, in source order.
    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    pub fn validation(&self) -> &Validation {
        &self.validation
    }

    /// Releases the driver program.
    pub fn destroy<G: GraphicsApi + ?Sized>(self, api: &G) {
        log::debug!("destroying program {:?}", self.handle);
        api.delete_program(self.handle);
    }
}

// ── Handle guards ─────────────────────────────────────────────────────────

/// A compiled stage owned by the builder. Releases its handle on drop.
struct CompiledStage<'a, G: GraphicsApi + ?Sized> {
    api: &'a G,
    kind: StageKind,
    handle: StageHandle,
}

impl<G: GraphicsApi + ?Sized> Drop for CompiledStage<'_, G> {
    fn drop(&mut self) {
        self.api.delete_stage(self.handle);
    }
}

/// A program under construction. Destroyed on drop unless released.
struct ProgramGuard<'a, G: GraphicsApi + ?Sized> {
    api: &'a G,
    handle: ProgramHandle,
    armed: bool,
}

impl<'a, G: GraphicsApi + ?Sized> ProgramGuard<'a, G> {
    fn create(api: &'a G) -> Result<Self, BuildError> {
        let handle = api
            .create_program()
            .ok_or(BuildError::CreateFailed(Object::Program))?;
        Ok(Self { api, handle, armed: true })
    }

    /// Hands the program to the caller; drop no longer deletes it.
    fn release(mut self) -> ProgramHandle {
        self.armed = false;
        self.handle
    }
}

impl<G: GraphicsApi + ?Sized> Drop for ProgramGuard<'_, G> {
    fn drop(&mut self) {
        if self.armed {
            self.api.delete_program(self.handle);
        }
    }
}

// ── ProgramBuilder ────────────────────────────────────────────────────────

/// Compiles, links and validates shader stages into a [`LinkedProgram`].
///
/// The builder holds configuration only; every `build` call is independent.
#[derive(Debug, Clone)]
pub struct ProgramBuilder {
    required: Vec<StageKind>,
    strict_validation: bool,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self {
            required: vec![StageKind::Vertex, StageKind::Fragment],
            strict_validation: false,
        }
    }
}

impl ProgramBuilder {
    /// Requires vertex and fragment stages; validation failures are reported
    /// on the program instead of failing the build.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set of stages that must be present.
    pub fn require(mut self, stages: impl IntoIterator<Item = StageKind>) -> Self {
        self.required = stages.into_iter().collect();
        self
    }

    /// Treats a validation failure as a build failure.
    pub fn strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    pub fn required(&self) -> &[StageKind] {
        &self.required
    }

    /// Builds a program from every stage in `sources`.
    ///
    /// No handle outlives this call except the returned program's.
    pub fn build<G: GraphicsApi + ?Sized>(
        &self,
        api: &G,
        sources: ShaderSource,
    ) -> Result<LinkedProgram, BuildError> {
        if let Some(&missing) = self.required.iter().find(|k| !sources.contains(**k)) {
            return Err(BuildError::MissingStage(missing));
        }

        let mut stages = Vec::with_capacity(sources.len());
        for (kind, text) in sources.iter() {
            stages.push(compile_stage(api, kind, text)?);
        }

        let program = ProgramGuard::create(api)?;
        let handle = program.handle;

        for stage in &stages {
            api.attach_stage(handle, stage.handle);
        }
        api.link_program(handle);
        let linked = api.program_link_status(handle);

        // Stage handles are single-use; release them whatever the link said.
        let kinds: Vec<StageKind> = stages.iter().map(|s| s.kind).collect();
        for stage in &stages {
            api.detach_stage(handle, stage.handle);
        }
        drop(stages);

        if !linked {
            let log = program_log(api, handle);
            return Err(BuildError::LinkFailed { log });
        }

        api.validate_program(handle);
        let validation = if api.program_validate_status(handle) {
            Validation::Passed
        } else {
            let log = program_log(api, handle);
            if self.strict_validation {
                return Err(BuildError::ValidateFailed { log });
            }
            log::warn!("program {:?} failed validation:\n{}", handle, log);
            Validation::Failed(log)
        };

        log::debug!("linked program {:?} from stages {:?}", handle, kinds);

        Ok(LinkedProgram {
            handle: program.release(),
            stages: kinds,
            validation,
        })
    }

    /// Loads a shader file and builds it.
    pub fn build_file<G: GraphicsApi + ?Sized>(
        &self,
        api: &G,
        path: impl AsRef<Path>,
    ) -> Result<LinkedProgram, BuildError> {
        self.build(api, load_file(path)?)
    }
}

fn compile_stage<'a, G: GraphicsApi + ?Sized>(
    api: &'a G,
    kind: StageKind,
    text: &str,
) -> Result<CompiledStage<'a, G>, BuildError> {
    let handle = api
        .create_stage(kind)
        .ok_or(BuildError::CreateFailed(Object::Stage(kind)))?;
    let stage = CompiledStage { api, kind, handle };

    log::debug!("compiling {} stage ({} bytes)", kind, text.len());
    api.set_stage_source(handle, text);
    api.compile_stage(handle);

    if !api.stage_compile_status(handle) {
        let log = stage_log(api, handle);
        // `stage` drops here and releases the handle.
        return Err(BuildError::CompileFailed { stage: kind, log });
    }

    Ok(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeGraphics;
    use crate::source::split;

    const VALID: &str = "\
#shader vertex
#version 450
layout(location = 0) in vec2 position;
layout(location = 0) out vec3 v_color;
void main() {
    v_color = vec3(1.0, 0.0, 0.0);
    gl_Position = vec4(position, 0.0, 1.0);
}
#shader fragment
#version 450
layout(location = 0) in vec3 v_color;
layout(location = 0) out vec4 color;
void main() {
    color = vec4(v_color, 1.0);
}
";

    const BROKEN_VERTEX: &str = "\
#shader vertex
#version 450
void main() {
    gl_Position = vec4(0.0);
#shader fragment
#version 450
layout(location = 0) out vec4 color;
void main() { color = vec4(1.0); }
";

    const BROKEN_FRAGMENT: &str = "\
#shader vertex
#version 450
void main() { gl_Position = vec4(0.0); }
#shader fragment
#version 450
layout(location = 0) out vec4 color;
void main() { color = vec4(1.0);
";

    const MISMATCHED: &str = "\
#shader vertex
#version 450
layout(location = 0) out vec2 v_uv;
void main() { v_uv = vec2(0.0); gl_Position = vec4(0.0); }
#shader fragment
#version 450
layout(location = 0) in vec3 v_color;
layout(location = 0) out vec4 color;
void main() { color = vec4(v_color, 1.0); }
";

    fn build(src: &str) -> (FakeGraphics, Result<LinkedProgram, BuildError>) {
        let api = FakeGraphics::new();
        let result = ProgramBuilder::new().build(&api, split(src));
        (api, result)
    }

    fn assert_no_leaks(api: &FakeGraphics) {
        let c = api.counters();
        assert_eq!(c.stages_created, c.stages_deleted, "stage handles leaked: {c:?}");
        assert_eq!(c.programs_created, c.programs_deleted, "program handles leaked: {c:?}");
        assert_eq!(c.unknown_deletes, 0, "deleted a handle that was not live: {c:?}");
    }

    // ── success ───────────────────────────────────────────────────────────

    #[test]
    fn valid_sources_are_ready() {
        let (api, result) = build(VALID);
        let program = result.unwrap();
        assert!(program.validation().passed());
        assert_eq!(program.stages(), &[StageKind::Vertex, StageKind::Fragment]);

        // Stages are gone, the program is the caller's.
        let c = api.counters();
        assert_eq!(c.stages_created, 2);
        assert_eq!(c.stages_deleted, 2);
        assert_eq!(api.live_programs(), 1);

        program.destroy(&api);
        assert_no_leaks(&api);
    }

    #[test]
    fn stages_are_detached_after_link() {
        let (api, result) = build(VALID);
        let program = result.unwrap();
        assert_eq!(api.attached_count(program.handle()), 0);
        program.destroy(&api);
    }

    // ── missing stage ─────────────────────────────────────────────────────

    #[test]
    fn missing_fragment_is_missing_stage() {
        let (api, result) = build("#shader vertex\nvoid main() {}\n");
        let err = result.unwrap_err();
        assert!(matches!(err, BuildError::MissingStage(StageKind::Fragment)));
        assert_eq!(api.counters().calls, 0);
    }

    #[test]
    fn empty_source_is_missing_vertex() {
        let (api, result) = build("");
        assert!(matches!(result.unwrap_err(), BuildError::MissingStage(StageKind::Vertex)));
        assert_eq!(api.counters().calls, 0);
    }

    #[test]
    fn default_requires_vertex_and_fragment() {
        assert_eq!(ProgramBuilder::new().required(), &[StageKind::Vertex, StageKind::Fragment]);
    }

    #[test]
    fn custom_required_set() {
        let api = FakeGraphics::new();
        let builder = ProgramBuilder::new().require([StageKind::Compute]);
        assert_eq!(builder.required(), &[StageKind::Compute]);

        let err = builder
            .build(&api, split(VALID))
            .unwrap_err();
        assert_eq!(err.stage(), Some(StageKind::Compute));
        assert!(matches!(err, BuildError::MissingStage(_)));
    }

    // ── compile failures ──────────────────────────────────────────────────

    #[test]
    fn vertex_syntax_error_is_compile_failed() {
        let (api, result) = build(BROKEN_VERTEX);
        match result.unwrap_err() {
            BuildError::CompileFailed { stage, log } => {
                assert_eq!(stage, StageKind::Vertex);
                assert!(log.contains("expected '}'"), "log was {log:?}");
            }
            other => panic!("expected CompileFailed, got {other:?}"),
        }
        let c = api.counters();
        assert_eq!(c.programs_created, 0);
        assert_eq!(c.links, 0);
        assert_no_leaks(&api);
    }

    #[test]
    fn fragment_error_releases_compiled_vertex() {
        let (api, result) = build(BROKEN_FRAGMENT);
        let err = result.unwrap_err();
        assert_eq!(err.stage(), Some(StageKind::Fragment));
        assert_eq!(api.counters().stages_created, 2);
        assert_no_leaks(&api);
    }

    #[test]
    fn compile_log_read_with_advertised_length() {
        let (api, result) = build(BROKEN_VERTEX);
        assert!(result.is_err());
        let reads = api.log_reads();
        assert_eq!(reads.len(), 1);
        let (advertised, given) = reads[0];
        assert_eq!(advertised, given);
    }

    #[test]
    fn empty_stage_body_fails_to_compile() {
        let (api, result) = build("#shader vertex\n#shader fragment\nvoid main() {}\n");
        let err = result.unwrap_err();
        assert!(matches!(err, BuildError::CompileFailed { stage: StageKind::Vertex, .. }));
        assert_no_leaks(&api);
    }

    // ── link failures ─────────────────────────────────────────────────────

    #[test]
    fn interface_mismatch_is_link_failed() {
        let (api, result) = build(MISMATCHED);
        match result.unwrap_err() {
            BuildError::LinkFailed { log } => assert!(log.contains("v_color"), "log was {log:?}"),
            other => panic!("expected LinkFailed, got {other:?}"),
        }
        let c = api.counters();
        assert_eq!(c.programs_created, 1);
        assert_eq!(c.validations, 0);
        assert_no_leaks(&api);
    }

    // ── creation failures ─────────────────────────────────────────────────

    #[test]
    fn refused_program_releases_stages() {
        let api = FakeGraphics::new();
        api.refuse_programs();
        let err = ProgramBuilder::new().build(&api, split(VALID)).unwrap_err();
        assert!(matches!(err, BuildError::CreateFailed(Object::Program)));
        assert_no_leaks(&api);
    }

    #[test]
    fn refused_stage_releases_earlier_stages() {
        let api = FakeGraphics::new();
        api.refuse_stage(StageKind::Fragment);
        let err = ProgramBuilder::new().build(&api, split(VALID)).unwrap_err();
        assert!(matches!(err, BuildError::CreateFailed(Object::Stage(StageKind::Fragment))));
        assert_eq!(api.counters().stages_created, 1);
        assert_no_leaks(&api);
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn validation_failure_is_reported_not_fatal() {
        let api = FakeGraphics::new();
        api.fail_validation("sampler unit conflict");
        let program = ProgramBuilder::new().build(&api, split(VALID)).unwrap();
        assert_eq!(
            program.validation(),
            &Validation::Failed("sampler unit conflict".to_string())
        );
        program.destroy(&api);
        assert_no_leaks(&api);
    }

    #[test]
    fn strict_validation_failure_destroys_program() {
        let api = FakeGraphics::new();
        api.fail_validation("sampler unit conflict");
        let err = ProgramBuilder::new()
            .strict_validation(true)
            .build(&api, split(VALID))
            .unwrap_err();
        assert!(matches!(err, BuildError::ValidateFailed { .. }));
        assert_eq!(err.log(), Some("sampler unit conflict"));
        assert_no_leaks(&api);
    }

    // ── determinism ───────────────────────────────────────────────────────

    #[test]
    fn builds_are_repeatable() {
        for src in [VALID, BROKEN_VERTEX, BROKEN_FRAGMENT, MISMATCHED] {
            let (api_a, a) = build(src);
            let (api_b, b) = build(src);
            match (a, b) {
                (Ok(pa), Ok(pb)) => {
                    assert_eq!(pa.stages(), pb.stages());
                    assert_eq!(pa.validation(), pb.validation());
                    pa.destroy(&api_a);
                    pb.destroy(&api_b);
                }
                (Err(ea), Err(eb)) => {
                    assert_eq!(std::mem::discriminant(&ea), std::mem::discriminant(&eb));
                    assert_eq!(ea.stage(), eb.stage());
                    assert_eq!(ea.log(), eb.log());
                }
                (a, b) => panic!("classification differs: {a:?} vs {b:?}"),
            }
        }
    }

    #[test]
    fn build_file_reports_io_error() {
        let api = FakeGraphics::new();
        let err = ProgramBuilder::new()
            .build_file(&api, "/nonexistent/trigon/basic.shader")
            .unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
        assert_eq!(api.counters().calls, 0);
    }

    #[test]
    fn error_display_names_stage() {
        let (_, result) = build(BROKEN_VERTEX);
        let text = result.unwrap_err().to_string();
        assert!(text.starts_with("failed to compile vertex shader:"), "{text}");
    }
}
