use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::rc::Rc;

use naga::front::glsl::{Frontend, Options};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::ShaderStage;
use trigon_shader::{GraphicsApi, ProgramHandle, StageHandle, StageKind};

use super::reflect::{self, VertexLayout};

/// GLSL entry point name; naga's GLSL frontend keeps `main`.
const ENTRY_POINT: &str = "main";

fn naga_stage(kind: StageKind) -> ShaderStage {
    match kind {
        StageKind::Vertex   => ShaderStage::Vertex,
        StageKind::Fragment => ShaderStage::Fragment,
        StageKind::Compute  => ShaderStage::Compute,
    }
}

/// A stage that passed naga parsing and validation.
struct CompiledModule {
    module: naga::Module,
    shader: wgpu::ShaderModule,
}

struct StageObject {
    kind: StageKind,
    source: String,
    compiled: Option<Rc<CompiledModule>>,
    log: String,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<StageHandle>,
    linked: Option<LinkedPipeline>,
    validated: bool,
    log: String,
}

struct LinkedPipeline {
    pipeline: wgpu::RenderPipeline,
    vertex_layout: VertexLayout,
    writes_color: bool,
}

/// [`GraphicsApi`] over a wgpu device.
///
/// Compiling parses and validates GLSL with naga, then creates a
/// `wgpu::ShaderModule`. Linking reflects the stage interfaces and creates a
/// `wgpu::RenderPipeline` that targets `target_format`.
///
/// Object tables use interior mutability, so this type is `!Sync`; it belongs
/// to the thread that drives the window.
pub struct WgpuGraphics {
    device: wgpu::Device,
    target_format: wgpu::TextureFormat,

    next_id: Cell<u32>,
    stages: RefCell<HashMap<StageHandle, StageObject>>,
    programs: RefCell<HashMap<ProgramHandle, ProgramObject>>,
}

impl WgpuGraphics {
    pub fn new(device: wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            target_format,
            next_id: Cell::new(0),
            stages: RefCell::new(HashMap::new()),
            programs: RefCell::new(HashMap::new()),
        }
    }

    /// Render pipeline of a linked program.
    pub fn pipeline(&self, program: ProgramHandle) -> Option<wgpu::RenderPipeline> {
        self.programs
            .borrow()
            .get(&program)
            .and_then(|p| p.linked.as_ref())
            .map(|l| l.pipeline.clone())
    }

    /// Vertex buffer layout a linked program expects.
    pub fn vertex_layout(&self, program: ProgramHandle) -> Option<VertexLayout> {
        self.programs
            .borrow()
            .get(&program)
            .and_then(|p| p.linked.as_ref())
            .map(|l| l.vertex_layout.clone())
    }

    /// Number of live stage and program objects.
    pub fn live_objects(&self) -> (usize, usize) {
        (self.stages.borrow().len(), self.programs.borrow().len())
    }

    fn next_id(&self) -> Option<NonZeroU32> {
        let id = self.next_id.get().checked_add(1)?;
        self.next_id.set(id);
        NonZeroU32::new(id)
    }

    fn compile(&self, kind: StageKind, source: &str) -> Result<CompiledModule, String> {
        let stage = naga_stage(kind);

        let module = Frontend::default()
            .parse(&Options::from(stage), source)
            .map_err(|e| e.emit_to_string(source))?;

        Validator::new(ValidationFlags::all(), Capabilities::default())
            .validate(&module)
            .map_err(|e| e.emit_to_string(source))?;

        let label = format!("trigon {} stage", kind);
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(source.to_string()),
                stage,
                defines: Default::default(),
            },
        });
        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(err.to_string());
        }

        Ok(CompiledModule { module, shader })
    }

    fn link(&self, attached: &[StageHandle]) -> Result<LinkedPipeline, Vec<String>> {
        let mut errors = Vec::new();
        let mut vertex: Option<Rc<CompiledModule>> = None;
        let mut fragment: Option<Rc<CompiledModule>> = None;

        {
            let stages = self.stages.borrow();
            for handle in attached {
                let Some(stage) = stages.get(handle) else {
                    errors.push(format!("attached stage {:?} no longer exists", handle));
                    continue;
                };
                let Some(compiled) = stage.compiled.clone() else {
                    errors.push(format!("{} stage has not been compiled", stage.kind));
                    continue;
                };
                let slot = match stage.kind {
                    StageKind::Vertex => &mut vertex,
                    StageKind::Fragment => &mut fragment,
                    StageKind::Compute => {
                        errors.push("compute stages cannot be linked into a render program".to_string());
                        continue;
                    }
                };
                if slot.replace(compiled).is_some() {
                    errors.push(format!("more than one {} stage attached", stage.kind));
                }
            }
        }

        if vertex.is_none() {
            errors.push("no vertex stage attached".to_string());
        }
        if fragment.is_none() {
            errors.push("no fragment stage attached".to_string());
        }
        let (Some(vs), Some(fs)) = (vertex, fragment) else {
            return Err(errors);
        };
        if !errors.is_empty() {
            return Err(errors);
        }

        let iface = reflect::link_interface(&vs.module, &fs.module)?;

        // A target the shader never writes must have its writes masked off.
        let write_mask = if iface.writes_color {
            wgpu::ColorWrites::ALL
        } else {
            wgpu::ColorWrites::empty()
        };

        let buffers: Vec<wgpu::VertexBufferLayout<'_>> =
            iface.vertex_layout.buffer_layout().into_iter().collect();

        // Anything naga let through but wgpu rejects goes to the link log.
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("trigon program"),
            layout: None,

            vertex: wgpu::VertexState {
                module: &vs.shader,
                entry_point: Some(ENTRY_POINT),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &fs.shader,
                entry_point: Some(ENTRY_POINT),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.target_format,
                    blend: None,
                    write_mask,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(vec![format!("pipeline creation failed: {}", err)]);
        }

        Ok(LinkedPipeline {
            pipeline,
            vertex_layout: iface.vertex_layout,
            writes_color: iface.writes_color,
        })
    }
}

fn copy_log(log: &str, buf: &mut [u8]) -> usize {
    let n = log.len().min(buf.len());
    buf[..n].copy_from_slice(&log.as_bytes()[..n]);
    n
}

impl GraphicsApi for WgpuGraphics {
    fn create_stage(&self, kind: StageKind) -> Option<StageHandle> {
        let handle = StageHandle(self.next_id()?);
        self.stages.borrow_mut().insert(
            handle,
            StageObject { kind, source: String::new(), compiled: None, log: String::new() },
        );
        Some(handle)
    }

    fn delete_stage(&self, stage: StageHandle) {
        if self.stages.borrow_mut().remove(&stage).is_none() {
            log::warn!("delete of unknown stage {:?}", stage);
        }
    }

    fn set_stage_source(&self, stage: StageHandle, source: &str) {
        if let Some(s) = self.stages.borrow_mut().get_mut(&stage) {
            s.source = source.to_string();
            s.compiled = None;
        }
    }

    fn compile_stage(&self, stage: StageHandle) {
        let Some((kind, source)) = self
            .stages
            .borrow()
            .get(&stage)
            .map(|s| (s.kind, s.source.clone()))
        else {
            return;
        };

        let result = self.compile(kind, &source);

        if let Some(s) = self.stages.borrow_mut().get_mut(&stage) {
            match result {
                Ok(module) => {
                    s.compiled = Some(Rc::new(module));
                    s.log.clear();
                }
                Err(log) => {
                    s.compiled = None;
                    s.log = log;
                }
            }
        }
    }

    fn stage_compile_status(&self, stage: StageHandle) -> bool {
        self.stages
            .borrow()
            .get(&stage)
            .is_some_and(|s| s.compiled.is_some())
    }

    fn stage_log_len(&self, stage: StageHandle) -> usize {
        self.stages.borrow().get(&stage).map_or(0, |s| s.log.len())
    }

    fn read_stage_log(&self, stage: StageHandle, buf: &mut [u8]) -> usize {
        self.stages
            .borrow()
            .get(&stage)
            .map_or(0, |s| copy_log(&s.log, buf))
    }

    fn create_program(&self) -> Option<ProgramHandle> {
        let handle = ProgramHandle(self.next_id()?);
        self.programs.borrow_mut().insert(handle, ProgramObject::default());
        Some(handle)
    }

    fn delete_program(&self, program: ProgramHandle) {
        if self.programs.borrow_mut().remove(&program).is_none() {
            log::warn!("delete of unknown program {:?}", program);
        }
    }

    fn attach_stage(&self, program: ProgramHandle, stage: StageHandle) {
        if let Some(p) = self.programs.borrow_mut().get_mut(&program) {
            if !p.attached.contains(&stage) {
                p.attached.push(stage);
            }
        }
    }

    fn detach_stage(&self, program: ProgramHandle, stage: StageHandle) {
        if let Some(p) = self.programs.borrow_mut().get_mut(&program) {
            p.attached.retain(|s| *s != stage);
        }
    }

    fn link_program(&self, program: ProgramHandle) {
        let Some(attached) = self.programs.borrow().get(&program).map(|p| p.attached.clone()) else {
            return;
        };

        let result = self.link(&attached);

        if let Some(p) = self.programs.borrow_mut().get_mut(&program) {
            p.validated = false;
            match result {
                Ok(linked) => {
                    p.linked = Some(linked);
                    p.log.clear();
                }
                Err(errors) => {
                    p.linked = None;
                    p.log = errors.join("\n");
                }
            }
        }
    }

    fn program_link_status(&self, program: ProgramHandle) -> bool {
        self.programs
            .borrow()
            .get(&program)
            .is_some_and(|p| p.linked.is_some())
    }

    fn validate_program(&self, program: ProgramHandle) {
        if let Some(p) = self.programs.borrow_mut().get_mut(&program) {
            let problem = match &p.linked {
                None => Some("program is not linked"),
                Some(l) if !l.writes_color => {
                    Some("fragment stage writes no colour at location 0; draws leave the target unchanged")
                }
                Some(_) => None,
            };
            p.validated = problem.is_none();
            if let Some(problem) = problem {
                p.log = problem.to_string();
            }
        }
    }

    fn program_validate_status(&self, program: ProgramHandle) -> bool {
        self.programs.borrow().get(&program).is_some_and(|p| p.validated)
    }

    fn program_log_len(&self, program: ProgramHandle) -> usize {
        self.programs.borrow().get(&program).map_or(0, |p| p.log.len())
    }

    fn read_program_log(&self, program: ProgramHandle, buf: &mut [u8]) -> usize {
        self.programs
            .borrow()
            .get(&program)
            .map_or(0, |p| copy_log(&p.log, buf))
    }
}
