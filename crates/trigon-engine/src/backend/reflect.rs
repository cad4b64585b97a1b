//! Stage interface reflection over naga IR.
//!
//! Used at link time to derive the vertex buffer layout from the vertex
//! stage's inputs and to check that the fragment stage only reads what the
//! vertex stage writes.

use naga::{
    Binding, Handle, Interpolation, Module, Sampling, Scalar, ScalarKind, ShaderStage, Type,
    TypeInner, VectorSize,
};

/// A user-defined (`layout(location = N)`) stage input or output.
#[derive(Debug, Clone, PartialEq)]
pub struct IoVar {
    pub location: u32,
    pub name: Option<String>,
    pub ty: TypeInner,
    pub interpolation: Option<Interpolation>,
    pub sampling: Option<Sampling>,
}

impl IoVar {
    fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("`{}`", name),
            None => format!("location {}", self.location),
        }
    }
}

/// Inputs of the `stage` entry point, sorted by location. Built-ins are skipped.
pub fn inputs(module: &Module, stage: ShaderStage) -> Vec<IoVar> {
    let mut vars = Vec::new();
    if let Some(ep) = module.entry_points.iter().find(|ep| ep.stage == stage) {
        for arg in &ep.function.arguments {
            collect(module, arg.name.as_deref(), arg.ty, arg.binding.as_ref(), &mut vars);
        }
    }
    vars.sort_by_key(|v| v.location);
    vars
}

/// Outputs of the `stage` entry point, sorted by location. Built-ins are skipped.
pub fn outputs(module: &Module, stage: ShaderStage) -> Vec<IoVar> {
    let mut vars = Vec::new();
    if let Some(result) = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage)
        .and_then(|ep| ep.function.result.as_ref())
    {
        collect(module, None, result.ty, result.binding.as_ref(), &mut vars);
    }
    vars.sort_by_key(|v| v.location);
    vars
}

fn collect(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<IoVar>,
) {
    match binding {
        Some(Binding::Location { location, interpolation, sampling, .. }) => out.push(IoVar {
            location: *location,
            name: name.map(str::to_string),
            ty: module.types[ty].inner.clone(),
            interpolation: *interpolation,
            sampling: *sampling,
        }),
        Some(Binding::BuiltIn(_)) => {}
        // Unbound aggregates carry per-member bindings.
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect(module, m.name.as_deref(), m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

// ── vertex layout ─────────────────────────────────────────────────────────

/// Tightly packed single-buffer layout for the vertex stage's inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexLayout {
    pub attributes: Vec<wgpu::VertexAttribute>,
    pub stride: u64,
}

impl VertexLayout {
    /// `None` when the vertex stage reads no attributes.
    pub fn buffer_layout(&self) -> Option<wgpu::VertexBufferLayout<'_>> {
        if self.attributes.is_empty() {
            return None;
        }
        Some(wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        })
    }
}

pub fn vertex_layout(inputs: &[IoVar]) -> Result<VertexLayout, String> {
    let mut attributes = Vec::with_capacity(inputs.len());
    let mut offset = 0u64;
    for input in inputs {
        let format = vertex_format(&input.ty).ok_or_else(|| {
            format!(
                "vertex input {} has type {}, which cannot be fed from a vertex buffer",
                input.label(),
                describe(&input.ty)
            )
        })?;
        attributes.push(wgpu::VertexAttribute {
            format,
            offset,
            shader_location: input.location,
        });
        offset += format.size();
    }
    Ok(VertexLayout { attributes, stride: offset })
}

fn vertex_format(ty: &TypeInner) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;

    let (scalar, size) = match *ty {
        TypeInner::Scalar(scalar) => (scalar, None),
        TypeInner::Vector { size, scalar } => (scalar, Some(size)),
        _ => return None,
    };
    if scalar.width != 4 {
        return None;
    }
    Some(match (scalar.kind, size) {
        (ScalarKind::Float, None) => F::Float32,
        (ScalarKind::Float, Some(VectorSize::Bi)) => F::Float32x2,
        (ScalarKind::Float, Some(VectorSize::Tri)) => F::Float32x3,
        (ScalarKind::Float, Some(VectorSize::Quad)) => F::Float32x4,
        (ScalarKind::Sint, None) => F::Sint32,
        (ScalarKind::Sint, Some(VectorSize::Bi)) => F::Sint32x2,
        (ScalarKind::Sint, Some(VectorSize::Tri)) => F::Sint32x3,
        (ScalarKind::Sint, Some(VectorSize::Quad)) => F::Sint32x4,
        (ScalarKind::Uint, None) => F::Uint32,
        (ScalarKind::Uint, Some(VectorSize::Bi)) => F::Uint32x2,
        (ScalarKind::Uint, Some(VectorSize::Tri)) => F::Uint32x3,
        (ScalarKind::Uint, Some(VectorSize::Quad)) => F::Uint32x4,
        _ => return None,
    })
}

// ── interface matching ────────────────────────────────────────────────────

/// What linking learned about a vertex + fragment pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInterface {
    pub vertex_layout: VertexLayout,
    /// Whether the fragment stage writes a colour at location 0.
    pub writes_color: bool,
}

/// Checks a vertex/fragment pair for link compatibility.
///
/// Every problem found is returned, one message per line of the link log.
pub fn link_interface(vs: &Module, fs: &Module) -> Result<ProgramInterface, Vec<String>> {
    let mut errors = Vec::new();

    let vertex_layout = match vertex_layout(&inputs(vs, ShaderStage::Vertex)) {
        Ok(layout) => Some(layout),
        Err(e) => {
            errors.push(e);
            None
        }
    };

    let written = outputs(vs, ShaderStage::Vertex);
    for input in inputs(fs, ShaderStage::Fragment) {
        match written.iter().find(|o| o.location == input.location) {
            None => errors.push(format!(
                "fragment input {} at location {} is not written by the vertex stage",
                input.label(),
                input.location
            )),
            Some(out) if out.ty != input.ty => errors.push(format!(
                "type mismatch at location {}: vertex writes {}, fragment reads {}",
                input.location,
                describe(&out.ty),
                describe(&input.ty)
            )),
            Some(out) if out.interpolation != input.interpolation => errors.push(format!(
                "interpolation mismatch at location {}: vertex writes {}, fragment reads {}",
                input.location,
                interpolation_name(out.interpolation),
                interpolation_name(input.interpolation)
            )),
            Some(out) if out.sampling != input.sampling => errors.push(format!(
                "sampling mismatch at location {}: vertex writes {}, fragment reads {}",
                input.location,
                sampling_name(out.sampling),
                sampling_name(input.sampling)
            )),
            Some(_) => {}
        }
    }

    let color = outputs(fs, ShaderStage::Fragment)
        .into_iter()
        .find(|o| o.location == 0);
    if let Some(color) = &color {
        if !is_float(&color.ty) {
            errors.push(format!(
                "fragment colour output {} is {}, expected a float vector",
                color.label(),
                describe(&color.ty)
            ));
        }
    }

    match vertex_layout {
        Some(vertex_layout) if errors.is_empty() => Ok(ProgramInterface {
            vertex_layout,
            writes_color: color.is_some(),
        }),
        _ => Err(errors),
    }
}

fn is_float(ty: &TypeInner) -> bool {
    matches!(
        ty,
        TypeInner::Scalar(Scalar { kind: ScalarKind::Float, .. })
            | TypeInner::Vector { scalar: Scalar { kind: ScalarKind::Float, .. }, .. }
    )
}

/// GLSL qualifier spelling, for diagnostics.
fn interpolation_name(interpolation: Option<Interpolation>) -> &'static str {
    match interpolation {
        None => "no interpolation qualifier",
        Some(Interpolation::Perspective) => "smooth",
        Some(Interpolation::Linear) => "noperspective",
        Some(Interpolation::Flat) => "flat",
    }
}

fn sampling_name(sampling: Option<Sampling>) -> &'static str {
    match sampling {
        None => "default sampling",
        Some(Sampling::Center) => "center",
        Some(Sampling::Centroid) => "centroid",
        Some(Sampling::Sample) => "sample",
        Some(Sampling::First) => "first-vertex",
        Some(Sampling::Either) => "either-vertex",
    }
}

/// GLSL-style spelling of simple types for diagnostics.
fn describe(ty: &TypeInner) -> String {
    let prefix = |kind: ScalarKind| match kind {
        ScalarKind::Float => "",
        ScalarKind::Sint => "i",
        ScalarKind::Uint => "u",
        ScalarKind::Bool => "b",
        _ => "?",
    };
    match *ty {
        TypeInner::Scalar(Scalar { kind, .. }) => match kind {
            ScalarKind::Float => "float".to_string(),
            ScalarKind::Sint => "int".to_string(),
            ScalarKind::Uint => "uint".to_string(),
            ScalarKind::Bool => "bool".to_string(),
            other => format!("{:?}", other),
        },
        TypeInner::Vector { size, scalar } => format!("{}vec{}", prefix(scalar.kind), size as u8),
        TypeInner::Matrix { columns, rows, .. } => {
            format!("mat{}x{}", columns as u8, rows as u8)
        }
        ref other => format!("{:?}", other),
    }
}
