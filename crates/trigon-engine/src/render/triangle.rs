use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use trigon_shader::LinkedProgram;
use wgpu::util::DeviceExt;

use crate::backend::{VertexLayout, WgpuGraphics};
use crate::device::Gpu;

/// One vertex of the demo triangle: a 2D position in NDC.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
}

/// The classic "hello triangle". Wound clockwise; the pipeline does not cull.
pub const TRIANGLE: [Vertex; 3] = [
    Vertex { position: [-0.5, -0.5] },
    Vertex { position: [0.0, 0.5] },
    Vertex { position: [0.5, -0.5] },
];

/// Draws [`TRIANGLE`] with a linked program.
///
/// The program must either read one `vec2` at location 0 or take no vertex
/// inputs at all (positions generated in the shader).
pub struct TriangleRenderer {
    pipeline: wgpu::RenderPipeline,
    vbo: Option<wgpu::Buffer>,
}

impl TriangleRenderer {
    pub fn new(gpu: &Gpu, graphics: &WgpuGraphics, program: &LinkedProgram) -> Result<Self> {
        let handle = program.handle();
        let pipeline = graphics
            .pipeline(handle)
            .context("program has no render pipeline")?;
        let layout = graphics
            .vertex_layout(handle)
            .context("program has no vertex layout")?;

        let vbo = if needs_vertex_buffer(&layout)? {
            Some(gpu.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("trigon triangle vbo"),
                contents: bytemuck::cast_slice(&TRIANGLE),
                usage: wgpu::BufferUsages::VERTEX,
            }))
        } else {
            None
        };

        Ok(Self { pipeline, vbo })
    }

    pub fn draw(&self, rpass: &mut wgpu::RenderPass<'_>) {
        rpass.set_pipeline(&self.pipeline);
        if let Some(vbo) = &self.vbo {
            rpass.set_vertex_buffer(0, vbo.slice(..));
        }
        rpass.draw(0..TRIANGLE.len() as u32, 0..1);
    }
}

/// The only attribute a [`Vertex`] buffer can feed.
const POSITION: wgpu::VertexAttribute = wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
    shader_location: 0,
};

/// `Ok(false)` when the program takes no vertex inputs.
fn needs_vertex_buffer(layout: &VertexLayout) -> Result<bool> {
    if layout.attributes.is_empty() {
        return Ok(false);
    }
    anyhow::ensure!(
        layout.attributes == [POSITION] && layout.stride == std::mem::size_of::<Vertex>() as u64,
        "program expects vertex attributes {:?}, triangle provides one vec2 at location 0",
        layout.attributes
    );
    Ok(true)
}
