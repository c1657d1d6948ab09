use bytemuck::{Pod, Zeroable};

/// Attribute names accepted by `bind_vertex_array`, in shader location order.
pub const VERTEX_ATTRIBUTES: &[&str] = &["in_pos", "in_color"];

/// One line-strip vertex in device space: `(x, y, r, g, b, a)`.
///
/// Layout (24 bytes):
///
///  offset  0  pos    [f32; 2]   loc 0  in_pos
///  offset  8  color  [f32; 4]   loc 1  in_color
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // in_pos
        1 => Float32x4  // in_color
    ];

    #[inline]
    pub const fn new(pos: [f32; 2], color: [f32; 4]) -> Self {
        Self { pos, color }
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.color[3]
    }

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}
