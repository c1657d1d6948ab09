use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::device::Gpu;
use crate::error::BackendError;
use crate::paint::Rgba;

use super::{
    ArrayHandle, BufferHandle, COLOR_UNIFORM, GraphicsBackend, HandleAlloc, PrimitiveKind,
    ProgramHandle, Vertex, check_attributes, check_range,
};

/// [`GraphicsBackend`] rendering into a window surface through wgpu.
///
/// Draws are collected during the frame and replayed in one render pass at
/// [`end_frame`](GraphicsBackend::end_frame). A vertex array drawn several
/// times in one frame keeps its first slot and its latest vertex count, so an
/// incremental append followed by a re-presentation costs one GPU draw.
pub struct WgpuBackend<'w> {
    gpu: Gpu<'w>,
    clear: Rgba,
    ids: HandleAlloc,

    buffers: HashMap<BufferHandle, VertexBuffer>,
    programs: HashMap<ProgramHandle, LineProgram>,
    arrays: HashMap<ArrayHandle, (ProgramHandle, BufferHandle)>,

    draws: Vec<DrawCall>,
    draw_slots: HashMap<ArrayHandle, usize>,

    line_width: f32,
    warned_line_width: bool,
}

struct VertexBuffer {
    buffer: wgpu::Buffer,
    size: u64,
}

struct LineProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipelines: HashMap<PrimitiveKind, wgpu::RenderPipeline>,
}

#[derive(Debug, Copy, Clone)]
struct DrawCall {
    array: ArrayHandle,
    kind: PrimitiveKind,
    count: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ColorUniform {
    color: [f32; 4],
}

impl<'w> WgpuBackend<'w> {
    pub fn new(gpu: Gpu<'w>, clear: Rgba) -> Self {
        Self {
            gpu,
            clear,
            ids: HandleAlloc::default(),
            buffers: HashMap::new(),
            programs: HashMap::new(),
            arrays: HashMap::new(),
            draws: Vec::new(),
            draw_slots: HashMap::new(),
            line_width: 1.0,
            warned_line_width: false,
        }
    }

    pub fn gpu(&self) -> &Gpu<'w> {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut Gpu<'w> {
        &mut self.gpu
    }

    /// Width requested by the last draw; informational on wgpu.
    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn set_clear_color(&mut self, clear: Rgba) {
        self.clear = clear;
    }

    fn ensure_pipeline(&mut self, program: ProgramHandle, kind: PrimitiveKind) -> Result<(), BackendError> {
        let format = self.gpu.surface_format();
        let device = self.gpu.device();
        let prog = self
            .programs
            .get_mut(&program)
            .ok_or(BackendError::UnknownProgram(program))?;

        if prog.pipelines.contains_key(&kind) {
            return Ok(());
        }

        let topology = match kind {
            PrimitiveKind::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveKind::Points => wgpu::PrimitiveTopology::PointList,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("turtlegl line pipeline"),
            layout: Some(&prog.layout),
            vertex: wgpu::VertexState {
                module: &prog.vertex,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &prog.fragment,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology,
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

        prog.pipelines.insert(kind, pipeline);
        Ok(())
    }
}

impl GraphicsBackend for WgpuBackend<'_> {
    fn create_buffer(&mut self, size: u64, initial: &[u8]) -> Result<BufferHandle, BackendError> {
        check_range(0, initial.len() as u64, size)?;

        let max = self.gpu.device().limits().max_buffer_size;
        // wgpu requires buffer sizes aligned to COPY_BUFFER_ALIGNMENT.
        let size = size.max(wgpu::COPY_BUFFER_ALIGNMENT).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if size > max {
            return Err(BackendError::TooLarge { size, max });
        }

        let buffer = self.gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("turtlegl vertex buffer"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if !initial.is_empty() {
            self.gpu.queue().write_buffer(&buffer, 0, initial);
        }

        let handle = BufferHandle(self.ids.next());
        self.buffers.insert(handle, VertexBuffer { buffer, size });
        Ok(handle)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), BackendError> {
        let vb = self
            .buffers
            .get(&buffer)
            .ok_or(BackendError::UnknownBuffer(buffer))?;
        check_range(offset, bytes.len() as u64, vb.size)?;
        if !bytes.is_empty() {
            self.gpu.queue().write_buffer(&vb.buffer, offset, bytes);
        }
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) -> Result<(), BackendError> {
        let vb = self
            .buffers
            .remove(&buffer)
            .ok_or(BackendError::UnknownBuffer(buffer))?;
        vb.buffer.destroy();
        Ok(())
    }

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle, BackendError> {
        let device = self.gpu.device();

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("turtlegl line vertex shader"),
            source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("turtlegl line fragment shader"),
            source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("turtlegl line bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ColorUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("turtlegl line pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("turtlegl color ubo"),
            size: std::mem::size_of::<ColorUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.gpu.queue().write_buffer(
            &uniform,
            0,
            bytemuck::bytes_of(&ColorUniform { color: [1.0; 4] }),
        );

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("turtlegl line bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });

        let handle = ProgramHandle(self.ids.next());
        self.programs.insert(
            handle,
            LineProgram {
                vertex,
                fragment,
                layout,
                uniform,
                bind_group,
                pipelines: HashMap::new(),
            },
        );

        // Line strips are the common case; build that pipeline eagerly so the
        // first draw does not stall.
        self.ensure_pipeline(handle, PrimitiveKind::LineStrip)?;
        Ok(handle)
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        name: &str,
        value: [f32; 4],
    ) -> Result<(), BackendError> {
        if name != COLOR_UNIFORM {
            return Err(BackendError::UnknownUniform(name.to_string()));
        }
        let prog = self
            .programs
            .get(&program)
            .ok_or(BackendError::UnknownProgram(program))?;
        self.gpu
            .queue()
            .write_buffer(&prog.uniform, 0, bytemuck::bytes_of(&ColorUniform { color: value }));
        Ok(())
    }

    fn release_program(&mut self, program: ProgramHandle) -> Result<(), BackendError> {
        let prog = self
            .programs
            .remove(&program)
            .ok_or(BackendError::UnknownProgram(program))?;
        prog.uniform.destroy();
        Ok(())
    }

    fn set_line_width(&mut self, width: f32) {
        // wgpu rasterizes lines one pixel wide; the value is kept for parity
        // with GL-style backends.
        if width != 1.0 && !self.warned_line_width {
            log::debug!("line width {width} requested; wgpu only draws 1px lines");
            self.warned_line_width = true;
        }
        self.line_width = width;
    }

    fn bind_vertex_array(
        &mut self,
        program: ProgramHandle,
        buffer: BufferHandle,
        attributes: &[&str],
    ) -> Result<ArrayHandle, BackendError> {
        check_attributes(attributes)?;
        if !self.programs.contains_key(&program) {
            return Err(BackendError::UnknownProgram(program));
        }
        if !self.buffers.contains_key(&buffer) {
            return Err(BackendError::UnknownBuffer(buffer));
        }
        let array = ArrayHandle(self.ids.next());
        self.arrays.insert(array, (program, buffer));
        Ok(array)
    }

    fn release_array(&mut self, array: ArrayHandle) -> Result<(), BackendError> {
        self.arrays
            .remove(&array)
            .map(|_| ())
            .ok_or(BackendError::UnknownArray(array))
    }

    fn draw(
        &mut self,
        array: ArrayHandle,
        kind: PrimitiveKind,
        vertex_count: u32,
    ) -> Result<(), BackendError> {
        let (program, buffer) = self
            .arrays
            .get(&array)
            .copied()
            .ok_or(BackendError::UnknownArray(array))?;
        let size = self
            .buffers
            .get(&buffer)
            .map(|b| b.size)
            .ok_or(BackendError::UnknownBuffer(buffer))?;
        check_range(0, vertex_count as u64 * Vertex::STRIDE, size)?;
        self.ensure_pipeline(program, kind)?;

        let call = DrawCall {
            array,
            kind,
            count: vertex_count,
        };
        match self.draw_slots.get(&array) {
            Some(&slot) => self.draws[slot] = call,
            None => {
                self.draw_slots.insert(array, self.draws.len());
                self.draws.push(call);
            }
        }
        Ok(())
    }

    fn begin_frame(&mut self) {
        self.draws.clear();
        self.draw_slots.clear();
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        let Some(mut frame) = self.gpu.acquire()? else {
            return Ok(());
        };

        {
            let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("turtlegl line pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for call in &self.draws {
                if call.count == 0 {
                    continue;
                }
                let Some(&(program, buffer)) = self.arrays.get(&call.array) else { continue };
                let Some(prog) = self.programs.get(&program) else { continue };
                let Some(vb) = self.buffers.get(&buffer) else { continue };
                let Some(pipeline) = prog.pipelines.get(&call.kind) else { continue };

                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, &prog.bind_group, &[]);
                rpass.set_vertex_buffer(0, vb.buffer.slice(..call.count as u64 * Vertex::STRIDE));
                rpass.draw(0..call.count, 0..1);
            }
        }

        self.gpu.present(frame);
        Ok(())
    }
}
