use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::Result;
use image::RgbaImage;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use wgpu::naga;
use wgpu::util::DeviceExt;

use crate::backend::{
    BackendError, BufferId, BufferUsage, DrawMode, GraphicsContext, ProgramId, Sampling, ShaderId,
    TextureId, UniformLocation, UniformSlot, UniformValue, VertexLayout,
};
use crate::compile::{prepare_stage, POSITION_ATTRIBUTE};
use crate::surface::SurfaceDimensions;
use crate::types::{GpuPowerPreference, StageKind};

use super::channels::{self, ChannelTexture};
use super::context::GpuContext;
use super::pipeline::{self, AttributeBinding, PipelineKey, PipelineLayouts};
use super::uniforms::BackdropUniforms;

struct CompiledStage {
    kind: StageKind,
    module: wgpu::ShaderModule,
    active_uniforms: Vec<UniformSlot>,
}

struct GpuProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    active_uniforms: Vec<UniformSlot>,
    pipeline: Option<(PipelineKey, wgpu::RenderPipeline)>,
}

struct ChannelBinding {
    texture: TextureId,
    generation: u64,
    bind_group: wgpu::BindGroup,
}

/// [`GraphicsContext`] backed by wgpu and a window surface.
///
/// Uniform writes land in a CPU-side [`BackdropUniforms`] block that is
/// flushed once per draw. `draw_arrays` acquires the swapchain image and
/// submits; `present` hands it to the compositor.
pub struct WgpuContext {
    context: GpuContext,
    layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: BackdropUniforms,
    channel_unit: u32,
    next_id: u32,
    next_generation: u64,
    shaders: HashMap<ShaderId, CompiledStage>,
    programs: HashMap<ProgramId, GpuProgram>,
    current_program: Option<ProgramId>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    attribute: Option<(BufferId, AttributeBinding)>,
    textures: HashMap<TextureId, ChannelTexture>,
    bound_textures: HashMap<u32, TextureId>,
    channel_binding: Option<ChannelBinding>,
    placeholder: ChannelTexture,
    clear_requested: bool,
    frame: Option<wgpu::SurfaceTexture>,
}

impl WgpuContext {
    /// Creates the device and configures a surface for `target`, which must
    /// outlive the returned context.
    pub fn new<T>(
        target: &T,
        initial_size: SurfaceDimensions,
        gpu_power: GpuPowerPreference,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size, gpu_power)?;
        let layouts = PipelineLayouts::new(&context.device);

        let uniforms = BackdropUniforms::new(initial_size.width, initial_size.height);
        let uniform_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("backdrop uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let uniform_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let placeholder = channels::create_placeholder(&context.device, &context.queue);

        Ok(Self {
            context,
            layouts,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            channel_unit: 0,
            next_id: 0,
            next_generation: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            current_program: None,
            buffers: HashMap::new(),
            attribute: None,
            textures: HashMap::new(),
            bound_textures: HashMap::new(),
            channel_binding: None,
            placeholder,
            clear_requested: false,
            frame: None,
        })
    }

    pub fn size(&self) -> SurfaceDimensions {
        self.context.size
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Runs `f` inside a validation error scope so device errors come back
    /// as text instead of aborting through the uncaptured-error handler.
    fn scoped<R>(&self, f: impl FnOnce(&wgpu::Device) -> R) -> Result<R, String> {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(device);
        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(value),
        }
    }

    fn surface_error(&mut self, error: wgpu::SurfaceError) -> BackendError {
        match error {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                self.context.reconfigure();
                BackendError::SurfaceLost(error.to_string())
            }
            wgpu::SurfaceError::OutOfMemory => BackendError::Fatal(error.to_string()),
            other => BackendError::SurfaceLost(other.to_string()),
        }
    }

    fn ensure_pipeline(&mut self, program: ProgramId, mode: DrawMode) -> Result<(), BackendError> {
        let (_, attribute) = self
            .attribute
            .ok_or(BackendError::UnknownHandle("vertex buffer"))?;
        let key = PipelineKey { mode, attribute };
        let entry = self
            .programs
            .get(&program)
            .ok_or(BackendError::UnknownHandle("program"))?;
        if matches!(&entry.pipeline, Some((cached, _)) if *cached == key) {
            return Ok(());
        }

        let format = pipeline::vertex_format(attribute.layout.components)
            .ok_or_else(|| BackendError::Fatal("unsupported vertex attribute size".into()))?;
        let render_pipeline = self
            .scoped(|device| {
                pipeline::create_render_pipeline(
                    device,
                    &self.layouts,
                    &entry.vertex,
                    &entry.fragment,
                    self.context.surface_format,
                    key,
                    format,
                )
            })
            .map_err(BackendError::Fatal)?;
        debug!(program = program.0, ?mode, "render pipeline created");
        if let Some(entry) = self.programs.get_mut(&program) {
            entry.pipeline = Some((key, render_pipeline));
        }
        Ok(())
    }

    fn ensure_channel_binding(&mut self) {
        let bound = self.bound_textures.get(&self.channel_unit).copied();
        let (texture_id, channel) = match bound.and_then(|id| self.textures.get(&id).map(|t| (id, t)))
        {
            Some(found) => found,
            None => (TextureId(0), &self.placeholder),
        };
        if let Some(binding) = &self.channel_binding {
            if binding.texture == texture_id && binding.generation == channel.generation {
                return;
            }
        }
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("channel bind group"),
                layout: &self.layouts.channel_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&channel.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&channel.sampler),
                    },
                ],
            });
        self.channel_binding = Some(ChannelBinding {
            texture: texture_id,
            generation: channel.generation,
            bind_group,
        });
    }
}

fn naga_stage(kind: StageKind) -> naga::ShaderStage {
    match kind {
        StageKind::Vertex => naga::ShaderStage::Vertex,
        StageKind::Fragment => naga::ShaderStage::Fragment,
    }
}

impl GraphicsContext for WgpuContext {
    fn create_shader(&mut self, kind: StageKind, source: &str) -> Result<ShaderId, String> {
        let prepared = prepare_stage(kind, source)?;
        let module = self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match kind {
                    StageKind::Vertex => "backdrop vertex shader",
                    StageKind::Fragment => "backdrop fragment shader",
                }),
                source: wgpu::ShaderSource::Glsl {
                    shader: Cow::Owned(prepared.glsl.clone()),
                    stage: naga_stage(kind),
                    defines: &[],
                },
            })
        })?;
        let shader = ShaderId(self.next_id());
        self.shaders.insert(
            shader,
            CompiledStage {
                kind,
                module,
                active_uniforms: prepared.active_uniforms,
            },
        );
        Ok(shader)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let vertex_stage = self
            .shaders
            .get(&vertex)
            .filter(|stage| stage.kind == StageKind::Vertex)
            .ok_or_else(|| format!("shader {} is not a compiled vertex stage", vertex.0))?;
        let fragment_stage = self
            .shaders
            .get(&fragment)
            .filter(|stage| stage.kind == StageKind::Fragment)
            .ok_or_else(|| format!("shader {} is not a compiled fragment stage", fragment.0))?;
        let program = GpuProgram {
            vertex: vertex_stage.module.clone(),
            fragment: fragment_stage.module.clone(),
            active_uniforms: fragment_stage.active_uniforms.clone(),
            pipeline: None,
        };
        let id = ProgramId(self.next_id());
        self.programs.insert(id, program);
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let slot = UniformSlot::from_glsl_name(name)?;
        self.programs
            .get(&program)
            .filter(|entry| entry.active_uniforms.contains(&slot))
            .map(|_| UniformLocation { program, slot })
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        (self.programs.contains_key(&program) && name == POSITION_ATTRIBUTE).then_some(0)
    }

    fn create_buffer(&mut self, data: &[f32], usage: BufferUsage) -> Result<BufferId, BackendError> {
        let mut usages = wgpu::BufferUsages::VERTEX;
        if usage == BufferUsage::Dynamic {
            usages |= wgpu::BufferUsages::COPY_DST;
        }
        let buffer = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("backdrop vertices"),
                contents: bytemuck::cast_slice(data),
                usage: usages,
            });
        let id = BufferId(self.next_id());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn vertex_attrib_pointer(&mut self, location: u32, buffer: BufferId, layout: VertexLayout) {
        if !self.buffers.contains_key(&buffer) {
            warn!(buffer = buffer.0, "attribute pointer to unknown buffer ignored");
            return;
        }
        self.attribute = Some((buffer, AttributeBinding { location, layout }));
    }

    fn create_texture(&mut self) -> Result<TextureId, BackendError> {
        let texture = channels::create_placeholder(&self.context.device, &self.context.queue);
        let id = TextureId(self.next_id());
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn upload_texture(
        &mut self,
        texture: TextureId,
        image: &RgbaImage,
        sampling: Sampling,
    ) -> Result<(), BackendError> {
        if !self.textures.contains_key(&texture) {
            return Err(BackendError::UnknownHandle("texture"));
        }
        let max_dimension = self.context.limits.max_texture_dimension_2d;
        if image.width() > max_dimension || image.height() > max_dimension {
            return Err(BackendError::Rejected(format!(
                "image is {}x{}, device limit is {max_dimension}",
                image.width(),
                image.height()
            )));
        }

        let generation = self.next_generation + 1;
        let queue = &self.context.queue;
        let uploaded = self
            .scoped(|device| channels::upload(device, queue, image, sampling, generation))
            .map_err(BackendError::Rejected)?;
        self.next_generation = generation;
        self.textures.insert(texture, uploaded);
        Ok(())
    }

    fn viewport(&mut self, width: u32, height: u32) {
        let requested = SurfaceDimensions::new(width, height);
        if requested != self.context.size {
            self.context.resize(requested);
        }
        let applied = self.context.size;
        self.uniforms.i_resolution = [applied.width as f32, applied.height as f32, 1.0];
    }

    fn clear(&mut self) {
        self.clear_requested = true;
    }

    fn uniform(&mut self, location: Option<&UniformLocation>, value: UniformValue) {
        let Some(location) = location else {
            return;
        };
        if self.current_program != Some(location.program) {
            return;
        }
        match (location.slot, value) {
            (UniformSlot::Channel0, UniformValue::Int(unit)) => {
                self.channel_unit = u32::try_from(unit).unwrap_or(0);
            }
            (slot, value) => {
                if !self.uniforms.apply(slot, value) {
                    warn!(uniform = slot.glsl_name(), ?value, "uniform type mismatch");
                }
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.bound_textures.insert(unit, texture);
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) -> Result<(), BackendError> {
        let program = self
            .current_program
            .ok_or(BackendError::UnknownHandle("program"))?;
        if self.context.size.is_empty() {
            return Ok(());
        }
        self.ensure_pipeline(program, mode)?;
        self.ensure_channel_binding();

        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(error) => return Err(self.surface_error(error)),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let (Some((vertex_buffer, _)), Some(entry), Some(channel)) = (
            self.attribute.and_then(|(id, _)| self.buffers.get(&id).map(|b| (b, id))),
            self.programs.get(&program),
            self.channel_binding.as_ref(),
        ) else {
            return Err(BackendError::UnknownHandle("pipeline state"));
        };
        let Some((_, render_pipeline)) = &entry.pipeline else {
            return Err(BackendError::UnknownHandle("render pipeline"));
        };

        let load = if std::mem::take(&mut self.clear_requested) {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("backdrop encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("backdrop pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(render_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &channel.bind_group, &[]);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.draw(first..first + count, 0..1);
        }
        self.context.queue.submit(Some(encoder.finish()));
        self.frame = Some(frame);
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
        Ok(())
    }
}
