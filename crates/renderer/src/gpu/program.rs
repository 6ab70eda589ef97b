use std::borrow::Cow;
use std::path::Path;

use wgpu::naga::ShaderStage;

use crate::compile::{
    parse_stage, wrap_fragment, ShaderError, DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER,
};
use crate::texture::UniformTarget;

use super::quad::ScreenQuad;
use super::uniforms::{UniformBlock, UniformLocation, UniformValue};

/// Linked vertex + fragment pipeline with a reflected uniform block.
///
/// Uniform writes go to a CPU mirror; [`flush`](Self::flush) uploads it when
/// something changed.
pub struct ShaderProgram {
    pipeline: wgpu::RenderPipeline,
    uniforms: UniformBlock,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

/// Inputs shared by every program drawn into the same surface.
pub(crate) struct ProgramTargets<'a> {
    pub surface_format: wgpu::TextureFormat,
    pub unit_layout: &'a wgpu::BindGroupLayout,
    pub unit_count: u32,
}

impl ShaderProgram {
    /// Reads the given shader files, falling back to the bundled shaders.
    pub(crate) fn from_files(
        device: &wgpu::Device,
        vertex: Option<&Path>,
        fragment: Option<&Path>,
        targets: &ProgramTargets<'_>,
    ) -> Result<Self, ShaderError> {
        let vertex_source = read_or_default(vertex, DEFAULT_VERTEX_SHADER)?;
        let fragment_source = read_or_default(fragment, DEFAULT_FRAGMENT_SHADER)?;
        Self::new(device, &vertex_source, &fragment_source, targets)
    }

    pub(crate) fn new(
        device: &wgpu::Device,
        vertex_source: &str,
        fragment_source: &str,
        targets: &ProgramTargets<'_>,
    ) -> Result<Self, ShaderError> {
        let vertex = parse_stage(vertex_source, ShaderStage::Vertex)?;
        let wrapped = wrap_fragment(fragment_source, targets.unit_count);
        let fragment = parse_stage(&wrapped, ShaderStage::Fragment)?;

        let uniforms = UniformBlock::reflect(&fragment)
            .or_else(|| UniformBlock::reflect(&vertex))
            .unwrap_or_else(UniformBlock::empty);
        tracing::debug!(
            uniforms = ?uniforms.fields().iter().map(|field| field.name.as_str()).collect::<Vec<_>>(),
            "reflected shader uniforms"
        );

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform buffer"),
            size: uniforms.size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // Interface mismatches between the stages only surface at pipeline
        // creation, which reports through the error scope.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("frax vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(vertex_source),
                stage: ShaderStage::Vertex,
                defines: &[],
            },
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("frax fragment"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(wrapped),
                stage: ShaderStage::Fragment,
                defines: &[],
            },
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("frax pipeline layout"),
            bind_group_layouts: &[&uniform_layout, targets.unit_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("frax pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[ScreenQuad::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
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
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: targets.surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::Link(error.to_string()));
        }

        Ok(Self {
            pipeline,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
        })
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.location(name)
    }

    pub fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) -> bool {
        self.uniforms.set(location, value)
    }

    /// Writes `value` into the uniform called `name`. Returns `false` when the
    /// shader has no such uniform or it has another type.
    pub fn set_named(&mut self, name: &str, value: UniformValue) -> bool {
        self.uniforms.set_named(name, value)
    }

    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    pub(crate) fn flush(&mut self, queue: &wgpu::Queue) {
        if self.uniforms.take_dirty() {
            queue.write_buffer(&self.uniform_buffer, 0, self.uniforms.bytes());
        }
    }

    pub(crate) fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub(crate) fn uniform_bind_group(&self) -> &wgpu::BindGroup {
        &self.uniform_bind_group
    }
}

impl UniformTarget for ShaderProgram {
    type Location = UniformLocation;

    fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.location(name)
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        self.set_uniform(location, UniformValue::Int(value));
    }
}

fn read_or_default(path: Option<&Path>, bundled: &'static str) -> Result<Cow<'static, str>, ShaderError> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "reading shader");
            std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| ShaderError::Read {
                    path: path.to_path_buf(),
                    source,
                })
        }
        None => Ok(Cow::Borrowed(bundled)),
    }
}
