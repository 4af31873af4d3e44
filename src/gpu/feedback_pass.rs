//! The feedback pass: runs the sketch's shader program over the previous
//! frame and writes the next one.
//!
//! Bindings supplied to the program:
//! - group 0: previous frame (`texture_2d<f32>` at 0, sampler at 1)
//! - group 1: [`ShaderParameters`] uniform block at 0
//!
//! The program itself is opaque; this module only guarantees the bindings
//! and the output target.

use anyhow::{anyhow, bail, Result};
use naga::front::wgsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::gpu::quad::{QuadVertex, QUAD_VERTEX_COUNT};
use crate::gpu::targets::{FeedbackBuffer, FEEDBACK_FORMAT};
use crate::parameters::ShaderParameters;

/// WGSL source plus the entry points to use.
#[derive(Clone, Debug)]
pub struct FeedbackShader<'a> {
    pub source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
}

impl<'a> FeedbackShader<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
        }
    }
}

pub struct FeedbackPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl FeedbackPass {
    /// Compile the program and build the pipeline.
    ///
    /// The source is parsed and validated with naga first, then pipeline
    /// creation runs inside a wgpu error scope. Either failure is returned.
    pub async fn new(
        device: &wgpu::Device,
        texture_bind_group_layout: &wgpu::BindGroupLayout,
        shader: &FeedbackShader<'_>,
    ) -> Result<Self> {
        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Feedback Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ShaderParameters>() as u64),
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Feedback Uniform Buffer"),
            size: std::mem::size_of::<ShaderParameters>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Feedback Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        validate_wgsl(shader.source)?;

        // Binding and entry point mismatches only show up at pipeline creation.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Feedback Shader"),
            source: wgpu::ShaderSource::Wgsl(shader.source.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Feedback Pipeline Layout"),
            bind_group_layouts: &[texture_bind_group_layout, &uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Feedback Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(shader.vertex_entry),
                buffers: &[QuadVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(shader.fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FEEDBACK_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(error) = device.pop_error_scope().await {
            bail!("Feedback shader failed to compile or link: {}", error);
        }

        log::debug!(
            "Feedback pipeline ready ({} / {})",
            shader.vertex_entry,
            shader.fragment_entry
        );

        Ok(Self {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
        })
    }

    /// Record the pass: `input` sampled, `output` written.
    pub fn encode(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        quad_vertex_buffer: &wgpu::Buffer,
        input: &FeedbackBuffer,
        output: &FeedbackBuffer,
        params: &ShaderParameters,
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(params));

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Feedback Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, input.bind_group(), &[]);
        render_pass.set_bind_group(1, &self.uniform_bind_group, &[]);
        render_pass.set_vertex_buffer(0, quad_vertex_buffer.slice(..));
        render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
    }
}

/// Parse and validate WGSL without a device.
pub fn validate_wgsl(source: &str) -> Result<()> {
    let module = wgsl::parse_str(source)
        .map_err(|err| anyhow!("Feedback shader failed to parse:\n{}", err.emit_to_string(source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| anyhow!("Feedback shader failed validation: {}", err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_shaders_validate() {
        validate_wgsl(crate::gpu::BUILTIN_SHADER).unwrap();
        validate_wgsl(include_str!("shader_present.wgsl")).unwrap();
    }

    #[test]
    fn test_invalid_shader_is_rejected() {
        assert!(validate_wgsl("@fragment fn fs_main() -> @location(0) vec4<f32> { return 1; }").is_err());
        assert!(validate_wgsl("not wgsl at all").is_err());
    }

    #[test]
    fn test_default_entry_points() {
        let shader = FeedbackShader::new("");
        assert_eq!(shader.vertex_entry, "vs_main");
        assert_eq!(shader.fragment_entry, "fs_main");
    }
}
