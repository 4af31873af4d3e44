//! wgpu implementation of [`RenderBackend`].

use anyhow::Result;

use crate::config::EngineConfig;
use crate::engine::{FeedbackEngine, RenderBackend, Viewport};
use crate::gpu::feedback_pass::{FeedbackPass, FeedbackShader};
use crate::gpu::present_pass::PresentPass;
use crate::gpu::quad::create_quad_buffer;
use crate::gpu::targets::{FeedbackBuffer, TargetAllocator};
use crate::parameters::ShaderParameters;

/// Feedback engine running on wgpu.
pub type GpuEngine = FeedbackEngine<WgpuBackend>;

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    allocator: TargetAllocator,
    quad_vertex_buffer: wgpu::Buffer,
    feedback_pass: FeedbackPass,
    present_pass: PresentPass,
    /// Encoder for the frame in flight, submitted by `finish_frame`.
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    /// Build both passes. Fails if the shader program does not compile or
    /// does not match the binding layout.
    pub async fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        shader: &FeedbackShader<'_>,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let allocator = TargetAllocator::new(&device);
        let quad_vertex_buffer = create_quad_buffer(&device);
        let feedback_pass =
            FeedbackPass::new(&device, allocator.texture_bind_group_layout(), shader).await?;
        let present_pass = PresentPass::new(&device, allocator.texture_bind_group_layout(), target_format);

        log::info!("wgpu backend ready (present format {:?})", target_format);

        Ok(Self {
            device,
            queue,
            allocator,
            quad_vertex_buffer,
            feedback_pass,
            present_pass,
            encoder: None,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

fn frame_encoder(device: &wgpu::Device) -> wgpu::CommandEncoder {
    device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Feedback Frame Encoder"),
    })
}

impl RenderBackend for WgpuBackend {
    type Buffer = FeedbackBuffer;
    type Target = wgpu::TextureView;

    fn create_buffer(&mut self, viewport: Viewport, label: &str) -> FeedbackBuffer {
        let fitted = viewport.clamped(self.max_buffer_dimension());
        if fitted != viewport {
            log::warn!(
                "{} clamped from {}x{} to {}x{}",
                label,
                viewport.width,
                viewport.height,
                fitted.width,
                fitted.height
            );
        }
        // wgpu zero-initialises new textures, so fresh buffers start black.
        self.allocator.create(&self.device, fitted, label)
    }

    fn feedback(&mut self, input: &FeedbackBuffer, output: &FeedbackBuffer, params: &ShaderParameters) {
        let encoder = self.encoder.get_or_insert_with(|| frame_encoder(&self.device));
        self.feedback_pass
            .encode(&self.queue, encoder, &self.quad_vertex_buffer, input, output, params);
    }

    fn present(&mut self, source: &FeedbackBuffer, target: &wgpu::TextureView) {
        let encoder = self.encoder.get_or_insert_with(|| frame_encoder(&self.device));
        self.present_pass
            .encode(encoder, &self.quad_vertex_buffer, source, target);
    }

    fn finish_frame(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn max_buffer_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

/// Build a wgpu backend and the engine on top of it.
pub async fn create_engine(
    device: wgpu::Device,
    queue: wgpu::Queue,
    shader_source: &str,
    target_format: wgpu::TextureFormat,
    viewport: Viewport,
    config: &EngineConfig,
) -> Result<GpuEngine> {
    let shader = FeedbackShader {
        source: shader_source,
        vertex_entry: &config.vertex_entry,
        fragment_entry: &config.fragment_entry,
    };
    let backend = WgpuBackend::new(device, queue, &shader, target_format).await?;
    Ok(FeedbackEngine::new(backend, viewport, config))
}
