use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::engine::Viewport;
use crate::gpu::{self, targets::FEEDBACK_FORMAT, GpuEngine};
use crate::input::InputTimeline;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames to disk without a window
    Render {
        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// WGSL feedback program (defaults to the built-in growth sketch)
        #[arg(long)]
        shader: Option<PathBuf>,

        /// Engine config JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Input timeline JSON (defaults to one activation at the centre)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Number of frames to render
        #[arg(long, default_value_t = 300)]
        frames: u64,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f64,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,
    },
    /// Open an interactive window
    Run {
        /// WGSL feedback program (defaults to the built-in growth sketch)
        #[arg(long)]
        shader: Option<PathBuf>,

        /// Engine config JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Initial window width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Initial window height
        #[arg(long, default_value_t = 600)]
        height: u32,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render { out, shader, config, input, frames, fps, width, height } => {
            let shader_source = load_shader(shader.as_deref())?;
            let config = load_config(config.as_deref())?;
            let timeline = match input {
                Some(path) => InputTimeline::load(&path)?,
                None => InputTimeline::centered_activation(),
            };
            let Some(viewport) = Viewport::new(width, height) else {
                bail!("Output size must be non-zero, got {}x{}", width, height);
            };
            if !(fps.is_finite() && fps > 0.0) {
                bail!("fps must be positive, got {}", fps);
            }
            pollster::block_on(render_offline(
                &out,
                &shader_source,
                &config,
                &timeline,
                frames,
                fps,
                viewport,
            ))?;
        }
        Commands::Run { shader, config, width, height } => {
            let shader_source = load_shader(shader.as_deref())?;
            let config = load_config(config.as_deref())?;
            crate::window::run(shader_source, config, width, height)?;
        }
    }
    Ok(())
}

fn load_shader(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read shader {:?}", path)),
        None => Ok(gpu::BUILTIN_SHADER.to_string()),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    }
}

/// The capture texture has the output size, so it must fit the device.
fn check_output_size(viewport: Viewport, max_dimension: u32) -> Result<()> {
    if viewport.width > max_dimension || viewport.height > max_dimension {
        bail!(
            "Output size {}x{} exceeds the device texture limit of {}",
            viewport.width,
            viewport.height,
            max_dimension
        );
    }
    Ok(())
}

async fn render_offline(
    out_dir: &Path,
    shader_source: &str,
    config: &EngineConfig,
    timeline: &InputTimeline,
    total_frames: u64,
    fps: f64,
    viewport: Viewport,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let (_adapter, device, queue) = gpu::request_device(&instance, None).await?;
    check_output_size(viewport, device.limits().max_texture_dimension_2d)?;

    let mut engine =
        gpu::create_engine(device, queue, shader_source, FEEDBACK_FORMAT, viewport, config).await?;
    // Output size stays fixed; the present pass rescales if the timeline resizes the buffers.
    let capture = FrameCapture::new(engine.backend().device(), viewport);

    let frame_ms = 1000.0 / fps;
    println!("Rendering {} frames to {:?}...", total_frames, out_dir);

    for i in 0..total_frames {
        timeline.apply(i, &mut engine);
        engine.frame(i as f64 * frame_ms, capture.view());

        let pixels = capture.read(&engine)?;
        let frame_path = out_dir.join(format!("frame_{:05}.png", i));
        image::save_buffer(
            &frame_path,
            &pixels,
            viewport.width,
            viewport.height,
            image::ColorType::Rgba8,
        )?;

        if i % 60 == 0 {
            print!(".");
            use std::io::Write;
            std::io::stdout().flush()?;
        }
    }
    println!("\nDone.");

    engine.dispose();
    Ok(())
}

/// Offscreen presentation target plus a mappable buffer to read it back.
struct FrameCapture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    output_buffer: wgpu::Buffer,
    padded_bytes_per_row: u32,
    viewport: Viewport,
}

impl FrameCapture {
    fn new(device: &wgpu::Device, viewport: Viewport) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Texture"),
            size: extent(viewport),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FEEDBACK_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let padded_bytes_per_row = padded_bytes_per_row(viewport.width);
        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Buffer"),
            size: (padded_bytes_per_row * viewport.height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            texture,
            view,
            output_buffer,
            padded_bytes_per_row,
            viewport,
        }
    }

    fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Copy the last presented frame back as tightly packed RGBA8.
    fn read(&self, engine: &GpuEngine) -> Result<Vec<u8>> {
        let device = engine.backend().device();
        let queue = engine.backend().queue();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Capture Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.viewport.height),
                },
            },
            extent(self.viewport),
        );
        queue.submit(Some(encoder.finish()));

        let buffer_slice = self.output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("Capture buffer mapping was dropped")?
            .context("Failed to map capture buffer")?;

        let data = buffer_slice.get_mapped_range();
        let row_bytes = (self.viewport.width * 4) as usize;
        let mut unpadded = Vec::with_capacity(row_bytes * self.viewport.height as usize);
        for row in 0..self.viewport.height {
            let start = (row * self.padded_bytes_per_row) as usize;
            unpadded.extend_from_slice(&data[start..start + row_bytes]);
        }

        drop(data);
        self.output_buffer.unmap();
        Ok(unpadded)
    }
}

fn extent(viewport: Viewport) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: viewport.width,
        height: viewport.height,
        depth_or_array_layers: 1,
    }
}

/// Row pitch for texture-to-buffer copies, rounded up to wgpu's alignment.
fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(800), 3328);
    }

    #[test]
    fn test_cli_parses_render() {
        let cli = Cli::try_parse_from([
            "feedback-growth", "render", "--out", "frames", "--frames", "10", "--width", "64",
        ])
        .unwrap();
        match cli.command {
            Commands::Render { frames, width, height, shader, .. } => {
                assert_eq!(frames, 10);
                assert_eq!(width, 64);
                assert_eq!(height, 600);
                assert!(shader.is_none());
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_output_size_checked_against_device_limit() {
        assert!(check_output_size(Viewport::new(2048, 2048).unwrap(), 2048).is_ok());
        assert!(check_output_size(Viewport::new(2049, 600).unwrap(), 2048).is_err());
        assert!(check_output_size(Viewport::new(800, 8192).unwrap(), 2048).is_err());
    }

    #[test]
    fn test_builtin_shader_when_no_path() {
        assert_eq!(load_shader(None).unwrap(), gpu::BUILTIN_SHADER);
    }
}
