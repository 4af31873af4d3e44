//! End-to-end behaviour of the feedback loop against a CPU backend.
//!
//! Run with: cargo test --test feedback_loop

use std::cell::RefCell;

use feedback_growth::input::{InputAction, InputTimeline, TimedInput};
use feedback_growth::{EngineConfig, FeedbackEngine, NormalizedPoint, RenderBackend, ShaderParameters, Viewport};

/// One "pixel" per buffer cell. The program writes `input * clear_flag + 1`,
/// so a buffer counts the frames since it was last cleared.
struct CpuBuffer {
    id: usize,
    viewport: Viewport,
    pixels: RefCell<Vec<f32>>,
}

#[derive(Default)]
struct CpuBackend {
    created: usize,
    /// (input id, output id) per feedback pass.
    passes: Vec<(usize, usize)>,
    /// Input pixels as each pass read them.
    reads: Vec<Vec<f32>>,
    /// Output pixels right after each pass.
    written: Vec<Vec<f32>>,
    /// (source id, pixels presented)
    presented: Vec<(usize, Vec<f32>)>,
}

impl RenderBackend for CpuBackend {
    type Buffer = CpuBuffer;
    type Target = RefCell<Vec<f32>>;

    fn create_buffer(&mut self, viewport: Viewport, _label: &str) -> CpuBuffer {
        self.created += 1;
        CpuBuffer {
            id: self.created,
            viewport,
            pixels: RefCell::new(vec![0.0; (viewport.width * viewport.height) as usize]),
        }
    }

    fn feedback(&mut self, input: &CpuBuffer, output: &CpuBuffer, params: &ShaderParameters) {
        let source = input.pixels.borrow();
        self.passes.push((input.id, output.id));
        self.reads.push(source.clone());
        let next: Vec<f32> = source.iter().map(|p| p * params.clear_flag + 1.0).collect();
        self.written.push(next.clone());
        *output.pixels.borrow_mut() = next;
    }

    fn present(&mut self, source: &CpuBuffer, target: &RefCell<Vec<f32>>) {
        let pixels = source.pixels.borrow();
        self.presented.push((source.id, pixels.clone()));
        *target.borrow_mut() = pixels.clone();
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        seed: Some(42),
        ..Default::default()
    }
}

fn engine(width: u32, height: u32) -> FeedbackEngine<CpuBackend> {
    FeedbackEngine::new(CpuBackend::default(), Viewport::new(width, height).unwrap(), &config())
}

fn run_frames(engine: &mut FeedbackEngine<CpuBackend>, screen: &RefCell<Vec<f32>>, from: u64, count: u64) {
    for i in from..from + count {
        engine.frame(i as f64 * 16.0, screen);
    }
}

#[test]
fn test_each_pass_reads_previous_output() {
    let mut engine = engine(4, 4);
    let screen = RefCell::new(Vec::new());
    run_frames(&mut engine, &screen, 0, 20);

    let backend = engine.backend();
    for n in 1..backend.passes.len() {
        let (prev_in, prev_out) = backend.passes[n - 1];
        let (input, output) = backend.passes[n];
        assert_eq!(input, prev_out, "frame {} read a stale buffer", n);
        assert_eq!(output, prev_in);
        assert_ne!(input, output);
        // Pixel for pixel, the input seen now is what was written last frame.
        assert_eq!(backend.reads[n], backend.written[n - 1], "frame {}", n);
    }
}

#[test]
fn test_presents_buffer_just_written() {
    let mut engine = engine(4, 4);
    let screen = RefCell::new(Vec::new());
    run_frames(&mut engine, &screen, 0, 10);

    let backend = engine.backend();
    for (n, (source, pixels)) in backend.presented.iter().enumerate() {
        assert_eq!(*source, backend.passes[n].1);
        assert_eq!(*pixels, backend.written[n]);
    }
    assert_eq!(*screen.borrow(), vec![10.0; 16]);
}

#[test]
fn test_degenerate_resizes_never_reach_backend() {
    let mut engine = engine(800, 600);
    let screen = RefCell::new(Vec::new());

    engine.resize(0, 600);
    engine.frame(0.0, &screen);
    engine.resize(800, 0);
    engine.frame(16.0, &screen);
    engine.resize(0, 0);
    engine.frame(32.0, &screen);

    assert_eq!(engine.viewport(), Viewport::new(800, 600).unwrap());
    assert_eq!(engine.backend().created, 2);
    assert!((engine.params().aspect_ratio - 800.0 / 600.0).abs() < 1e-6);
}

#[test]
fn test_resize_recreates_buffers_and_updates_aspect() {
    let mut engine = engine(800, 600);
    let screen = RefCell::new(Vec::new());
    run_frames(&mut engine, &screen, 0, 3);

    engine.resize(400, 300);
    engine.frame(48.0, &screen);

    assert_eq!(engine.backend().created, 4);
    let viewport = Viewport::new(400, 300).unwrap();
    assert_eq!(engine.viewport(), viewport);
    assert_eq!(engine.buffers().acquire_input().viewport, viewport);
    assert_eq!(engine.buffers().acquire_output().viewport, viewport);
    assert_eq!(engine.params().resolution, [400.0, 300.0]);
    assert!((engine.params().aspect_ratio - 4.0 / 3.0).abs() < 1e-6);
    // Accumulation restarted from black.
    assert_eq!(screen.borrow().len(), 400 * 300);
    assert!(screen.borrow().iter().all(|p| *p == 1.0));
}

#[test]
fn test_discrete_activation_snaps_and_resets() {
    let mut engine = engine(8, 8);
    let screen = RefCell::new(Vec::new());
    run_frames(&mut engine, &screen, 0, 30);
    let seed_before = engine.params().random_seed;
    assert!(engine.params().elapsed_since_stop > 0.4);

    engine.observe_discrete(NormalizedPoint::new(0.2, 0.8));
    engine.frame(30.0 * 16.0, &screen);

    let params = engine.params();
    assert!((params.cursor[0] - 0.2).abs() < 1e-6);
    assert!((params.cursor[1] - 0.2).abs() < 1e-6);
    assert_eq!(params.elapsed_since_stop, 0.0);
    assert_ne!(params.random_seed, seed_before);
    assert!(params.random_seed.iter().all(|s| (0.0..1.0).contains(s)));

    // Pinned: no drift on following frames.
    run_frames(&mut engine, &screen, 31, 10);
    assert!((engine.params().cursor[0] - 0.2).abs() < 1e-6);
    assert!((engine.params().elapsed_since_stop - 0.16).abs() < 1e-4);
}

#[test]
fn test_continuous_easing_converges_geometrically() {
    let mut engine = engine(8, 8);
    let screen = RefCell::new(Vec::new());
    engine.observe_continuous(NormalizedPoint::new(1.0, 1.0));
    run_frames(&mut engine, &screen, 0, 300);

    let expected = 1.0 - 0.5 * 0.98f32.powi(300);
    let params = engine.params();
    assert!((params.cursor[0] - expected).abs() < 1e-4, "x = {}", params.cursor[0]);
    // y flipped into shader convention
    assert!((params.cursor[1] - (1.0 - expected)).abs() < 1e-4, "y = {}", params.cursor[1]);
    assert!(engine.cursor_state().current.x() < 1.0);
}

#[test]
fn test_clear_pulse_is_bounded() {
    let mut engine = engine(2, 2);
    let screen = RefCell::new(Vec::new());
    run_frames(&mut engine, &screen, 0, 10);
    assert_eq!(*screen.borrow(), vec![10.0; 4]);

    engine.request_clear();
    let cleared_at = 10.0 * 16.0;
    let mut flags = Vec::new();
    for i in 10..20 {
        let now = i as f64 * 16.0;
        engine.frame(now, &screen);
        flags.push((now - cleared_at, engine.params().clear_flag));
    }

    for (since, flag) in flags {
        if since < 50.0 {
            assert_eq!(flag, 0.0, "{}ms after clear", since);
        } else {
            assert_eq!(flag, 1.0, "{}ms after clear", since);
        }
    }
    // Four cleared frames (0,16,32,48ms) leave 1, then six accumulating ones.
    assert_eq!(*screen.borrow(), vec![7.0; 4]);
}

#[test]
fn test_timeline_drives_engine() {
    let timeline = InputTimeline::new(vec![
        TimedInput { frame: 0, action: InputAction::Activate { x: 0.25, y: 0.75 } },
        TimedInput { frame: 5, action: InputAction::Resize { width: 4, height: 2 } },
        TimedInput { frame: 8, action: InputAction::Clear },
    ]);

    let mut engine = engine(8, 8);
    let screen = RefCell::new(Vec::new());
    for i in 0..10u64 {
        timeline.apply(i, &mut engine);
        engine.frame(i as f64 * 16.0, &screen);
        if i == 0 {
            assert_eq!(engine.params().cursor, [0.25, 0.25]);
        }
    }

    assert_eq!(engine.viewport(), Viewport::new(4, 2).unwrap());
    assert_eq!(engine.params().aspect_ratio, 2.0);
    assert_eq!(engine.params().clear_flag, 0.0);
}

#[test]
fn test_touch_locks_out_hover() {
    let mut engine = FeedbackEngine::new(
        CpuBackend::default(),
        Viewport::new(8, 8).unwrap(),
        &EngineConfig { seed: Some(1), ..Default::default() },
    );
    let screen = RefCell::new(Vec::new());

    engine.observe_touch(NormalizedPoint::new(0.1, 0.1));
    engine.observe_continuous(NormalizedPoint::new(0.9, 0.9));
    run_frames(&mut engine, &screen, 0, 50);

    let state = engine.cursor_state();
    assert_eq!(state.current, NormalizedPoint::new(0.1, 0.1));
    assert_eq!(state.target, NormalizedPoint::new(0.1, 0.1));
}

#[test]
fn test_dispose_after_stop() {
    let mut engine = engine(2, 2);
    let screen = RefCell::new(Vec::new());
    run_frames(&mut engine, &screen, 0, 3);
    engine.stop();
    assert!(!engine.frame(100.0, &screen));
    assert_eq!(engine.frame_count(), 3);

    let backend = engine.dispose();
    assert_eq!(backend.passes.len(), 3);
}
