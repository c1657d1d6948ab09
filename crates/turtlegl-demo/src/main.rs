use std::time::Instant;

use anyhow::{Result, bail};
use turtlegl_engine::logging::{LoggingConfig, init_logging};
use turtlegl_engine::{
    Canvas, GraphicsBackend, Rgb, Rgba, Space, TurtleApp, TurtleConfig, TurtleId,
};

const WIDTH: f32 = 800.0;
const HEIGHT: f32 = 600.0;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let arg = std::env::args().nth(1).unwrap_or_else(|| "paths".to_string());
    let scene = Scene::parse(&arg)?;
    log::info!("scene: {scene:?}");

    TurtleApp::new()
        .title("TurtleGL Window")
        .size(WIDTH as f64, HEIGHT as f64)
        .vsync(false)
        .run(move |canvas| scene.setup(canvas))
}

#[derive(Debug, Copy, Clone)]
enum Scene {
    Square,
    Swarm,
    Paths,
    Deferred,
    Dashes,
}

impl Scene {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "square" => Scene::Square,
            "swarm" => Scene::Swarm,
            "paths" => Scene::Paths,
            "deferred" => Scene::Deferred,
            "dashes" => Scene::Dashes,
            other => bail!("unknown scene `{other}` (square, swarm, paths, deferred, dashes)"),
        })
    }

    fn setup<B: GraphicsBackend>(self, canvas: &mut Canvas<B>) -> Result<()> {
        match self {
            Scene::Square => square(canvas),
            Scene::Swarm => swarm(canvas),
            Scene::Paths => paths(canvas),
            Scene::Deferred => deferred(canvas),
            Scene::Dashes => dashes(canvas),
        }
    }
}

/// Small deterministic generator so scenes look the same on every run.
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform in `[0, 1)`.
    fn unit(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform in `[lo, hi)`.
    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.unit()
    }

    fn color(&mut self) -> Rgb {
        Rgb::new(self.unit(), self.unit(), self.unit())
    }
}

// ── scenes ────────────────────────────────────────────────────────────────

/// One turtle walking a square, redrawn only once.
fn square<B: GraphicsBackend>(canvas: &mut Canvas<B>) -> Result<()> {
    let id = canvas.create_turtle(TurtleConfig::new().position((-100.0, -100.0)))?;

    canvas.set_mainloop(move |canvas| {
        let mut t = canvas.turtle(id)?;
        t.move_to((100.0, -100.0), None)?;
        t.move_to((100.0, 100.0), Some(Rgb::GREEN))?;
        t.move_to((-100.0, 100.0), Some(Rgb::BLUE))?;
        t.move_to((-100.0, -100.0), Some(Rgb::WHITE))?;
        Ok(())
    })?;
    Ok(())
}

/// Many turtles, each taking many single-point steps.
fn swarm<B: GraphicsBackend>(canvas: &mut Canvas<B>) -> Result<()> {
    const TURTLES: usize = 200;
    const STEPS: usize = 200;

    let mut rng = XorShift::new(7);
    let started = Instant::now();
    let ids = (0..TURTLES)
        .map(|_| {
            canvas.create_turtle(
                TurtleConfig::new()
                    .color(rng.color())
                    .position((rng.range(-100.0, 100.0), rng.range(-100.0, 100.0)))
                    .max_vertices(STEPS + 1),
            )
        })
        .collect::<turtlegl_engine::Result<Vec<TurtleId>>>()?;
    log::info!("init time {:?}", started.elapsed());

    canvas.set_mainloop(move |canvas| {
        let started = Instant::now();
        for _ in 0..STEPS {
            for &id in &ids {
                let point = (rng.range(-WIDTH / 2.0, WIDTH / 2.0), rng.range(-HEIGHT / 2.0, HEIGHT / 2.0));
                canvas.turtle(id)?.move_to(point, None)?;
            }
        }
        log::info!("draw time {:?}", started.elapsed());
        Ok(())
    })?;
    Ok(())
}

/// Ten turtles, a million device-space points each, one batch per turtle.
fn paths<B: GraphicsBackend>(canvas: &mut Canvas<B>) -> Result<()> {
    const TURTLES: usize = 10;
    const PATH_LEN: usize = 1_000_000;

    let mut rng = XorShift::new(42);
    let started = Instant::now();
    let mut work = Vec::with_capacity(TURTLES);
    for _ in 0..TURTLES {
        let id = canvas.create_turtle(
            TurtleConfig::new()
                .color(rng.color())
                .position((rng.range(-100.0, 100.0), rng.range(-100.0, 100.0)))
                .max_vertices(PATH_LEN + 1),
        )?;
        let path: Vec<[f32; 2]> = (0..PATH_LEN)
            .map(|_| [rng.range(-1.0, 1.0), rng.range(-1.0, 1.0)])
            .collect();
        work.push((id, path));
    }
    log::info!("init time {:?}", started.elapsed());

    canvas.set_mainloop(move |canvas| {
        let started = Instant::now();
        for (id, path) in &work {
            let append = canvas
                .turtle(*id)?
                .move_path(path, Space::Device, None)?
                .append();
            log::debug!("turtle {id}: {append:?}");
        }
        log::info!("draw time {:?}", started.elapsed());
        Ok(())
    })?;
    Ok(())
}

/// A spiral that grows one segment every 50 ms, plus a color change at 3 s.
fn deferred<B: GraphicsBackend>(canvas: &mut Canvas<B>) -> Result<()> {
    const SEGMENTS: usize = 120;

    let id = canvas.create_turtle(TurtleConfig::new().color(Rgb::from_u8(255, 200, 0)))?;

    canvas.set_mainloop(move |canvas| {
        let mut t = canvas.turtle(id)?;
        t.set_tint(Rgba::new(1.0, 1.0, 1.0, 0.9))?;
        for i in 1..=SEGMENTS {
            let angle = i as f32 * 0.35;
            let radius = i as f32 * 2.2;
            t.defer(i as f64 * 0.05)?;
            t.move_to((radius * angle.cos(), radius * angle.sin()), None)?;
        }
        t.defer(3.0)?;
        t.set_color(Rgb::from_u8(0, 200, 255))?;
        Ok(())
    })?;
    Ok(())
}

/// Pen up/down dashes, batched through `accumulate` with thick lines.
fn dashes<B: GraphicsBackend>(canvas: &mut Canvas<B>) -> Result<()> {
    let id = canvas.create_turtle(TurtleConfig::new().position((-350.0, 0.0)))?;

    canvas.set_mainloop(move |canvas| {
        let mut t = canvas.turtle(id)?;
        t.set_line_width(3.0)?;
        let mut x: f32 = -350.0;
        for dash in 0..35 {
            x += 20.0;
            if dash % 2 == 0 {
                t.pen_up();
            } else {
                t.pen_down();
            }
            t.move_to((x, 0.0), None)?;
        }

        // Accumulated points share the color current at the end of the frame.
        t.pen_down();
        for i in 0..=70 {
            let x = -350.0 + i as f32 * 10.0;
            t.accumulate((x, 80.0 * (x / 60.0).sin() - 150.0))?;
        }
        t.set_color(Rgb::GREEN)?;
        Ok(())
    })?;
    Ok(())
}
