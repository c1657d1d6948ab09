use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::backend::WgpuBackend;
use crate::canvas::Canvas;
use crate::coords::Extent;
use crate::device::{Gpu, GpuInit};
use crate::paint::Rgba;
use crate::time::FrameClock;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Clear color behind every frame.
    pub background: Rgba,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "turtlegl".to_string(),
            initial_size: LogicalSize::new(500.0, 500.0),
            background: Rgba::new(0.1, 0.1, 0.1, 1.0),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and drives its canvas until the window is closed.
    ///
    /// `setup` runs once, after the GPU is ready and before the first tick;
    /// it typically creates turtles and registers the main loop.
    pub fn run<S>(config: RuntimeConfig, gpu_init: GpuInit, setup: S) -> Result<()>
    where
        S: for<'w> FnOnce(&mut Canvas<WgpuBackend<'w>>) -> Result<()>,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, setup);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[not_covariant]
    canvas: Canvas<WgpuBackend<'this>>,
}

struct AppState<S> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    setup: Option<S>,

    window: Option<(WindowId, WindowEntry)>,
    failure: Option<anyhow::Error>,
    exit_requested: bool,
}

impl<S> AppState<S>
where
    S: for<'w> FnOnce(&mut Canvas<WgpuBackend<'w>>) -> Result<()>,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, setup: S) -> Self {
        Self {
            config,
            gpu_init,
            setup: Some(setup),
            window: None,
            failure: None,
            exit_requested: false,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.close_window();
        self.failure = Some(err);
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let setup = self
            .setup
            .take()
            .context("window was already created once")?;

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let id = window.id();
        let gpu_init = self.gpu_init.clone();
        let background = self.config.background;

        let entry = WindowEntryTryBuilder {
            clock: FrameClock::default(),
            window,
            canvas_builder: |w| {
                let gpu = pollster::block_on(Gpu::new(w, gpu_init))
                    .context("GPU initialization failed")?;
                log::info!("rendering with {}", gpu.adapter_name());

                let backend = WgpuBackend::new(gpu, background);
                let mut canvas = Canvas::new(backend, logical_extent(w, w.inner_size()))?;
                setup(&mut canvas).context("setup failed")?;
                Ok::<_, anyhow::Error>(canvas)
            },
        }
        .try_build()?;

        entry.with_window(|w| w.request_redraw());
        self.window = Some((id, entry));
        Ok(())
    }

    fn close_window(&mut self) {
        if let Some((_, mut entry)) = self.window.take() {
            entry.with_canvas_mut(|canvas| canvas.close());
        }
    }

    fn resize(entry: &mut WindowEntry, size: PhysicalSize<u32>) {
        entry.with_mut(|fields| {
            fields.canvas.backend_mut().gpu_mut().resize(size);
            fields.canvas.set_extent(logical_extent(fields.window, size));
            fields.window.request_redraw();
        });
    }
}

impl<S> ApplicationHandler for AppState<S>
where
    S: for<'w> FnOnce(&mut Canvas<WgpuBackend<'w>>) -> Result<()>,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.exit_requested {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            self.fail(event_loop, e.context("failed to create the turtle window"));
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Continuous redraw: clean frames re-present buffered geometry and
        // deferred commands need a tick to fire.
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some((_, entry)) = &self.window {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let Some((id, entry)) = self.window.as_mut() else {
            return;
        };
        if *id != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::debug!("close requested");
                self.close_window();
                self.exit_requested = true;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => Self::resize(entry, new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                let new_size = entry.with_window(|w| w.inner_size());
                Self::resize(entry, new_size);
            }

            WindowEvent::RedrawRequested => {
                let outcome = entry.with_mut(|fields| {
                    let ft = fields.clock.tick();
                    fields.canvas.tick(ft.elapsed)
                });

                if let Err(e) = outcome {
                    self.fail(event_loop, anyhow::Error::new(e).context("frame tick failed"));
                }
            }

            _ => {}
        }
    }
}

/// Window size in logical pixels, the unit turtle coordinates are measured in.
fn logical_extent(window: &Window, size: PhysicalSize<u32>) -> Extent {
    let logical: LogicalSize<f32> = size.to_logical(window.scale_factor());
    Extent::new(logical.width, logical.height)
}
