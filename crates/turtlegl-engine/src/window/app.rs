use anyhow::Result;
use winit::dpi::LogicalSize;

use crate::backend::WgpuBackend;
use crate::canvas::Canvas;
use crate::device::GpuInit;
use crate::paint::Rgba;

use super::{Runtime, RuntimeConfig};

/// Builder for a single-window turtle program.
///
/// ```no_run
/// use turtlegl_engine::{TurtleApp, TurtleConfig};
///
/// TurtleApp::new()
///     .title("square")
///     .size(600.0, 600.0)
///     .run(|canvas| {
///         let id = canvas.create_turtle(TurtleConfig::new())?;
///         canvas.set_mainloop(move |canvas| {
///             let mut t = canvas.turtle(id)?;
///             for p in [(100.0, 0.0), (100.0, 100.0), (0.0, 100.0), (0.0, 0.0)] {
///                 t.move_to(p, None)?;
///             }
///             Ok(())
///         })?;
///         Ok(())
///     })
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TurtleApp {
    config: RuntimeConfig,
    gpu: GpuInit,
}

impl TurtleApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    /// Initial inner size in logical pixels.
    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.config.initial_size = LogicalSize::new(width, height);
        self
    }

    pub fn background(mut self, color: Rgba) -> Self {
        self.config.background = color;
        self
    }

    pub fn vsync(mut self, vsync: bool) -> Self {
        self.gpu = self.gpu.with_vsync(vsync);
        self
    }

    pub fn gpu(mut self, init: GpuInit) -> Self {
        self.gpu = init;
        self
    }

    /// Opens the window and blocks until it is closed.
    pub fn run<S>(self, setup: S) -> Result<()>
    where
        S: for<'w> FnOnce(&mut Canvas<WgpuBackend<'w>>) -> Result<()>,
    {
        Runtime::run(self.config, self.gpu, setup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let app = TurtleApp::new()
            .title("spiral")
            .size(800.0, 600.0)
            .background(Rgba::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(app.config.title, "spiral");
        assert_eq!(app.config.initial_size, LogicalSize::new(800.0, 600.0));
        assert_eq!(app.config.background, Rgba::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn default_background_is_dark_gray() {
        assert_eq!(TurtleApp::new().config.background, Rgba::new(0.1, 0.1, 0.1, 1.0));
    }

    #[test]
    fn vsync_off_selects_no_vsync_present_mode() {
        let app = TurtleApp::new().vsync(false);
        assert_eq!(app.gpu.present_mode, wgpu::PresentMode::AutoNoVsync);
    }
}
