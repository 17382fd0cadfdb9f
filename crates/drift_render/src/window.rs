//! Window management
//!
//! Window creation via winit. In winit 0.30 windows are created from
//! `ApplicationHandler::resumed`, so this module only builds attributes and
//! the event loop; the runtime owns the handler.

use winit::{
    dpi::LogicalSize,
    event_loop::EventLoop,
    window::{Window, WindowAttributes},
};

use crate::RenderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Drift".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Create window attributes from config
pub fn window_attributes(config: &WindowConfig) -> WindowAttributes {
    Window::default_attributes()
        .with_title(config.title.clone())
        .with_inner_size(LogicalSize::new(config.width.max(1), config.height.max(1)))
}

pub fn create_event_loop() -> Result<EventLoop<()>, RenderError> {
    EventLoop::new().map_err(|e| RenderError::Initialization(format!("event loop: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_carry_title_and_size() {
        let config = WindowConfig {
            title: "planes".to_string(),
            width: 640,
            height: 0,
        };
        let attrs = window_attributes(&config);
        assert_eq!(attrs.title, "planes");
        assert_eq!(
            attrs.inner_size,
            Some(LogicalSize::new(640u32, 1u32).into())
        );
    }
}
