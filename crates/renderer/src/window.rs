use std::sync::Arc;

use anyhow::{anyhow, Result};
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::app::App;
use crate::interaction::FrameInput;
use crate::types::RendererConfig;

#[derive(Default)]
struct PointerState {
    position: PhysicalPosition<f64>,
    pressed: bool,
}

impl PointerState {
    fn handle_button(&mut self, state: ElementState) {
        self.pressed = state == ElementState::Pressed;
    }

    /// Pointer and window size in logical units, framebuffer in physical.
    fn frame_input(&self, window: &Window, app: &App) -> FrameInput {
        let scale = window.scale_factor();
        let cursor = self.position.to_logical::<f64>(scale);
        let window_size = window.inner_size().to_logical::<f64>(scale);
        let framebuffer = app.size();
        FrameInput {
            cursor: (cursor.x, cursor.y),
            pressed: self.pressed,
            window_size: (window_size.width, window_size.height),
            framebuffer_size: (framebuffer.width, framebuffer.height),
        }
    }
}

/// Opens the viewer window and drives frames until the window is closed or
/// Escape is pressed. Initialisation failures and fatal surface errors are
/// returned; a normal close returns `Ok`.
pub(crate) fn run(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(LogicalSize::new(config.window_size.0, config.window_size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create viewer window: {err}"))?;
    let window = Arc::new(window);

    let mut app = App::new(window.clone(), &config)?;
    let mut pointer = PointerState::default();
    let mut quit_requested = false;
    let mut fatal: Option<anyhow::Error> = None;

    tracing::info!(
        width = config.window_size.0,
        height = config.window_size.1,
        "viewer window ready"
    );

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                elwt.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                quit_requested = true;
            }
            WindowEvent::CursorMoved { position, .. } => {
                pointer.position = position;
            }
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => {
                pointer.handle_button(button_state);
            }
            WindowEvent::Resized(new_size) => {
                app.resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let _ = inner_size_writer.request_inner_size(app.size());
            }
            WindowEvent::RedrawRequested => {
                let input = pointer.frame_input(&window, &app);
                match app.frame(&input) {
                    Ok(outcome) => {
                        if outcome.toggled || outcome.radius_changed {
                            tracing::trace!(?outcome, "widget state changed");
                        }
                    }
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        app.resize(app.size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        fatal = Some(anyhow!("surface out of memory"));
                        elwt.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        tracing::warn!("surface timeout; retrying next frame");
                    }
                    Err(other) => {
                        tracing::warn!("surface error: {other:?}; retrying next frame");
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if quit_requested {
                elwt.exit();
            } else {
                window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    match fatal {
        Some(err) => Err(err),
        None => {
            tracing::info!("viewer window closed");
            Ok(())
        }
    }
}
