//! Fixed widget layout and the flat-colour draw list derived from it.
//!
//! Both are pure functions of the frame state: nothing here is retained
//! between frames.

use crate::interaction::{RadiusRange, WidgetState};

/// Axis-aligned rectangle in framebuffer pixels, origin at the bottom-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Edges are inclusive.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// NDC offset (xy) and half-extent scale (zw) for a unit quad spanning
    /// `[-1, 1]`, as consumed by the vertex shader's `uRect`.
    pub fn to_ndc(&self, framebuffer: (u32, u32)) -> [f32; 4] {
        let fb_width = framebuffer.0.max(1) as f32;
        let fb_height = framebuffer.1.max(1) as f32;
        let center_x = self.x + self.width * 0.5;
        let center_y = self.y + self.height * 0.5;
        [
            center_x / fb_width * 2.0 - 1.0,
            center_y / fb_height * 2.0 - 1.0,
            self.width / fb_width,
            self.height / fb_height,
        ]
    }
}

/// `uRect` value that makes the quad cover the whole viewport.
pub const FULLSCREEN_NDC: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

pub const BUTTON_RECT: Rect = Rect::new(20.0, 20.0, 120.0, 40.0);
pub const SLIDER_RECT: Rect = Rect::new(170.0, 30.0, 300.0, 20.0);
const KNOB_WIDTH: f32 = 12.0;
const KNOB_OVERHANG: f32 = 6.0;

const BUTTON_ON: [f32; 4] = [0.20, 0.70, 0.30, 1.0];
const BUTTON_OFF: [f32; 4] = [0.35, 0.35, 0.35, 1.0];
const TRACK: [f32; 4] = [0.18, 0.18, 0.20, 1.0];
const TRACK_FILL: [f32; 4] = [0.30, 0.50, 0.90, 1.0];
const KNOB_IDLE: [f32; 4] = [0.85, 0.85, 0.85, 1.0];
const KNOB_DRAGGING: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WidgetLayout {
    pub button: Rect,
    pub slider: Rect,
}

/// The widgets sit at fixed offsets from the lower-left corner, so the layout
/// does not depend on the framebuffer size today; it is still computed per
/// frame from it.
pub fn layout(_framebuffer: (u32, u32)) -> WidgetLayout {
    WidgetLayout {
        button: BUTTON_RECT,
        slider: SLIDER_RECT,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WidgetRect {
    pub rect: Rect,
    pub color: [f32; 4],
}

/// Horizontal position of the slider knob for the current radius, in `[0, 1]`.
pub fn slider_fraction(radius: i32, range: RadiusRange) -> f32 {
    let span = (range.max() - range.min()) as f32;
    if span <= 0.0 {
        return 0.0;
    }
    ((radius - range.min()) as f32 / span).clamp(0.0, 1.0)
}

pub fn draw_list(state: &WidgetState, layout: &WidgetLayout, range: RadiusRange) -> Vec<WidgetRect> {
    let slider = layout.slider;
    let fraction = slider_fraction(state.radius, range);
    let fill_width = slider.width * fraction;
    let knob_x = (slider.x + fill_width - KNOB_WIDTH * 0.5)
        .clamp(slider.x - KNOB_WIDTH * 0.5, slider.x + slider.width - KNOB_WIDTH * 0.5);

    let mut rects = vec![
        WidgetRect {
            rect: layout.button,
            color: if state.show_filtered {
                BUTTON_ON
            } else {
                BUTTON_OFF
            },
        },
        WidgetRect {
            rect: slider,
            color: TRACK,
        },
    ];
    if fill_width > 0.0 {
        rects.push(WidgetRect {
            rect: Rect::new(slider.x, slider.y, fill_width, slider.height),
            color: TRACK_FILL,
        });
    }
    rects.push(WidgetRect {
        rect: Rect::new(
            knob_x,
            slider.y - KNOB_OVERHANG,
            KNOB_WIDTH,
            slider.height + KNOB_OVERHANG * 2.0,
        ),
        color: if state.dragging {
            KNOB_DRAGGING
        } else {
            KNOB_IDLE
        },
    });
    rects
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_edge_inclusive() {
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert!(rect.contains(10.0, 20.0));
        assert!(rect.contains(40.0, 60.0));
        assert!(!rect.contains(40.1, 60.0));
        assert!(!rect.contains(9.9, 30.0));
    }

    #[test]
    fn full_framebuffer_rect_maps_to_fullscreen_ndc() {
        let rect = Rect::new(0.0, 0.0, 800.0, 600.0);
        assert_eq!(rect.to_ndc((800, 600)), FULLSCREEN_NDC);
    }

    #[test]
    fn lower_left_rect_maps_to_negative_ndc() {
        let ndc = Rect::new(0.0, 0.0, 100.0, 100.0).to_ndc((200, 200));
        assert_eq!(ndc, [-0.5, -0.5, 0.5, 0.5]);
    }

    #[test]
    fn draw_list_reflects_toggle_and_drag() {
        let range = RadiusRange::new(1, 5).unwrap();
        let layout = layout((1280, 720));
        let state = WidgetState {
            show_filtered: true,
            radius: 5,
            dragging: true,
        };
        let rects = draw_list(&state, &layout, range);
        assert_eq!(rects.len(), 4);
        assert_eq!(rects[0].color, BUTTON_ON);
        assert_eq!(rects[2].rect.width, SLIDER_RECT.width);
        assert_eq!(rects[3].color, KNOB_DRAGGING);
    }

    #[test]
    fn minimum_radius_has_no_fill() {
        let range = RadiusRange::new(1, 5).unwrap();
        let state = WidgetState {
            show_filtered: false,
            radius: 1,
            dragging: false,
        };
        let rects = draw_list(&state, &layout((640, 480)), range);
        assert_eq!(rects.len(), 3);
        assert_eq!(rects[0].color, BUTTON_OFF);
    }
}
