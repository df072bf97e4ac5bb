//! Pointer handling for the toggle button and radius slider.
//!
//! The controller is fed one [`FrameInput`] per frame. It converts the pointer
//! from window space into framebuffer space, updates [`WidgetState`], and
//! reports a radius change to the filter cache through [`CacheInvalidation`].
//! It never touches the cache target itself.

use crate::filter::CacheInvalidation;
use crate::widgets::{self, WidgetLayout};

/// Inclusive blur radius bounds. Reference bounds are `[1, 5]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadiusRange {
    min: i32,
    max: i32,
}

impl RadiusRange {
    pub const DEFAULT: RadiusRange = RadiusRange { min: 1, max: 5 };

    pub fn new(min: i32, max: i32) -> Option<Self> {
        (min >= 1 && min <= max).then_some(Self { min, max })
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn clamp(&self, radius: i32) -> i32 {
        radius.clamp(self.min, self.max)
    }

    /// Linear map of `t` in `[0, 1]` onto the range, rounded to nearest.
    pub fn lerp(&self, t: f32) -> i32 {
        let t = t.clamp(0.0, 1.0);
        let value = self.min as f32 + t * (self.max - self.min) as f32;
        self.clamp(value.round() as i32)
    }
}

impl Default for RadiusRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WidgetState {
    pub show_filtered: bool,
    pub radius: i32,
    pub dragging: bool,
}

/// Everything the controller reads in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameInput {
    /// Pointer position in window coordinates, origin top-left.
    pub cursor: (f64, f64),
    pub pressed: bool,
    pub window_size: (f64, f64),
    pub framebuffer_size: (u32, u32),
}

impl FrameInput {
    /// Scales the pointer into framebuffer pixels and flips it so the origin
    /// is at the bottom-left.
    pub fn framebuffer_cursor(&self) -> (f32, f32) {
        let (window_w, window_h) = self.window_size;
        let (fb_w, fb_h) = (
            self.framebuffer_size.0 as f64,
            self.framebuffer_size.1 as f64,
        );
        let scale_x = if window_w > 0.0 { fb_w / window_w } else { 1.0 };
        let scale_y = if window_h > 0.0 { fb_h / window_h } else { 1.0 };
        let x = self.cursor.0 * scale_x;
        let y = fb_h - self.cursor.1 * scale_y;
        (x as f32, y as f32)
    }
}

/// What changed during [`InteractionController::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub toggled: bool,
    pub radius_changed: bool,
}

pub struct InteractionController {
    state: WidgetState,
    range: RadiusRange,
    was_pressed: bool,
}

impl InteractionController {
    pub fn new(range: RadiusRange, initial_radius: i32, show_filtered: bool) -> Self {
        Self {
            state: WidgetState {
                show_filtered,
                radius: range.clamp(initial_radius),
                dragging: false,
            },
            range,
            was_pressed: false,
        }
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn range(&self) -> RadiusRange {
        self.range
    }

    pub fn update<C>(&mut self, input: &FrameInput, cache: &mut C) -> FrameOutcome
    where
        C: CacheInvalidation + ?Sized,
    {
        let layout = widgets::layout(input.framebuffer_size);
        self.update_with_layout(input, &layout, cache)
    }

    pub fn update_with_layout<C>(
        &mut self,
        input: &FrameInput,
        layout: &WidgetLayout,
        cache: &mut C,
    ) -> FrameOutcome
    where
        C: CacheInvalidation + ?Sized,
    {
        let (x, y) = input.framebuffer_cursor();
        let press_edge = input.pressed && !self.was_pressed;
        self.was_pressed = input.pressed;

        let mut outcome = FrameOutcome::default();

        if press_edge && layout.button.contains(x, y) {
            self.state.show_filtered = !self.state.show_filtered;
            outcome.toggled = true;
            tracing::debug!(show_filtered = self.state.show_filtered, "toggled filter");
        }

        if press_edge && layout.slider.contains(x, y) {
            self.state.dragging = true;
        } else if !input.pressed {
            self.state.dragging = false;
        }

        if self.state.dragging {
            let track = layout.slider;
            let t = if track.width > 0.0 {
                (x - track.x) / track.width
            } else {
                0.0
            };
            let radius = self.range.lerp(t);
            if radius != self.state.radius {
                self.state.radius = radius;
                outcome.radius_changed = true;
                cache.invalidate();
                tracing::debug!(radius, "blur radius changed");
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::{BUTTON_RECT, SLIDER_RECT};

    #[derive(Default)]
    struct Invalidations(u32);

    impl CacheInvalidation for Invalidations {
        fn invalidate(&mut self) {
            self.0 += 1;
        }
    }

    const FB: (u32, u32) = (800, 600);

    /// Builds input for a framebuffer-space point on a window with a 2x
    /// backing scale, exercising the scale and flip.
    fn input_at(fb_x: f32, fb_y: f32, pressed: bool) -> FrameInput {
        FrameInput {
            cursor: (fb_x as f64 / 2.0, (FB.1 as f64 - fb_y as f64) / 2.0),
            pressed,
            window_size: (FB.0 as f64 / 2.0, FB.1 as f64 / 2.0),
            framebuffer_size: FB,
        }
    }

    fn button_center() -> (f32, f32) {
        (
            BUTTON_RECT.x + BUTTON_RECT.width / 2.0,
            BUTTON_RECT.y + BUTTON_RECT.height / 2.0,
        )
    }

    #[test]
    fn cursor_is_scaled_and_flipped() {
        let input = FrameInput {
            cursor: (100.0, 50.0),
            pressed: false,
            window_size: (400.0, 300.0),
            framebuffer_size: (800, 600),
        };
        assert_eq!(input.framebuffer_cursor(), (200.0, 500.0));
    }

    #[test]
    fn held_button_toggles_once() {
        let mut controller = InteractionController::new(RadiusRange::DEFAULT, 1, false);
        let mut cache = Invalidations::default();
        let (x, y) = button_center();

        let first = controller.update(&input_at(x, y, true), &mut cache);
        let second = controller.update(&input_at(x, y, true), &mut cache);

        assert!(first.toggled);
        assert!(!second.toggled);
        assert!(controller.state().show_filtered);
        assert_eq!(cache.0, 0);
    }

    #[test]
    fn release_and_press_toggles_again() {
        let mut controller = InteractionController::new(RadiusRange::DEFAULT, 1, false);
        let mut cache = Invalidations::default();
        let (x, y) = button_center();

        controller.update(&input_at(x, y, true), &mut cache);
        controller.update(&input_at(x, y, false), &mut cache);
        controller.update(&input_at(x, y, true), &mut cache);
        assert!(!controller.state().show_filtered);
    }

    #[test]
    fn press_outside_button_does_nothing() {
        let mut controller = InteractionController::new(RadiusRange::DEFAULT, 1, false);
        let mut cache = Invalidations::default();
        let outcome = controller.update(&input_at(700.0, 500.0, true), &mut cache);
        assert_eq!(outcome, FrameOutcome::default());
        assert!(!controller.state().dragging);
    }

    #[test]
    fn dragging_right_never_decreases_radius() {
        let mut controller = InteractionController::new(RadiusRange::DEFAULT, 1, true);
        let mut cache = Invalidations::default();
        let y = SLIDER_RECT.y + SLIDER_RECT.height / 2.0;

        controller.update(&input_at(SLIDER_RECT.x, y, true), &mut cache);
        assert!(controller.state().dragging);

        let mut last = controller.state().radius;
        let mut x = SLIDER_RECT.x - 40.0;
        while x <= SLIDER_RECT.x + SLIDER_RECT.width + 40.0 {
            controller.update(&input_at(x, y, true), &mut cache);
            let radius = controller.state().radius;
            assert!(radius >= last, "radius went from {last} to {radius} at x={x}");
            assert!((1..=5).contains(&radius));
            last = radius;
            x += 7.0;
        }
        assert_eq!(last, 5);
        assert_eq!(cache.0, 4, "one invalidation per radius step");
    }

    #[test]
    fn drag_continues_outside_track_until_release() {
        let mut controller = InteractionController::new(RadiusRange::DEFAULT, 3, true);
        let mut cache = Invalidations::default();
        let y = SLIDER_RECT.y + SLIDER_RECT.height / 2.0;
        let mid = SLIDER_RECT.x + SLIDER_RECT.width / 2.0;

        controller.update(&input_at(mid, y, true), &mut cache);
        controller.update(&input_at(SLIDER_RECT.x - 100.0, 400.0, true), &mut cache);
        assert_eq!(controller.state().radius, 1);
        assert!(controller.state().dragging);

        controller.update(&input_at(SLIDER_RECT.x - 100.0, 400.0, false), &mut cache);
        assert!(!controller.state().dragging);

        controller.update(&input_at(SLIDER_RECT.x + SLIDER_RECT.width, 400.0, false), &mut cache);
        assert_eq!(controller.state().radius, 1);
    }

    #[test]
    fn drag_cannot_start_by_sliding_onto_track() {
        let mut controller = InteractionController::new(RadiusRange::DEFAULT, 1, true);
        let mut cache = Invalidations::default();
        let y = SLIDER_RECT.y + SLIDER_RECT.height / 2.0;

        controller.update(&input_at(700.0, 500.0, true), &mut cache);
        controller.update(&input_at(SLIDER_RECT.x + SLIDER_RECT.width, y, true), &mut cache);
        assert!(!controller.state().dragging);
        assert_eq!(controller.state().radius, 1);
        assert_eq!(cache.0, 0);
    }

    #[test]
    fn initial_radius_is_clamped() {
        let controller = InteractionController::new(RadiusRange::DEFAULT, 42, false);
        assert_eq!(controller.state().radius, 5);
    }

    #[test]
    fn radius_range_rejects_bad_bounds() {
        assert!(RadiusRange::new(0, 5).is_none());
        assert!(RadiusRange::new(4, 2).is_none());
        assert_eq!(RadiusRange::new(2, 2).unwrap().lerp(0.7), 2);
    }

    #[test]
    fn lerp_rounds_to_nearest() {
        let range = RadiusRange::DEFAULT;
        assert_eq!(range.lerp(0.0), 1);
        assert_eq!(range.lerp(0.12), 1);
        assert_eq!(range.lerp(0.13), 2);
        assert_eq!(range.lerp(1.0), 5);
        assert_eq!(range.lerp(2.0), 5);
    }
}
