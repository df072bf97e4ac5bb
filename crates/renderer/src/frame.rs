//! Per-frame draw planning.
//!
//! [`plan`] turns the widget state into the ordered command list the GPU
//! state executes. Keeping it pure lets the ordering rules be tested without
//! a device: clear first, cache refresh before anything samples the cache,
//! the image quad before the widgets, and present last.

use crate::interaction::{RadiusRange, WidgetState};
use crate::widgets::{self, WidgetLayout, WidgetRect};

pub const CLEAR_COLOR: [f64; 4] = [0.05, 0.05, 0.05, 1.0];

/// Which texture the fullscreen quad samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSource {
    Original,
    Filtered,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawCommand {
    Clear { color: [f64; 4] },
    RefreshCache { radius: i32 },
    Quad { source: ImageSource },
    Rect(WidgetRect),
    Present,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    pub framebuffer: (u32, u32),
    pub commands: Vec<DrawCommand>,
}

impl FramePlan {
    pub fn iter(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands.iter()
    }

    pub fn quad_source(&self) -> Option<ImageSource> {
        self.commands.iter().find_map(|command| match command {
            DrawCommand::Quad { source } => Some(*source),
            _ => None,
        })
    }
}

pub fn plan(
    state: &WidgetState,
    layout: &WidgetLayout,
    range: RadiusRange,
    framebuffer: (u32, u32),
) -> FramePlan {
    let mut commands = vec![DrawCommand::Clear { color: CLEAR_COLOR }];

    let source = if state.show_filtered {
        commands.push(DrawCommand::RefreshCache {
            radius: range.clamp(state.radius),
        });
        ImageSource::Filtered
    } else {
        ImageSource::Original
    };
    commands.push(DrawCommand::Quad { source });

    commands.extend(
        widgets::draw_list(state, layout, range)
            .into_iter()
            .map(DrawCommand::Rect),
    );
    commands.push(DrawCommand::Present);

    FramePlan {
        framebuffer,
        commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(show_filtered: bool, radius: i32) -> WidgetState {
        WidgetState {
            show_filtered,
            radius,
            dragging: false,
        }
    }

    fn position(plan: &FramePlan, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        plan.iter()
            .position(predicate)
            .expect("command missing from plan")
    }

    #[test]
    fn filtered_frame_refreshes_before_quad() {
        let layout = widgets::layout((800, 600));
        let plan = plan(&state(true, 3), &layout, RadiusRange::DEFAULT, (800, 600));

        assert!(matches!(plan.commands[0], DrawCommand::Clear { .. }));
        let refresh = position(&plan, |c| matches!(c, DrawCommand::RefreshCache { radius: 3 }));
        let quad = position(&plan, |c| matches!(c, DrawCommand::Quad { .. }));
        let first_rect = position(&plan, |c| matches!(c, DrawCommand::Rect(_)));
        assert!(refresh < quad);
        assert!(quad < first_rect);
        assert_eq!(plan.commands.last(), Some(&DrawCommand::Present));
        assert_eq!(plan.quad_source(), Some(ImageSource::Filtered));
    }

    #[test]
    fn original_frame_never_touches_cache() {
        let layout = widgets::layout((800, 600));
        let plan = plan(&state(false, 3), &layout, RadiusRange::DEFAULT, (800, 600));

        assert!(!plan
            .iter()
            .any(|c| matches!(c, DrawCommand::RefreshCache { .. })));
        assert_eq!(plan.quad_source(), Some(ImageSource::Original));
    }

    #[test]
    fn widgets_follow_draw_list_order() {
        let layout = widgets::layout((1280, 720));
        let widget_state = state(true, 5);
        let plan = plan(&widget_state, &layout, RadiusRange::DEFAULT, (1280, 720));

        let rects: Vec<WidgetRect> = plan
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Rect(rect) => Some(*rect),
                _ => None,
            })
            .collect();
        assert_eq!(
            rects,
            widgets::draw_list(&widget_state, &layout, RadiusRange::DEFAULT)
        );
    }
}
