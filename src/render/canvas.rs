//! Backend-agnostic draw command lists
//!
//! Every drawable the registry caches is a `DrawList`. A backend replays the
//! commands in order; later commands paint over earlier ones.

use crate::util::vec2::Vec2;

/// 0xRRGGBB
pub type Color = u32;

pub const WHITE: Color = 0xffffff;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillCircle {
        center: Vec2,
        radius: f64,
        color: Color,
        alpha: f64,
    },
    StrokeCircle {
        center: Vec2,
        radius: f64,
        width: f64,
        color: Color,
        alpha: f64,
    },
    FillRect {
        origin: Vec2,
        width: f64,
        height: f64,
        color: Color,
        alpha: f64,
    },
    /// Open polylines stroked with one shared style
    StrokePaths {
        paths: Vec<Vec<Vec2>>,
        width: f64,
        color: Color,
        alpha: f64,
    },
}

impl DrawCommand {
    /// Radius for circle commands
    pub fn radius(&self) -> Option<f64> {
        match self {
            DrawCommand::FillCircle { radius, .. } | DrawCommand::StrokeCircle { radius, .. } => {
                Some(*radius)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    #[inline]
    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn fill_circle(&mut self, center: Vec2, radius: f64, color: Color, alpha: f64) {
        self.push(DrawCommand::FillCircle {
            center,
            radius,
            color,
            alpha,
        });
    }

    pub fn stroke_circle(&mut self, center: Vec2, radius: f64, width: f64, color: Color, alpha: f64) {
        self.push(DrawCommand::StrokeCircle {
            center,
            radius,
            width,
            color,
            alpha,
        });
    }

    pub fn fill_rect(&mut self, origin: Vec2, width: f64, height: f64, color: Color, alpha: f64) {
        self.push(DrawCommand::FillRect {
            origin,
            width,
            height,
            color,
            alpha,
        });
    }

    /// Stroke `paths`; empty path sets are skipped
    pub fn stroke_paths(&mut self, paths: Vec<Vec<Vec2>>, width: f64, color: Color, alpha: f64) {
        if paths.is_empty() {
            return;
        }
        self.push(DrawCommand::StrokePaths {
            paths,
            width,
            color,
            alpha,
        });
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
