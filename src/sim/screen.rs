//! Screen geometry: bounds, proportional coordinates, exit points

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (top-left origin, y down)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_center(center: Vec2, size: Vec2) -> Self {
        Self {
            min: center - size / 2.0,
            max: center + size / 2.0,
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) / 2.0
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Strict overlap (touching edges do not count)
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// The visible play area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub size: Vec2,
}

impl Screen {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: Vec2::new(width, height),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect {
            min: Vec2::ZERO,
            max: self.size,
        }
    }

    /// Proportions of the screen size (0..1) to pixels, rounded
    pub fn to_pixels(&self, proportional: Vec2) -> Vec2 {
        (proportional * self.size).round()
    }

    pub fn prop_x(&self, x: f32) -> f32 {
        (x * self.size.x).round()
    }

    pub fn prop_y(&self, y: f32) -> f32 {
        (y * self.size.y).round()
    }

    /// Where something at `pos` moving with `vel` crosses the screen edge.
    ///
    /// A motionless object "exits" where it stands.
    pub fn exit_point(&self, pos: Vec2, vel: Vec2) -> Vec2 {
        let bound = |p: f32, v: f32, extent: f32| -> Option<f32> {
            if v > 0.0 {
                Some((extent - p) / v)
            } else if v < 0.0 {
                Some(-p / v)
            } else {
                None
            }
        };
        let tx = bound(pos.x, vel.x, self.size.x);
        let ty = bound(pos.y, vel.y, self.size.y);
        let exit_time = match (tx, ty) {
            (Some(a), Some(b)) => a.min(b),
            (Some(t), None) | (None, Some(t)) => t,
            (None, None) => return pos,
        };
        pos + vel * exit_time.max(0.0)
    }

    /// True once `center` is more than `cutoff` pixels outside the screen
    pub fn is_far_outside(&self, center: Vec2, cutoff: f32) -> bool {
        center.x < -cutoff
            || center.y < -cutoff
            || center.x > self.size.x + cutoff
            || center.y > self.size.y + cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_conversion() {
        let screen = Screen::new(640.0, 480.0);
        assert_eq!(screen.to_pixels(Vec2::new(0.5, 0.75)), Vec2::new(320.0, 360.0));
        assert_eq!(screen.prop_x(0.1), 64.0);
    }

    #[test]
    fn test_exit_point() {
        let screen = Screen::new(640.0, 480.0);
        // Moving right and down: hits the bottom first
        let exit = screen.exit_point(Vec2::new(100.0, 400.0), Vec2::new(10.0, 10.0));
        assert_eq!(exit, Vec2::new(180.0, 480.0));
        // Moving left
        let exit = screen.exit_point(Vec2::new(100.0, 100.0), Vec2::new(-50.0, 0.0));
        assert_eq!(exit, Vec2::new(0.0, 100.0));
        // Stationary
        assert_eq!(screen.exit_point(Vec2::new(5.0, 6.0), Vec2::ZERO), Vec2::new(5.0, 6.0));
    }

    #[test]
    fn test_far_outside() {
        let screen = Screen::new(640.0, 480.0);
        assert!(!screen.is_far_outside(Vec2::new(-499.0, 10.0), 500.0));
        assert!(screen.is_far_outside(Vec2::new(-501.0, 10.0), 500.0));
        assert!(screen.is_far_outside(Vec2::new(10.0, 981.0), 500.0));
    }

    #[test]
    fn test_rect_intersects() {
        let a = Rect::from_center(Vec2::new(10.0, 10.0), Vec2::splat(10.0));
        let b = Rect::from_center(Vec2::new(19.0, 10.0), Vec2::splat(10.0));
        let c = Rect::from_center(Vec2::new(20.0, 10.0), Vec2::splat(10.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
