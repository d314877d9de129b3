//! Collision shape descriptions
//!
//! Image assets are loaded outside the crate, so a template describes its
//! collision shape directly: `rect: [w, h]`, `circle: r`,
//! `ellipse: [w, h]`, or `rows: [".##.", "####"]` (ascii art, `#` solid).

use glam::Vec2;

use crate::config::{ConfigError, TemplateView, Value};

/// Collision shape of an entity, in pixels
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeSpec {
    Rect { width: u32, height: u32 },
    Circle { radius: u32 },
    Ellipse { width: u32, height: u32 },
    /// Rows of ascii art, every row padded to the widest
    Rows(Vec<String>),
}

impl Default for ShapeSpec {
    fn default() -> Self {
        ShapeSpec::Rect {
            width: 32,
            height: 32,
        }
    }
}

impl ShapeSpec {
    /// Bounding size in pixels
    pub fn size(&self) -> Vec2 {
        match self {
            ShapeSpec::Rect { width, height } | ShapeSpec::Ellipse { width, height } => {
                Vec2::new(*width as f32, *height as f32)
            }
            ShapeSpec::Circle { radius } => Vec2::splat((radius * 2) as f32),
            ShapeSpec::Rows(rows) => Vec2::new(
                rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as f32,
                rows.len() as f32,
            ),
        }
    }

    /// Read the `field` of a template as a shape
    pub fn from_field(view: &TemplateView<'_>, field: &str) -> Result<Option<ShapeSpec>, ConfigError> {
        let Some(value) = view.value(field) else {
            return Ok(None);
        };
        let bad = |reason: &str| view.error(field, reason);
        let map = value
            .as_map()
            .ok_or_else(|| bad("expected one of rect, circle, ellipse or rows"))?;
        if map.len() != 1 {
            return Err(bad("a shape has exactly one of rect, circle, ellipse or rows"));
        }
        let (kind, spec) = map.iter().next().ok_or_else(|| bad("empty shape"))?;
        let dimension = |v: &Value| -> Result<u32, ConfigError> {
            v.as_i64()
                .filter(|&d| d > 0)
                .map(|d| d as u32)
                .ok_or_else(|| bad("shape dimensions must be positive integers"))
        };
        let pair = |v: &Value| -> Result<(u32, u32), ConfigError> {
            match v.as_list() {
                Some([w, h]) => Ok((dimension(w)?, dimension(h)?)),
                _ => Err(bad("expected [width, height]")),
            }
        };
        let shape = match kind.as_str() {
            "rect" => {
                let (width, height) = pair(spec)?;
                ShapeSpec::Rect { width, height }
            }
            "ellipse" => {
                let (width, height) = pair(spec)?;
                ShapeSpec::Ellipse { width, height }
            }
            "circle" => ShapeSpec::Circle {
                radius: dimension(spec)?,
            },
            "rows" => {
                let rows = spec
                    .as_list()
                    .ok_or_else(|| bad("rows must be a list of strings"))?
                    .iter()
                    .map(|row| row.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| bad("rows must be a list of strings"))?;
                if rows.is_empty() || rows.iter().all(|r| !r.contains('#')) {
                    return Err(bad("rows must contain at least one solid '#' pixel"));
                }
                ShapeSpec::Rows(rows)
            }
            other => return Err(bad(&format!("unknown shape kind '{other}'"))),
        };
        Ok(Some(shape))
    }
}
