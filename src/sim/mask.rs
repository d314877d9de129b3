//! Pixel collision masks
//!
//! A mask is a boolean bitmap. Two masks are compared at an integer offset
//! (the second mask's top-left corner relative to the first's); the overlap
//! region's orientation gives the contact normal for mass collisions.

use glam::{IVec2, Vec2};

use crate::blueprint::ShapeSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Mask {
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    pub fn filled(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![true; width * height],
        }
    }

    pub fn from_shape(shape: &ShapeSpec) -> Self {
        match shape {
            ShapeSpec::Rect { width, height } => Self::filled(*width as usize, *height as usize),
            ShapeSpec::Circle { radius } => {
                let d = *radius as usize * 2;
                Self::ellipse(d, d)
            }
            ShapeSpec::Ellipse { width, height } => Self::ellipse(*width as usize, *height as usize),
            ShapeSpec::Rows(rows) => {
                let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
                let mut mask = Self::empty(width, rows.len());
                for (y, row) in rows.iter().enumerate() {
                    for (x, c) in row.chars().enumerate() {
                        mask.set(x, y, c == '#');
                    }
                }
                mask
            }
        }
    }

    /// Ellipse inscribed in a `width` x `height` box
    pub fn ellipse(width: usize, height: usize) -> Self {
        let mut mask = Self::empty(width, height);
        let (a, b) = (width as f32 / 2.0, height as f32 / 2.0);
        for y in 0..height {
            for x in 0..width {
                let dx = (x as f32 + 0.5 - a) / a;
                let dy = (y as f32 + 0.5 - b) / b;
                mask.set(x, y, dx * dx + dy * dy <= 1.0);
            }
        }
        mask
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Integer top-left corner when the mask is centered on `center`
    pub fn origin_at(&self, center: Vec2) -> IVec2 {
        (center - self.size() / 2.0).round().as_ivec2()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.bits[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.bits[y * self.width + x] = value;
        }
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Pixel ranges of `self` that can overlap `other` placed at `offset`
    fn overlap_range(&self, other: &Mask, offset: IVec2) -> Option<(std::ops::Range<usize>, std::ops::Range<usize>)> {
        let x0 = offset.x.max(0);
        let y0 = offset.y.max(0);
        let x1 = (offset.x + other.width as i32).min(self.width as i32);
        let y1 = (offset.y + other.height as i32).min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as usize..x1 as usize, y0 as usize..y1 as usize))
    }

    /// Whether any set pixel of `other` (top-left at `offset`) lands on a set pixel here
    pub fn overlap(&self, other: &Mask, offset: IVec2) -> bool {
        let Some((xs, ys)) = self.overlap_range(other, offset) else {
            return false;
        };
        ys.into_iter().any(|y| {
            xs.clone().any(|x| {
                self.get(x, y)
                    && other.get((x as i32 - offset.x) as usize, (y as i32 - offset.y) as usize)
            })
        })
    }

    /// The overlapping pixels, in this mask's coordinates
    pub fn overlap_mask(&self, other: &Mask, offset: IVec2) -> Mask {
        let mut out = Mask::empty(self.width, self.height);
        if let Some((xs, ys)) = self.overlap_range(other, offset) {
            for y in ys {
                for x in xs.clone() {
                    if self.get(x, y)
                        && other.get((x as i32 - offset.x) as usize, (y as i32 - offset.y) as usize)
                    {
                        out.set(x, y, true);
                    }
                }
            }
        }
        out
    }

    fn set_pixels(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(|(i, _)| Vec2::new((i % self.width) as f32 + 0.5, (i / self.width) as f32 + 0.5))
    }

    /// Mean position of set pixels
    pub fn centroid(&self) -> Option<Vec2> {
        let n = self.count();
        if n == 0 {
            return None;
        }
        Some(self.set_pixels().sum::<Vec2>() / n as f32)
    }

    /// Angle (radians) of the principal axis of the set pixels.
    ///
    /// `None` for fewer than two pixels or a rotationally symmetric blob.
    pub fn orientation(&self) -> Option<f32> {
        let n = self.count();
        if n < 2 {
            return None;
        }
        let c = self.centroid()?;
        let (mut m20, mut m02, mut m11) = (0.0f32, 0.0f32, 0.0f32);
        for p in self.set_pixels() {
            let d = p - c;
            m20 += d.x * d.x;
            m02 += d.y * d.y;
            m11 += d.x * d.y;
        }
        let eps = 1e-4 * n as f32;
        if (m20 - m02).abs() < eps && m11.abs() < eps {
            return None;
        }
        Some(0.5 * (2.0 * m11).atan2(m20 - m02))
    }

    /// Bounds of the set pixels as (top-left, size), in mask coordinates
    pub fn bounding_rect(&self) -> Option<(Vec2, Vec2)> {
        let mut min = IVec2::new(i32::MAX, i32::MAX);
        let mut max = IVec2::new(i32::MIN, i32::MIN);
        for (i, _) in self.bits.iter().enumerate().filter(|(_, b)| **b) {
            let p = IVec2::new((i % self.width) as i32, (i / self.width) as i32);
            min = min.min(p);
            max = max.max(p);
        }
        if min.x > max.x {
            return None;
        }
        Some((min.as_vec2(), (max - min + IVec2::ONE).as_vec2()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_overlap_offsets() {
        let a = Mask::filled(10, 10);
        let b = Mask::filled(4, 4);
        assert!(a.overlap(&b, IVec2::new(8, 8)));
        assert!(!a.overlap(&b, IVec2::new(10, 0)));
        assert!(a.overlap(&b, IVec2::new(-3, -3)));
        assert_eq!(a.overlap_mask(&b, IVec2::new(8, 8)).count(), 4);
    }

    #[test]
    fn test_circles_miss_at_corners() {
        let a = Mask::from_shape(&ShapeSpec::Circle { radius: 10 });
        let b = Mask::from_shape(&ShapeSpec::Circle { radius: 10 });
        // Bounding boxes overlap diagonally but the discs do not
        assert!(!a.overlap(&b, IVec2::new(17, 17)));
        assert!(a.overlap(&b, IVec2::new(15, 0)));
    }

    #[test]
    fn test_rows_shape() {
        let mask = Mask::from_shape(&ShapeSpec::Rows(vec![".#.".into(), "###".into()]));
        assert_eq!(mask.count(), 4);
        assert!(!mask.get(0, 0));
        assert!(mask.get(1, 0));
        let (min, size) = mask.bounding_rect().unwrap();
        assert_eq!(min, Vec2::ZERO);
        assert_eq!(size, Vec2::new(3.0, 2.0));
    }

    #[test]
    fn test_orientation_of_strips() {
        let horizontal = Mask::filled(10, 2);
        let vertical = Mask::filled(2, 10);
        assert!(horizontal.orientation().unwrap().abs() < 1e-4);
        let v = vertical.orientation().unwrap().abs();
        assert!((v - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
        assert_eq!(Mask::filled(4, 4).orientation(), None);
    }

    #[test]
    fn test_centroid() {
        let mut mask = Mask::empty(4, 4);
        mask.set(0, 0, true);
        mask.set(2, 2, true);
        assert_eq!(mask.centroid(), Some(Vec2::new(1.5, 1.5)));
        assert_eq!(Mask::empty(3, 3).centroid(), None);
    }
}
