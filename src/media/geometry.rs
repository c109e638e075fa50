use serde::{Deserialize, Serialize};

/// A point in asset space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width and height, possibly negative after a transform is applied
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Apply the linear part of a transform (translation does not move a size)
    pub fn applying(&self, transform: &AffineTransform) -> Size {
        Size {
            width: transform.a * self.width + transform.c * self.height,
            height: transform.b * self.width + transform.d * self.height,
        }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    /// True when the rectangle covers no area
    pub fn is_empty(&self) -> bool {
        !(self.size.width > 0.0 && self.size.height > 0.0)
    }
}

/// 2D affine transform in row-vector convention:
///
/// ```text
/// [x' y' 1] = [x y 1] * | a  b  0 |
///                       | c  d  0 |
///                       | tx ty 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: AffineTransform = AffineTransform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Counter-clockwise rotation by a multiple of 90 degrees.
    ///
    /// Other angles are snapped to the nearest quarter turn since video
    /// orientation metadata only ever carries those.
    pub fn quarter_turns(degrees: i32) -> Self {
        let (cos, sin) = match degrees.rem_euclid(360) {
            45..=134 => (0.0, 1.0),
            135..=224 => (-1.0, 0.0),
            225..=314 => (0.0, -1.0),
            _ => (1.0, 0.0),
        };

        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Apply to a point, including translation
    pub fn apply(&self, point: Point) -> Point {
        Point {
            x: self.a * point.x + self.c * point.y + self.tx,
            y: self.b * point.x + self.d * point.y + self.ty,
        }
    }

    pub fn translation(&self) -> Point {
        Point::new(self.tx, self.ty)
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
