//! Core geometry types for barnhunt.
//!
//! ## Rust Lesson #3: Structs & Derives
//!
//! Everything here is a small `Copy` value: points, affine transforms and
//! axis-aligned bounding boxes. The `#[derive(...)]` macro gives us:
//! - `Debug` = print with `{:?}`
//! - `Clone` + `Copy` = pass by value without thinking about ownership
//! - `PartialEq` = compare with `==` (exact, use the `approx_eq` helpers
//!   when floating-point noise matters)

use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

/// Tolerance used when comparing transforms and coordinates.
pub const EPSILON: f64 = 1e-9;

/// A 2D point (or displacement) with x,y coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

// ============================================================================
// AFFINE TRANSFORMS
// ============================================================================

/// A 2×3 affine matrix, laid out like the SVG `matrix(a b c d e f)` form:
///
/// ```text
/// | a c e |
/// | b d f |
/// | 0 0 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    #[inline]
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    #[inline]
    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    #[inline]
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `degrees`, clockwise on screen (SVG y axis points down).
    pub fn rotate(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Compose two transforms: the result applies `inner` first, then `self`.
    ///
    /// This matches nested SVG groups, where a child's transform is applied
    /// inside its parent's: `parent.compose(child)`.
    pub fn compose(&self, inner: &Transform) -> Transform {
        Transform {
            a: self.a * inner.a + self.c * inner.b,
            b: self.b * inner.a + self.d * inner.b,
            c: self.a * inner.c + self.c * inner.d,
            d: self.b * inner.c + self.d * inner.d,
            e: self.a * inner.e + self.c * inner.f + self.e,
            f: self.b * inner.e + self.d * inner.f + self.f,
        }
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// The inverse transform, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Transform> {
        let det = self.determinant();
        if det.abs() < EPSILON || !det.is_finite() {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Transform {
            a,
            b,
            c,
            d,
            e: -(a * self.e + c * self.f),
            f: -(b * self.e + d * self.f),
        })
    }

    /// Map a point through the transform.
    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    /// Map a displacement (ignores the translation part).
    #[inline]
    pub fn apply_vector(&self, v: Point) -> Point {
        Point::new(self.a * v.x + self.c * v.y, self.b * v.x + self.d * v.y)
    }

    pub fn is_identity(&self) -> bool {
        self.approx_eq(&Transform::IDENTITY, EPSILON)
    }

    /// True when the transform only translates.
    pub fn is_translation(&self) -> bool {
        (self.a - 1.0).abs() < EPSILON
            && self.b.abs() < EPSILON
            && self.c.abs() < EPSILON
            && (self.d - 1.0).abs() < EPSILON
    }

    pub fn approx_eq(&self, other: &Transform, tolerance: f64) -> bool {
        (self.a - other.a).abs() <= tolerance
            && (self.b - other.b).abs() <= tolerance
            && (self.c - other.c).abs() <= tolerance
            && (self.d - other.d).abs() <= tolerance
            && (self.e - other.e).abs() <= tolerance
            && (self.f - other.f).abs() <= tolerance
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}

/// `outer * inner` is `outer.compose(&inner)`.
impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

/// Format a number for an attribute value: at most 6 decimals, no trailing
/// zeros, no negative zero.
pub fn fmt_number(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "-0" | "" => "0".to_string(),
        _ => s.to_string(),
    }
}

/// Persisted form, as written to a `transform` attribute.
///
/// The identity formats as an empty string.
impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            Ok(())
        } else if self.is_translation() {
            write!(f, "translate({},{})", fmt_number(self.e), fmt_number(self.f))
        } else {
            write!(
                f,
                "matrix({},{},{},{},{},{})",
                fmt_number(self.a),
                fmt_number(self.b),
                fmt_number(self.c),
                fmt_number(self.d),
                fmt_number(self.e),
                fmt_number(self.f)
            )
        }
    }
}

/// Parse any SVG transform list (`translate(..) rotate(..) matrix(..)` ...).
impl FromStr for Transform {
    type Err = svgtypes::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Transform::IDENTITY);
        }
        let t = svgtypes::Transform::from_str(s)?;
        Ok(Transform::new(t.a, t.b, t.c, t.d, t.e, t.f))
    }
}

// ============================================================================
// BOUNDING BOXES
// ============================================================================

/// An axis-aligned rectangle. Invariant: `right >= left`, `bottom >= top`.
///
/// Degenerate (zero width or height) boxes are valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BoundingBox {
    /// Create a box from two x and two y coordinates, in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            left: x0.min(x1),
            top: y0.min(y1),
            right: x0.max(x1),
            bottom: y0.max(y1),
        }
    }

    /// Create a box from its top-left corner and size.
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Smallest box containing all points, `None` for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        points.into_iter().fold(None, |acc: Option<BoundingBox>, p| {
            Some(match acc {
                None => BoundingBox::new(p.x, p.y, p.x, p.y),
                Some(b) => BoundingBox {
                    left: b.left.min(p.x),
                    top: b.top.min(p.y),
                    right: b.right.max(p.x),
                    bottom: b.bottom.max(p.y),
                },
            })
        })
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Top-left corner.
    #[inline]
    pub fn minimum(&self) -> Point {
        Point::new(self.left, self.top)
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Closed-interval overlap test: boxes that merely touch overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.top <= other.bottom
            && other.top <= self.bottom
    }

    /// The common area of both boxes, if they overlap.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.overlaps(other) {
            return None;
        }
        Some(BoundingBox {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        })
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }

    /// The same box moved so its top-left corner is at `origin`.
    pub fn moved_to(&self, origin: Point) -> BoundingBox {
        BoundingBox::from_origin_size(origin.x, origin.y, self.width(), self.height())
    }

    /// Axis-aligned box around the four transformed corners.
    pub fn transformed(&self, t: &Transform) -> BoundingBox {
        let corners = [
            Point::new(self.left, self.top),
            Point::new(self.right, self.top),
            Point::new(self.right, self.bottom),
            Point::new(self.left, self.bottom),
        ];
        // Four corners always give Some.
        BoundingBox::from_points(corners.iter().map(|&p| t.apply(p))).unwrap_or(*self)
    }

    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f64) -> bool {
        (self.left - other.left).abs() <= tolerance
            && (self.top - other.top).abs() <= tolerance
            && (self.right - other.right).abs() <= tolerance
            && (self.bottom - other.bottom).abs() <= tolerance
    }
}

/// Union of any number of boxes.
pub fn union_all<I: IntoIterator<Item = BoundingBox>>(boxes: I) -> Option<BoundingBox> {
    boxes.into_iter().reduce(|a, b| a.union(&b))
}

// ============================================================================
// TESTS
// ============================================================================
