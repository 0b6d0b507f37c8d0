//! Path construction and clip regions.
//!
//! Paths are built in user space by the path operators and transformed to
//! device space only when they become part of a clip.

use crate::utils::{Matrix, Point, Rect, apply_matrix_pt};

/// Winding rule used to fill or clip a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// Path segment for graphics operations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    /// Cubic bezier: two control points and the end point
    CurveTo(Point, Point, Point),
    Close,
}

/// An ordered list of subpaths.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Path {
    segments: Vec<PathSegment>,
    #[cfg_attr(feature = "serde", serde(skip))]
    current: Option<Point>,
    #[cfg_attr(feature = "serde", serde(skip))]
    subpath_start: Option<Point>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Axis-aligned rectangle as one closed subpath.
    pub fn from_rect(rect: Rect) -> Self {
        let mut path = Self::new();
        let (x0, y0, x1, y1) = rect;
        path.rect(x0, y0, x1 - x0, y1 - y0);
        path
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The current point, if one is defined.
    pub const fn current_point(&self) -> Option<Point> {
        self.current
    }

    pub fn move_to(&mut self, p: Point) {
        // consecutive movetos collapse into one
        if let Some(PathSegment::MoveTo(last)) = self.segments.last_mut() {
            *last = p;
        } else {
            self.segments.push(PathSegment::MoveTo(p));
        }
        self.current = Some(p);
        self.subpath_start = Some(p);
    }

    /// Append a line. Returns `false` when there is no current point.
    pub fn line_to(&mut self, p: Point) -> bool {
        if self.current.is_none() {
            return false;
        }
        self.segments.push(PathSegment::LineTo(p));
        self.current = Some(p);
        true
    }

    /// Append a cubic bezier. Returns `false` when there is no current point.
    pub fn curve_to(&mut self, c1: Point, c2: Point, end: Point) -> bool {
        if self.current.is_none() {
            return false;
        }
        self.segments.push(PathSegment::CurveTo(c1, c2, end));
        self.current = Some(end);
        true
    }

    /// `v`: the first control point is the current point.
    pub fn curve_to_v(&mut self, c2: Point, end: Point) -> bool {
        match self.current {
            Some(c1) => self.curve_to(c1, c2, end),
            None => false,
        }
    }

    /// `y`: the second control point is the end point.
    pub fn curve_to_y(&mut self, c1: Point, end: Point) -> bool {
        self.curve_to(c1, end, end)
    }

    pub fn close(&mut self) {
        if self.current.is_none() || matches!(self.segments.last(), Some(PathSegment::Close)) {
            return;
        }
        self.segments.push(PathSegment::Close);
        self.current = self.subpath_start;
    }

    /// `re`: a closed rectangle subpath; the current point ends at `(x, y)`.
    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.move_to((x, y));
        self.segments.push(PathSegment::LineTo((x + w, y)));
        self.segments.push(PathSegment::LineTo((x + w, y + h)));
        self.segments.push(PathSegment::LineTo((x, y + h)));
        self.segments.push(PathSegment::Close);
        self.current = Some((x, y));
    }

    /// Take the segments out, leaving the path empty with no current point.
    pub fn take(&mut self) -> Path {
        Path {
            segments: std::mem::take(&mut self.segments),
            current: self.current.take(),
            subpath_start: self.subpath_start.take(),
        }
    }

    /// A copy of this path with every point mapped through `m`.
    pub fn transform(&self, m: Matrix) -> Path {
        let map = |p: Point| apply_matrix_pt(m, p);
        Path {
            segments: self
                .segments
                .iter()
                .map(|seg| match *seg {
                    PathSegment::MoveTo(p) => PathSegment::MoveTo(map(p)),
                    PathSegment::LineTo(p) => PathSegment::LineTo(map(p)),
                    PathSegment::CurveTo(a, b, c) => PathSegment::CurveTo(map(a), map(b), map(c)),
                    PathSegment::Close => PathSegment::Close,
                })
                .collect(),
            current: self.current.map(map),
            subpath_start: self.subpath_start.map(map),
        }
    }

    /// Bounding box of all points, control points included.
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = self.segments.iter().flat_map(|seg| {
            let pts: smallvec::SmallVec<[Point; 3]> = match *seg {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => smallvec::smallvec![p],
                PathSegment::CurveTo(a, b, c) => smallvec::smallvec![a, b, c],
                PathSegment::Close => smallvec::SmallVec::new(),
            };
            pts
        });
        let (x, y) = points.next()?;
        let init = (x, y, x, y);
        Some(points.fold(init, |(x0, y0, x1, y1), (x, y)| {
            (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
        }))
    }
}

/// Clip region in device space: the intersection of its paths.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClipPath {
    pub paths: Vec<(Path, FillRule)>,
    /// Bounds of the intersection (conservative).
    pub bounds: Rect,
}

impl ClipPath {
    /// Clip to a device-space rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            paths: vec![(Path::from_rect(rect), FillRule::NonZero)],
            bounds: rect,
        }
    }

    /// Start a clip from one device-space path.
    pub fn from_path(path: Path, rule: FillRule) -> Self {
        let bounds = path.bounds().unwrap_or((0.0, 0.0, 0.0, 0.0));
        Self {
            paths: vec![(path, rule)],
            bounds,
        }
    }

    /// Intersect `clip` (if any) with a device-space path.
    pub fn intersect(clip: Option<&ClipPath>, path: Path, rule: FillRule) -> ClipPath {
        let Some(clip) = clip else {
            return Self::from_path(path, rule);
        };
        let (a0, b0, a1, b1) = clip.bounds;
        let (c0, d0, c1, d1) = path.bounds().unwrap_or((0.0, 0.0, 0.0, 0.0));
        let x0 = a0.max(c0);
        let y0 = b0.max(d0);
        let bounds = (x0, y0, a1.min(c1).max(x0), b1.min(d1).max(y0));
        let mut paths = clip.paths.clone();
        paths.push((path, rule));
        ClipPath { paths, bounds }
    }

    pub fn is_empty(&self) -> bool {
        let (x0, y0, x1, y1) = self.bounds;
        x1 <= x0 || y1 <= y0
    }
}
