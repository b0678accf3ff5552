/// Axis-aligned integer rectangle, half-open on the max edges.
///
/// Used for content bounds, write rectangles and scissors. Coordinates are
/// in the surface's pixel space.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct IRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IRect {
    #[inline]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rect from origin and size.
    #[inline]
    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Rect covering `[0, w) x [0, h)`.
    #[inline]
    pub const fn from_wh(w: i32, h: i32) -> Self {
        Self::new(0, 0, w, h)
    }

    #[inline]
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// True if the rect encloses zero area (including inverted rects).
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// True if `other` lies entirely inside `self`.
    #[inline]
    pub fn contains(&self, other: &IRect) -> bool {
        !other.is_empty()
            && !self.is_empty()
            && self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    /// Intersection of two rects; `None` when they share no area.
    #[inline]
    pub fn intersect(&self, other: &IRect) -> Option<IRect> {
        let r = IRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if r.is_empty() { None } else { Some(r) }
    }
}
