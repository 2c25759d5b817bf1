//! Normalized-rectangle math shared by the editor, hit-testing and the wire format.

use serde::{Deserialize, Serialize};

/// Smallest side length a drawn or resized box may have, in normalized units.
pub const MIN_SIZE: f64 = 0.01;

const SPAN_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

impl CanvasPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn safe_width(self) -> f64 {
        self.width.max(1.0)
    }

    fn safe_height(self) -> f64 {
        self.height.max(1.0)
    }

    pub fn clamp_point(self, point: CanvasPoint) -> CanvasPoint {
        CanvasPoint::new(
            point.x.clamp(0.0, self.width.max(0.0)),
            point.y.clamp(0.0, self.height.max(0.0)),
        )
    }
}

/// Axis-aligned box in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Square of side `size` centered on `center`.
    pub fn centered(center: CanvasPoint, size: f64) -> Self {
        let half = size / 2.0;
        Self::new(center.x - half, center.y - half, size, size)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> CanvasPoint {
        CanvasPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Edges are inclusive so a pointer exactly on the border still hits.
    pub fn contains(&self, point: CanvasPoint) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }
}

/// Box in normalized `[0, 1]` image space. Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "[f64; 4]", from = "Vec<f64>")]
pub struct NormRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl NormRect {
    /// Builds a rect from raw corners. The result is sanitized.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        sanitize_rect(&[x1, y1, x2, y2])
    }

    pub const fn degenerate() -> Self {
        Self {
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub const fn to_array(self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// True when either side is shorter than [`MIN_SIZE`].
    pub fn is_below_min_size(&self) -> bool {
        self.width() < MIN_SIZE - SPAN_EPSILON || self.height() < MIN_SIZE - SPAN_EPSILON
    }
}

impl From<Vec<f64>> for NormRect {
    fn from(raw: Vec<f64>) -> Self {
        sanitize_rect(&raw)
    }
}

impl From<NormRect> for [f64; 4] {
    fn from(rect: NormRect) -> Self {
        rect.to_array()
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Clamps every coordinate into `[0, 1]` and swaps inverted corners.
/// Anything other than four values yields the degenerate rect.
pub fn sanitize_rect(raw: &[f64]) -> NormRect {
    let [x1, y1, x2, y2] = match raw {
        [x1, y1, x2, y2] => [*x1, *y1, *x2, *y2].map(clamp_unit),
        _ => return NormRect::degenerate(),
    };
    NormRect {
        x1: x1.min(x2),
        y1: y1.min(y2),
        x2: x1.max(x2),
        y2: y1.max(y2),
    }
}

pub fn to_pixel_space(rect: NormRect, canvas: CanvasSize) -> PixelRect {
    PixelRect::new(
        rect.x1 * canvas.width,
        rect.y1 * canvas.height,
        rect.width() * canvas.width,
        rect.height() * canvas.height,
    )
}

pub fn from_pixel_space(rect: PixelRect, canvas: CanvasSize) -> NormRect {
    let width = canvas.safe_width();
    let height = canvas.safe_height();
    sanitize_rect(&[
        rect.x / width,
        rect.y / height,
        rect.right() / width,
        rect.bottom() / height,
    ])
}

/// Normalizes a drag gesture's two pixel endpoints, independently per axis.
pub fn rect_from_drag_points(start: CanvasPoint, end: CanvasPoint, canvas: CanvasSize) -> NormRect {
    let width = canvas.safe_width();
    let height = canvas.safe_height();
    sanitize_rect(&[
        start.x.min(end.x) / width,
        start.y.min(end.y) / height,
        start.x.max(end.x) / width,
        start.y.max(end.y) / height,
    ])
}

/// Converts a pixel drag delta into normalized units.
pub fn normalized_delta(start: CanvasPoint, current: CanvasPoint, canvas: CanvasSize) -> (f64, f64) {
    (
        (current.x - start.x) / canvas.safe_width(),
        (current.y - start.y) / canvas.safe_height(),
    )
}

/// Translates `rect`, stopping at the image border without changing its size.
pub fn move_rect(rect: NormRect, dx: f64, dy: f64) -> NormRect {
    let rect = sanitize_rect(&rect.to_array());
    let dx = finite_or_zero(dx).clamp(-rect.x1, 1.0 - rect.x2);
    let dy = finite_or_zero(dy).clamp(-rect.y1, 1.0 - rect.y2);
    NormRect {
        x1: (rect.x1 + dx).max(0.0),
        y1: (rect.y1 + dy).max(0.0),
        x2: (rect.x2 + dx).min(1.0),
        y2: (rect.y2 + dy).min(1.0),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        Self::NorthWest,
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
    ];

    pub const fn moves_west(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    pub const fn moves_east(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    pub const fn moves_north(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    pub const fn moves_south(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }

    pub const fn cursor(self) -> &'static str {
        match self {
            Self::North => "n-resize",
            Self::NorthEast => "ne-resize",
            Self::East => "e-resize",
            Self::SouthEast => "se-resize",
            Self::South => "s-resize",
            Self::SouthWest => "sw-resize",
            Self::West => "w-resize",
            Self::NorthWest => "nw-resize",
        }
    }

    /// Anchor point of this handle on the edges of `rect`.
    pub fn anchor(self, rect: &PixelRect) -> CanvasPoint {
        let x = if self.moves_west() {
            rect.x
        } else if self.moves_east() {
            rect.right()
        } else {
            rect.x + rect.width / 2.0
        };
        let y = if self.moves_north() {
            rect.y
        } else if self.moves_south() {
            rect.bottom()
        } else {
            rect.y + rect.height / 2.0
        };
        CanvasPoint::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MovingEdge {
    Low,
    High,
    Neither,
}

impl MovingEdge {
    const fn horizontal(handle: ResizeHandle) -> Self {
        if handle.moves_west() {
            Self::Low
        } else if handle.moves_east() {
            Self::High
        } else {
            Self::Neither
        }
    }

    const fn vertical(handle: ResizeHandle) -> Self {
        if handle.moves_north() {
            Self::Low
        } else if handle.moves_south() {
            Self::High
        } else {
            Self::Neither
        }
    }
}

/// Moves the edges implied by `handle`, then re-expands any side that ended up
/// shorter than [`MIN_SIZE`] by snapping the moving edge against the pinned one.
pub fn resize_rect(rect: NormRect, handle: ResizeHandle, dx: f64, dy: f64) -> NormRect {
    let rect = sanitize_rect(&rect.to_array());
    let dx = finite_or_zero(dx);
    let dy = finite_or_zero(dy);
    let mut next = rect;

    if handle.moves_west() {
        next.x1 = clamp_unit(rect.x1 + dx);
    }
    if handle.moves_east() {
        next.x2 = clamp_unit(rect.x2 + dx);
    }
    if handle.moves_north() {
        next.y1 = clamp_unit(rect.y1 + dy);
    }
    if handle.moves_south() {
        next.y2 = clamp_unit(rect.y2 + dy);
    }

    let (x1, x2) = correct_span(next.x1, next.x2, MovingEdge::horizontal(handle));
    let (y1, y2) = correct_span(next.y1, next.y2, MovingEdge::vertical(handle));
    NormRect { x1, y1, x2, y2 }
}

fn correct_span(low: f64, high: f64, moving: MovingEdge) -> (f64, f64) {
    if high - low >= MIN_SIZE - SPAN_EPSILON {
        return (low, high);
    }
    match moving {
        MovingEdge::Low => {
            let high = high.max(MIN_SIZE);
            ((high - MIN_SIZE).max(0.0), high)
        }
        MovingEdge::High | MovingEdge::Neither => {
            let low = low.min(1.0 - MIN_SIZE);
            (low, (low + MIN_SIZE).min(1.0))
        }
    }
}

#[cfg(test)]
pub(crate) fn assert_rect_close(actual: NormRect, expected: [f64; 4]) {
    let actual = actual.to_array();
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!(
            (a - e).abs() < 1e-9,
            "rect mismatch: actual {actual:?}, expected {expected:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Vec<f64>> {
        vec![
            vec![0.2, 0.3, 0.4, 0.5],
            vec![0.9, 0.8, 0.1, 0.2],
            vec![-3.0, 2.0, 0.5, -0.5],
            vec![1.5, 1.5, 1.5, 1.5],
            vec![f64::NAN, 0.4, f64::INFINITY, 0.1],
            vec![0.5, 0.5, 0.5, 0.5],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.995, 0.0, 1.0, 0.004],
        ]
    }

    /// Every corner combination on an even grid over [-0.5, 1.5].
    fn grid(steps: u32) -> Vec<Vec<f64>> {
        let axis: Vec<f64> = (0..steps)
            .map(|i| -0.5 + 2.0 * f64::from(i) / f64::from(steps - 1))
            .collect();
        let mut rects = Vec::with_capacity(axis.len().pow(4));
        for &x1 in &axis {
            for &y1 in &axis {
                for &x2 in &axis {
                    for &y2 in &axis {
                        rects.push(vec![x1, y1, x2, y2]);
                    }
                }
            }
        }
        rects
    }

    #[test]
    fn sanitize_rect_orders_and_clamps_arbitrary_input() {
        for raw in samples().into_iter().chain(grid(9)) {
            let rect = sanitize_rect(&raw);
            assert!(rect.x1 <= rect.x2 && rect.y1 <= rect.y2, "{raw:?} -> {rect:?}");
            for value in rect.to_array() {
                assert!((0.0..=1.0).contains(&value), "{raw:?} -> {rect:?}");
            }
            assert_eq!(sanitize_rect(&rect.to_array()), rect);
        }
    }

    #[test]
    fn sanitize_rect_swaps_inverted_corners() {
        assert_rect_close(sanitize_rect(&[0.9, 0.8, 0.1, 0.2]), [0.1, 0.2, 0.9, 0.8]);
    }

    #[test]
    fn sanitize_rect_rejects_wrong_arity() {
        assert_eq!(sanitize_rect(&[0.1, 0.2, 0.3]), NormRect::degenerate());
        assert_eq!(sanitize_rect(&[]), NormRect::degenerate());
        assert_eq!(
            sanitize_rect(&[0.1, 0.2, 0.3, 0.4, 0.5]),
            NormRect::degenerate()
        );
    }

    #[test]
    fn norm_rect_wire_format_is_sanitized_array() {
        let rect: NormRect = serde_json::from_str("[0.6, 0.7, 0.2, 1.4]").expect("rect json");
        assert_rect_close(rect, [0.2, 0.7, 0.6, 1.0]);
        let malformed: NormRect = serde_json::from_str("[0.6]").expect("short rect json");
        assert_eq!(malformed, NormRect::degenerate());
        let encoded = serde_json::to_string(&NormRect::new(0.25, 0.5, 0.75, 1.0)).expect("encode");
        assert_eq!(encoded, "[0.25,0.5,0.75,1.0]");
    }

    #[test]
    fn pixel_space_round_trips_within_rounding() {
        let canvas = CanvasSize::new(640.0, 480.0);
        let rect = NormRect::new(0.125, 0.2, 0.6, 0.95);
        let back = from_pixel_space(to_pixel_space(rect, canvas), canvas);
        assert_rect_close(back, rect.to_array());
    }

    #[test]
    fn drag_points_normalize_on_canvas() {
        let canvas = CanvasSize::new(200.0, 100.0);
        let rect = rect_from_drag_points(
            CanvasPoint::new(110.0, 60.0),
            CanvasPoint::new(10.0, 10.0),
            canvas,
        );
        assert_rect_close(rect, [0.05, 0.1, 0.55, 0.6]);
    }

    #[test]
    fn drag_points_outside_canvas_are_clamped() {
        let canvas = CanvasSize::new(100.0, 100.0);
        let rect = rect_from_drag_points(
            CanvasPoint::new(-20.0, 50.0),
            CanvasPoint::new(150.0, 80.0),
            canvas,
        );
        assert_rect_close(rect, [0.0, 0.5, 1.0, 0.8]);
    }

    #[test]
    fn move_rect_preserves_size_at_borders() {
        let rect = NormRect::new(0.7, 0.1, 0.9, 0.4);
        let moved = move_rect(rect, 0.5, -0.3);
        assert_rect_close(moved, [0.8, 0.0, 1.0, 0.3]);
        assert!((moved.width() - rect.width()).abs() < 1e-12);
        assert!((moved.height() - rect.height()).abs() < 1e-12);
    }

    #[test]
    fn move_rect_translates_inside_bounds() {
        let moved = move_rect(NormRect::new(0.05, 0.1, 0.55, 0.6), 0.1, 0.0);
        assert_rect_close(moved, [0.15, 0.1, 0.65, 0.6]);
    }

    #[test]
    fn resize_rect_moves_only_handle_edges() {
        let rect = NormRect::new(0.2, 0.2, 0.6, 0.6);
        assert_rect_close(
            resize_rect(rect, ResizeHandle::East, 0.1, 0.3),
            [0.2, 0.2, 0.7, 0.6],
        );
        assert_rect_close(
            resize_rect(rect, ResizeHandle::NorthWest, -0.1, -0.05),
            [0.1, 0.15, 0.6, 0.6],
        );
        assert_rect_close(
            resize_rect(rect, ResizeHandle::South, 0.5, 0.9),
            [0.2, 0.2, 0.6, 1.0],
        );
    }

    #[test]
    fn resize_rect_pins_far_edge_when_collapsing() {
        let rect = NormRect::new(0.2, 0.2, 0.6, 0.6);
        let crossed = resize_rect(rect, ResizeHandle::West, 0.9, 0.0);
        assert_rect_close(crossed, [0.59, 0.2, 0.6, 0.6]);

        let crossed = resize_rect(rect, ResizeHandle::SouthEast, -0.5, -0.5);
        assert_rect_close(crossed, [0.2, 0.2, 0.21, 0.21]);
    }

    #[test]
    fn resize_rect_re_expands_when_far_edge_hugs_border() {
        let rect = NormRect::new(0.0, 0.0, 0.005, 0.3);
        let resized = resize_rect(rect, ResizeHandle::West, 0.4, 0.0);
        assert_rect_close(resized, [0.0, 0.0, 0.01, 0.3]);

        let rect = NormRect::new(0.995, 0.2, 1.0, 0.4);
        let resized = resize_rect(rect, ResizeHandle::East, -0.4, 0.0);
        assert_rect_close(resized, [0.99, 0.2, 1.0, 0.4]);
    }

    #[test]
    fn resize_rect_never_inverts_or_undershoots_min_size() {
        let deltas = [-2.0, -0.7, -0.3, -0.004, 0.0, 0.004, 0.3, 0.7, 2.0];
        for raw in samples().into_iter().chain(grid(7)) {
            let rect = sanitize_rect(&raw);
            for handle in ResizeHandle::ALL {
                for dx in deltas {
                    for dy in deltas {
                        let resized = resize_rect(rect, handle, dx, dy);
                        assert!(resized.x1 <= resized.x2 && resized.y1 <= resized.y2);
                        assert!(
                            resized.width() >= MIN_SIZE - 1e-9
                                && resized.height() >= MIN_SIZE - 1e-9,
                            "{rect:?} {handle:?} ({dx}, {dy}) -> {resized:?}"
                        );
                        for value in resized.to_array() {
                            assert!((0.0..=1.0).contains(&value));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn handle_anchor_sits_on_edges_and_corners() {
        let rect = PixelRect::new(10.0, 20.0, 100.0, 40.0);
        assert_eq!(
            ResizeHandle::NorthWest.anchor(&rect),
            CanvasPoint::new(10.0, 20.0)
        );
        assert_eq!(ResizeHandle::East.anchor(&rect), CanvasPoint::new(110.0, 40.0));
        assert_eq!(ResizeHandle::South.anchor(&rect), CanvasPoint::new(60.0, 60.0));
    }
}
