/// A half-open index interval `[start, end)` into the bound data.
///
/// Producers keep `0 <= start <= end <= data_length`; a range is recreated on
/// every recomputation and never mutated after being published.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListRange {
    pub start: usize,
    pub end: usize, // exclusive
}

impl ListRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` when `other` lies entirely inside this range.
    pub fn covers(&self, other: &ListRange) -> bool {
        other.is_empty() || (self.start <= other.start && other.end <= self.end)
    }
}

/// The scroll axis of a viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

/// Animation behavior forwarded to the scrollable surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Instant,
    Smooth,
}

/// An edge of a scrollable surface.
///
/// `Start` and `End` are logical edges resolved against the surface's text
/// direction; the other four are physical.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
    Start,
    End,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

/// How the host platform reports `scroll_left` in right-to-left mode.
///
/// - `Normal`: 0 at the left edge, increasing rightward (same as LTR).
/// - `Negated`: 0 at the right edge, decreasing (negative) leftward.
/// - `Inverted`: 0 at the right edge, increasing leftward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RtlScrollAxisType {
    #[default]
    Normal,
    Negated,
    Inverted,
}

/// Whether a rendered-content offset is measured from the start or the end of
/// the rendered block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OffsetAnchor {
    #[default]
    ToStart,
    ToEnd,
}

/// A raw geometry snapshot of a scrollable surface.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollGeometry {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub scroll_width: f64,
    pub scroll_height: f64,
    pub client_width: f64,
    pub client_height: f64,
    pub direction: TextDirection,
    pub rtl_axis: RtlScrollAxisType,
}

/// A bounding rectangle in host coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingRect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingRect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Scroll target offsets, one per edge, resolved by the surface against its
/// geometry and text direction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollToOptions {
    pub top: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
    pub right: Option<f64>,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub behavior: ScrollBehavior,
}

/// A native scroll event reported by a surface. Timestamps are host-provided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollEvent {
    pub now_ms: u64,
}

/// A resize or orientation-change event reported by a geometry source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeometryEvent {
    pub now_ms: u64,
}

/// Cached viewport dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewportDimensions {
    pub width: f64,
    pub height: f64,
}

/// The translation applied to the rendered content block.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentTransform {
    pub axis: Orientation,
    pub offset_px: f64,
    pub anchor: OffsetAnchor,
}

/// The externally observable outcome of one coalesced refresh cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderFrame {
    pub total_content_size: f64,
    pub rendered_range: ListRange,
    pub transform: Option<ContentTransform>,
}
