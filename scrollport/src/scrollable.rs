use std::rc::Rc;

use crate::emitter::EventBus;
use crate::types::{
    BoundingRect, Edge, Orientation, RtlScrollAxisType, ScrollBehavior, ScrollEvent,
    ScrollGeometry, ScrollToOptions, TextDirection,
};

/// Resolves a logical `Start`/`End` edge to a physical horizontal edge.
fn resolve_horizontal(direction: TextDirection, from: Edge) -> Edge {
    match from {
        Edge::Start => match direction {
            TextDirection::Ltr => Edge::Left,
            TextDirection::Rtl => Edge::Right,
        },
        Edge::End => match direction {
            TextDirection::Ltr => Edge::Right,
            TextDirection::Rtl => Edge::Left,
        },
        other => other,
    }
}

/// Measures how many pixels of content are hidden past `from`.
///
/// `Start`/`End` resolve against the text direction, and the raw
/// `scroll_left` is normalized across the three RTL axis conventions, so the
/// result is always non-negative regardless of platform quirks.
pub fn measure_scroll_offset(geometry: &ScrollGeometry, from: Edge) -> f64 {
    let offset = match from {
        Edge::Top => geometry.scroll_top,
        Edge::Bottom => geometry.scroll_height - geometry.client_height - geometry.scroll_top,
        horizontal => {
            let from = resolve_horizontal(geometry.direction, horizontal);
            let leftover = geometry.scroll_width - geometry.client_width;
            let is_rtl = geometry.direction == TextDirection::Rtl;
            match (is_rtl, geometry.rtl_axis) {
                (true, RtlScrollAxisType::Inverted) => {
                    if from == Edge::Left {
                        leftover - geometry.scroll_left
                    } else {
                        geometry.scroll_left
                    }
                }
                (true, RtlScrollAxisType::Negated) => {
                    if from == Edge::Left {
                        geometry.scroll_left + leftover
                    } else {
                        -geometry.scroll_left
                    }
                }
                _ => {
                    if from == Edge::Left {
                        geometry.scroll_left
                    } else {
                        leftover - geometry.scroll_left
                    }
                }
            }
        }
    };
    offset.max(0.0)
}

/// Normalizes [`ScrollToOptions`] into the raw `(left, top)` pair the
/// platform understands.
///
/// `start`/`end` are rewritten as `left`/`right` under the text direction,
/// `bottom` as a top offset, `right` as a left offset, and the final left is
/// re-encoded for `Negated`/`Inverted` RTL axes.
pub fn resolve_scroll_to(
    geometry: &ScrollGeometry,
    options: &ScrollToOptions,
) -> (Option<f64>, Option<f64>) {
    let is_rtl = geometry.direction == TextDirection::Rtl;

    let mut left = options
        .left
        .or(if is_rtl { options.end } else { options.start });
    let mut right = options
        .right
        .or(if is_rtl { options.start } else { options.end });

    let mut top = options.top;
    if let Some(bottom) = options.bottom {
        top = Some(geometry.scroll_height - geometry.client_height - bottom);
    }

    let leftover = geometry.scroll_width - geometry.client_width;
    if is_rtl && geometry.rtl_axis != RtlScrollAxisType::Normal {
        if let Some(l) = left {
            right = Some(leftover - l);
        }
        left = match geometry.rtl_axis {
            RtlScrollAxisType::Inverted => right,
            _ => right.map(|r| -r),
        };
    } else if let Some(r) = right {
        left = Some(leftover - r);
    }

    (left, top)
}

/// A node in the host UI tree, used for containment walks.
pub trait ScrollNode {
    /// A stable identity for this node.
    fn node_id(&self) -> u64;
    fn parent(&self) -> Option<Rc<dyn ScrollNode>>;
}

/// Something that can report a bounding rectangle (e.g. the viewport's own
/// host element when the scrolling container is an ancestor).
pub trait BoundsSource {
    fn bounding_rect(&self) -> BoundingRect;
}

/// A scrollable surface — the external collaborator wrapping a real
/// scroll container.
///
/// Implementors provide raw geometry and the scroll side effect; the provided
/// methods layer edge resolution and RTL normalization on top.
///
/// Contract: [`apply_scroll`] must not synchronously emit on
/// [`element_scrolled`]; scroll events are delivered on a later turn with a
/// host-provided timestamp.
///
/// [`apply_scroll`]: ScrollableSurface::apply_scroll
/// [`element_scrolled`]: ScrollableSurface::element_scrolled
pub trait ScrollableSurface {
    /// A stable identity for this surface (registry key).
    fn surface_id(&self) -> u64;

    fn geometry(&self) -> ScrollGeometry;

    fn bounding_rect(&self) -> BoundingRect;

    /// Applies a raw scroll position. `None` leaves that axis untouched.
    fn apply_scroll(&self, left: Option<f64>, top: Option<f64>, behavior: ScrollBehavior);

    /// The surface's native scroll event stream.
    fn element_scrolled(&self) -> EventBus<ScrollEvent>;

    /// The surface's node in the UI tree, when it has one. Used by the
    /// scroll-event hub for ancestor queries.
    fn scroll_node(&self) -> Option<Rc<dyn ScrollNode>> {
        None
    }

    fn measure_viewport_size(&self, orientation: Orientation) -> f64 {
        let geometry = self.geometry();
        match orientation {
            Orientation::Horizontal => geometry.client_width,
            Orientation::Vertical => geometry.client_height,
        }
    }

    fn measure_scroll_offset(&self, from: Edge) -> f64 {
        measure_scroll_offset(&self.geometry(), from)
    }

    /// Where the surface's content origin sits in host coordinates: the
    /// bounding-rect edge with the scroll offset hidden past it subtracted
    /// back out.
    fn measure_bounding_client_rect_with_scroll_offset(&self, from: Edge) -> f64 {
        let geometry = self.geometry();
        let rect = self.bounding_rect();
        let edge = resolve_horizontal(geometry.direction, from);
        let position = match edge {
            Edge::Top => rect.top,
            Edge::Bottom => rect.bottom(),
            Edge::Left => rect.left,
            _ => rect.right(),
        };
        position - measure_scroll_offset(&geometry, edge)
    }

    fn scroll_to(&self, options: ScrollToOptions) {
        let geometry = self.geometry();
        let (left, top) = resolve_scroll_to(&geometry, &options);
        self.apply_scroll(left, top, options.behavior);
    }
}
