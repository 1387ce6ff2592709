use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::audit::AuditedSubscription;
use crate::emitter::{EventBus, Subscription};
use crate::error::ScrollError;
use crate::geometry::{DEFAULT_RESIZE_AUDIT_MS, ViewportGeometryCache};
use crate::hub::ScrollEventHub;
use crate::scheduler::TaskQueue;
use crate::scrollable::{BoundsSource, ScrollableSurface};
use crate::strategy::VirtualScrollStrategy;
use crate::types::{
    ContentTransform, Edge, GeometryEvent, ListRange, OffsetAnchor, Orientation, RenderFrame,
    ScrollBehavior, ScrollEvent, ScrollToOptions, TextDirection,
};

/// Measures the pixel size of a materialized range of items.
///
/// Object-safe supertrait of [`DataRepeater`] so the viewport can hold the
/// measuring side without knowing the item type.
pub trait RangeMeasurer {
    /// Fails with [`ScrollError::OutOfRange`] when `range` is not currently
    /// materialized.
    fn measure_range_size(&self, range: ListRange, orientation: Orientation)
    -> Result<f64, ScrollError>;
}

/// The data-binding collaborator: turns an abstract data source into a
/// stream of full snapshots and can measure rendered items.
pub trait DataRepeater<T>: RangeMeasurer {
    /// Emits the current full data snapshot on every change.
    fn data_stream(&self) -> EventBus<Rc<[T]>>;
}

/// Static configuration for a [`VirtualScrollViewport`].
pub struct ViewportOptions {
    pub orientation: Orientation,
    /// When set, the rendered range only grows: it is widened to
    /// `{0, max(existing.end, new.end)}` so items are never removed once
    /// appended.
    pub append_only: bool,
    /// The viewport's own host element, when the scrolling container is an
    /// ancestor element rather than the viewport itself.
    pub own_bounds: Option<Rc<dyn BoundsSource>>,
}

impl ViewportOptions {
    pub fn new() -> Self {
        Self {
            orientation: Orientation::Vertical,
            append_only: false,
            own_bounds: None,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_append_only(mut self, append_only: bool) -> Self {
        self.append_only = append_only;
        self
    }

    pub fn with_own_bounds(mut self, own_bounds: Option<Rc<dyn BoundsSource>>) -> Self {
        self.own_bounds = own_bounds;
        self
    }
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ViewportOptions {
    fn clone(&self) -> Self {
        Self {
            orientation: self.orientation,
            append_only: self.append_only,
            own_bounds: self.own_bounds.clone(),
        }
    }
}

impl std::fmt::Debug for ViewportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportOptions")
            .field("orientation", &self.orientation)
            .field("append_only", &self.append_only)
            .finish_non_exhaustive()
    }
}

/// Work queued to run after the next refresh cycle, in registration order.
enum AfterRender {
    /// Tell the strategy the published range has been rendered.
    ContentRendered,
    /// The content transform changed; rewrite a `ToEnd` offset to its
    /// start-relative equivalent, or tell the strategy otherwise.
    OffsetChanged,
    Custom(Box<dyn FnOnce()>),
}

/// The authoritative viewport state.
///
/// Strategy hooks receive `&mut ViewportCore` and drive it exclusively
/// through [`set_total_content_size`], [`set_rendered_range`],
/// [`set_rendered_content_offset`] and [`scroll_to_offset`]; every mutation
/// within one synchronous turn coalesces into a single scheduled refresh.
///
/// [`set_total_content_size`]: ViewportCore::set_total_content_size
/// [`set_rendered_range`]: ViewportCore::set_rendered_range
/// [`set_rendered_content_offset`]: ViewportCore::set_rendered_content_offset
/// [`scroll_to_offset`]: ViewportCore::scroll_to_offset
pub struct ViewportCore {
    orientation: Orientation,
    append_only: bool,
    scrollable: Rc<dyn ScrollableSurface>,
    own_bounds: Option<Rc<dyn BoundsSource>>,
    measurer: Option<Rc<dyn RangeMeasurer>>,
    data_length: usize,
    total_content_size: f64,
    rendered_range: ListRange,
    rendered_content_offset: f64,
    offset_anchor: OffsetAnchor,
    offset_needs_rewrite: bool,
    rendered_content_transform: Option<ContentTransform>,
    viewport_size: f64,
    render_pending: bool,
    after_render: Vec<AfterRender>,
    detached: bool,
    range_stream: EventBus<ListRange>,
    render_stream: EventBus<RenderFrame>,
    queue: TaskQueue,
    strategy: Weak<RefCell<dyn VirtualScrollStrategy>>,
    weak_self: Weak<RefCell<ViewportCore>>,
}

impl ViewportCore {
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn append_only(&self) -> bool {
        self.append_only
    }

    pub fn data_length(&self) -> usize {
        self.data_length
    }

    pub fn viewport_size(&self) -> f64 {
        self.viewport_size
    }

    pub fn rendered_range(&self) -> ListRange {
        self.rendered_range
    }

    pub fn total_content_size(&self) -> f64 {
        self.total_content_size
    }

    pub fn rendered_content_offset(&self) -> f64 {
        self.rendered_content_offset
    }

    pub fn offset_anchor(&self) -> OffsetAnchor {
        self.offset_anchor
    }

    /// The scroll offset from the given edge (default: the orientation's
    /// start edge), with the viewport's own offset inside the scrolling
    /// container subtracted, floored at 0.
    pub fn measure_scroll_offset(&self, from: Option<Edge>) -> f64 {
        let from = from.unwrap_or(match self.orientation {
            Orientation::Horizontal => Edge::Start,
            Orientation::Vertical => Edge::Top,
        });
        (self.scrollable.measure_scroll_offset(from) - self.measure_viewport_offset(None)).max(0.0)
    }

    /// The offset of the viewport's host element from the scrolling
    /// container's origin. Zero when the viewport is its own scroller.
    pub fn measure_viewport_offset(&self, from: Option<Edge>) -> f64 {
        let Some(own) = &self.own_bounds else {
            return 0.0;
        };
        let from = from.unwrap_or(match self.orientation {
            Orientation::Horizontal => Edge::Left,
            Orientation::Vertical => Edge::Top,
        });
        let direction = self.scrollable.geometry().direction;
        let from = match (from, direction) {
            (Edge::Start, TextDirection::Rtl) => Edge::Right,
            (Edge::Start, TextDirection::Ltr) => Edge::Left,
            (Edge::End, TextDirection::Rtl) => Edge::Left,
            (Edge::End, TextDirection::Ltr) => Edge::Right,
            (other, _) => other,
        };
        let rect = own.bounding_rect();
        let position = match from {
            Edge::Top => rect.top,
            Edge::Bottom => rect.bottom(),
            Edge::Left | Edge::Start => rect.left,
            Edge::Right | Edge::End => rect.right(),
        };
        position
            - self
                .scrollable
                .measure_bounding_client_rect_with_scroll_offset(from)
    }

    /// The pixel size of the currently rendered content.
    pub fn measure_rendered_content_size(&self) -> Result<f64, ScrollError> {
        self.measure_range_size(self.rendered_range)
    }

    /// Measures a range of items through the attached repeater.
    pub fn measure_range_size(&self, range: ListRange) -> Result<f64, ScrollError> {
        let measurer = self.measurer.as_ref().ok_or_else(|| {
            ScrollError::Configuration("no data repeater is attached to this viewport".into())
        })?;
        measurer.measure_range_size(range, self.orientation)
    }

    pub fn set_total_content_size(&mut self, size: f64) {
        if self.total_content_size == size {
            return;
        }
        self.total_content_size = size;
        self.mark_change_detection_needed(None);
    }

    /// Publishes a new rendered range.
    ///
    /// No-op when value-equal to the current range. In append-only mode the
    /// range is widened so previously rendered items stay materialized. The
    /// range stream fires synchronously; its subscribers must not call back
    /// into the viewport in the same turn.
    pub fn set_rendered_range(&mut self, range: ListRange) {
        let range = if self.append_only {
            ListRange::new(0, self.rendered_range.end.max(range.end))
        } else {
            range
        };
        if self.rendered_range == range {
            return;
        }
        strace!(start = range.start, end = range.end, "Viewport: rendered range");
        self.rendered_range = range;
        let stream = self.range_stream.clone();
        stream.emit(&range);
        self.mark_change_detection_needed(Some(AfterRender::ContentRendered));
    }

    /// Positions the rendered content block.
    ///
    /// A `ToEnd` offset is written optimistically and rewritten to its
    /// start-relative equivalent on the refresh after the content size
    /// becomes measurable.
    pub fn set_rendered_content_offset(&mut self, offset: f64, to: OffsetAnchor) {
        self.rendered_content_offset = offset;
        self.offset_anchor = to;
        if to == OffsetAnchor::ToEnd {
            self.offset_needs_rewrite = true;
        }
        let transform = ContentTransform {
            axis: self.orientation,
            offset_px: offset,
            anchor: to,
        };
        if self.rendered_content_transform != Some(transform) {
            self.rendered_content_transform = Some(transform);
            self.mark_change_detection_needed(Some(AfterRender::OffsetChanged));
        }
    }

    /// Scrolls the underlying surface to `offset` on the viewport's axis.
    pub fn scroll_to_offset(&mut self, offset: f64, behavior: ScrollBehavior) {
        let mut options = ScrollToOptions {
            behavior,
            ..ScrollToOptions::default()
        };
        match self.orientation {
            Orientation::Horizontal => options.start = Some(offset),
            Orientation::Vertical => options.top = Some(offset),
        }
        self.scrollable.scroll_to(options);
    }

    /// Queues `callback` to run once, after the next refresh cycle.
    ///
    /// Callbacks run in registration order. After [`dispose`] no new
    /// callbacks are accepted, but an already-scheduled refresh still runs.
    ///
    /// [`dispose`]: VirtualScrollViewport::dispose
    pub fn run_after_render(&mut self, callback: impl FnOnce() + 'static) {
        self.mark_change_detection_needed(Some(AfterRender::Custom(Box::new(callback))));
    }

    pub(crate) fn set_data_length(&mut self, data_length: usize) {
        self.data_length = data_length;
    }

    fn mark_change_detection_needed(&mut self, after: Option<AfterRender>) {
        if self.detached {
            return;
        }
        if let Some(after) = after {
            self.after_render.push(after);
        }
        if !self.render_pending {
            self.render_pending = true;
            if let Some(core) = self.weak_self.upgrade() {
                self.queue.schedule(move || dispatch_render(&core));
            }
        }
    }

    fn frame(&self) -> RenderFrame {
        RenderFrame {
            total_content_size: self.total_content_size,
            rendered_range: self.rendered_range,
            transform: self.rendered_content_transform,
        }
    }
}

/// Runs one coalesced refresh cycle: publish the frame, then drain the
/// run-after queue in registration order.
fn dispatch_render(core: &Rc<RefCell<ViewportCore>>) {
    let (frame, callbacks, render_stream, strategy) = {
        let mut state = core.borrow_mut();
        state.render_pending = false;
        (
            state.frame(),
            std::mem::take(&mut state.after_render),
            state.render_stream.clone(),
            state.strategy.upgrade(),
        )
    };
    render_stream.emit(&frame);

    for callback in callbacks {
        match callback {
            AfterRender::ContentRendered => {
                if let Some(strategy) = &strategy {
                    let mut state = core.borrow_mut();
                    strategy.borrow_mut().on_content_rendered(&mut state);
                }
            }
            AfterRender::OffsetChanged => {
                let needs_rewrite = core.borrow().offset_needs_rewrite;
                if needs_rewrite {
                    rewrite_offset(core);
                } else if let Some(strategy) = &strategy {
                    let mut state = core.borrow_mut();
                    strategy.borrow_mut().on_rendered_offset_changed(&mut state);
                }
            }
            AfterRender::Custom(callback) => callback(),
        }
    }
}

/// Converts an optimistic `ToEnd` offset into the start-relative offset the
/// next frame renders with, now that the content size is measurable.
fn rewrite_offset(core: &Rc<RefCell<ViewportCore>>) {
    let mut state = core.borrow_mut();
    state.offset_needs_rewrite = false;
    match state.measure_rendered_content_size() {
        Ok(size) => {
            let offset = state.rendered_content_offset - size;
            state.set_rendered_content_offset(offset, OffsetAnchor::ToStart);
        }
        Err(_error) => {
            swarn!("Viewport: cannot rewrite a to-end offset without a measurable range");
        }
    }
}

/// Orchestrates a strategy, a data repeater and a scrollable surface.
///
/// Construction registers the surface with the hub, wires scroll events to
/// the strategy, subscribes resize notifications, measures the viewport and
/// attaches the strategy.
pub struct VirtualScrollViewport {
    core: Rc<RefCell<ViewportCore>>,
    strategy: Rc<RefCell<dyn VirtualScrollStrategy>>,
    hub: ScrollEventHub,
    surface_id: u64,
    data_subscription: Option<Subscription>,
    scroll_subscription: Option<Subscription>,
    geometry_subscription: Option<AuditedSubscription<GeometryEvent>>,
    disposed: bool,
}

impl std::fmt::Debug for VirtualScrollViewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualScrollViewport")
            .field("surface_id", &self.surface_id)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl VirtualScrollViewport {
    /// Fails with [`ScrollError::Configuration`] when no strategy is given.
    pub fn new(
        scrollable: Rc<dyn ScrollableSurface>,
        strategy: Option<Rc<RefCell<dyn VirtualScrollStrategy>>>,
        hub: &ScrollEventHub,
        geometry: &ViewportGeometryCache,
        queue: &TaskQueue,
        options: ViewportOptions,
    ) -> Result<Self, ScrollError> {
        let strategy = strategy.ok_or_else(|| {
            ScrollError::Configuration("a virtual scroll viewport requires a scroll strategy".into())
        })?;

        let surface_id = scrollable.surface_id();
        let viewport_size = scrollable.measure_viewport_size(options.orientation);
        let core = Rc::new(RefCell::new(ViewportCore {
            orientation: options.orientation,
            append_only: options.append_only,
            scrollable: Rc::clone(&scrollable),
            own_bounds: options.own_bounds,
            measurer: None,
            data_length: 0,
            total_content_size: 0.0,
            rendered_range: ListRange::default(),
            rendered_content_offset: 0.0,
            offset_anchor: OffsetAnchor::ToStart,
            offset_needs_rewrite: false,
            rendered_content_transform: None,
            viewport_size,
            render_pending: false,
            after_render: Vec::new(),
            detached: false,
            range_stream: EventBus::new(),
            render_stream: EventBus::new(),
            queue: queue.clone(),
            strategy: Rc::downgrade(&strategy),
            weak_self: Weak::new(),
        }));
        core.borrow_mut().weak_self = Rc::downgrade(&core);

        hub.register(Rc::clone(&scrollable));

        let scroll_subscription = {
            let core = Rc::downgrade(&core);
            let strategy = Rc::clone(&strategy);
            scrollable.element_scrolled().subscribe(move |_event: &ScrollEvent| {
                if let Some(core) = core.upgrade() {
                    let mut state = core.borrow_mut();
                    strategy.borrow_mut().on_content_scrolled(&mut state);
                }
            })
        };

        let geometry_subscription = {
            let core = Rc::downgrade(&core);
            let strategy = Rc::clone(&strategy);
            geometry
                .change(Some(DEFAULT_RESIZE_AUDIT_MS))
                .subscribe(move |_event: &GeometryEvent| {
                    if let Some(core) = core.upgrade() {
                        check_viewport_size(&core, &strategy);
                    }
                })
        };

        sdebug!(surface_id, "VirtualScrollViewport: created");
        {
            let mut state = core.borrow_mut();
            strategy.borrow_mut().attach(&mut state);
        }

        Ok(Self {
            core,
            strategy,
            hub: hub.clone(),
            surface_id,
            data_subscription: None,
            scroll_subscription: Some(scroll_subscription),
            geometry_subscription: Some(geometry_subscription),
            disposed: false,
        })
    }

    /// Attaches the data repeater.
    ///
    /// Fails with [`ScrollError::AlreadyAttached`] when one is attached.
    pub fn attach<T, R>(&mut self, repeater: Rc<R>) -> Result<(), ScrollError>
    where
        T: 'static,
        R: DataRepeater<T> + 'static,
    {
        if self.data_subscription.is_some() {
            return Err(ScrollError::AlreadyAttached);
        }
        let measurer: Rc<dyn RangeMeasurer> = repeater.clone();
        self.core.borrow_mut().measurer = Some(measurer);

        let subscription = {
            let core = Rc::downgrade(&self.core);
            let strategy = Rc::clone(&self.strategy);
            repeater.data_stream().subscribe(move |data: &Rc<[T]>| {
                if let Some(core) = core.upgrade() {
                    let mut state = core.borrow_mut();
                    state.set_data_length(data.len());
                    strategy.borrow_mut().on_data_length_changed(&mut state);
                }
            })
        };
        self.data_subscription = Some(subscription);
        sdebug!("VirtualScrollViewport: repeater attached");
        Ok(())
    }

    /// Detaches the data repeater, unsubscribing its data stream.
    pub fn detach(&mut self) {
        self.data_subscription = None;
        self.core.borrow_mut().measurer = None;
    }

    /// Tears the viewport down: deregisters the surface, detaches the
    /// strategy and closes the owned streams. A refresh that was already
    /// scheduled still runs once; no new run-after callbacks are accepted.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.detach();
        self.scroll_subscription = None;
        self.geometry_subscription = None;
        self.hub.deregister(self.surface_id);
        {
            let mut state = self.core.borrow_mut();
            state.detached = true;
            state.range_stream.close();
            state.render_stream.close();
        }
        self.strategy.borrow_mut().detach();
        sdebug!(surface_id = self.surface_id, "VirtualScrollViewport: disposed");
    }

    /// Re-measures the viewport and asks the strategy to recompute. Used on
    /// external resize notifications.
    pub fn check_viewport_size(&self) {
        check_viewport_size(&self.core, &self.strategy);
    }

    pub fn scroll_to_offset(&self, offset: f64, behavior: ScrollBehavior) {
        self.core.borrow_mut().scroll_to_offset(offset, behavior);
    }

    /// Scrolls so the item at `index` lands at the start edge, as the
    /// strategy computes it.
    pub fn scroll_to_index(&self, index: usize, behavior: ScrollBehavior) {
        let mut state = self.core.borrow_mut();
        self.strategy
            .borrow_mut()
            .scroll_to_index(&mut state, index, behavior);
    }

    pub fn rendered_range(&self) -> ListRange {
        self.core.borrow().rendered_range
    }

    pub fn data_length(&self) -> usize {
        self.core.borrow().data_length
    }

    pub fn viewport_size(&self) -> f64 {
        self.core.borrow().viewport_size
    }

    pub fn total_content_size(&self) -> f64 {
        self.core.borrow().total_content_size
    }

    /// Emits on every rendered-range change (distinct values only).
    pub fn rendered_range_stream(&self) -> EventBus<ListRange> {
        self.core.borrow().range_stream.clone()
    }

    /// Emits one [`RenderFrame`] per coalesced refresh cycle.
    pub fn render_stream(&self) -> EventBus<RenderFrame> {
        self.core.borrow().render_stream.clone()
    }

    pub fn measure_scroll_offset(&self, from: Option<Edge>) -> f64 {
        self.core.borrow().measure_scroll_offset(from)
    }

    pub fn measure_range_size(&self, range: ListRange) -> Result<f64, ScrollError> {
        self.core.borrow().measure_range_size(range)
    }

    /// Grants direct access to the core, e.g. for strategy reconfiguration:
    /// hold your own typed handle to the strategy and reconfigure it with
    /// the core borrowed here.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut ViewportCore) -> R) -> R {
        f(&mut self.core.borrow_mut())
    }
}

impl Drop for VirtualScrollViewport {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn check_viewport_size(
    core: &Rc<RefCell<ViewportCore>>,
    strategy: &Rc<RefCell<dyn VirtualScrollStrategy>>,
) {
    let mut state = core.borrow_mut();
    state.viewport_size = state.scrollable.measure_viewport_size(state.orientation);
    strategy.borrow_mut().on_data_length_changed(&mut state);
}
