use crate::emitter::EventBus;
use crate::error::ScrollError;
use crate::types::{OffsetAnchor, ScrollBehavior};
use crate::viewport::ViewportCore;

/// The capability set of a render-window strategy.
///
/// Hooks receive the viewport by `&mut` parameter; fixed-size and future
/// variable-size strategies are separate structs implementing this trait.
pub trait VirtualScrollStrategy {
    /// Binds the strategy to a viewport and computes the initial total
    /// content size and rendered range.
    fn attach(&mut self, viewport: &mut ViewportCore);

    /// Closes the scrolled-index stream and clears the attachment.
    /// Idempotent.
    fn detach(&mut self);

    /// The viewport's scroll offset changed.
    fn on_content_scrolled(&mut self, viewport: &mut ViewportCore);

    /// The bound data's length changed.
    fn on_data_length_changed(&mut self, viewport: &mut ViewportCore);

    /// A refresh cycle finished rendering the published range.
    fn on_content_rendered(&mut self, viewport: &mut ViewportCore);

    /// The rendered content offset was rewritten.
    fn on_rendered_offset_changed(&mut self, viewport: &mut ViewportCore);

    /// Scrolls the viewport so `index` is at the start edge.
    fn scroll_to_index(&mut self, viewport: &mut ViewportCore, index: usize, behavior: ScrollBehavior);
}

/// A render-window strategy for items of a fixed pixel size.
///
/// Buffers beyond the visible viewport absorb scroll jitter without a
/// recomputation on every frame: the rendered window is only expanded when
/// the buffered content on the starved edge drops below `min_buffer_px`, and
/// it is then topped up to `max_buffer_px`.
pub struct FixedSizeStrategy {
    item_size: f64,
    min_buffer_px: f64,
    max_buffer_px: f64,
    scrolled_index: EventBus<usize>,
    last_scrolled_index: Option<usize>,
    attached: bool,
}

impl std::fmt::Debug for FixedSizeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedSizeStrategy")
            .field("item_size", &self.item_size)
            .field("min_buffer_px", &self.min_buffer_px)
            .field("max_buffer_px", &self.max_buffer_px)
            .field("last_scrolled_index", &self.last_scrolled_index)
            .field("attached", &self.attached)
            .finish()
    }
}

impl FixedSizeStrategy {
    /// Fails with [`ScrollError::Configuration`] when
    /// `max_buffer_px < min_buffer_px`.
    pub fn new(item_size: f64, min_buffer_px: f64, max_buffer_px: f64) -> Result<Self, ScrollError> {
        Self::validate(min_buffer_px, max_buffer_px)?;
        Ok(Self {
            item_size,
            min_buffer_px,
            max_buffer_px,
            scrolled_index: EventBus::new(),
            last_scrolled_index: None,
            attached: false,
        })
    }

    fn validate(min_buffer_px: f64, max_buffer_px: f64) -> Result<(), ScrollError> {
        if max_buffer_px < min_buffer_px {
            return Err(ScrollError::Configuration(format!(
                "max_buffer_px ({max_buffer_px}) must be greater than or equal to \
                 min_buffer_px ({min_buffer_px})"
            )));
        }
        Ok(())
    }

    pub fn item_size(&self) -> f64 {
        self.item_size
    }

    pub fn min_buffer_px(&self) -> f64 {
        self.min_buffer_px
    }

    pub fn max_buffer_px(&self) -> f64 {
        self.max_buffer_px
    }

    /// De-duplicated stream of the first visible index,
    /// `floor(scroll_offset / item_size)`, emitted only when it changes.
    pub fn scrolled_index(&self) -> EventBus<usize> {
        self.scrolled_index.clone()
    }

    /// Reconfigures the strategy and recomputes the total content size and
    /// rendered range.
    ///
    /// Fails with [`ScrollError::Configuration`] when
    /// `max_buffer_px < min_buffer_px`, leaving the prior configuration
    /// unchanged.
    pub fn update_item_and_buffer_size(
        &mut self,
        viewport: &mut ViewportCore,
        item_size: f64,
        min_buffer_px: f64,
        max_buffer_px: f64,
    ) -> Result<(), ScrollError> {
        Self::validate(min_buffer_px, max_buffer_px)?;
        self.item_size = item_size;
        self.min_buffer_px = min_buffer_px;
        self.max_buffer_px = max_buffer_px;
        sdebug!(
            item_size,
            min_buffer_px,
            max_buffer_px,
            "FixedSizeStrategy: reconfigured"
        );
        self.update_total_content_size(viewport);
        self.update_rendered_range(viewport);
        Ok(())
    }

    fn update_total_content_size(&self, viewport: &mut ViewportCore) {
        viewport.set_total_content_size(viewport.data_length() as f64 * self.item_size);
    }

    fn update_rendered_range(&mut self, viewport: &mut ViewportCore) {
        let viewport_size = viewport.viewport_size();
        let data_length = viewport.data_length();
        let mut range = viewport.rendered_range();
        let mut scroll_offset = viewport.measure_scroll_offset(None);
        // Guard the division so a zero item size yields index 0, not NaN.
        let mut first_visible_index = if self.item_size > 0.0 {
            scroll_offset / self.item_size
        } else {
            0.0
        };

        // The data shrank while scrolled near the bottom: pull the window
        // back so it still covers valid indices.
        if range.end > data_length {
            let max_visible_items = if self.item_size > 0.0 {
                (viewport_size / self.item_size).ceil() as usize
            } else {
                data_length
            };
            let new_visible_index = first_visible_index
                .min(data_length.saturating_sub(max_visible_items) as f64)
                .max(0.0);
            if first_visible_index != new_visible_index {
                first_visible_index = new_visible_index;
                scroll_offset = new_visible_index * self.item_size;
                range.start = first_visible_index.floor() as usize;
            }
            range.end = range.start.saturating_add(max_visible_items).min(data_length);
        }

        let start_buffer = scroll_offset - range.start as f64 * self.item_size;
        if start_buffer < self.min_buffer_px && range.start != 0 {
            let expand_start =
                clamped_ceil((self.max_buffer_px - start_buffer) / self.item_size);
            range.start = range.start.saturating_sub(expand_start);
            range.end = clamped_ceil(
                first_visible_index + (viewport_size + self.min_buffer_px) / self.item_size,
            )
            .min(data_length);
        } else {
            let end_buffer = range.end as f64 * self.item_size - (scroll_offset + viewport_size);
            if end_buffer < self.min_buffer_px && range.end != data_length {
                let expand_end = (self.max_buffer_px - end_buffer) / self.item_size;
                if expand_end > 0.0 {
                    range.end = range
                        .end
                        .saturating_add(clamped_ceil(expand_end))
                        .min(data_length);
                    range.start = clamped_floor(
                        first_visible_index - self.min_buffer_px / self.item_size,
                    );
                }
            }
        }

        strace!(
            start = range.start,
            end = range.end,
            scroll_offset,
            "FixedSizeStrategy: rendered range"
        );
        viewport.set_rendered_range(range);
        viewport.set_rendered_content_offset(self.item_size * range.start as f64, OffsetAnchor::ToStart);

        let index = clamped_floor(first_visible_index);
        if self.last_scrolled_index != Some(index) {
            self.last_scrolled_index = Some(index);
            self.scrolled_index.emit(&index);
        }
    }
}

impl VirtualScrollStrategy for FixedSizeStrategy {
    fn attach(&mut self, viewport: &mut ViewportCore) {
        sdebug!(
            item_size = self.item_size,
            data_length = viewport.data_length(),
            "FixedSizeStrategy: attach"
        );
        self.attached = true;
        self.update_total_content_size(viewport);
        self.update_rendered_range(viewport);
    }

    fn detach(&mut self) {
        self.attached = false;
        self.scrolled_index.close();
    }

    fn on_content_scrolled(&mut self, viewport: &mut ViewportCore) {
        if self.attached {
            self.update_rendered_range(viewport);
        }
    }

    fn on_data_length_changed(&mut self, viewport: &mut ViewportCore) {
        if self.attached {
            self.update_total_content_size(viewport);
            self.update_rendered_range(viewport);
        }
    }

    fn on_content_rendered(&mut self, _viewport: &mut ViewportCore) {}

    fn on_rendered_offset_changed(&mut self, _viewport: &mut ViewportCore) {}

    fn scroll_to_index(&mut self, viewport: &mut ViewportCore, index: usize, behavior: ScrollBehavior) {
        if self.attached {
            viewport.scroll_to_offset(index as f64 * self.item_size, behavior);
        }
    }
}

/// `ceil` to `usize`, clamping negatives to 0 and saturating infinities.
fn clamped_ceil(value: f64) -> usize {
    value.ceil().max(0.0) as usize
}

/// `floor` to `usize`, clamping negatives to 0 and saturating infinities.
fn clamped_floor(value: f64) -> usize {
    value.floor().max(0.0) as usize
}
