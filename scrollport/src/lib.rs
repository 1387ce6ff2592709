//! A headless virtual scroll viewport engine.
//!
//! For the component-harness query framework built on the same batching
//! protocol, see the `scrollport-harness` crate.
//!
//! This crate focuses on the coordination logic needed to window massive
//! lists behind a scrollable surface: a buffered render-window strategy, a
//! viewport that coalesces every state mutation in a turn into one refresh
//! cycle, a scroll-event hub with reference-counted native listeners, and a
//! change-detection batching protocol for deterministic assertions.
//!
//! It is UI-agnostic. A host UI layer is expected to provide:
//! - a scrollable surface (geometry, scroll side effect, scroll events)
//! - a geometry source (viewport dimensions, resize events)
//! - a data repeater (data snapshots, rendered-range measurement)
//! - one task-queue flush per turn, and timestamps on events
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod audit;
mod batch;
mod emitter;
mod error;
mod geometry;
mod hub;
mod scheduler;
mod scrollable;
mod strategy;
mod types;
mod viewport;


pub use audit::{AuditGate, AuditedSubscription};
pub use batch::{ChangeDetectionControl, ChangeDetectionStatus};
pub use emitter::{EventBus, Subscription};
pub use error::ScrollError;
pub use geometry::{DEFAULT_RESIZE_AUDIT_MS, GeometrySource, GeometryStream, ViewportGeometryCache};
pub use hub::{DEFAULT_SCROLL_AUDIT_MS, ScrollEventHub, Scrolled, ScrolledStream};
pub use scheduler::TaskQueue;
pub use scrollable::{
    BoundsSource, ScrollNode, ScrollableSurface, measure_scroll_offset, resolve_scroll_to,
};
pub use strategy::{FixedSizeStrategy, VirtualScrollStrategy};
pub use types::{
    BoundingRect, ContentTransform, Edge, GeometryEvent, ListRange, OffsetAnchor, Orientation,
    RenderFrame, RtlScrollAxisType, ScrollBehavior, ScrollEvent, ScrollGeometry, ScrollToOptions,
    TextDirection, ViewportDimensions,
};
pub use viewport::{
    DataRepeater, RangeMeasurer, ViewportCore, ViewportOptions, VirtualScrollViewport,
};
