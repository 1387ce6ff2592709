//! Component test harness utilities for the `scrollport` engine.
//!
//! The `scrollport` crate is UI-agnostic and focuses on the core windowing
//! and coordination logic. This crate provides the query side: a harness
//! abstraction over live UI components, declarative locators, and predicate
//! filtering — all resolved under scrollport's change-detection batching
//! protocol so host refreshes happen at operation boundaries.
//!
//! This crate is intentionally framework-agnostic: the host environment
//! supplies the element tree behind the [`TestElement`] trait.
#![forbid(unsafe_code)]

mod element;
mod environment;
mod error;
mod harness;
mod predicate;
mod query;

#[cfg(test)]
mod tests;

pub use element::{TestElement, TestElementRef};
pub use environment::{HarnessEnvironment, HarnessInstance, Locator, LocatorResult};
pub use error::HarnessError;
pub use harness::{ComponentHarness, HarnessHost};
pub use predicate::{HarnessPredicate, Pattern, string_matches};
pub use query::{ErasedHarnessQuery, HarnessQuery};
