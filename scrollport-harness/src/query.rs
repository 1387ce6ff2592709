use std::any::{Any, TypeId};
use std::rc::Rc;

use crate::element::TestElementRef;
use crate::environment::HarnessEnvironment;
use crate::harness::{ComponentHarness, HarnessHost};
use crate::predicate::HarnessPredicate;

pub(crate) type AnyHarness = Rc<dyn Any>;

pub(crate) fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// A harness-producing query with its type erased, so heterogeneous queries
/// can be resolved in one traversal.
pub trait ErasedHarnessQuery {
    fn harness_type_id(&self) -> TypeId;

    fn harness_name(&self) -> &'static str;

    /// The selector host elements must match.
    fn selector(&self) -> String;

    /// Human-readable filter constraints, if any.
    fn constraints(&self) -> Option<String>;

    /// Creates the harness for `element` and evaluates any filters,
    /// returning `None` when a filter rejects it.
    fn create_and_evaluate(
        &self,
        element: &TestElementRef,
        environment: &HarnessEnvironment,
    ) -> Option<AnyHarness>;
}

struct TypeQuery<H> {
    _marker: std::marker::PhantomData<fn() -> H>,
}

impl<H: ComponentHarness> ErasedHarnessQuery for TypeQuery<H> {
    fn harness_type_id(&self) -> TypeId {
        TypeId::of::<H>()
    }

    fn harness_name(&self) -> &'static str {
        short_type_name::<H>()
    }

    fn selector(&self) -> String {
        H::HOST_SELECTOR.to_string()
    }

    fn constraints(&self) -> Option<String> {
        None
    }

    fn create_and_evaluate(
        &self,
        element: &TestElementRef,
        environment: &HarnessEnvironment,
    ) -> Option<AnyHarness> {
        let host = HarnessHost::new(element.clone(), environment.rooted_at(element.clone()));
        Some(Rc::new(H::new(host)))
    }
}

impl<H: ComponentHarness> ErasedHarnessQuery for HarnessPredicate<H> {
    fn harness_type_id(&self) -> TypeId {
        TypeId::of::<H>()
    }

    fn harness_name(&self) -> &'static str {
        short_type_name::<H>()
    }

    fn selector(&self) -> String {
        HarnessPredicate::selector(self)
    }

    fn constraints(&self) -> Option<String> {
        Some(self.description())
    }

    fn create_and_evaluate(
        &self,
        element: &TestElementRef,
        environment: &HarnessEnvironment,
    ) -> Option<AnyHarness> {
        let host = HarnessHost::new(element.clone(), environment.rooted_at(element.clone()));
        let harness = H::new(host);
        self.evaluate(&harness, environment.change_detection())
            .then(|| Rc::new(harness) as AnyHarness)
    }
}

/// One declarative lookup: a literal selector, a harness type, or a harness
/// predicate. Constructed per lookup call; no persistent identity.
pub enum HarnessQuery {
    Selector(String),
    Harness(Rc<dyn ErasedHarnessQuery>),
}

impl HarnessQuery {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector(selector.into())
    }

    pub fn harness<H: ComponentHarness>() -> Self {
        Self::Harness(Rc::new(TypeQuery::<H> {
            _marker: std::marker::PhantomData,
        }))
    }

    pub fn predicate<H: ComponentHarness>(predicate: HarnessPredicate<H>) -> Self {
        Self::Harness(Rc::new(predicate))
    }

    pub(crate) fn raw_selector(&self) -> String {
        match self {
            Self::Selector(selector) => selector.clone(),
            Self::Harness(query) => query.selector(),
        }
    }

    /// The human-readable form used in locator failure messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Selector(selector) => format!("('{selector}' selector)"),
            Self::Harness(query) => match query.constraints() {
                None => format!("({} harness)", query.harness_name()),
                Some(constraints) if constraints.is_empty() => {
                    format!(
                        "({} harness with host element matching selector \"{}\")",
                        query.harness_name(),
                        query.selector()
                    )
                }
                Some(constraints) => format!(
                    "({} harness with host element matching selector \"{}\" satisfying the constraints: {})",
                    query.harness_name(),
                    query.selector(),
                    constraints
                ),
            },
        }
    }
}

pub(crate) fn describe_queries(queries: &[HarnessQuery]) -> String {
    queries
        .iter()
        .map(HarnessQuery::describe)
        .collect::<Vec<_>>()
        .join(", ")
}
