use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use scrollport::{ChangeDetectionControl, TaskQueue};

use crate::element::TestElementRef;
use crate::error::HarnessError;
use crate::harness::ComponentHarness;
use crate::predicate::HarnessPredicate;
use crate::query::{AnyHarness, HarnessQuery, describe_queries};

/// One resolved lookup result: a raw element handle or a harness instance.
pub enum LocatorResult {
    Element(TestElementRef),
    Harness(HarnessInstance),
}

impl fmt::Debug for LocatorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(_) => f.write_str("LocatorResult::Element"),
            Self::Harness(instance) => f
                .debug_tuple("LocatorResult::Harness")
                .field(&instance.name)
                .finish(),
        }
    }
}

impl Clone for LocatorResult {
    fn clone(&self) -> Self {
        match self {
            Self::Element(element) => Self::Element(element.clone()),
            Self::Harness(instance) => Self::Harness(instance.clone()),
        }
    }
}

impl LocatorResult {
    pub fn as_element(&self) -> Option<&TestElementRef> {
        match self {
            Self::Element(element) => Some(element),
            Self::Harness(_) => None,
        }
    }

    pub fn harness<H: ComponentHarness>(&self) -> Option<Rc<H>> {
        match self {
            Self::Element(_) => None,
            Self::Harness(instance) => instance.downcast::<H>(),
        }
    }
}

/// A type-erased harness instance, downcastable to its concrete type.
pub struct HarnessInstance {
    type_id: TypeId,
    name: &'static str,
    instance: AnyHarness,
}

impl Clone for HarnessInstance {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id,
            name: self.name,
            instance: Rc::clone(&self.instance),
        }
    }
}

impl HarnessInstance {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn harness_name(&self) -> &'static str {
        self.name
    }

    pub fn downcast<H: ComponentHarness>(&self) -> Option<Rc<H>> {
        Rc::clone(&self.instance).downcast::<H>().ok()
    }
}

/// The query engine over a live UI tree.
///
/// Resolves declarative queries against the subtree under `root`, running
/// per-element evaluation under the batching protocol so host refreshes
/// happen at the resolution boundaries rather than once per query.
pub struct HarnessEnvironment {
    root: TestElementRef,
    control: ChangeDetectionControl,
    queue: TaskQueue,
}

impl Clone for HarnessEnvironment {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            control: self.control.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl HarnessEnvironment {
    pub fn new(root: TestElementRef, control: ChangeDetectionControl, queue: TaskQueue) -> Self {
        Self {
            root,
            control,
            queue,
        }
    }

    pub fn root(&self) -> &TestElementRef {
        &self.root
    }

    pub fn change_detection(&self) -> &ChangeDetectionControl {
        &self.control
    }

    pub fn task_queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// The same environment, rooted at `element`.
    pub fn rooted_at(&self, element: TestElementRef) -> Self {
        Self {
            root: element,
            control: self.control.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Flushes the task queue — the environment's refresh boundary.
    pub fn force_stabilize(&self) {
        self.queue.flush();
    }

    /// Builds a locator over `queries`, resolved on demand.
    pub fn locator_for(&self, queries: Vec<HarnessQuery>) -> Locator {
        Locator {
            environment: self.clone(),
            queries,
        }
    }

    pub fn get_harness<H: ComponentHarness>(&self) -> Result<Rc<H>, HarnessError> {
        let result = self.locator_for(vec![HarnessQuery::harness::<H>()]).find()?;
        downcast_required(result)
    }

    pub fn get_harness_with<H: ComponentHarness>(
        &self,
        predicate: HarnessPredicate<H>,
    ) -> Result<Rc<H>, HarnessError> {
        let result = self
            .locator_for(vec![HarnessQuery::predicate(predicate)])
            .find()?;
        downcast_required(result)
    }

    pub fn get_harness_or_null<H: ComponentHarness>(&self) -> Result<Option<Rc<H>>, HarnessError> {
        let result = self
            .locator_for(vec![HarnessQuery::harness::<H>()])
            .find_optional()?;
        Ok(result.and_then(|found| found.harness::<H>()))
    }

    pub fn get_all_harnesses<H: ComponentHarness>(&self) -> Result<Vec<Rc<H>>, HarnessError> {
        let results = self.locator_for(vec![HarnessQuery::harness::<H>()]).find_all()?;
        Ok(results
            .iter()
            .filter_map(LocatorResult::harness::<H>)
            .collect())
    }

    /// An environment rooted at the first descendant matching `selector`.
    pub fn harness_loader_for(&self, selector: &str) -> Result<HarnessEnvironment, HarnessError> {
        let result = self
            .locator_for(vec![HarnessQuery::selector(selector)])
            .find()?;
        let element = result
            .as_element()
            .cloned()
            .ok_or_else(|| HarnessError::NoMatch(format!("('{selector}' selector)")))?;
        Ok(self.rooted_at(element))
    }

    pub fn get_all_harnesses_with<H: ComponentHarness>(
        &self,
        predicate: HarnessPredicate<H>,
    ) -> Result<Vec<Rc<H>>, HarnessError> {
        let results = self
            .locator_for(vec![HarnessQuery::predicate(predicate)])
            .find_all()?;
        Ok(results
            .iter()
            .filter_map(LocatorResult::harness::<H>)
            .collect())
    }

    /// Resolves `queries` in one traversal.
    ///
    /// Raw elements are fetched once with the OR-combination of every
    /// query's selector; each element is then evaluated against every query
    /// in original order (under one batching pair per element) and
    /// de-duplicated, so one element yields at most one raw handle and one
    /// instance per harness type. Results are ordered by document order,
    /// then original query order.
    fn all_harnesses_and_elements(
        &self,
        queries: &[HarnessQuery],
    ) -> Result<Vec<LocatorResult>, HarnessError> {
        if queries.is_empty() {
            return Err(HarnessError::EmptyQuery);
        }

        let element_query_count = queries
            .iter()
            .filter(|query| matches!(query, HarnessQuery::Selector(_)))
            .count();
        let harness_types: HashSet<TypeId> = queries
            .iter()
            .filter_map(|query| match query {
                HarnessQuery::Selector(_) => None,
                HarnessQuery::Harness(harness) => Some(harness.harness_type_id()),
            })
            .collect();

        let combined = queries
            .iter()
            .map(HarnessQuery::raw_selector)
            .collect::<Vec<_>>()
            .join(", ");
        let raw_elements = self.root.query_all(&combined);

        // With no element-only queries and a single harness type, every
        // fetched element necessarily matched that one selector, so the
        // per-query selector re-check is redundant. Mixed query lists always
        // re-check: a fetched element may have matched some other query's
        // selector.
        let skip_selector_check = element_query_count == 0 && harness_types.len() <= 1;

        let mut results = Vec::new();
        for element in raw_elements {
            let thunks: Vec<Box<dyn FnOnce() -> Option<LocatorResult> + '_>> = queries
                .iter()
                .map(|query| {
                    let element = element.clone();
                    Box::new(move || {
                        self.query_result_for_element(query, &element, skip_selector_check)
                    }) as Box<dyn FnOnce() -> Option<LocatorResult> + '_>
                })
                .collect();
            let matches = self.control.batch_all(thunks);
            results.extend(dedupe_element_results(matches.into_iter().flatten()));
        }
        Ok(results)
    }

    fn query_result_for_element(
        &self,
        query: &HarnessQuery,
        element: &TestElementRef,
        skip_selector_check: bool,
    ) -> Option<LocatorResult> {
        match query {
            HarnessQuery::Selector(selector) => (skip_selector_check
                || element.matches(selector))
            .then(|| LocatorResult::Element(element.clone())),
            HarnessQuery::Harness(harness_query) => {
                if !skip_selector_check && !element.matches(&harness_query.selector()) {
                    return None;
                }
                harness_query
                    .create_and_evaluate(element, self)
                    .map(|instance| {
                        LocatorResult::Harness(HarnessInstance {
                            type_id: harness_query.harness_type_id(),
                            name: harness_query.harness_name(),
                            instance,
                        })
                    })
            }
        }
    }
}

/// Keeps the first raw-element result and the first instance per harness
/// type for one element's matches.
fn dedupe_element_results(matches: impl IntoIterator<Item = LocatorResult>) -> Vec<LocatorResult> {
    let mut seen_element = false;
    let mut seen_types: Vec<TypeId> = Vec::new();
    let mut results = Vec::new();
    for result in matches {
        match &result {
            LocatorResult::Element(_) => {
                if seen_element {
                    continue;
                }
                seen_element = true;
            }
            LocatorResult::Harness(instance) => {
                if seen_types.contains(&instance.type_id()) {
                    continue;
                }
                seen_types.push(instance.type_id());
            }
        }
        results.push(result);
    }
    results
}

fn downcast_required<H: ComponentHarness>(result: LocatorResult) -> Result<Rc<H>, HarnessError> {
    result
        .harness::<H>()
        .ok_or_else(|| HarnessError::NoMatch(format!("({} harness)", crate::query::short_type_name::<H>())))
}

/// A deferred lookup over a fixed query list.
pub struct Locator {
    environment: HarnessEnvironment,
    queries: Vec<HarnessQuery>,
}

impl Locator {
    /// The first result in document order.
    ///
    /// Fails with [`HarnessError::NoMatch`] — enumerating every attempted
    /// query — when nothing matched.
    pub fn find(&self) -> Result<LocatorResult, HarnessError> {
        let mut results = self.environment.all_harnesses_and_elements(&self.queries)?;
        if results.is_empty() {
            return Err(HarnessError::NoMatch(describe_queries(&self.queries)));
        }
        Ok(results.remove(0))
    }

    /// The first result, or `None` when nothing matched.
    pub fn find_optional(&self) -> Result<Option<LocatorResult>, HarnessError> {
        let mut results = self.environment.all_harnesses_and_elements(&self.queries)?;
        if results.is_empty() {
            return Ok(None);
        }
        Ok(Some(results.remove(0)))
    }

    /// Every result, ordered by document order, then original query order.
    pub fn find_all(&self) -> Result<Vec<LocatorResult>, HarnessError> {
        self.environment.all_harnesses_and_elements(&self.queries)
    }
}
