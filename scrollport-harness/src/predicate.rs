use std::rc::Rc;

use scrollport::ChangeDetectionControl;

use crate::harness::ComponentHarness;

/// A text pattern for harness filter options.
#[derive(Clone)]
pub enum Pattern {
    Literal(String),
    Regex(regex::Regex),
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value:?}"),
            Self::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl Pattern {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn regex(value: regex::Regex) -> Self {
        Self::Regex(value)
    }
}

/// Whether `value` matches `pattern`. A missing value never matches.
pub fn string_matches(value: Option<&str>, pattern: &Pattern) -> bool {
    let Some(value) = value else {
        return false;
    };
    match pattern {
        Pattern::Literal(expected) => value == expected,
        Pattern::Regex(regex) => regex.is_match(value),
    }
}

/// A harness type plus an ordered list of filters with human-readable
/// descriptions.
///
/// [`evaluate`] resolves true only when every filter passes (logical AND);
/// the filters run under one batching transition pair. Descriptions feed the
/// failure message a locator assembles when nothing matched.
///
/// [`evaluate`]: HarnessPredicate::evaluate
pub struct HarnessPredicate<H: ComponentHarness> {
    filters: Vec<Rc<dyn Fn(&H) -> bool>>,
    descriptions: Vec<String>,
    ancestor: Option<String>,
}

impl<H: ComponentHarness> Default for HarnessPredicate<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ComponentHarness> HarnessPredicate<H> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            descriptions: Vec::new(),
            ancestor: None,
        }
    }

    /// Adds a filter with its description.
    pub fn add(mut self, description: impl Into<String>, filter: impl Fn(&H) -> bool + 'static) -> Self {
        self.descriptions.push(description.into());
        self.filters.push(Rc::new(filter));
        self
    }

    /// Adds a filter for an optional option value; a `None` option adds
    /// nothing.
    pub fn add_option<O: std::fmt::Debug + 'static>(
        self,
        name: &str,
        option: Option<O>,
        filter: impl Fn(&H, &O) -> bool + 'static,
    ) -> Self {
        match option {
            None => self,
            Some(value) => {
                let description = format!("{name} = {value:?}");
                self.add(description, move |harness| filter(harness, &value))
            }
        }
    }

    /// Restricts matches to hosts under an ancestor matching `selector`.
    /// Enforced through the combined selector, not a filter.
    pub fn with_ancestor(mut self, selector: impl Into<String>) -> Self {
        let selector = selector.into();
        self.descriptions
            .push(format!("has ancestor matching selector \"{selector}\""));
        self.ancestor = Some(selector);
        self
    }

    /// True only when all filters resolve true, resolved under one batching
    /// transition pair.
    pub fn evaluate(&self, harness: &H, control: &ChangeDetectionControl) -> bool {
        let thunks: Vec<Box<dyn FnOnce() -> bool + '_>> = self
            .filters
            .iter()
            .map(|filter| {
                let filter = Rc::clone(filter);
                Box::new(move || filter(harness)) as Box<dyn FnOnce() -> bool + '_>
            })
            .collect();
        control.batch_all(thunks).into_iter().all(|passed| passed)
    }

    /// The subsequence of `harnesses` passing [`evaluate`].
    ///
    /// [`evaluate`]: HarnessPredicate::evaluate
    pub fn filter(&self, harnesses: Vec<H>, control: &ChangeDetectionControl) -> Vec<H> {
        if harnesses.is_empty() {
            return harnesses;
        }
        let results: Vec<bool> = {
            let thunks: Vec<Box<dyn FnOnce() -> bool + '_>> = harnesses
                .iter()
                .map(|harness| {
                    Box::new(move || self.evaluate(harness, control))
                        as Box<dyn FnOnce() -> bool + '_>
                })
                .collect();
            control.batch_all(thunks)
        };
        harnesses
            .into_iter()
            .zip(results)
            .filter_map(|(harness, keep)| keep.then_some(harness))
            .collect()
    }

    /// The comma-joined filter descriptions.
    pub fn description(&self) -> String {
        self.descriptions.join(", ")
    }

    /// The host selector, combined with the ancestor selector when set.
    pub fn selector(&self) -> String {
        match &self.ancestor {
            None => H::HOST_SELECTOR.to_string(),
            Some(ancestor) => ancestor
                .split(',')
                .map(|part| format!("{} {}", part.trim(), H::HOST_SELECTOR))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
