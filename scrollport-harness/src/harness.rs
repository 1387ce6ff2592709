use crate::element::TestElementRef;
use crate::environment::HarnessEnvironment;

/// The environment a harness instance operates in: its host element plus a
/// query environment rooted at that element, so harnesses can build
/// sub-locators without reaching outside their component.
pub struct HarnessHost {
    element: TestElementRef,
    environment: HarnessEnvironment,
}

impl Clone for HarnessHost {
    fn clone(&self) -> Self {
        Self {
            element: self.element.clone(),
            environment: self.environment.clone(),
        }
    }
}

impl HarnessHost {
    pub(crate) fn new(element: TestElementRef, environment: HarnessEnvironment) -> Self {
        Self {
            element,
            environment,
        }
    }

    pub fn element(&self) -> &TestElementRef {
        &self.element
    }

    /// A query environment rooted at the host element.
    pub fn environment(&self) -> &HarnessEnvironment {
        &self.environment
    }
}

/// A handle type providing a stable query API over one live UI component.
///
/// Implementors declare the selector their host element matches and are
/// constructed by locators, never directly.
pub trait ComponentHarness: Sized + 'static {
    const HOST_SELECTOR: &'static str;

    fn new(host: HarnessHost) -> Self;

    fn host(&self) -> &HarnessHost;
}
