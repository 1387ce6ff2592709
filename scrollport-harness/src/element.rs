use std::rc::Rc;

/// A handle to a live UI node, independent of the node's internal structure.
///
/// Implementations wrap whatever the host environment exposes (a DOM node, a
/// widget tree entry, a fixture). The query engine only needs identity,
/// selector matching and subtree traversal.
pub trait TestElement {
    /// A stable identity, used for de-duplication.
    fn element_id(&self) -> u64;

    /// Whether this element matches `selector` (comma-separated selector
    /// lists match any part).
    fn matches(&self, selector: &str) -> bool;

    /// All descendant elements matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Vec<TestElementRef>;

    fn text(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;
}

pub type TestElementRef = Rc<dyn TestElement>;
