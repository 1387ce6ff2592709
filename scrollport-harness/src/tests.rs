use crate::*;

use std::cell::RefCell;
use std::rc::Rc;

use scrollport::{ChangeDetectionControl, ChangeDetectionStatus, TaskQueue};

struct FakeElement {
    id: u64,
    tag: String,
    classes: Vec<String>,
    text: String,
    children: Vec<Rc<FakeElement>>,
}

fn el(
    id: u64,
    tag: &str,
    classes: &[&str],
    text: &str,
    children: Vec<Rc<FakeElement>>,
) -> Rc<FakeElement> {
    Rc::new(FakeElement {
        id,
        tag: tag.to_string(),
        classes: classes.iter().map(|class| class.to_string()).collect(),
        text: text.to_string(),
        children,
    })
}

impl FakeElement {
    fn matches_part(&self, part: &str) -> bool {
        let part = part.trim();
        if part == "*" {
            return true;
        }
        let mut segments = part.split('.');
        let tag = segments.next().unwrap_or("");
        if !tag.is_empty() && tag != self.tag {
            return false;
        }
        segments.all(|class| self.classes.iter().any(|c| c == class))
    }

    fn collect_matches(&self, selector: &str, out: &mut Vec<TestElementRef>) {
        for child in &self.children {
            if TestElement::matches(child.as_ref(), selector) {
                out.push(child.clone() as TestElementRef);
            }
            child.collect_matches(selector, out);
        }
    }
}

impl TestElement for FakeElement {
    fn element_id(&self) -> u64 {
        self.id
    }

    fn matches(&self, selector: &str) -> bool {
        selector.split(',').any(|part| self.matches_part(part))
    }

    fn query_all(&self, selector: &str) -> Vec<TestElementRef> {
        let mut out = Vec::new();
        self.collect_matches(selector, &mut out);
        out
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn attribute(&self, _name: &str) -> Option<String> {
        None
    }
}

struct ButtonHarness {
    host: HarnessHost,
}

impl ComponentHarness for ButtonHarness {
    const HOST_SELECTOR: &'static str = "button";

    fn new(host: HarnessHost) -> Self {
        Self { host }
    }

    fn host(&self) -> &HarnessHost {
        &self.host
    }
}

impl ButtonHarness {
    fn label(&self) -> String {
        self.host.element().text()
    }

    fn with_label(pattern: Pattern) -> HarnessPredicate<Self> {
        HarnessPredicate::new().add_option("label", Some(pattern), |harness: &Self, pattern| {
            let label = harness.label();
            string_matches(Some(label.as_str()), pattern)
        })
    }
}

struct ChipHarness {
    host: HarnessHost,
}

impl ComponentHarness for ChipHarness {
    const HOST_SELECTOR: &'static str = ".chip";

    fn new(host: HarnessHost) -> Self {
        Self { host }
    }

    fn host(&self) -> &HarnessHost {
        &self.host
    }
}

impl ChipHarness {
    fn text(&self) -> String {
        self.host.element().text()
    }
}

struct PanelHarness {
    host: HarnessHost,
}

impl ComponentHarness for PanelHarness {
    const HOST_SELECTOR: &'static str = ".panel";

    fn new(host: HarnessHost) -> Self {
        Self { host }
    }

    fn host(&self) -> &HarnessHost {
        &self.host
    }
}

impl PanelHarness {
    fn buttons(&self) -> Result<Vec<Rc<ButtonHarness>>, HarnessError> {
        self.host.environment().get_all_harnesses::<ButtonHarness>()
    }
}

struct MissingHarness {
    host: HarnessHost,
}

impl ComponentHarness for MissingHarness {
    const HOST_SELECTOR: &'static str = ".missing-widget";

    fn new(host: HarnessHost) -> Self {
        Self { host }
    }

    fn host(&self) -> &HarnessHost {
        &self.host
    }
}

// root
//   .panel (10)
//     button "Save" (11)
//     button "Cancel" (12)
//     .chip "alpha" (13)
//   .chip "beta" (14)
fn sample_tree() -> Rc<FakeElement> {
    el(
        1,
        "div",
        &[],
        "",
        vec![
            el(
                10,
                "div",
                &["panel"],
                "",
                vec![
                    el(11, "button", &[], "Save", vec![]),
                    el(12, "button", &[], "Cancel", vec![]),
                    el(13, "span", &["chip"], "alpha", vec![]),
                ],
            ),
            el(14, "span", &["chip"], "beta", vec![]),
        ],
    )
}

fn environment() -> HarnessEnvironment {
    HarnessEnvironment::new(
        sample_tree() as TestElementRef,
        ChangeDetectionControl::new(),
        TaskQueue::new(),
    )
}

#[test]
fn get_harness_returns_the_first_match_in_document_order() {
    let env = environment();
    let button = env.get_harness::<ButtonHarness>().unwrap();
    assert_eq!(button.label(), "Save");
}

#[test]
fn get_all_harnesses_returns_every_match() {
    let env = environment();
    let buttons = env.get_all_harnesses::<ButtonHarness>().unwrap();
    let labels: Vec<String> = buttons.iter().map(|b| b.label()).collect();
    assert_eq!(labels, vec!["Save", "Cancel"]);
}

#[test]
fn no_match_error_enumerates_every_attempted_query() {
    let env = environment();
    let error = env
        .locator_for(vec![
            HarnessQuery::selector(".missing"),
            HarnessQuery::predicate(ButtonHarness::with_label(Pattern::literal("Nope"))),
        ])
        .find()
        .unwrap_err();

    let message = error.to_string();
    assert!(message.contains("('.missing' selector)"), "{message}");
    assert!(message.contains("ButtonHarness harness"), "{message}");
    assert!(message.contains("label = \"Nope\""), "{message}");
}

#[test]
fn optional_locator_returns_none_instead_of_failing() {
    let env = environment();
    let result = env
        .locator_for(vec![HarnessQuery::selector(".missing")])
        .find_optional()
        .unwrap();
    assert!(result.is_none());

    assert!(env.get_harness_or_null::<MissingHarness>().unwrap().is_none());
    assert!(env.get_harness_or_null::<PanelHarness>().unwrap().is_some());
}

#[test]
fn empty_query_lists_are_rejected() {
    let env = environment();
    assert_eq!(
        env.locator_for(Vec::new()).find().unwrap_err(),
        HarnessError::EmptyQuery
    );
    assert_eq!(
        env.locator_for(Vec::new()).find_all().unwrap_err(),
        HarnessError::EmptyQuery
    );
}

#[test]
fn one_element_yields_one_instance_per_harness_type() {
    let env = environment();
    // Two different queries for the same harness type: the matching element
    // must produce exactly one ButtonHarness instance.
    let results = env
        .locator_for(vec![
            HarnessQuery::harness::<ButtonHarness>(),
            HarnessQuery::predicate(ButtonHarness::with_label(Pattern::literal("Save"))),
        ])
        .find_all()
        .unwrap();

    assert_eq!(results.len(), 2);
    let labels: Vec<String> = results
        .iter()
        .map(|result| result.harness::<ButtonHarness>().unwrap().label())
        .collect();
    assert_eq!(labels, vec!["Save", "Cancel"]);
}

#[test]
fn results_are_ordered_by_document_order_then_query_order() {
    let env = environment();
    let results = env
        .locator_for(vec![
            HarnessQuery::selector(".chip"),
            HarnessQuery::harness::<ChipHarness>(),
        ])
        .find_all()
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_element().unwrap().element_id(), 13);
    assert_eq!(results[1].harness::<ChipHarness>().unwrap().text(), "alpha");
    assert_eq!(results[2].as_element().unwrap().element_id(), 14);
    assert_eq!(results[3].harness::<ChipHarness>().unwrap().text(), "beta");
}

#[test]
fn mixed_query_lists_re_check_selectors() {
    let env = environment();
    let results = env
        .locator_for(vec![
            HarnessQuery::selector(".chip"),
            HarnessQuery::harness::<ButtonHarness>(),
        ])
        .find_all()
        .unwrap();

    // Buttons must only surface as harnesses and chips only as raw
    // elements, even though all four elements came from one traversal.
    assert_eq!(results.len(), 4);
    assert_eq!(
        results[0].harness::<ButtonHarness>().unwrap().label(),
        "Save"
    );
    assert_eq!(
        results[1].harness::<ButtonHarness>().unwrap().label(),
        "Cancel"
    );
    assert_eq!(results[2].as_element().unwrap().element_id(), 13);
    assert_eq!(results[3].as_element().unwrap().element_id(), 14);
}

#[test]
fn predicate_filters_combine_with_logical_and() {
    let env = environment();
    let predicate = HarnessPredicate::<ButtonHarness>::new()
        .add("starts with S", |harness| harness.label().starts_with('S'))
        .add("ends with e", |harness| harness.label().ends_with('e'));
    assert_eq!(predicate.description(), "starts with S, ends with e");

    let matches = env.get_all_harnesses_with(predicate).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].label(), "Save");
}

#[test]
fn predicate_filter_keeps_the_passing_subsequence() {
    let env = environment();
    let buttons = env.get_all_harnesses::<ButtonHarness>().unwrap();
    let owned: Vec<ButtonHarness> = buttons
        .iter()
        .map(|b| ButtonHarness::new(b.host().clone()))
        .collect();

    let predicate = HarnessPredicate::<ButtonHarness>::new()
        .add("is cancel", |harness| harness.label() == "Cancel");
    let kept = predicate.filter(owned, env.change_detection());
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].label(), "Cancel");
}

#[test]
fn string_patterns_match_literally_and_by_regex() {
    assert!(string_matches(Some("Save"), &Pattern::literal("Save")));
    assert!(!string_matches(Some("Save "), &Pattern::literal("Save")));
    assert!(!string_matches(None, &Pattern::literal("Save")));

    let pattern = Pattern::regex(regex::Regex::new("^Sa").unwrap());
    assert!(string_matches(Some("Save"), &pattern));
    assert!(!string_matches(Some("Cancel"), &pattern));
}

#[test]
fn sub_locators_are_rooted_at_the_host_element() {
    let env = environment();
    let panel = env.get_harness::<PanelHarness>().unwrap();
    assert_eq!(panel.buttons().unwrap().len(), 2);

    // Only the chip inside the panel is visible from the panel's host.
    let chips = panel
        .host()
        .environment()
        .get_all_harnesses::<ChipHarness>()
        .unwrap();
    assert_eq!(chips.len(), 1);
    assert_eq!(chips[0].text(), "alpha");

    let loader = env.harness_loader_for(".panel").unwrap();
    assert_eq!(loader.get_all_harnesses::<ButtonHarness>().unwrap().len(), 2);
}

#[test]
fn resolution_runs_one_batching_pair_per_element() {
    let env = environment();
    let transitions = Rc::new(RefCell::new(Vec::new()));
    {
        let transitions = Rc::clone(&transitions);
        env.change_detection()
            .install_handler(move |status: &ChangeDetectionStatus| {
                transitions.borrow_mut().push(status.is_disabled);
                if let Some(detect) = &status.on_detect_changes_now {
                    detect();
                }
            });
    }

    let button = env
        .get_harness_with(ButtonHarness::with_label(Pattern::literal("Save")))
        .unwrap();
    assert_eq!(button.label(), "Save");

    // Two raw button elements, one disable/enable pair each; the nested
    // predicate evaluation runs inside the outer pair without toggling.
    assert_eq!(&*transitions.borrow(), &[true, false, true, false]);
    assert!(!env.change_detection().is_disabled());
}

#[test]
fn force_stabilize_flushes_the_task_queue() {
    let env = environment();
    let ran = Rc::new(std::cell::Cell::new(false));
    {
        let ran = Rc::clone(&ran);
        env.task_queue().schedule(move || ran.set(true));
    }
    assert!(!ran.get());
    env.force_stabilize();
    assert!(ran.get());
}

#[test]
fn ancestor_predicates_combine_selectors() {
    let predicate = ButtonHarness::with_label(Pattern::literal("Save")).with_ancestor(".panel");
    assert_eq!(predicate.selector(), ".panel button");
    assert!(predicate.description().contains("has ancestor matching selector \".panel\""));
}
