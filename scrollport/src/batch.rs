use std::cell::RefCell;
use std::rc::Rc;

/// The current batching state, delivered to the installed handler on every
/// transition.
///
/// `on_detect_changes_now` is present in detect mode; the handler must run
/// its refresh work and invoke it to acknowledge the transition.
pub struct ChangeDetectionStatus {
    pub is_disabled: bool,
    pub on_detect_changes_now: Option<Rc<dyn Fn()>>,
}

impl Clone for ChangeDetectionStatus {
    fn clone(&self) -> Self {
        Self {
            is_disabled: self.is_disabled,
            on_detect_changes_now: self.on_detect_changes_now.clone(),
        }
    }
}

impl std::fmt::Debug for ChangeDetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetectionStatus")
            .field("is_disabled", &self.is_disabled)
            .field("has_detect_callback", &self.on_detect_changes_now.is_some())
            .finish()
    }
}

type StatusHandler = Rc<dyn Fn(&ChangeDetectionStatus)>;

struct ControlState {
    is_disabled: bool,
    handler: Option<StatusHandler>,
}

/// The change-detection batching protocol.
///
/// A two-state machine (`enabled`, the default, and `disabled`) shared by the
/// viewport layer and the harness layer. At most one handler is installed at
/// a time — installing a new one displaces the previous — and a hosting test
/// environment uses it to flush pending refresh work exactly at the
/// disable/enable boundaries.
///
/// This is an explicit handle: clone it and pass it to constructors instead
/// of relying on ambient state.
pub struct ChangeDetectionControl {
    state: Rc<RefCell<ControlState>>,
}

impl Clone for ChangeDetectionControl {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl Default for ChangeDetectionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetectionControl {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ControlState {
                is_disabled: false,
                handler: None,
            })),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.state.borrow().is_disabled
    }

    pub fn status(&self) -> ChangeDetectionStatus {
        ChangeDetectionStatus {
            is_disabled: self.state.borrow().is_disabled,
            on_detect_changes_now: None,
        }
    }

    /// Installs `handler`, displacing any previous one.
    pub fn install_handler(&self, handler: impl Fn(&ChangeDetectionStatus) + 'static) {
        sdebug!("ChangeDetectionControl: handler installed");
        self.state.borrow_mut().handler = Some(Rc::new(handler));
    }

    /// Removes the handler and resets the state to enabled.
    pub fn uninstall_handler(&self) {
        let mut state = self.state.borrow_mut();
        state.handler = None;
        state.is_disabled = false;
    }

    pub fn has_handler(&self) -> bool {
        self.state.borrow().handler.is_some()
    }

    fn ensure_handler(&self) {
        if self.state.borrow().handler.is_some() {
            return;
        }
        // The default handler acknowledges detect requests immediately.
        self.install_handler(|status: &ChangeDetectionStatus| {
            if let Some(detect) = &status.on_detect_changes_now {
                detect();
            }
        });
    }

    fn transition(&self, disabled: bool, with_detect: bool) {
        let handler = {
            let mut state = self.state.borrow_mut();
            state.is_disabled = disabled;
            state.handler.clone()
        };
        let Some(handler) = handler else {
            return;
        };
        let acknowledged = Rc::new(std::cell::Cell::new(!with_detect));
        let status = ChangeDetectionStatus {
            is_disabled: disabled,
            on_detect_changes_now: with_detect.then(|| {
                let acknowledged = Rc::clone(&acknowledged);
                Rc::new(move || acknowledged.set(true)) as Rc<dyn Fn()>
            }),
        };
        handler(&status);
        if !acknowledged.get() {
            swarn!(
                disabled,
                "ChangeDetectionControl: handler did not acknowledge a detect transition"
            );
        }
    }

    /// Runs `f` with batching: refreshes are suppressed for its duration and
    /// re-enabled on every exit path, including panics. When batching is
    /// already disabled by an outer caller, `f` runs directly with no
    /// re-entrant toggling.
    pub fn batch<T>(&self, f: impl FnOnce() -> T) -> T {
        self.batch_inner(false, f)
    }

    /// Like [`batch`], but both transitions carry a detect-now
    /// acknowledgment callback so the handler can flush refresh work at the
    /// boundaries ("trigger before/after" mode).
    ///
    /// [`batch`]: ChangeDetectionControl::batch
    pub fn batch_with_detect<T>(&self, f: impl FnOnce() -> T) -> T {
        self.batch_inner(true, f)
    }

    fn batch_inner<T>(&self, with_detect: bool, f: impl FnOnce() -> T) -> T {
        if self.is_disabled() {
            return f();
        }
        self.ensure_handler();
        self.transition(true, with_detect);
        let _guard = ReenableGuard {
            control: self.clone(),
            with_detect,
        };
        f()
    }

    /// Resolves N values inside exactly one disable/enable transition pair,
    /// so host refreshes occur once before and once after, not once per
    /// value.
    pub fn batch_all<'a, T>(&self, thunks: Vec<Box<dyn FnOnce() -> T + 'a>>) -> Vec<T> {
        self.batch_with_detect(move || thunks.into_iter().map(|thunk| thunk()).collect())
    }
}

impl std::fmt::Debug for ChangeDetectionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ChangeDetectionControl")
            .field("is_disabled", &state.is_disabled)
            .field("has_handler", &state.handler.is_some())
            .finish()
    }
}

/// Restores the enabled state when a batched call unwinds.
struct ReenableGuard {
    control: ChangeDetectionControl,
    with_detect: bool,
}

impl Drop for ReenableGuard {
    fn drop(&mut self) {
        self.control.transition(false, self.with_detect);
    }
}
