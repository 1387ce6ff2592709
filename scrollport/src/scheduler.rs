use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Box<dyn FnOnce()>>,
    flushing: bool,
}

/// An explicit single task-queue primitive.
///
/// Components coalesce their refresh work by scheduling at most one task per
/// dirty period; the host drains the queue once per turn with [`flush`].
/// Tasks scheduled while a flush is running are drained by the same flush
/// (microtask semantics); a re-entrant `flush` is a no-op.
///
/// [`flush`]: TaskQueue::flush
#[derive(Clone, Default)]
pub struct TaskQueue {
    state: Rc<RefCell<QueueState>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.state.borrow_mut().tasks.push_back(Box::new(task));
    }

    pub fn flush(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.flushing {
                return;
            }
            state.flushing = true;
        }
        loop {
            let task = self.state.borrow_mut().tasks.pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        self.state.borrow_mut().flushing = false;
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().tasks.len()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TaskQueue")
            .field("pending", &state.tasks.len())
            .field("flushing", &state.flushing)
            .finish()
    }
}
