use std::collections::VecDeque;

use parking_lot::Mutex;
use politecrawl_core_types::Host;

use crate::model::CrawlTask;

#[derive(Debug, Default)]
struct LaneState {
    pending: VecDeque<CrawlTask>,
    /// A driver owns this lane; it stays set until the driver observes an
    /// empty queue after finishing a task.
    active: bool,
}

/// FIFO of tasks for one host.
///
/// At most one driver runs per lane: [`HostQueue::push`] reports whether the
/// caller has to start one, and [`HostQueue::disarm_if_idle`] is the only way
/// to release it.
#[derive(Debug)]
pub struct HostQueue {
    host: Host,
    state: Mutex<LaneState>,
}

impl HostQueue {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            state: Mutex::new(LaneState::default()),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Append `task`; returns `true` when the lane was idle and is now armed.
    pub fn push(&self, task: CrawlTask) -> bool {
        let mut state = self.state.lock();
        state.pending.push_back(task);
        if state.active {
            false
        } else {
            state.active = true;
            true
        }
    }

    pub fn pop(&self) -> Option<CrawlTask> {
        self.state.lock().pending.pop_front()
    }

    /// Go idle when nothing is pending; returns whether the lane disarmed.
    pub fn disarm_if_idle(&self) -> bool {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            state.active = false;
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }
}
