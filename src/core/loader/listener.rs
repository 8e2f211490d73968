//=========================================================================
// Progress Listeners
//=========================================================================
//
// Every terminal status transition is broadcast as a `ProgressEvent`.
// Plain progress listeners run newest-first; completion listeners run
// after them, fire only on an event that reports every entry finished,
// and detach themselves once they have fired.
//
//=========================================================================

use super::entry::ResourceStatus;

//=== ProgressEvent =======================================================

/// One terminal status transition, with cache-wide totals.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Resolved URL of the entry that changed.
    pub url: String,
    /// The status it changed to. Always terminal.
    pub status: ResourceStatus,
    /// Entries finished so far, this event's own included.
    pub finished: usize,
    /// Entries known to the loader at dispatch time.
    pub total: usize,
}

impl ProgressEvent {
    /// Finished fraction in [0, 1]. An empty loader counts as complete.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.finished as f32 / self.total as f32
        }
    }

    /// True when every known entry has finished.
    pub fn is_complete(&self) -> bool {
        self.finished == self.total
    }
}

//=== ListenerId ==========================================================

/// Opaque handle for deregistering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

//=== ListenerRegistry ====================================================

type Handler = Box<dyn FnMut(&ProgressEvent) + Send>;

struct Slot {
    id: ListenerId,
    handler: Handler,
}

/// Ordered storage for progress and completion listeners.
pub(crate) struct ListenerRegistry {
    progress: Vec<Slot>,
    completion: Vec<Slot>,
    next_id: u64,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self { progress: Vec::new(), completion: Vec::new(), next_id: 0 }
    }

    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    /// Registers a progress listener. Later registrations are notified
    /// first.
    pub(crate) fn add_progress(&mut self, handler: Handler) -> ListenerId {
        let id = self.next_id();
        self.progress.insert(0, Slot { id, handler });
        id
    }

    /// Registers a one-shot completion listener, notified after all
    /// progress listeners.
    pub(crate) fn add_completion(&mut self, handler: Handler) -> ListenerId {
        let id = self.next_id();
        self.completion.push(Slot { id, handler });
        id
    }

    /// Removes a listener of either kind. Returns whether it existed.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.progress.len() + self.completion.len();
        self.progress.retain(|slot| slot.id != id);
        self.completion.retain(|slot| slot.id != id);
        before != self.progress.len() + self.completion.len()
    }

    /// Broadcasts one event. Completion listeners fire and detach only
    /// when the event reports every entry finished.
    pub(crate) fn notify(&mut self, event: &ProgressEvent) {
        for slot in &mut self.progress {
            (slot.handler)(event);
        }
        if event.is_complete() {
            for slot in &mut self.completion {
                (slot.handler)(event);
            }
            self.completion.clear();
        }
    }
}

//=== Tests ===============================================================
