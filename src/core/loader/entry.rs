//=========================================================================
// Load Entries
//=========================================================================
//
// One entry per resolved URL, owned by the loader for its lifetime.
// Entries are created on first reference and never destroyed; status
// transitions are applied exclusively by the loader.
//
// Lifecycle:
//
// ```text
//   Queued ──start──> Waiting ──signal──> Loaded | Error | TimedOut
// ```
//
//=========================================================================

use std::fmt;

use crate::core::resource::{LoadSignal, Resource, ResourceData};

//=== ResourceStatus ======================================================

/// Where one entry is in its load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    /// Known to the loader, not yet started.
    Queued,
    /// Started, outcome unknown.
    Waiting,
    /// Payload populated and usable.
    Loaded,
    /// Fetch or decode failed.
    Error,
    /// Gave up after the stall timeout.
    TimedOut,
}

impl ResourceStatus {
    /// True once the entry can never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Loaded | Self::Error | Self::TimedOut)
    }
}

//--- Trait Implementations -----------------------------------------------

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Waiting => "waiting",
            Self::Loaded => "loaded",
            Self::Error => "error",
            Self::TimedOut => "timed out",
        };
        f.write_str(name)
    }
}

impl From<&LoadSignal> for ResourceStatus {
    fn from(signal: &LoadSignal) -> Self {
        match signal {
            LoadSignal::Loaded => Self::Loaded,
            LoadSignal::Failed(_) => Self::Error,
            LoadSignal::TimedOut => Self::TimedOut,
        }
    }
}

//=== ResourceEntry =======================================================

/// A cached load entry: the loader-owned status plus the resource that
/// does the work.
pub(crate) struct ResourceEntry {
    status: ResourceStatus,
    resource: Box<dyn Resource>,
}

impl ResourceEntry {
    pub(crate) fn new(resource: Box<dyn Resource>) -> Self {
        Self { status: ResourceStatus::Queued, resource }
    }

    pub(crate) fn status(&self) -> ResourceStatus {
        self.status
    }

    pub(crate) fn mark(&mut self, status: ResourceStatus) {
        self.status = status;
    }

    pub(crate) fn data(&self) -> ResourceData {
        self.resource.data()
    }

    pub(crate) fn resource_mut(&mut self) -> &mut dyn Resource {
        self.resource.as_mut()
    }
}

//=== Tests ===============================================================
