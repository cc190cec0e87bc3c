//! Terminal allocation policy.
//!
//! Finished allocations are either kept as untainted history, ignored, or
//! handed to the replacement path. Batch jobs keep clean exits as final;
//! service and system jobs never keep terminal allocations around.

use crate::structs::{Allocation, ClientStatus, DesiredStatus, JobType};

/// What to do with a terminal allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalOutcome {
    /// Keep it in the working set; it counts toward the group.
    Untainted,
    /// Drop it from this and every later pass.
    Ignore,
    /// Neither kept nor dropped: place a replacement in its slot.
    Reschedule,
}

impl TerminalOutcome {
    pub fn is_untainted(&self) -> bool {
        matches!(self, Self::Untainted)
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, Self::Ignore)
    }
}

/// Decides the fate of a terminal allocation.
pub fn should_filter(alloc: &Allocation, job_type: JobType) -> TerminalOutcome {
    match job_type {
        JobType::Batch => match alloc.desired_status {
            // A stopped batch alloc that exited cleanly is still a success.
            DesiredStatus::Stop if alloc.ran_successfully() => TerminalOutcome::Untainted,
            DesiredStatus::Stop | DesiredStatus::Evict => TerminalOutcome::Ignore,
            DesiredStatus::Run => match alloc.client_status {
                ClientStatus::Failed => TerminalOutcome::Reschedule,
                _ => TerminalOutcome::Untainted,
            },
        },
        JobType::Service | JobType::System => match alloc.desired_status {
            DesiredStatus::Stop | DesiredStatus::Evict => TerminalOutcome::Ignore,
            DesiredStatus::Run => match alloc.client_status {
                ClientStatus::Complete | ClientStatus::Lost => TerminalOutcome::Ignore,
                _ => TerminalOutcome::Reschedule,
            },
        },
    }
}
