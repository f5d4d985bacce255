use tracing::trace;

use crate::{host::HostSystem, users::BuildUser};

/// The processes one active build user owned at sampling time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    user: BuildUser,
    /// Ascending, no duplicates, never empty.
    pids: Vec<u32>,
}

impl ProcessSnapshot {
    /// Sorts and deduplicates `pids`; `None` when the user owns nothing.
    pub fn new(user: BuildUser, mut pids: Vec<u32>) -> Option<Self> {
        pids.sort_unstable();
        pids.dedup();
        if pids.is_empty() {
            return None;
        }
        Some(Self { user, pids })
    }

    pub fn user(&self) -> &BuildUser {
        &self.user
    }

    pub fn pids(&self) -> &[u32] {
        &self.pids
    }

    /// The lowest PID, taken to be the process that started the build.
    pub fn representative(&self) -> u32 {
        self.pids[0]
    }
}

/// Narrows `users` down to those that own processes right now, keeping their order.
pub fn sample<H: HostSystem + ?Sized>(host: &mut H, users: &[BuildUser]) -> Vec<ProcessSnapshot> {
    host.refresh_processes();

    users
        .iter()
        .filter(|user| host.owns_any_process(user.uid))
        .filter_map(|user| {
            let snapshot = ProcessSnapshot::new(user.clone(), host.processes_owned_by(user.uid));
            if snapshot.is_none() {
                // Everything exited between the two queries.
                trace!(user = %user.name, "went idle while sampling");
            }
            snapshot
        })
        .collect()
}
