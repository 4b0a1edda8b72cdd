use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// The kind of work currently in flight for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPhase {
    VerifyingLiveness,
    CheckingForUpgrade,
    ApplyingStagedUpgrade,
}

impl TaskPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VerifyingLiveness => "verifying-liveness",
            Self::CheckingForUpgrade => "checking-for-upgrade",
            Self::ApplyingStagedUpgrade => "applying-staged-upgrade",
        }
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    phase: TaskPhase,
    ticket: u64,
}

/// In-memory record of which targets have a unit of work in flight.
///
/// At most one claim exists per name. Claims are handed out as [`TaskGuard`]s which
/// release themselves on drop, so error and panic paths cannot leave a target stuck.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    claims: Mutex<HashMap<String, Claim>>,
    next_ticket: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims `name` for `phase` if nothing is in flight for it.
    pub fn try_acquire(self: &Arc<Self>, name: &str, phase: TaskPhase) -> Option<TaskGuard> {
        let mut claims = self.lock();
        if claims.contains_key(name) {
            return None;
        }
        Some(self.insert_claim(&mut claims, name, phase))
    }

    /// Claims `name` for `phase` if it is free or currently held only for `over`.
    ///
    /// The displaced holder keeps running, but its guard no longer owns the slot.
    pub fn try_preempt(
        self: &Arc<Self>,
        name: &str,
        phase: TaskPhase,
        over: TaskPhase,
    ) -> Option<TaskGuard> {
        let mut claims = self.lock();
        if let Some(existing) = claims.get(name) {
            if existing.phase != over {
                return None;
            }
        }
        Some(self.insert_claim(&mut claims, name, phase))
    }

    /// Removes whatever claim `name` has, regardless of who holds it.
    pub fn release(&self, name: &str) {
        self.lock().remove(name);
    }

    pub fn phase(&self, name: &str) -> Option<TaskPhase> {
        self.lock().get(name).map(|claim| claim.phase)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn insert_claim(
        self: &Arc<Self>,
        claims: &mut HashMap<String, Claim>,
        name: &str,
        phase: TaskPhase,
    ) -> TaskGuard {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        claims.insert(name.to_string(), Claim { phase, ticket });
        TaskGuard {
            registry: Arc::clone(self),
            name: name.to_string(),
            phase,
            ticket,
        }
    }

    fn release_ticket(&self, name: &str, ticket: u64) {
        let mut claims = self.lock();
        if claims.get(name).is_some_and(|claim| claim.ticket == ticket) {
            claims.remove(name);
        }
    }

    // A panicking worker must not wedge every other target.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Claim>> {
        self.claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
pub struct TaskGuard {
    registry: Arc<TaskRegistry>,
    name: String,
    phase: TaskPhase,
    ticket: u64,
}

impl TaskGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.release_ticket(&self.name, self.ticket);
    }
}
