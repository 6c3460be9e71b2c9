use std::fmt;

/// Lifecycle status of a backend.
///
/// There is exactly one status per backend. It only changes through
/// [`PoolStatus::can_transition_to`]-approved transitions:
///
/// ```text
/// Idle ──start──▶ Running ──wait──▶ Waiting ──drained──▶ Running
///  │                 │                 │
///  │ spawn failure   └──stop / join────┴──▶ Shutdown ──workers joined──▶ Idle
///  ▼                                          ▲
/// Error ─────────────────join─────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolStatus {
    /// No worker accepts work. The initial state, and the state after `join`.
    Idle,

    /// Workers are started and accept work.
    Running,

    /// A host thread is blocked until the queue drains.
    Waiting,

    /// Workers finish the queued work and exit.
    Shutdown,

    /// Starting the workers failed.
    Error,
}

impl PoolStatus {
    /// Whether the transition `self -> next` is legal.
    pub fn can_transition_to(self, next: PoolStatus) -> bool {
        use PoolStatus::*;

        matches!(
            (self, next),
            (Idle, Running)
                | (Idle, Error)
                | (Running, Waiting)
                | (Running, Shutdown)
                | (Waiting, Running)
                | (Waiting, Shutdown)
                | (Shutdown, Idle)
                | (Error, Shutdown)
        )
    }

    /// Whether workers pick up queued work in this status.
    pub(crate) fn drains_queue(self) -> bool {
        !matches!(self, PoolStatus::Idle)
    }

    /// Whether a worker with nothing left to do should exit.
    pub(crate) fn releases_workers(self) -> bool {
        matches!(self, PoolStatus::Shutdown | PoolStatus::Error)
    }

    fn as_str(self) -> &'static str {
        match self {
            PoolStatus::Idle => "idle",
            PoolStatus::Running => "running",
            PoolStatus::Waiting => "waiting",
            PoolStatus::Shutdown => "shutdown",
            PoolStatus::Error => "error",
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::PoolStatus::{self, *};

    use rstest::rstest;

    #[rstest]
    #[case::start(Idle, Running)]
    #[case::start_failed(Idle, Error)]
    #[case::wait(Running, Waiting)]
    #[case::stop(Running, Shutdown)]
    #[case::drained(Waiting, Running)]
    #[case::stop_while_waiting(Waiting, Shutdown)]
    #[case::joined(Shutdown, Idle)]
    #[case::reap_failed_start(Error, Shutdown)]
    fn legal_transitions(#[case] from: PoolStatus, #[case] to: PoolStatus) {
        assert!(from.can_transition_to(to));
    }

    #[rstest]
    #[case::restart_without_join(Shutdown, Running)]
    #[case::double_start(Running, Running)]
    #[case::idle_wait(Idle, Waiting)]
    #[case::shutdown_from_idle(Idle, Shutdown)]
    #[case::skip_join(Running, Idle)]
    #[case::error_restart(Error, Running)]
    #[case::shutdown_wait(Shutdown, Waiting)]
    fn illegal_transitions(#[case] from: PoolStatus, #[case] to: PoolStatus) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn displays_lowercase() {
        assert_eq!(Waiting.to_string(), "waiting");
        assert_eq!(Shutdown.to_string(), "shutdown");
    }
}
