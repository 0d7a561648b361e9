//! Component 1: the run state machine (§4.1). A pure function module —
//! no state lives here, the Runner owns the current `RunState` value.

use sa_domain::{Error, RunState};

const fn allowed(from: RunState) -> &'static [RunState] {
    use RunState::*;
    match from {
        Pending => &[Queued, Failed, Cancelled],
        Queued => &[Running, Cancelled, Timeout],
        Running => &[Completed, Failed, Cancelled, Timeout],
        Completed | Failed | Cancelled | Timeout => &[],
    }
}

/// Whether `to` is in the allow-list of `from`.
pub fn can_transition(from: RunState, to: RunState) -> bool {
    allowed(from).contains(&to)
}

/// Transition `from` to `to`, or fail with `InvalidTransition`.
pub fn transition(from: RunState, to: RunState) -> Result<RunState, Error> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(Error::InvalidTransition { from: format!("{from:?}"), to: format!("{to:?}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_allows_queued_failed_cancelled_only() {
        assert!(can_transition(RunState::Pending, RunState::Queued));
        assert!(can_transition(RunState::Pending, RunState::Failed));
        assert!(can_transition(RunState::Pending, RunState::Cancelled));
        assert!(!can_transition(RunState::Pending, RunState::Running));
        assert!(!can_transition(RunState::Pending, RunState::Completed));
    }

    #[test]
    fn queued_allows_running_cancelled_timeout() {
        assert!(can_transition(RunState::Queued, RunState::Running));
        assert!(can_transition(RunState::Queued, RunState::Cancelled));
        assert!(can_transition(RunState::Queued, RunState::Timeout));
        assert!(!can_transition(RunState::Queued, RunState::Completed));
    }

    #[test]
    fn running_allows_all_terminal_states() {
        for to in [RunState::Completed, RunState::Failed, RunState::Cancelled, RunState::Timeout] {
            assert!(can_transition(RunState::Running, to));
        }
        assert!(!can_transition(RunState::Running, RunState::Queued));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [RunState::Completed, RunState::Failed, RunState::Cancelled, RunState::Timeout] {
            for to in [RunState::Pending, RunState::Queued, RunState::Running, RunState::Completed, RunState::Failed, RunState::Cancelled, RunState::Timeout] {
                assert!(!can_transition(from, to), "{from:?} -> {to:?} should be illegal");
            }
        }
    }

    #[test]
    fn transition_returns_error_for_illegal_edge() {
        let err = transition(RunState::Completed, RunState::Running).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn transition_returns_to_state_for_legal_edge() {
        assert_eq!(transition(RunState::Pending, RunState::Queued).unwrap(), RunState::Queued);
    }
}
