//! Control Lifecycle State Machine
//!
//! Every control moves forward one state at a time. The only shortcut is
//! disposal, which is reachable from any state so that removed or cancelled
//! controls can be released without running the remaining stages.

use core::fmt;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Control State
// ----------------------------------------------------------------------------

/// Lifecycle position of a control, ordered by progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ControlState {
    /// Created, not yet initialized
    Constructed,
    /// `on_init` has run
    Initialized,
    /// View state replayed, or skipped because no token covered the control
    StateRestored,
    /// `on_load` has run
    Loaded,
    /// `on_pre_render` has run; last point for tree mutation
    PreRendered,
    /// Markup emitted
    Rendered,
    /// Released; terminal
    Disposed,
}

impl ControlState {
    /// Get current state name for logging
    pub fn state_name(self) -> &'static str {
        match self {
            ControlState::Constructed => "Constructed",
            ControlState::Initialized => "Initialized",
            ControlState::StateRestored => "StateRestored",
            ControlState::Loaded => "Loaded",
            ControlState::PreRendered => "PreRendered",
            ControlState::Rendered => "Rendered",
            ControlState::Disposed => "Disposed",
        }
    }

    /// The single forward step from this state
    pub fn next(self) -> Option<ControlState> {
        match self {
            ControlState::Constructed => Some(ControlState::Initialized),
            ControlState::Initialized => Some(ControlState::StateRestored),
            ControlState::StateRestored => Some(ControlState::Loaded),
            ControlState::Loaded => Some(ControlState::PreRendered),
            ControlState::PreRendered => Some(ControlState::Rendered),
            ControlState::Rendered => Some(ControlState::Disposed),
            ControlState::Disposed => None,
        }
    }

    /// Check whether `target` is reachable in one step
    pub fn can_transition_to(self, target: ControlState) -> bool {
        target == ControlState::Disposed || self.next() == Some(target)
    }

    /// Validate a single step, producing the error the tree reports
    pub fn validate_transition(self, target: ControlState) -> Result<(), StateTransitionError> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(StateTransitionError::InvalidTransition {
                from_state: self,
                to_state: target,
            })
        }
    }

    /// Whether the control has been through `on_init`
    pub fn is_initialized(self) -> bool {
        self >= ControlState::Initialized
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// State transition errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    /// Invalid state transition attempted
    #[error("Invalid transition from {from_state} to {to_state}")]
    InvalidTransition {
        from_state: ControlState,
        to_state: ControlState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_order() {
        assert!(ControlState::Constructed < ControlState::Initialized);
        assert!(ControlState::Rendered < ControlState::Disposed);
        assert!(!ControlState::Constructed.is_initialized());
        assert!(ControlState::Loaded.is_initialized());
    }

    #[test]
    fn test_forward_steps_only() {
        assert!(ControlState::Constructed.can_transition_to(ControlState::Initialized));
        assert!(ControlState::Loaded.can_transition_to(ControlState::PreRendered));
        assert!(!ControlState::Constructed.can_transition_to(ControlState::Loaded));
        assert!(!ControlState::Loaded.can_transition_to(ControlState::Initialized));
    }

    #[test]
    fn test_invalid_transition() {
        let result = ControlState::Initialized.validate_transition(ControlState::Rendered);
        assert_eq!(
            result,
            Err(StateTransitionError::InvalidTransition {
                from_state: ControlState::Initialized,
                to_state: ControlState::Rendered,
            })
        );
    }

    #[test]
    fn test_universal_dispose() {
        for state in [
            ControlState::Constructed,
            ControlState::Initialized,
            ControlState::StateRestored,
            ControlState::Loaded,
            ControlState::PreRendered,
            ControlState::Rendered,
            ControlState::Disposed,
        ] {
            assert!(state.can_transition_to(ControlState::Disposed));
        }
        assert_eq!(ControlState::Disposed.next(), None);
    }
}
