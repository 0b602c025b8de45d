//! Lazy connection state machine

use crate::{Error, Result};

/// Lazy connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No physical connection opened yet
    Pending,

    /// Physical connection open
    Open,

    /// Closed (terminal)
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Pending, Open) | (Open, Closed) | (Pending, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = ConnectionState::Pending;
        assert!(state.transition(ConnectionState::Open).is_ok());
        assert!(state.transition(ConnectionState::Closed).is_ok());
    }

    #[test]
    fn test_close_without_opening() {
        let mut state = ConnectionState::Pending;
        assert!(state.transition(ConnectionState::Closed).is_ok());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut state = ConnectionState::Closed;
        assert!(state.transition(ConnectionState::Open).is_err());
        assert!(state.transition(ConnectionState::Closed).is_err());
        assert_eq!(state, ConnectionState::Closed);
    }

    #[test]
    fn test_cannot_reopen() {
        let mut state = ConnectionState::Open;
        assert!(state.transition(ConnectionState::Open).is_err());
        assert!(state.transition(ConnectionState::Pending).is_err());
    }
}
