//! Session State Machine
//!
//! The single source of truth for whether reads and writes are permitted.
//! Only the edges of the connection lifecycle are accepted:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Closing -> Disconnected
//!                      \________________________________/
//!                               (open failure)
//! ```

use super::error::SessionError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No device open
    #[default]
    Disconnected,
    /// Resolving the selector and opening the device
    Connecting,
    /// Device open, reader running
    Connected,
    /// Reader stopping and device closing
    Closing,
}

impl SessionState {
    /// Check if state allows sending data
    pub fn can_send(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if state is a transitional state
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Connecting | Self::Closing)
    }

    /// Port and baud selection may only change while disconnected
    pub fn selection_unlocked(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// Previous state
    pub from: SessionState,
    /// New state
    pub to: SessionState,
    /// Timestamp
    pub timestamp: DateTime<Local>,
    /// Reason for transition
    pub reason: Option<String>,
}

/// Session state machine
#[derive(Debug)]
pub struct SessionStateMachine {
    state: SessionState,
    history: VecDeque<StateTransition>,
    max_history: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Create a new state machine in `Disconnected`
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            history: VecDeque::new(),
            max_history: 100,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get state history, oldest first
    pub fn history(&self) -> impl Iterator<Item = &StateTransition> {
        self.history.iter()
    }

    /// Transition to a new state
    pub fn transition(
        &mut self,
        new_state: SessionState,
        reason: Option<&str>,
    ) -> Result<StateTransition, SessionError> {
        if !Self::is_valid_transition(self.state, new_state) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }

        let transition = StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Local::now(),
            reason: reason.map(String::from),
        };

        self.history.push_back(transition.clone());
        if self.history.len() > self.max_history {
            self.history.pop_front();
        }

        self.state = new_state;

        Ok(transition)
    }

    /// Check if transition is valid
    pub fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (from, to),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Closing)
                | (Closing, Disconnected)
        )
    }
}
