//! Per-stage lifecycle state machine, grounded on
//! `original_source/.../videoproc/stage_fsm.hpp`.
//!
//! The original drives this through a Boost.MSM state machine with
//! `on_done` callback registration per state. This port keeps the same
//! three states and three events but expresses the transition table as a
//! plain `match` — idiomatic Rust for a state machine this small, and it
//! makes illegal transitions (`process` before `start`, a second `init`)
//! fail fast with [`tilework_core::error::Error::Internal`] instead of
//! silently corrupting stage state.

use tilework_core::error::{Error, Result};

/// A pipeline stage's three lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Allocating per-context state; not yet ready to receive data.
    Initializing,
    /// Idle, ready to accept the next `process`/`next` call.
    WaitingForData,
    /// Inside a `process`/`next` call's body.
    ProcessingData,
}

/// Events that drive [`StageFsm`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    /// `init` has finished allocating per-context state.
    InitializeDone,
    /// A `process`/`next` call is beginning its body.
    ProcessData,
    /// A `process`/`next` call's body has finished.
    ProcessDataDone,
}

/// Explicit `initializing -> waiting_for_data -> processing_data` state
/// machine, one instance per stage-context.
pub struct StageFsm {
    name: String,
    state: StageState,
}

impl StageFsm {
    /// A fresh FSM in the `Initializing` state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StageState::Initializing,
        }
    }

    /// The current state.
    pub fn state(&self) -> StageState {
        self.state
    }

    /// Applies `event`, advancing to the next state or returning
    /// `Error::Internal` for an event that isn't valid in the current state.
    pub fn process(&mut self, event: StageEvent) -> Result<()> {
        let next = match (self.state, event) {
            (StageState::Initializing, StageEvent::InitializeDone) => StageState::WaitingForData,
            (StageState::WaitingForData, StageEvent::ProcessData) => StageState::ProcessingData,
            (StageState::ProcessingData, StageEvent::ProcessDataDone) => StageState::WaitingForData,
            (state, event) => {
                return Err(Error::Internal(format!(
                    "stage '{}': event {event:?} is invalid in state {state:?}",
                    self.name
                )))
            }
        };
        self.state = next;
        Ok(())
    }

    /// Convenience for a call that must happen while `WaitingForData`: runs
    /// `body` between a `ProcessData`/`ProcessDataDone` transition pair.
    pub fn run_processing<F, R>(&mut self, body: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        self.process(StageEvent::ProcessData)?;
        let result = body();
        self.process(StageEvent::ProcessDataDone)?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_cycles_through_states() {
        let mut fsm = StageFsm::new("source");
        assert_eq!(fsm.state(), StageState::Initializing);
        fsm.process(StageEvent::InitializeDone).unwrap();
        assert_eq!(fsm.state(), StageState::WaitingForData);
        fsm.process(StageEvent::ProcessData).unwrap();
        assert_eq!(fsm.state(), StageState::ProcessingData);
        fsm.process(StageEvent::ProcessDataDone).unwrap();
        assert_eq!(fsm.state(), StageState::WaitingForData);
    }

    #[test]
    fn process_before_initialize_done_is_rejected() {
        let mut fsm = StageFsm::new("source");
        let err = fsm.process(StageEvent::ProcessData).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn double_initialize_is_rejected() {
        let mut fsm = StageFsm::new("source");
        fsm.process(StageEvent::InitializeDone).unwrap();
        let err = fsm.process(StageEvent::InitializeDone).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn run_processing_still_advances_state_when_body_fails() {
        let mut fsm = StageFsm::new("sink");
        fsm.process(StageEvent::InitializeDone).unwrap();
        let result: Result<()> = fsm.run_processing(|| Err(Error::Internal("boom".into())));
        assert!(result.is_err());
        assert_eq!(fsm.state(), StageState::WaitingForData);
    }
}
