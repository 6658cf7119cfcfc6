//! The authentication gate: a bounded retry state machine.

pub mod methods;
pub mod verifier;

use crate::config::{AuthMethodKind, Config};
use crate::ui::UserInterface;
use log::{info, warn};
use methods::{AuthMethod, AuthOutcome};

/// Observable states of the retry machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Ready,
    Prompting(AuthMethodKind),
    Verifying(AuthMethodKind),
    AttemptFailed,
    Granted,
    Exhausted,
}

/// Terminal result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Correct credential within the budget.
    Granted,
    /// Budget exhausted; the dead-man's switch is next.
    Exhausted,
}

/// Bounded-attempt authentication driver. Owns the session counter; the
/// counter lives in memory only and dies with the session.
pub struct AuthGate<'a> {
    config: &'a Config,
    methods: Vec<Box<dyn AuthMethod + 'a>>,
    attempts: u32,
    state: GateState,
}

impl<'a> AuthGate<'a> {
    pub fn new(config: &'a Config, methods: Vec<Box<dyn AuthMethod + 'a>>) -> Self {
        Self {
            config,
            methods,
            attempts: 0,
            state: GateState::Ready,
        }
    }

    /// Completed attempts so far. Invariant: never exceeds `max_attempts`.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Run the machine to a terminal state. Once `Exhausted` is reached it
    /// is never left; the caller must hand control to the sequencer and
    /// must not re-enter the gate.
    pub fn run(&mut self, ui: &mut dyn UserInterface) -> GateOutcome {
        loop {
            self.state = GateState::Ready;

            let outcome = match self.select_method() {
                Some(index) => self.one_attempt(index, ui),
                None => {
                    // Nothing answered the probe this round; burn an attempt
                    // so a hostile peripheral cannot stall the gate forever.
                    warn!("no authentication method available this attempt");
                    ui.error("no authentication method available");
                    AuthOutcome::BackendError("no method available".into())
                }
            };

            match outcome {
                AuthOutcome::Granted => {
                    self.state = GateState::Granted;
                    info!("access granted after {} failed attempt(s)", self.attempts);
                    return GateOutcome::Granted;
                }
                AuthOutcome::Rejected | AuthOutcome::BackendError(_) => {
                    if let AuthOutcome::BackendError(reason) = &outcome {
                        warn!("attempt failed on backend error: {}", reason);
                    }
                    self.attempts += 1;
                    self.state = GateState::AttemptFailed;

                    if self.attempts >= self.config.max_attempts {
                        self.state = GateState::Exhausted;
                        warn!(
                            "attempt budget exhausted ({} of {})",
                            self.attempts, self.config.max_attempts
                        );
                        return GateOutcome::Exhausted;
                    }

                    ui.show_attempt_failed(self.config.max_attempts - self.attempts);
                }
            }
        }
    }

    /// First enabled method whose runtime probe answers. Probing consumes
    /// no attempt.
    fn select_method(&self) -> Option<usize> {
        self.methods.iter().position(|method| method.available())
    }

    fn one_attempt(&mut self, index: usize, ui: &mut dyn UserInterface) -> AuthOutcome {
        let kind = self.methods[index].kind();
        ui.show_login(kind, self.attempts + 1, self.config.max_attempts);

        self.state = GateState::Prompting(kind);
        let sample = match self.methods[index].acquire(ui) {
            Ok(Some(sample)) => sample,
            // Cancel during prompting is a completed attempt.
            Ok(None) => return AuthOutcome::Rejected,
            Err(reason) => return AuthOutcome::BackendError(reason),
        };

        // Cancellation is disallowed from here on.
        self.state = GateState::Verifying(kind);
        self.methods[index].verify(sample)
    }
}

#[cfg(test)]
mod gate_tests;
