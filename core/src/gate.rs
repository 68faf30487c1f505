//! PIN gate for the editing view.
//!
//! This is cosmetic UI gating, not authentication: one shared static PIN,
//! compared verbatim, no hashing, no lockout.

use thiserror::Error;

pub const ADMIN_PIN: &str = "1979";

#[derive(Debug, Error, PartialEq)]
#[error("Wrong PIN")]
pub struct WrongPin;

#[must_use]
pub fn pin_matches(input: &str) -> bool {
    input == ADMIN_PIN
}

pub fn check_pin(input: &str) -> Result<(), WrongPin> {
    if pin_matches(input) {
        Ok(())
    } else {
        Err(WrongPin)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminGate {
    /// Text currently typed into the PIN field.
    pub pin: String,
    /// Set after a wrong submission, cleared by the next correct one.
    pub error: bool,
    pub unlocked: bool,
}

impl AdminGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit the typed PIN. Returns whether the gate is now unlocked.
    pub fn submit(&mut self, input: &str) -> bool {
        self.pin = input.to_string();
        if pin_matches(&self.pin) {
            self.unlocked = true;
            self.error = false;
        } else {
            self.error = true;
            self.pin.clear();
        }
        self.unlocked
    }

    /// Sign out of the editing view.
    pub fn lock(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_pin_unlocks() {
        let mut gate = AdminGate::new();
        assert!(gate.submit("1979"));
        assert!(gate.unlocked);
        assert!(!gate.error);
    }

    #[test]
    fn test_wrong_pin_sets_error_and_clears_input() {
        for attempt in ["0000", "1978", "9791", "abcd"] {
            let mut gate = AdminGate::new();
            assert!(!gate.submit(attempt));
            assert!(!gate.unlocked);
            assert!(gate.error);
            assert!(gate.pin.is_empty());
        }
    }

    #[test]
    fn test_retry_after_error() {
        let mut gate = AdminGate::new();
        gate.submit("1234");
        assert!(gate.submit("1979"));
        assert!(!gate.error);
    }

    #[test]
    fn test_lock_resets_gate() {
        let mut gate = AdminGate::new();
        gate.submit("1979");
        gate.lock();
        assert_eq!(gate, AdminGate::default());
    }

    #[test]
    fn test_check_pin() {
        assert_eq!(check_pin("1979"), Ok(()));
        assert_eq!(check_pin(" 1979"), Err(WrongPin));
    }
}
