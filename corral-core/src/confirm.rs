//! Injected confirmation capability.
//!
//! Destructive steps ask an abstract [`Confirmer`] instead of reading the
//! terminal directly, so orchestration logic stays testable without one.
//! A rejected confirmation is a normal termination path, not an error.

/// Answers yes/no questions on behalf of the operator.
pub trait Confirmer: Send + Sync {
    /// Ask the operator to confirm a destructive action.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Confirms everything; used with `--force` style flags and in tests.
pub struct AlwaysConfirm;

impl Confirmer for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Declines everything; used in tests and non-interactive contexts.
pub struct NeverConfirm;

impl Confirmer for NeverConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}
