//! Host-side arbitration of near-simultaneous win claims.
//!
//! The first claim opens a window; every claim that arrives before the window
//! closes is merged into one outcome. The window is an owned deadline rather
//! than a spawned timer, so the runtime sleeps until [`WinArbiter::deadline`]
//! and a restart can [`cancel`](WinArbiter::cancel) it deterministically.

use std::time::{Duration, Instant};

use tracing::debug;

/// Default merge window for win claims.
pub const DEFAULT_WIN_WINDOW: Duration = Duration::from_millis(1500);

/// What a single [`WinArbiter::register_claim_at`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// First claim of the round; the window closes at the given instant.
    WindowOpened(Instant),
    /// Added to the already open window.
    Merged,
    /// This name already has a pending claim.
    Duplicate,
}

/// Collects win claims and resolves them into a single outcome.
#[derive(Debug, Clone)]
pub struct WinArbiter {
    window: Duration,
    claims: Vec<String>,
    deadline: Option<Instant>,
}

impl WinArbiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            claims: Vec::new(),
            deadline: None,
        }
    }

    /// Register a claim received now.
    pub fn register_claim(&mut self, name: &str) -> ClaimOutcome {
        self.register_claim_at(name, Instant::now())
    }

    /// Register a claim received at `at`. Idempotent per name.
    pub fn register_claim_at(&mut self, name: &str, at: Instant) -> ClaimOutcome {
        let duplicate = self.claims.iter().any(|c| c == name);
        if !duplicate {
            self.claims.push(name.to_string());
        }

        match self.deadline {
            Some(_) if duplicate => ClaimOutcome::Duplicate,
            Some(_) => {
                debug!(name, "win claim merged into open window");
                ClaimOutcome::Merged
            }
            None => {
                let deadline = at + self.window;
                self.deadline = Some(deadline);
                debug!(name, window_ms = self.window.as_millis(), "win window opened");
                ClaimOutcome::WindowOpened(deadline)
            }
        }
    }

    /// When the open window closes, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Names claimed so far, in arrival order.
    pub fn pending(&self) -> &[String] {
        &self.claims
    }

    /// Resolve the window if it has closed by `now`.
    ///
    /// Returns the joint outcome (`"Alice & Bob"`) and clears all pending
    /// state, so each window resolves exactly once.
    pub fn poll_expired(&mut self, now: Instant) -> Option<String> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                let outcome = self.claims.join(" & ");
                self.claims.clear();
                self.deadline = None;
                Some(outcome)
            }
            _ => None,
        }
    }

    /// Drop any open window without resolving it.
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            debug!(pending = self.claims.len(), "win window cancelled");
        }
        self.claims.clear();
    }
}

impl Default for WinArbiter {
    fn default() -> Self {
        Self::new(DEFAULT_WIN_WINDOW)
    }
}
