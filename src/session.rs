//! Per-machine provisioning session state.
//!
//! The three probe-backed flags are the true state; [`LifecycleState`] is a
//! convenience projection over them. The lifecycle owns the session
//! exclusively and always rewrites the flags wholesale from fresh probes,
//! never patches them incrementally.

use serde::Serialize;

/// Mutable session state, one active instance per machine session.
///
/// Constructed once at session start, populated by the initialize
/// transition, mutated only by [`crate::lifecycle::KeyLifecycle`], and
/// discarded at process exit. The only persistence is the audit log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    /// A previously injected key was detected in the firmware license store.
    pub has_key_on_record: bool,
    /// A key container was pulled from the server but not yet injected.
    pub has_pulled_bin: bool,
    /// Key usage was confirmed to the license server.
    pub has_reported: bool,
    /// The currently detected activation key, if any.
    pub activation_key: Option<String>,
    /// Product key id parsed from the staged key-id document, if any.
    pub product_key_id: Option<String>,
    /// Work-order correlation identifier.
    pub order_id: String,
    /// Inject the staged test bin instead of pulling a live key.
    pub test_mode: bool,
    /// Keep the vendor tool console open for the operator.
    pub interactive: bool,
    /// Reboot once injection completes.
    pub reboot_after_inject: bool,
    /// Skip the confirmation prompt before the mandatory post-clear reboot.
    pub suppress_reboot_prompt: bool,
    pub(crate) initialized: bool,
}

impl SessionState {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            ..Default::default()
        }
    }

    /// Whether the initialize transition has populated the flags.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Project the flag combination onto a named state.
    pub fn state(&self) -> LifecycleState {
        if !self.initialized {
            LifecycleState::Uninitialized
        } else if self.has_reported {
            LifecycleState::Reported
        } else if self.has_key_on_record {
            LifecycleState::Injected
        } else if self.has_pulled_bin {
            LifecycleState::PendingBin
        } else {
            LifecycleState::NoKey
        }
    }
}

/// Named projection of the session flags, for reporting and exhaustive
/// matching. `Reported` is the terminal success state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    Uninitialized,
    NoKey,
    PendingBin,
    Injected,
    Reported,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::NoKey => "no key",
            LifecycleState::PendingBin => "bin pulled, not injected",
            LifecycleState::Injected => "injected, not reported",
            LifecycleState::Reported => "reported",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_uninitialized() {
        let session = SessionState::new("WO-1");
        assert_eq!(session.state(), LifecycleState::Uninitialized);
        assert!(!session.is_initialized());
    }

    #[test]
    fn projection_follows_flag_priority() {
        let mut session = SessionState::new("WO-1");
        session.initialized = true;
        assert_eq!(session.state(), LifecycleState::NoKey);

        session.has_pulled_bin = true;
        assert_eq!(session.state(), LifecycleState::PendingBin);

        session.has_key_on_record = true;
        assert_eq!(session.state(), LifecycleState::Injected);

        session.has_reported = true;
        assert_eq!(session.state(), LifecycleState::Reported);
    }

    #[test]
    fn order_id_is_retained() {
        let session = SessionState::new("WO-5521");
        assert_eq!(session.order_id, "WO-5521");
    }
}
