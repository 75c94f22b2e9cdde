//! Key provisioning lifecycle state machine.
//!
//! [`KeyLifecycle`] orchestrates every transition against the machine:
//! pulling and injecting keys, reporting consumption, returning unused keys,
//! clearing the firmware store, and uploading logs. It owns the
//! [`SessionState`] exclusively and talks to the outside world only through
//! the collaborator traits, so the full machine can be exercised in tests
//! with fakes.
//!
//! Every tool-invoking transition follows the same shape:
//!
//! 1. append a correlated audit row (before invocation, so a tool that hangs
//!    or reboots the machine still leaves a trace),
//! 2. run the resolved [`ToolInvocation`] to completion on a blocking worker,
//! 3. re-read the key-state probes and rewrite the session flags wholesale,
//! 4. surface each failed post-condition as a [`ValidationIssue`].
//!
//! Nonzero exit codes are logged but never treated as failure: the vendor
//! tools are known to succeed despite them, and the probes are the
//! documented source of truth. There is no timeout; a hung vendor tool hangs
//! the transition (the caller serializes transitions, so nothing else is in
//! flight).

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditLog};
use crate::errors::ProvisionResult;
use crate::hardware::HardwareProfile;
use crate::probes::{FsKeyStateProbe, KeyStateProbe};
use crate::process::{Confirm, ConsoleConfirm, Rebooter, SystemRebooter, SystemToolRunner, ToolRunner};
use crate::session::{LifecycleState, SessionState};
use crate::tiers::Tier;
use crate::tools::{self, ToolInvocation, ToolSettings};

/// A post-condition that did not hold after an external tool ran.
///
/// These are surfaced to the operator, not raised as errors: the lifecycle
/// stays usable and the operator decides whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationIssue {
    /// No key container appeared on disk; the server did not provide a key.
    BinNotPulled,
    /// A key was pulled but the firmware store does not show it.
    KeyNotInjected,
    /// Consumption was not confirmed to the license server.
    NotReported,
}

impl ValidationIssue {
    /// Actionable operator-facing message.
    pub fn message(&self) -> &'static str {
        match self {
            ValidationIssue::BinNotPulled => {
                "Server did not provide a key. Check stock levels and contact a manager if the error continues."
            }
            ValidationIssue::KeyNotInjected => {
                "Key was pulled, but was not injected. Try rebooting the system and reporting."
            }
            ValidationIssue::NotReported => "Failed to report to the license server.",
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Outcome of one lifecycle transition.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionReport {
    /// Whether an external tool was actually invoked. Guarded transitions
    /// that skip are not errors.
    pub invoked: bool,
    /// Post-conditions that did not hold, in validation order.
    pub issues: Vec<ValidationIssue>,
}

impl TransitionReport {
    fn skipped() -> Self {
        Self {
            invoked: false,
            issues: Vec::new(),
        }
    }

    fn invoked(issues: Vec<ValidationIssue>) -> Self {
        Self {
            invoked: true,
            issues,
        }
    }

    /// Invoked and every post-condition held.
    pub fn completed(&self) -> bool {
        self.invoked && self.issues.is_empty()
    }
}

/// External collaborators the lifecycle consumes.
pub struct Collaborators {
    pub runner: Arc<dyn ToolRunner>,
    pub probe: Arc<dyn KeyStateProbe>,
    pub rebooter: Arc<dyn Rebooter>,
    pub confirm: Arc<dyn Confirm>,
}

impl Collaborators {
    /// Real collaborators: system process runner, filesystem probes, console
    /// confirmation, platform reboot.
    pub fn system(settings: &ToolSettings) -> Self {
        let confirm: Arc<dyn Confirm> = Arc::new(ConsoleConfirm);
        Self {
            runner: Arc::new(SystemToolRunner),
            probe: Arc::new(FsKeyStateProbe::new(settings)),
            rebooter: Arc::new(SystemRebooter::new(Arc::clone(&confirm))),
            confirm,
        }
    }
}

/// The provisioning state machine for one machine session.
pub struct KeyLifecycle {
    session: SessionState,
    profile: HardwareProfile,
    tier: Tier,
    os_version: String,
    settings: ToolSettings,
    audit: AuditLog,
    runner: Arc<dyn ToolRunner>,
    probe: Arc<dyn KeyStateProbe>,
    rebooter: Arc<dyn Rebooter>,
    confirm: Arc<dyn Confirm>,
    session_id: Uuid,
}

impl KeyLifecycle {
    pub fn new(
        profile: HardwareProfile,
        tier: Tier,
        os_version: impl Into<String>,
        session: SessionState,
        settings: ToolSettings,
        collaborators: Collaborators,
    ) -> Self {
        let audit = AuditLog::new(settings.audit_log.clone());
        Self {
            session,
            profile,
            tier,
            os_version: os_version.into(),
            settings,
            audit,
            runner: collaborators.runner,
            probe: collaborators.probe,
            rebooter: collaborators.rebooter,
            confirm: collaborators.confirm,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn state(&self) -> LifecycleState {
        self.session.state()
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Establish the current on-machine state from the probes.
    ///
    /// Idempotent, invokes no external tool, and must run before any other
    /// transition.
    pub async fn initialize(&mut self) -> ProvisionResult<()> {
        self.refresh_from_probes();
        self.session.initialized = true;
        info!(
            session = %self.session_id,
            state = %self.session.state(),
            "session initialized"
        );
        Ok(())
    }

    /// Pull a fresh key for the tier and inject it (or inject the staged
    /// test bin in test mode).
    ///
    /// Fails before invocation when the tier has no edition code. After the
    /// tool runs, each post-condition is validated independently; a missing
    /// report is tolerated for `Rdpk`.
    pub async fn inject_new(
        &mut self,
        profile: &HardwareProfile,
        tier: Tier,
        order: &str,
    ) -> ProvisionResult<TransitionReport> {
        // Resolution must succeed before anything is invoked, even in test
        // mode where the edition code is not part of the command line.
        tools::edition_code(tier)?;

        self.log_audit("InjectNew", order, profile, tier).await?;
        info!(session = %self.session_id, order, %tier, "injecting new key");

        let invocation = if self.session.test_mode {
            self.settings
                .test_inject_invocation(profile.manufacturer, self.session.interactive)
        } else {
            self.settings.assemble_invocation(
                profile,
                &self.os_version,
                tier,
                order,
                self.session.interactive,
            )?
        };
        self.run_tool(invocation).await;

        self.refresh_from_probes();

        let mut issues = Vec::new();
        if !self.session.has_pulled_bin {
            issues.push(ValidationIssue::BinNotPulled);
        }
        if !self.session.has_key_on_record {
            issues.push(ValidationIssue::KeyNotInjected);
        }
        if !self.session.has_reported && tier != Tier::Rdpk {
            issues.push(ValidationIssue::NotReported);
        }
        for issue in &issues {
            warn!(session = %self.session_id, %issue, "post-condition failed");
        }

        if self.session.reboot_after_inject {
            self.request_reboot(false).await;
        }

        Ok(TransitionReport::invoked(issues))
    }

    /// Inject a previously pulled, staged bin.
    ///
    /// Guarded: a no-op when no bin is staged. Only the key probe is
    /// re-checked; this path assumes an unreported bin is being retried.
    pub async fn inject_old(
        &mut self,
        profile: &HardwareProfile,
        order: &str,
    ) -> ProvisionResult<TransitionReport> {
        if !self.session.has_pulled_bin {
            info!(session = %self.session_id, "no staged bin, skipping inject");
            return Ok(TransitionReport::skipped());
        }

        self.log_audit("InjectOld", order, profile, self.tier).await?;
        info!(session = %self.session_id, order, "injecting pulled key");

        let invocation = self
            .settings
            .bin_inject_invocation(profile.manufacturer, self.session.interactive);
        self.run_tool(invocation).await;

        let key = self.probe.current_key().unwrap_or_else(|e| {
            warn!(session = %self.session_id, error = %e, "key probe failed, assuming no key");
            None
        });
        self.session.has_key_on_record = key.is_some();
        self.session.activation_key = key;

        let issues = if self.session.has_key_on_record {
            Vec::new()
        } else {
            warn!(
                session = %self.session_id,
                issue = %ValidationIssue::KeyNotInjected,
                "post-condition failed"
            );
            vec![ValidationIssue::KeyNotInjected]
        };

        if self.session.reboot_after_inject {
            self.request_reboot(false).await;
        }

        Ok(TransitionReport::invoked(issues))
    }

    /// Clear the key from the firmware store.
    ///
    /// When no key is on record the operator must explicitly confirm.
    /// Clearing always ends in a reboot; the prompt before it can be
    /// suppressed but the reboot itself cannot.
    pub async fn clear(&mut self, profile: &HardwareProfile) -> ProvisionResult<TransitionReport> {
        if !self.session.has_key_on_record
            && !self
                .confirm
                .confirm("System doesn't have a key injected. Are you sure you want to clear?")
        {
            info!(session = %self.session_id, "clear declined by operator");
            return Ok(TransitionReport::skipped());
        }

        // Clearing can run without a work order; keep the ORDERID column
        // visibly filled.
        let order = if self.session.order_id.is_empty() {
            "-".to_string()
        } else {
            self.session.order_id.clone()
        };
        self.log_audit("Clear", &order, profile, self.tier).await?;
        info!(session = %self.session_id, "clearing key");

        let invocation = self.settings.clear_invocation(profile.manufacturer);
        self.run_tool(invocation).await;

        // A clear is only finished after a restart.
        self.request_reboot(!self.session.suppress_reboot_prompt).await;

        Ok(TransitionReport::invoked(Vec::new()))
    }

    /// Confirm key consumption to the license server.
    ///
    /// Guarded: runs only when unreported and a bin was pulled.
    pub async fn report(&mut self, order: &str) -> ProvisionResult<TransitionReport> {
        if self.session.has_reported || !self.session.has_pulled_bin {
            info!(session = %self.session_id, "nothing to report, skipping");
            return Ok(TransitionReport::skipped());
        }

        let profile = self.profile.clone();
        self.log_audit("Report", order, &profile, self.tier).await?;
        info!(session = %self.session_id, order, "reporting key");

        let invocation = self
            .settings
            .report_invocation(order, self.session.interactive);
        self.run_tool(invocation).await;

        self.session.has_reported = self.probe.report_present();

        let issues = if self.session.has_reported {
            Vec::new()
        } else {
            warn!(
                session = %self.session_id,
                issue = %ValidationIssue::NotReported,
                "post-condition failed"
            );
            vec![ValidationIssue::NotReported]
        };

        Ok(TransitionReport::invoked(issues))
    }

    /// Return an unreported pulled key to the server.
    ///
    /// Guarded: runs only when unreported. Fire-and-forget; no flag is
    /// re-probed and the operator treats the key as consumed.
    pub async fn return_key(&mut self, order: &str) -> ProvisionResult<TransitionReport> {
        if self.session.has_reported {
            info!(session = %self.session_id, "key already reported, skipping return");
            return Ok(TransitionReport::skipped());
        }

        let profile = self.profile.clone();
        self.log_audit("Return", order, &profile, self.tier).await?;
        info!(session = %self.session_id, order, "returning key");

        let invocation = self
            .settings
            .return_invocation(order, self.session.interactive);
        self.run_tool(invocation).await;

        Ok(TransitionReport::invoked(Vec::new()))
    }

    /// Upload the assemble log and the report artifact.
    ///
    /// Guarded: runs only once reported. Chains two script invocations.
    pub async fn upload_logs(&mut self, order: &str) -> ProvisionResult<TransitionReport> {
        if !self.session.has_reported {
            info!(session = %self.session_id, "not reported yet, skipping log upload");
            return Ok(TransitionReport::skipped());
        }

        let profile = self.profile.clone();
        self.log_audit("UploadLogs", order, &profile, self.tier).await?;
        info!(session = %self.session_id, order, "uploading logs");

        let [assemble, report] = self
            .settings
            .upload_invocations(order, self.session.interactive);
        self.run_tool(assemble).await;
        self.run_tool(report).await;

        Ok(TransitionReport::invoked(Vec::new()))
    }

    /// Rewrite all session flags from fresh probe reads. Probe failures
    /// degrade to "absent" with a warning rather than failing the session.
    fn refresh_from_probes(&mut self) {
        let key = self.probe.current_key().unwrap_or_else(|e| {
            warn!(session = %self.session_id, error = %e, "key probe failed, assuming no key");
            None
        });
        self.session.has_key_on_record = key.is_some();
        self.session.activation_key = key;
        self.session.has_pulled_bin = self.probe.bin_present();
        self.session.has_reported = self.probe.report_present();
        self.session.product_key_id = self.probe.product_key_id().unwrap_or_else(|e| {
            warn!(session = %self.session_id, error = %e, "key id probe failed");
            None
        });
    }

    /// Run one invocation to completion on a blocking worker.
    ///
    /// Launch failures and nonzero exits are logged and swallowed; the
    /// post-condition probes decide whether the transition worked.
    async fn run_tool(&self, invocation: ToolInvocation) {
        let runner = Arc::clone(&self.runner);
        let command = invocation.render();

        let result = tokio::task::spawn_blocking(move || runner.run(&invocation)).await;
        match result {
            Ok(Ok(output)) => {
                if !output.exited_zero() {
                    warn!(
                        session = %self.session_id,
                        %command,
                        exit_code = ?output.exit_code,
                        "tool exited nonzero, trusting probes for the outcome"
                    );
                }
                if !output.stderr.trim().is_empty() {
                    warn!(session = %self.session_id, %command, stderr = %output.stderr.trim(), "tool stderr");
                }
            }
            Ok(Err(e)) => {
                warn!(session = %self.session_id, %command, error = %e, "failed to launch external tool");
            }
            Err(e) => {
                warn!(session = %self.session_id, %command, error = %e, "tool worker failed");
            }
        }
    }

    async fn request_reboot(&self, prompt_first: bool) {
        info!(session = %self.session_id, prompt_first, "requesting reboot");
        let rebooter = Arc::clone(&self.rebooter);
        let result = tokio::task::spawn_blocking(move || rebooter.reboot(prompt_first)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(session = %self.session_id, error = %e, "reboot request failed"),
            Err(e) => warn!(session = %self.session_id, error = %e, "reboot worker failed"),
        }
    }

    async fn log_audit(
        &self,
        action: &'static str,
        order: &str,
        profile: &HardwareProfile,
        tier: Tier,
    ) -> ProvisionResult<()> {
        let entry = AuditEntry::new(action, order, profile, &self.os_version, tier);
        self.audit.append(&entry).await
    }
}
