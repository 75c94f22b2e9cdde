//! Process-execution collaborators.
//!
//! The lifecycle never spawns processes directly; it hands a
//! [`ToolInvocation`](crate::tools::ToolInvocation) to a [`ToolRunner`] and
//! inspects the captured output. Exit codes are informational only: the
//! vendor tools are known to succeed with nonzero codes, so the re-probed
//! flag state is the sole success signal.
//!
//! Reboot and operator confirmation live behind the same kind of narrow
//! traits so tests can run the full lifecycle without touching the machine.

use std::io::{self, BufRead, Write};
use std::process::Command;

use tracing::debug;

use crate::tools::ToolInvocation;

/// Captured result of one external tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, absent when the tool was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the tool exited zero. Informational only; callers must trust
    /// the post-condition probes, not this.
    pub fn exited_zero(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external tool to completion and captures its outcome.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> io::Result<ToolOutput>;
}

/// Real runner shelling through the platform command interpreter.
pub struct SystemToolRunner;

impl ToolRunner for SystemToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> io::Result<ToolOutput> {
        debug!(command = %invocation.render(), "launching external tool");

        let mut command = interpreter_command(invocation);
        let output = command.output()?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Build the platform command for an invocation.
///
/// On Windows the vendor scripts need `cmd.exe`; `/K` keeps the console open
/// for the operator when the invocation is interactive. Elsewhere the script
/// is executed directly.
fn interpreter_command(invocation: &ToolInvocation) -> Command {
    #[cfg(target_os = "windows")]
    {
        let mut command = Command::new("cmd.exe");
        command.arg(if invocation.interactive { "/K" } else { "/C" });
        command.arg(&invocation.program);
        command.args(&invocation.args);
        command
    }
    #[cfg(not(target_os = "windows"))]
    {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        command
    }
}

/// Yes/no decision point requiring operator input.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Console confirmation over stdin.
pub struct ConsoleConfirm;

impl Confirm for ConsoleConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N]: ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Reboots the machine, optionally asking the operator first.
pub trait Rebooter: Send + Sync {
    /// Reboot now, or when `prompt_first` is set ask for confirmation and
    /// skip the reboot if the operator declines.
    fn reboot(&self, prompt_first: bool) -> io::Result<()>;
}

/// Real rebooter invoking the platform shutdown command. The reboot may
/// terminate this process; callers treat it as fire-and-forget.
pub struct SystemRebooter {
    confirm: std::sync::Arc<dyn Confirm>,
}

impl SystemRebooter {
    pub fn new(confirm: std::sync::Arc<dyn Confirm>) -> Self {
        Self { confirm }
    }
}

impl Rebooter for SystemRebooter {
    fn reboot(&self, prompt_first: bool) -> io::Result<()> {
        if prompt_first
            && !self.confirm.confirm(
                "System restart is REQUIRED to finish the clear process. Reboot now?",
            )
        {
            return Ok(());
        }

        #[cfg(target_os = "windows")]
        {
            Command::new("cmd.exe")
                .args(["/C", "shutdown", "-r", "-t", "0"])
                .spawn()?;
        }
        #[cfg(not(target_os = "windows"))]
        {
            Command::new("shutdown").args(["-r", "now"]).spawn()?;
        }

        Ok(())
    }
}
