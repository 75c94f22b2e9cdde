//! Append-only CSV audit log.
//!
//! One row per tool-invoking transition, written *before* the invocation so
//! a hung or machine-rebooting tool still leaves a trace. The header row is
//! written once when the file does not yet exist.

use std::path::PathBuf;

use chrono::Local;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::errors::{ProvisionError, ProvisionResult};
use crate::hardware::{HardwareProfile, Manufacturer};
use crate::tiers::Tier;
use crate::tools;

/// Header row, matching the column order of [`AuditEntry::to_csv_row`].
pub const AUDIT_HEADER: &str = "DATETIME,ACTION,ORDERID,MBMFR,MODEL,TOOL,OS,EDITION";

/// One correlated audit row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: &'static str,
    pub order_id: String,
    pub manufacturer: Manufacturer,
    pub board_name: String,
    /// Resolved numeric inject code for the manufacturer.
    pub tool_code: &'static str,
    pub os_version: String,
    pub tier: Tier,
}

impl AuditEntry {
    pub fn new(
        action: &'static str,
        order_id: &str,
        profile: &HardwareProfile,
        os_version: &str,
        tier: Tier,
    ) -> Self {
        Self {
            action,
            order_id: order_id.to_string(),
            manufacturer: profile.manufacturer,
            board_name: profile.board_name.clone(),
            tool_code: tools::inject_code(profile.manufacturer),
            os_version: os_version.to_string(),
            tier,
        }
    }

    /// Render the row with the current local timestamp.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.action,
            self.order_id,
            self.manufacturer,
            self.board_name,
            self.tool_code,
            self.os_version,
            self.tier,
        )
    }
}

/// The flat audit log file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one entry, writing the header first if the file is new.
    pub async fn append(&self, entry: &AuditEntry) -> ProvisionResult<()> {
        let needs_header = !self.path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                ProvisionError::AuditError(format!("could not open {}: {e}", self.path.display()))
            })?;

        let mut lines = String::new();
        if needs_header {
            lines.push_str(AUDIT_HEADER);
            lines.push('\n');
        }
        lines.push_str(&entry.to_csv_row());
        lines.push('\n');

        file.write_all(lines.as_bytes())
            .await
            .map_err(|e| ProvisionError::AuditError(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| ProvisionError::AuditError(e.to_string()))?;

        Ok(())
    }
}
