//! Vendor tool resolution and command building.
//!
//! Each manufacturer maps to a numeric inject code (consumed by the assemble
//! script) and a lowercase tool slug (the per-vendor executable). Anything
//! unrecognized is silently treated as MSI-compatible hardware; MSI is the
//! documented fallback tool, not an error. Tiers map to the edition codes the
//! key server expects, and an unmapped tier *is* an error: the caller must
//! not proceed to invocation.
//!
//! Command lines are built as [`ToolInvocation`] values from a settings table
//! instead of inline branching, so tests can assert on exact argument vectors
//! without spawning anything.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::{get_config, PathsConfig, ScriptsConfig};
use crate::errors::{ProvisionError, ProvisionResult};
use crate::hardware::{HardwareProfile, Manufacturer};
use crate::tiers::Tier;

/// Numeric inject code passed to the assemble script.
pub fn inject_code(manufacturer: Manufacturer) -> &'static str {
    match manufacturer {
        Manufacturer::AsRock => "1",
        Manufacturer::Asus => "2",
        Manufacturer::AsusZ690 => "22",
        Manufacturer::Gigabyte => "3",
        Manufacturer::Msi => "4",
        Manufacturer::Sager => "5",
        Manufacturer::SagerH2O => "5h",
        Manufacturer::TongFang => "9",
        Manufacturer::None => "4",
    }
}

/// Lowercase slug naming the per-vendor tool executable.
pub fn tool_slug(manufacturer: Manufacturer) -> &'static str {
    match manufacturer {
        Manufacturer::AsRock => "asrock",
        Manufacturer::Asus => "asus",
        Manufacturer::AsusZ690 => "asusz690",
        Manufacturer::Gigabyte => "gigabyte",
        Manufacturer::Msi => "msi",
        Manufacturer::Sager => "sager",
        Manufacturer::SagerH2O => "sagerh2o",
        Manufacturer::TongFang => "tongfang",
        Manufacturer::None => "msi",
    }
}

/// Edition code the key server expects for a tier.
///
/// `Tier::None` has no code; resolving it is a fatal error and the caller
/// must not invoke any external tool.
pub fn edition_code(tier: Tier) -> ProvisionResult<&'static str> {
    match tier {
        Tier::Home => Ok("1"),
        Tier::Pro => Ok("2"),
        Tier::HomeAdvanced => Ok("3"),
        Tier::ProAdvanced => Ok("4"),
        Tier::Rdpk => Ok("rdpk"),
        Tier::None => Err(ProvisionError::UnresolvedEdition(tier)),
    }
}

/// A fully resolved external tool command line, ready for the process
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
    /// Program or script path.
    pub program: PathBuf,
    /// Argument vector, already ordered.
    pub args: Vec<String>,
    /// Keep the tool console open for the operator.
    pub interactive: bool,
}

impl ToolInvocation {
    fn new(program: PathBuf, args: Vec<String>, interactive: bool) -> Self {
        Self {
            program,
            args,
            interactive,
        }
    }

    /// One-line rendering for logs and debug output.
    pub fn render(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Resolved tool locations and script names, the data behind every command
/// line the lifecycle issues.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub tool_dir: PathBuf,
    pub data_dir: PathBuf,
    pub audit_log: PathBuf,
    bin_file: String,
    key_id_file: String,
    report_file: String,
    test_bin_file: String,
    scripts: ScriptsConfig,
}

impl ToolSettings {
    pub fn new(paths: &PathsConfig, scripts: &ScriptsConfig) -> Self {
        Self {
            tool_dir: PathBuf::from(&paths.tool_dir),
            data_dir: PathBuf::from(&paths.data_dir),
            audit_log: PathBuf::from(&paths.audit_log),
            bin_file: paths.bin_file.clone(),
            key_id_file: paths.key_id_file.clone(),
            report_file: paths.report_file.clone(),
            test_bin_file: paths.test_bin_file.clone(),
            scripts: scripts.clone(),
        }
    }

    /// Build settings from the global configuration.
    pub fn from_config() -> ProvisionResult<Self> {
        let config = get_config()?;
        Ok(Self::new(&config.paths, &config.scripts))
    }

    /// Staged key container pulled from the server.
    pub fn bin_path(&self) -> PathBuf {
        self.data_dir.join(&self.bin_file)
    }

    /// Product-key-id document written by the assemble script.
    pub fn key_id_path(&self) -> PathBuf {
        self.data_dir.join(&self.key_id_file)
    }

    /// Report artifact confirming key consumption.
    pub fn report_path(&self) -> PathBuf {
        self.data_dir.join(&self.report_file)
    }

    /// Test key container shipped alongside the tools.
    pub fn test_bin_path(&self) -> PathBuf {
        self.tool_dir.join(&self.test_bin_file)
    }

    fn vendor_tool(&self, manufacturer: Manufacturer) -> PathBuf {
        self.tool_dir.join(tool_slug(manufacturer))
    }

    fn script(&self, name: &str) -> PathBuf {
        self.tool_dir.join(name)
    }

    /// Production injection: pull a fresh key from the server and inject it.
    ///
    /// `<assemble-script> <board> <os-version> <edition-code> <order> <inject-code>`
    pub fn assemble_invocation(
        &self,
        profile: &HardwareProfile,
        os_version: &str,
        tier: Tier,
        order: &str,
        interactive: bool,
    ) -> ProvisionResult<ToolInvocation> {
        let edition = edition_code(tier)?;
        Ok(ToolInvocation::new(
            self.script(&self.scripts.assemble),
            vec![
                profile.board_name.clone(),
                os_version.to_string(),
                edition.to_string(),
                order.to_string(),
                inject_code(profile.manufacturer).to_string(),
            ],
            interactive,
        ))
    }

    /// Test-mode injection of the staged test bin.
    ///
    /// `<vendor-tool> inject <test-bin>`
    pub fn test_inject_invocation(
        &self,
        manufacturer: Manufacturer,
        interactive: bool,
    ) -> ToolInvocation {
        ToolInvocation::new(
            self.vendor_tool(manufacturer),
            vec![
                "inject".to_string(),
                self.test_bin_path().display().to_string(),
            ],
            interactive,
        )
    }

    /// Injection of a previously pulled, staged bin.
    ///
    /// `<vendor-tool> inject <bin>`
    pub fn bin_inject_invocation(
        &self,
        manufacturer: Manufacturer,
        interactive: bool,
    ) -> ToolInvocation {
        ToolInvocation::new(
            self.vendor_tool(manufacturer),
            vec!["inject".to_string(), self.bin_path().display().to_string()],
            interactive,
        )
    }

    /// Clear the key present in the firmware license store.
    ///
    /// `<vendor-tool> clear`
    pub fn clear_invocation(&self, manufacturer: Manufacturer) -> ToolInvocation {
        ToolInvocation::new(self.vendor_tool(manufacturer), vec!["clear".to_string()], false)
    }

    /// Confirm key consumption to the license server.
    ///
    /// `<report-script> <order> wrapper`
    pub fn report_invocation(&self, order: &str, interactive: bool) -> ToolInvocation {
        ToolInvocation::new(
            self.script(&self.scripts.report),
            vec![order.to_string(), "wrapper".to_string()],
            interactive,
        )
    }

    /// Return an unreported pulled key to the server.
    ///
    /// `<return-script> <order> wrapper`
    pub fn return_invocation(&self, order: &str, interactive: bool) -> ToolInvocation {
        ToolInvocation::new(
            self.script(&self.scripts.return_key),
            vec![order.to_string(), "wrapper".to_string()],
            interactive,
        )
    }

    /// Upload the assemble log and the report artifact, in that order.
    pub fn upload_invocations(&self, order: &str, interactive: bool) -> [ToolInvocation; 2] {
        [
            ToolInvocation::new(
                self.script(&self.scripts.upload_assemble),
                vec![order.to_string()],
                interactive,
            ),
            ToolInvocation::new(
                self.script(&self.scripts.upload_report),
                vec![
                    self.report_path().display().to_string(),
                    order.to_string(),
                ],
                interactive,
            ),
        ]
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::new(&PathsConfig::default(), &ScriptsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::Manufacturer::*;

    fn profile() -> HardwareProfile {
        HardwareProfile {
            manufacturer: Gigabyte,
            board_name: "B650MDS3H".to_string(),
            memory_gb: 16,
            storage_gb: 1000,
            processor_name: "AMD Ryzen 7 7700".to_string(),
        }
    }

    #[test]
    fn inject_codes_match_vendor_table() {
        assert_eq!(inject_code(AsRock), "1");
        assert_eq!(inject_code(Asus), "2");
        assert_eq!(inject_code(AsusZ690), "22");
        assert_eq!(inject_code(Gigabyte), "3");
        assert_eq!(inject_code(Msi), "4");
        assert_eq!(inject_code(Sager), "5");
        assert_eq!(inject_code(SagerH2O), "5h");
        assert_eq!(inject_code(TongFang), "9");
    }

    #[test]
    fn unknown_manufacturer_falls_back_to_msi() {
        assert_eq!(inject_code(None), inject_code(Msi));
        assert_eq!(tool_slug(None), "msi");
    }

    #[test]
    fn edition_codes_match_server_table() {
        assert_eq!(edition_code(Tier::Home).unwrap(), "1");
        assert_eq!(edition_code(Tier::Pro).unwrap(), "2");
        assert_eq!(edition_code(Tier::HomeAdvanced).unwrap(), "3");
        assert_eq!(edition_code(Tier::ProAdvanced).unwrap(), "4");
        assert_eq!(edition_code(Tier::Rdpk).unwrap(), "rdpk");
    }

    #[test]
    fn unresolved_edition_is_an_error() {
        let err = edition_code(Tier::None).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::ProvisionError::UnresolvedEdition(Tier::None)
        ));
    }

    #[test]
    fn assemble_invocation_orders_arguments() {
        let settings = ToolSettings::default();
        let invocation = settings
            .assemble_invocation(&profile(), "11", Tier::HomeAdvanced, "WO-1234", false)
            .unwrap();

        assert_eq!(invocation.program, PathBuf::from("OA30/pcloa3assemble11.cmd"));
        assert_eq!(
            invocation.args,
            vec!["B650MDS3H", "11", "3", "WO-1234", "3"]
        );
    }

    #[test]
    fn assemble_invocation_fails_closed_on_tier_none() {
        let settings = ToolSettings::default();
        assert!(settings
            .assemble_invocation(&profile(), "11", Tier::None, "WO-1234", false)
            .is_err());
    }

    #[test]
    fn bin_inject_uses_staged_bin() {
        let settings = ToolSettings::default();
        let invocation = settings.bin_inject_invocation(Msi, false);

        assert_eq!(invocation.program, PathBuf::from("OA30/msi"));
        assert_eq!(invocation.args[0], "inject");
        assert!(invocation.args[1].ends_with("oa3.bin"));
    }

    #[test]
    fn test_inject_uses_tool_dir_bin() {
        let settings = ToolSettings::default();
        let invocation = settings.test_inject_invocation(SagerH2O, true);

        assert_eq!(invocation.program, PathBuf::from("OA30/sagerh2o"));
        assert!(invocation.interactive);
        assert!(invocation.args[1].ends_with("OA3.bin"));
    }

    #[test]
    fn clear_invocation_is_never_interactive() {
        let settings = ToolSettings::default();
        let invocation = settings.clear_invocation(AsRock);

        assert_eq!(invocation.program, PathBuf::from("OA30/asrock"));
        assert_eq!(invocation.args, vec!["clear"]);
        assert!(!invocation.interactive);
    }

    #[test]
    fn report_and_return_take_order_and_wrapper() {
        let settings = ToolSettings::default();
        let report = settings.report_invocation("WO-9", false);
        let ret = settings.return_invocation("WO-9", false);

        assert_eq!(report.args, vec!["WO-9", "wrapper"]);
        assert_eq!(ret.args, vec!["WO-9", "wrapper"]);
        assert_eq!(report.program, PathBuf::from("OA30/pcloa3report.cmd"));
        assert_eq!(ret.program, PathBuf::from("OA30/pcloa3return.cmd"));
    }

    #[test]
    fn upload_chains_two_invocations() {
        let settings = ToolSettings::default();
        let [first, second] = settings.upload_invocations("WO-9", false);

        assert_eq!(first.program, PathBuf::from("OA30/uploadAssemble.cmd"));
        assert_eq!(first.args, vec!["WO-9"]);
        assert_eq!(second.program, PathBuf::from("OA30/uploadReport.cmd"));
        assert!(second.args[0].ends_with("Report.xml"));
        assert_eq!(second.args[1], "WO-9");
    }
}
