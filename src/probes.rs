//! Key-state probes.
//!
//! After every external tool invocation the lifecycle re-reads the on-disk
//! key artifacts and the firmware license store. These probes are the only
//! authoritative success signal; exit codes are informational. Reads are a
//! best-effort freshness check, not a transactional guarantee: the vendor
//! tools own the writes.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{ProvisionError, ProvisionResult};
use crate::tools::ToolSettings;

/// Read-side view of the machine's key state.
pub trait KeyStateProbe: Send + Sync {
    /// The activation key currently present in the firmware license store,
    /// if any.
    fn current_key(&self) -> ProvisionResult<Option<String>>;

    /// Whether a pulled key container is staged on disk.
    fn bin_present(&self) -> bool;

    /// Whether the report artifact exists.
    fn report_present(&self) -> bool;

    /// Product key id from the staged key-id document, if present.
    fn product_key_id(&self) -> ProvisionResult<Option<String>>;
}

/// Filesystem-backed probe over the artifact directory, plus the platform
/// firmware key query.
pub struct FsKeyStateProbe {
    bin_path: PathBuf,
    report_path: PathBuf,
    key_id_path: PathBuf,
}

impl FsKeyStateProbe {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            bin_path: settings.bin_path(),
            report_path: settings.report_path(),
            key_id_path: settings.key_id_path(),
        }
    }
}

impl KeyStateProbe for FsKeyStateProbe {
    fn current_key(&self) -> ProvisionResult<Option<String>> {
        query_firmware_key()
    }

    fn bin_present(&self) -> bool {
        self.bin_path.exists()
    }

    fn report_present(&self) -> bool {
        self.report_path.exists()
    }

    fn product_key_id(&self) -> ProvisionResult<Option<String>> {
        if !self.key_id_path.exists() {
            return Ok(None);
        }
        let document = std::fs::read_to_string(&self.key_id_path).map_err(|e| {
            ProvisionError::ProbeError(format!(
                "could not read {}: {e}",
                self.key_id_path.display()
            ))
        })?;
        Ok(parse_product_key_id(&document))
    }
}

static PRODUCT_KEY_ID_RE: OnceLock<Regex> = OnceLock::new();

/// Extract the product key id from the key-id document.
///
/// The first non-empty `ProductKeyID` element wins if multiple exist.
pub fn parse_product_key_id(document: &str) -> Option<String> {
    let re = PRODUCT_KEY_ID_RE.get_or_init(|| {
        Regex::new(r"<\s*ProductKeyID\s*>([^<]*)<\s*/\s*ProductKeyID\s*>")
            .expect("product key id pattern is valid")
    });

    re.captures_iter(document)
        .map(|cap| cap[1].trim().to_string())
        .find(|id| !id.is_empty())
}

/// Query the firmware license store for the injected activation key.
///
/// Only Windows machines carry a firmware license store; other platforms
/// report no key.
pub fn query_firmware_key() -> ProvisionResult<Option<String>> {
    #[cfg(target_os = "windows")]
    {
        query_windows_firmware_key()
    }
    #[cfg(not(target_os = "windows"))]
    {
        Ok(None)
    }
}

#[cfg(target_os = "windows")]
fn query_windows_firmware_key() -> ProvisionResult<Option<String>> {
    use std::process::Command;

    // SoftwareLicensingService exposes the OA3x original product key.
    let output = Command::new("powershell")
        .args([
            "-NoProfile",
            "-Command",
            "(Get-CimInstance -ClassName SoftwareLicensingService).OA3xOriginalProductKey",
        ])
        .output()
        .map_err(|e| ProvisionError::ProbeError(format!("firmware key query failed: {e}")))?;

    let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if key.is_empty() {
        Ok(None)
    } else {
        Ok(Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_extracts_key_id() {
        let doc = r#"<?xml version="1.0"?>
            <Keys>
                <Key><ProductKeyID>123456789012</ProductKeyID></Key>
            </Keys>"#;
        assert_eq!(parse_product_key_id(doc), Some("123456789012".to_string()));
    }

    #[test]
    fn parse_first_non_empty_wins() {
        let doc = "<ProductKeyID></ProductKeyID>\
                   <ProductKeyID>  </ProductKeyID>\
                   <ProductKeyID>987654</ProductKeyID>\
                   <ProductKeyID>111111</ProductKeyID>";
        assert_eq!(parse_product_key_id(doc), Some("987654".to_string()));
    }

    #[test]
    fn parse_trims_whitespace() {
        let doc = "<ProductKeyID>\n  424242  \n</ProductKeyID>";
        assert_eq!(parse_product_key_id(doc), Some("424242".to_string()));
    }

    #[test]
    fn parse_missing_element_is_none() {
        assert_eq!(parse_product_key_id("<Keys></Keys>"), None);
        assert_eq!(parse_product_key_id(""), None);
    }

    #[test]
    fn missing_artifacts_probe_as_absent() {
        let settings = ToolSettings::new(
            &crate::config::PathsConfig {
                data_dir: "/nonexistent/keysmith-test".to_string(),
                ..Default::default()
            },
            &crate::config::ScriptsConfig::default(),
        );
        let probe = FsKeyStateProbe::new(&settings);

        assert!(!probe.bin_present());
        assert!(!probe.report_present());
        assert_eq!(probe.product_key_id().unwrap(), None);
    }
}
