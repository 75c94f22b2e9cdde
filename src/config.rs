//! Configuration system for keysmith.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `KEYSMITH_TOOL_DIR` - Directory holding the vendor injection tools
//! - `KEYSMITH_DATA_DIR` - Directory holding key artifacts (bin/xml/report)
//! - `KEYSMITH_AUDIT_LOG` - Path of the append-only CSV audit log
//! - `KEYSMITH_SCRIPT_ASSEMBLE` - Assemble script name (inside the tool dir)
//! - `KEYSMITH_SCRIPT_REPORT` - Report script name
//! - `KEYSMITH_SCRIPT_RETURN` - Return script name
//! - `KEYSMITH_SCRIPT_UPLOAD_ASSEMBLE` - Assemble-log upload script name
//! - `KEYSMITH_SCRIPT_UPLOAD_REPORT` - Report upload script name
//! - `KEYSMITH_TEST_MODE` - Pull the staged test bin instead of a live key
//! - `KEYSMITH_INTERACTIVE` - Keep the vendor tool console open
//! - `KEYSMITH_REBOOT_AFTER_INJECT` - Reboot once injection completes
//! - `KEYSMITH_SUPPRESS_REBOOT_PROMPT` - Skip the yes/no prompt before the
//!   mandatory post-clear reboot
//! - `KEYSMITH_LOGGING_ENABLED` - Enable structured logging
//! - `KEYSMITH_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{ProvisionError, ProvisionResult};

/// Global configuration singleton.
static CONFIG: OnceLock<KeysmithConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeysmithConfig {
    /// Tool and artifact locations
    pub paths: PathsConfig,
    /// Vendor script names
    pub scripts: ScriptsConfig,
    /// Operator behavior flags
    pub behavior: BehaviorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Tool and artifact locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the vendor injection tools and scripts
    pub tool_dir: String,
    /// Directory the vendor tools stage key artifacts into
    pub data_dir: String,
    /// Append-only CSV audit log
    pub audit_log: String,
    /// Staged key container file name (inside `data_dir`)
    pub bin_file: String,
    /// Product-key-id document file name (inside `data_dir`)
    pub key_id_file: String,
    /// Report artifact file name (inside `data_dir`)
    pub report_file: String,
    /// Test key container file name (inside `tool_dir`)
    pub test_bin_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tool_dir: "OA30".to_string(),
            data_dir: "C:/Temp/Data".to_string(),
            audit_log: "InjectionLogs.csv".to_string(),
            bin_file: "oa3.bin".to_string(),
            key_id_file: "oa3.xml".to_string(),
            report_file: "Report.xml".to_string(),
            test_bin_file: "OA3.bin".to_string(),
        }
    }
}

/// Vendor script names, resolved relative to `paths.tool_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Script that pulls a key from the server and injects it
    pub assemble: String,
    /// Script that confirms key consumption to the license server
    pub report: String,
    /// Script that returns an unreported pulled key
    pub return_key: String,
    /// Script that uploads the assemble log
    pub upload_assemble: String,
    /// Script that uploads the report artifact
    pub upload_report: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            assemble: "pcloa3assemble11.cmd".to_string(),
            report: "pcloa3report.cmd".to_string(),
            return_key: "pcloa3return.cmd".to_string(),
            upload_assemble: "uploadAssemble.cmd".to_string(),
            upload_report: "uploadReport.cmd".to_string(),
        }
    }
}

/// Operator behavior flags. These seed the session; the operator can still
/// flip them per session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Inject the staged test bin instead of pulling a live key
    pub test_mode: bool,
    /// Keep the vendor tool console open for the operator
    pub interactive: bool,
    /// Reboot once injection completes
    pub reboot_after_inject: bool,
    /// Skip the confirmation prompt before the mandatory post-clear reboot
    pub suppress_reboot_prompt: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

impl KeysmithConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    fn load() -> ProvisionResult<Self> {
        let defaults = PathsConfig::default();
        let scripts = ScriptsConfig::default();

        let builder = Config::builder()
            // Start with defaults
            .set_default("paths.tool_dir", defaults.tool_dir)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("paths.data_dir", defaults.data_dir)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("paths.audit_log", defaults.audit_log)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("paths.bin_file", defaults.bin_file)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("paths.key_id_file", defaults.key_id_file)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("paths.report_file", defaults.report_file)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("paths.test_bin_file", defaults.test_bin_file)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("scripts.assemble", scripts.assemble)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("scripts.report", scripts.report)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("scripts.return_key", scripts.return_key)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("scripts.upload_assemble", scripts.upload_assemble)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("scripts.upload_report", scripts.upload_report)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("behavior.test_mode", false)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("behavior.interactive", false)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("behavior.reboot_after_inject", false)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("behavior.suppress_reboot_prompt", false)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("logging.enabled", true)
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_default("logging.level", "info")
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("paths.tool_dir", env::var("KEYSMITH_TOOL_DIR").ok())
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option("paths.data_dir", env::var("KEYSMITH_DATA_DIR").ok())
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option("paths.audit_log", env::var("KEYSMITH_AUDIT_LOG").ok())
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option("scripts.assemble", env::var("KEYSMITH_SCRIPT_ASSEMBLE").ok())
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option("scripts.report", env::var("KEYSMITH_SCRIPT_REPORT").ok())
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option("scripts.return_key", env::var("KEYSMITH_SCRIPT_RETURN").ok())
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option(
                "scripts.upload_assemble",
                env::var("KEYSMITH_SCRIPT_UPLOAD_ASSEMBLE").ok(),
            )
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option(
                "scripts.upload_report",
                env::var("KEYSMITH_SCRIPT_UPLOAD_REPORT").ok(),
            )
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option(
                "behavior.test_mode",
                env::var("KEYSMITH_TEST_MODE")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option(
                "behavior.interactive",
                env::var("KEYSMITH_INTERACTIVE")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option(
                "behavior.reboot_after_inject",
                env::var("KEYSMITH_REBOOT_AFTER_INJECT")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option(
                "behavior.suppress_reboot_prompt",
                env::var("KEYSMITH_SUPPRESS_REBOOT_PROMPT")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option(
                "logging.enabled",
                env::var("KEYSMITH_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?
            .set_override_option("logging.level", env::var("KEYSMITH_LOG_LEVEL").ok())
            .map_err(|e| ProvisionError::ConfigError(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| ProvisionError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| ProvisionError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ProvisionResult<()> {
        if self.paths.tool_dir.is_empty() {
            return Err(ProvisionError::ConfigError(
                "paths.tool_dir cannot be empty".to_string(),
            ));
        }
        if self.paths.data_dir.is_empty() {
            return Err(ProvisionError::ConfigError(
                "paths.data_dir cannot be empty".to_string(),
            ));
        }
        if self.paths.audit_log.is_empty() {
            return Err(ProvisionError::ConfigError(
                "paths.audit_log cannot be empty".to_string(),
            ));
        }

        for (field, value) in [
            ("scripts.assemble", &self.scripts.assemble),
            ("scripts.report", &self.scripts.report),
            ("scripts.return_key", &self.scripts.return_key),
            ("scripts.upload_assemble", &self.scripts.upload_assemble),
            ("scripts.upload_report", &self.scripts.upload_report),
        ] {
            if value.is_empty() {
                return Err(ProvisionError::ConfigError(format!(
                    "{field} cannot be empty"
                )));
            }
        }

        // Validate log level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ProvisionError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> ProvisionResult<&'static KeysmithConfig> {
    // Check if already initialized
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    // Load and validate configuration
    let config = KeysmithConfig::load()?;
    config.validate()?;

    // Try to set it (ignore if another thread beat us)
    let _ = CONFIG.set(config.clone());

    // Return the stored config (either ours or another thread's)
    Ok(CONFIG.get().expect("config was just set"))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
/// Returns the validated configuration.
pub fn init_config() -> ProvisionResult<&'static KeysmithConfig> {
    get_config()
}

/// Check whether logging is enabled.
pub fn is_logging_enabled() -> bool {
    get_config().map(|c| c.logging.enabled).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_vendor_layout() {
        let config = KeysmithConfig {
            paths: PathsConfig::default(),
            scripts: ScriptsConfig::default(),
            behavior: BehaviorConfig::default(),
            logging: LoggingConfig::default(),
        };

        assert_eq!(config.paths.tool_dir, "OA30");
        assert_eq!(config.paths.bin_file, "oa3.bin");
        assert_eq!(config.scripts.assemble, "pcloa3assemble11.cmd");
        assert!(!config.behavior.test_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_empty_tool_dir() {
        let config = KeysmithConfig {
            paths: PathsConfig {
                tool_dir: String::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_bad_log_level() {
        let config = KeysmithConfig {
            logging: LoggingConfig {
                enabled: true,
                level: "verbose".to_string(),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
