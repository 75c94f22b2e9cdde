//! Hardware inventory model.
//!
//! The raw platform queries (WMI, registry, drive enumeration) live behind
//! the inventory collaborator; this module owns the *shape* of that data and
//! the normalization rules applied to it:
//!
//! - baseboard manufacturer strings are matched against known vendor markers,
//! - board names are sanitized for use as script arguments,
//! - processor names are truncated at the clock-speed suffix,
//! - memory is rounded up to whole gigabytes, storage summed over ready
//!   volumes.

use serde::Serialize;

/// Baseboard manufacturers with a dedicated injection tool.
///
/// `AsusZ690` and `Sager` have no raw-string marker and are only reachable
/// through explicit operator selection. Anything unrecognized stays `None`
/// and is treated as MSI-compatible at tool-resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Manufacturer {
    None,
    AsRock,
    Asus,
    AsusZ690,
    Gigabyte,
    Msi,
    Sager,
    SagerH2O,
    TongFang,
}

impl Manufacturer {
    /// Match a raw baseboard manufacturer string against known markers.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            s if s.contains("ASRock") => Manufacturer::AsRock,
            s if s.contains("ASUS") => Manufacturer::Asus,
            s if s.contains("Gigabyte") => Manufacturer::Gigabyte,
            s if s.contains("Micro") => Manufacturer::Msi,
            s if s.contains("Notebook") => Manufacturer::SagerH2O,
            s if s.contains("THTF") => Manufacturer::TongFang,
            _ => Manufacturer::None,
        }
    }
}

impl std::fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Manufacturer::None => "NONE",
            Manufacturer::AsRock => "ASROCK",
            Manufacturer::Asus => "ASUS",
            Manufacturer::AsusZ690 => "ASUSZ690",
            Manufacturer::Gigabyte => "GIGABYTE",
            Manufacturer::Msi => "MSI",
            Manufacturer::Sager => "SAGER",
            Manufacturer::SagerH2O => "SAGERH2O",
            Manufacturer::TongFang => "TONGFANG",
        };
        write!(f, "{}", s)
    }
}

/// Edition detected on the machine before tier classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BaseEdition {
    None,
    Home,
    Pro,
}

impl BaseEdition {
    /// Derive the base edition from the OS edition-id string.
    pub fn from_edition_id(edition_id: &str) -> Self {
        match edition_id {
            s if s.contains("Core") => BaseEdition::Home,
            s if s.contains("Pro") => BaseEdition::Pro,
            _ => BaseEdition::None,
        }
    }
}

/// One volume as reported by the inventory collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VolumeInfo {
    /// Whether the volume was mounted and readable at probe time.
    pub ready: bool,
    /// Total volume size in bytes.
    pub total_bytes: u64,
}

/// Raw inventory snapshot as the platform collaborator hands it over.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawInventory {
    /// Baseboard manufacturer string, verbatim.
    pub manufacturer: String,
    /// Baseboard product string, verbatim.
    pub board_product: String,
    /// Total physical memory in bytes.
    pub memory_bytes: u64,
    /// All volumes seen at probe time.
    pub volumes: Vec<VolumeInfo>,
    /// Processor name string, verbatim.
    pub processor_name: String,
    /// OS build number.
    pub os_build: u32,
    /// OS edition-id string from the registry.
    pub edition_id: String,
}

/// Immutable snapshot of the hardware facts the classifier and the tool
/// resolver consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareProfile {
    pub manufacturer: Manufacturer,
    /// Sanitized baseboard product name, safe to pass as a script argument.
    pub board_name: String,
    /// Physical memory in gigabytes, rounded up.
    pub memory_gb: u32,
    /// Sum of ready volume sizes in gigabytes.
    pub storage_gb: u32,
    /// Processor name, truncated at '@' if present.
    pub processor_name: String,
}

impl HardwareProfile {
    /// Build a profile from a raw inventory snapshot.
    pub fn from_inventory(inventory: &RawInventory) -> Self {
        let storage_bytes: u64 = inventory
            .volumes
            .iter()
            .filter(|v| v.ready)
            .map(|v| v.total_bytes)
            .sum();

        Self {
            manufacturer: Manufacturer::from_raw(&inventory.manufacturer),
            board_name: sanitize_board_name(&inventory.board_product),
            memory_gb: ceil_gb(inventory.memory_bytes),
            storage_gb: (storage_bytes / GIB) as u32,
            processor_name: truncate_processor_name(&inventory.processor_name),
        }
    }
}

const GIB: u64 = 1024 * 1024 * 1024;

fn ceil_gb(bytes: u64) -> u32 {
    bytes.div_ceil(GIB) as u32
}

/// Sanitize a baseboard product string for use in a command line.
///
/// Spaces, commas, and slashes are stripped, then any trailing parenthetical
/// suffix is truncated. Idempotent: sanitizing a sanitized name is a no-op.
pub fn sanitize_board_name(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | ',' | '/' | '\\'))
        .collect();

    match stripped.find('(') {
        Some(idx) => stripped[..idx].to_string(),
        None => stripped,
    }
}

/// Truncate a processor name at the clock-speed suffix ("... @ 3.60GHz").
pub fn truncate_processor_name(raw: &str) -> String {
    match raw.find('@') {
        Some(idx) => raw[..idx].to_string(),
        None => raw.to_string(),
    }
}

/// Derive the marketing OS version from the build number.
pub fn os_version_from_build(build: u32) -> &'static str {
    if build >= 22000 {
        "11"
    } else {
        "10"
    }
}

/// Collect a raw inventory snapshot from the running machine.
///
/// The real platform queries are the inventory collaborator's concern; these
/// per-OS bodies are placeholders that callers replace with their own
/// instrumentation (or feed a [`RawInventory`] built elsewhere).
pub fn collect_inventory() -> RawInventory {
    #[cfg(target_os = "windows")]
    {
        collect_windows_inventory()
    }
    #[cfg(target_os = "macos")]
    {
        collect_macos_inventory()
    }
    #[cfg(target_os = "linux")]
    {
        collect_linux_inventory()
    }
}

/// Placeholder implementation for Windows
#[cfg(target_os = "windows")]
fn collect_windows_inventory() -> RawInventory {
    RawInventory::default()
}

/// Placeholder implementation for macOS
#[cfg(target_os = "macos")]
fn collect_macos_inventory() -> RawInventory {
    RawInventory::default()
}

/// Placeholder implementation for Linux
#[cfg(target_os = "linux")]
fn collect_linux_inventory() -> RawInventory {
    RawInventory::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manufacturer_from_raw_matches_markers() {
        assert_eq!(Manufacturer::from_raw("ASRock Inc."), Manufacturer::AsRock);
        assert_eq!(
            Manufacturer::from_raw("ASUSTeK COMPUTER INC. (ASUS)"),
            Manufacturer::Asus
        );
        assert_eq!(
            Manufacturer::from_raw("Gigabyte Technology Co."),
            Manufacturer::Gigabyte
        );
        assert_eq!(
            Manufacturer::from_raw("Micro-Star International"),
            Manufacturer::Msi
        );
        assert_eq!(Manufacturer::from_raw("Notebook"), Manufacturer::SagerH2O);
        assert_eq!(Manufacturer::from_raw("THTF"), Manufacturer::TongFang);
    }

    #[test]
    fn manufacturer_defaults_to_none() {
        assert_eq!(Manufacturer::from_raw("Dell Inc."), Manufacturer::None);
        assert_eq!(Manufacturer::from_raw(""), Manufacturer::None);
    }

    #[test]
    fn base_edition_from_edition_id() {
        assert_eq!(BaseEdition::from_edition_id("Core"), BaseEdition::Home);
        assert_eq!(
            BaseEdition::from_edition_id("CoreSingleLanguage"),
            BaseEdition::Home
        );
        assert_eq!(BaseEdition::from_edition_id("Professional"), BaseEdition::Pro);
        assert_eq!(BaseEdition::from_edition_id("Enterprise"), BaseEdition::None);
    }

    #[test]
    fn sanitize_strips_parenthetical_suffix() {
        assert_eq!(sanitize_board_name("B550 (MS-7C56)"), "B550");
    }

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_board_name("Z690-A, Pro/Gaming"), "Z690-AProGaming");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_board_name("PRIME B650M-A WIFI (rev 1.0)");
        let twice = sanitize_board_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn processor_name_truncated_at_clock_speed() {
        assert_eq!(
            truncate_processor_name("Intel(R) Core(TM) i7-12700K CPU @ 3.60GHz"),
            "Intel(R) Core(TM) i7-12700K CPU "
        );
        assert_eq!(truncate_processor_name("AMD Ryzen 9 5900X"), "AMD Ryzen 9 5900X");
    }

    #[test]
    fn memory_rounds_up_to_whole_gigabytes() {
        let inventory = RawInventory {
            memory_bytes: 16 * GIB - 512 * 1024 * 1024,
            ..Default::default()
        };
        assert_eq!(HardwareProfile::from_inventory(&inventory).memory_gb, 16);
    }

    #[test]
    fn storage_sums_only_ready_volumes() {
        let inventory = RawInventory {
            volumes: vec![
                VolumeInfo {
                    ready: true,
                    total_bytes: 500 * GIB,
                },
                VolumeInfo {
                    ready: false,
                    total_bytes: 1000 * GIB,
                },
                VolumeInfo {
                    ready: true,
                    total_bytes: 1000 * GIB,
                },
            ],
            ..Default::default()
        };
        assert_eq!(HardwareProfile::from_inventory(&inventory).storage_gb, 1500);
    }

    #[test]
    fn os_version_boundary() {
        assert_eq!(os_version_from_build(22000), "11");
        assert_eq!(os_version_from_build(21999), "10");
        assert_eq!(os_version_from_build(19045), "10");
    }
}
