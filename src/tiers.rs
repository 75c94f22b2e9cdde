//! Tier classification for provisioned machines.
//!
//! The final license tier is a pure function of the detected base edition,
//! the hardware profile, and the processor predicates. Two CPU sets are in
//! play and they are intentionally different:
//!
//! - the *high-end* set (i9, Ryzen 9, i7, Ryzen 7, Threadripper) qualifies a
//!   Home machine for `HomeAdvanced`,
//! - the narrower *flagship* set (i9, Ryzen 9, Threadripper) is required for
//!   `ProAdvanced`.
//!
//! An i7 therefore upgrades Home but never Pro. This asymmetry is policy set
//! by the key server's stock keeping, not a bug.
//!
//! `Rdpk` is never derived here; it exists only for explicit operator
//! selection.

use serde::Serialize;

use crate::hardware::{BaseEdition, HardwareProfile};

/// Final license edition classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    None,
    Home,
    HomeAdvanced,
    Pro,
    ProAdvanced,
    Rdpk,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::None => "NONE",
            Tier::Home => "Home",
            Tier::HomeAdvanced => "HomeAdvanced",
            Tier::Pro => "Pro",
            Tier::ProAdvanced => "ProAdvanced",
            Tier::Rdpk => "RDPK",
        };
        write!(f, "{}", s)
    }
}

/// Markers that qualify a processor for an advanced key on the Home tier.
const HIGH_END_MARKERS: [&str; 5] = ["i9", "Ryzen 9", "i7", "Ryzen 7", "Threadripper"];

/// Markers that qualify a processor for an advanced key on the Pro tier.
const FLAGSHIP_MARKERS: [&str; 3] = ["i9", "Ryzen 9", "Threadripper"];

/// Whether the processor meets the broad advanced-key requirement.
pub fn is_high_end_cpu(processor_name: &str) -> bool {
    HIGH_END_MARKERS.iter().any(|m| processor_name.contains(m))
}

/// Whether the processor is in the flagship subset required for `ProAdvanced`.
pub fn is_flagship_cpu(processor_name: &str) -> bool {
    FLAGSHIP_MARKERS.iter().any(|m| processor_name.contains(m))
}

/// Classify the machine into its final tier.
///
/// Pure and deterministic. Rules in priority order, first match wins:
///
/// 1. Home + (high-end CPU | >8 GB memory | >1250 GB storage) → `HomeAdvanced`
/// 2. Pro + high-end CPU + flagship CPU → `ProAdvanced`
/// 3. Pro → `Pro`
/// 4. anything else → the base edition unchanged
pub fn classify(base: BaseEdition, hw: &HardwareProfile, is_high_end_cpu: bool) -> Tier {
    match base {
        BaseEdition::Home if is_high_end_cpu || hw.memory_gb > 8 || hw.storage_gb > 1250 => {
            Tier::HomeAdvanced
        }
        BaseEdition::Pro if is_high_end_cpu && is_flagship_cpu(&hw.processor_name) => {
            Tier::ProAdvanced
        }
        BaseEdition::Pro => Tier::Pro,
        BaseEdition::Home => Tier::Home,
        BaseEdition::None => Tier::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::Manufacturer;

    fn profile(memory_gb: u32, storage_gb: u32, processor: &str) -> HardwareProfile {
        HardwareProfile {
            manufacturer: Manufacturer::Msi,
            board_name: "B550".to_string(),
            memory_gb,
            storage_gb,
            processor_name: processor.to_string(),
        }
    }

    #[test]
    fn home_with_large_memory_is_advanced() {
        let hw = profile(16, 500, "Intel Core i5-12400");
        assert_eq!(classify(BaseEdition::Home, &hw, false), Tier::HomeAdvanced);
    }

    #[test]
    fn home_with_large_storage_is_advanced() {
        let hw = profile(8, 2000, "Intel Core i5-12400");
        assert_eq!(classify(BaseEdition::Home, &hw, false), Tier::HomeAdvanced);
    }

    #[test]
    fn home_with_high_end_cpu_is_advanced() {
        let hw = profile(8, 500, "Intel Core i7-12700K");
        let high_end = is_high_end_cpu(&hw.processor_name);
        assert!(high_end);
        assert_eq!(classify(BaseEdition::Home, &hw, high_end), Tier::HomeAdvanced);
    }

    #[test]
    fn modest_home_machine_stays_home() {
        let hw = profile(4, 500, "Intel Core i5-10400");
        assert_eq!(classify(BaseEdition::Home, &hw, false), Tier::Home);
    }

    #[test]
    fn pro_with_flagship_cpu_is_advanced() {
        let hw = profile(32, 2000, "AMD Ryzen 9 5900X");
        assert_eq!(classify(BaseEdition::Pro, &hw, true), Tier::ProAdvanced);

        let hw = profile(64, 4000, "AMD Ryzen Threadripper 3970X");
        assert_eq!(classify(BaseEdition::Pro, &hw, true), Tier::ProAdvanced);
    }

    #[test]
    fn pro_with_i7_stays_pro() {
        // i7 is high-end (would upgrade Home) but not flagship, so Pro
        // machines keep the plain Pro tier.
        let hw = profile(32, 2000, "Intel Core i7-13700K");
        assert!(is_high_end_cpu(&hw.processor_name));
        assert!(!is_flagship_cpu(&hw.processor_name));
        assert_eq!(classify(BaseEdition::Pro, &hw, true), Tier::Pro);
    }

    #[test]
    fn pro_without_high_end_cpu_stays_pro() {
        let hw = profile(8, 500, "Intel Core i5-12400");
        assert_eq!(classify(BaseEdition::Pro, &hw, false), Tier::Pro);
    }

    #[test]
    fn none_stays_none() {
        let hw = profile(64, 4000, "AMD Ryzen 9 7950X");
        assert_eq!(classify(BaseEdition::None, &hw, true), Tier::None);
    }

    #[test]
    fn classification_is_deterministic() {
        let hw = profile(16, 1500, "Intel Core i9-13900K");
        let first = classify(BaseEdition::Pro, &hw, true);
        for _ in 0..10 {
            assert_eq!(classify(BaseEdition::Pro, &hw, true), first);
        }
    }

    #[test]
    fn high_end_set_is_broader_than_flagship_set() {
        for name in ["Core i7", "Ryzen 7 5800X"] {
            assert!(is_high_end_cpu(name));
            assert!(!is_flagship_cpu(name));
        }
        for name in ["Core i9", "Ryzen 9 7900X", "Threadripper PRO"] {
            assert!(is_high_end_cpu(name));
            assert!(is_flagship_cpu(name));
        }
    }
}
