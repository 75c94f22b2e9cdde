//! Keysmith - OEM activation key provisioning for factory floors
//!
//! Keysmith drives vendor injection tools through a small state machine:
//! it classifies a machine into a license tier from detected hardware,
//! resolves which vendor tool to invoke, and tracks the pull → inject →
//! report lifecycle of the activation key, validating state after every
//! transition.
//!
//! # Example
//!
//! ```rust,ignore
//! use keysmith::hardware::{collect_inventory, BaseEdition, HardwareProfile};
//! use keysmith::lifecycle::{Collaborators, KeyLifecycle};
//! use keysmith::session::SessionState;
//! use keysmith::tiers::{classify, is_high_end_cpu};
//! use keysmith::tools::ToolSettings;
//!
//! let inventory = collect_inventory();
//! let profile = HardwareProfile::from_inventory(&inventory);
//! let base = BaseEdition::from_edition_id(&inventory.edition_id);
//! let tier = classify(base, &profile, is_high_end_cpu(&profile.processor_name));
//!
//! let settings = ToolSettings::from_config()?;
//! let collaborators = Collaborators::system(&settings);
//! let mut lifecycle = KeyLifecycle::new(
//!     profile.clone(), tier, "11", SessionState::new("WO-1234"), settings, collaborators,
//! );
//! lifecycle.initialize().await?;
//! let report = lifecycle.inject_new(&profile, tier, "WO-1234").await?;
//! ```

pub mod audit;
pub mod config;
pub mod errors;
pub mod hardware;
pub mod lifecycle;
pub mod probes;
pub mod process;
pub mod session;
pub mod tiers;
pub mod tools;
