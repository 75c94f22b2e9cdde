use keysmith::config::init_config;
use keysmith::errors::{ProvisionError, ProvisionResult};
use keysmith::hardware::{collect_inventory, os_version_from_build, BaseEdition, HardwareProfile};
use keysmith::lifecycle::{Collaborators, KeyLifecycle, TransitionReport};
use keysmith::session::SessionState;
use keysmith::tiers::{classify, is_high_end_cpu, Tier};
use keysmith::tools::ToolSettings;

/// Thin command-line driver for the provisioning lifecycle.
///
/// Builds the hardware profile, classifies the tier, initializes the
/// session, and runs the single requested transition. The caller (operator
/// or wrapping script) serializes invocations; the lifecycle itself never
/// has two transitions in flight.
///
/// Usage:
///   keysmith status
///   keysmith inject-new <order> [rdpk]
///   keysmith inject-old <order>
///   keysmith report <order>
///   keysmith return <order>
///   keysmith upload-logs <order>
///   keysmith clear
#[tokio::main]
async fn main() -> ProvisionResult<()> {
    let config = init_config()?;
    if config.logging.enabled {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("status");
    let order = args.get(1).cloned().unwrap_or_default();

    let inventory = collect_inventory();
    let profile = HardwareProfile::from_inventory(&inventory);
    let base = BaseEdition::from_edition_id(&inventory.edition_id);
    let tier = if args.get(2).map(String::as_str) == Some("rdpk") {
        // RDPK is never auto-derived, only selected explicitly.
        Tier::Rdpk
    } else {
        classify(base, &profile, is_high_end_cpu(&profile.processor_name))
    };
    let os_version = os_version_from_build(inventory.os_build);

    let settings = ToolSettings::from_config()?;
    let collaborators = Collaborators::system(&settings);

    let mut session = SessionState::new(order.clone());
    session.test_mode = config.behavior.test_mode;
    session.interactive = config.behavior.interactive;
    session.reboot_after_inject = config.behavior.reboot_after_inject;
    session.suppress_reboot_prompt = config.behavior.suppress_reboot_prompt;

    let mut lifecycle = KeyLifecycle::new(
        profile.clone(),
        tier,
        os_version,
        session,
        settings,
        collaborators,
    );
    lifecycle.initialize().await?;

    let report = match command {
        "status" => {
            if args.get(1).map(String::as_str) == Some("json") {
                let status = serde_json::json!({
                    "profile": profile,
                    "tier": tier,
                    "state": lifecycle.state(),
                    "session": lifecycle.session(),
                });
                println!("{}", serde_json::to_string_pretty(&status).unwrap_or_default());
                return Ok(());
            }
            println!("board:     {} ({})", profile.board_name, profile.manufacturer);
            println!("processor: {}", profile.processor_name);
            println!(
                "memory:    {} GB, storage: {} GB",
                profile.memory_gb, profile.storage_gb
            );
            println!("tier:      {tier}");
            println!("state:     {}", lifecycle.state());
            if let Some(key) = &lifecycle.session().activation_key {
                println!("key:       {key}");
            }
            if let Some(id) = &lifecycle.session().product_key_id {
                println!("key id:    {id}");
            }
            return Ok(());
        }
        "inject-new" => {
            require_order(command, &order)?;
            lifecycle.inject_new(&profile, tier, &order).await?
        }
        "inject-old" => {
            require_order(command, &order)?;
            lifecycle.inject_old(&profile, &order).await?
        }
        "report" => {
            require_order(command, &order)?;
            lifecycle.report(&order).await?
        }
        "return" => {
            require_order(command, &order)?;
            lifecycle.return_key(&order).await?
        }
        "upload-logs" => {
            require_order(command, &order)?;
            lifecycle.upload_logs(&order).await?
        }
        "clear" => lifecycle.clear(&profile).await?,
        other => {
            eprintln!("unknown command '{other}'");
            eprintln!("commands: status, inject-new, inject-old, report, return, upload-logs, clear");
            std::process::exit(2);
        }
    };

    print_report(command, &report);
    Ok(())
}

fn require_order(command: &str, order: &str) -> ProvisionResult<()> {
    if order.is_empty() {
        return Err(ProvisionError::ConfigError(format!(
            "'{command}' requires an order id"
        )));
    }
    Ok(())
}

fn print_report(command: &str, report: &TransitionReport) {
    if !report.invoked {
        println!("{command}: skipped (guard not met)");
        return;
    }
    if report.completed() {
        println!("{command}: ok");
        return;
    }
    println!("{command}: completed with issues:");
    for issue in &report.issues {
        println!("  - {issue}");
    }
}
