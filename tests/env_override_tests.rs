use serial_test::serial;

use keysmith::config::init_config;

// These tests live in their own binary: the config singleton is populated on
// first access, so the overrides must be in the environment before any other
// test touches it.

#[test]
#[serial]
fn env_overrides_reach_scripts_and_paths() {
    std::env::set_var("KEYSMITH_SCRIPT_ASSEMBLE", "assemble-alt.cmd");
    std::env::set_var("KEYSMITH_SCRIPT_UPLOAD_REPORT", "uploadReport-alt.cmd");
    std::env::set_var("KEYSMITH_TOOL_DIR", "Tools");

    let config = init_config().expect("config with overrides must validate");
    assert_eq!(config.scripts.assemble, "assemble-alt.cmd");
    assert_eq!(config.scripts.upload_report, "uploadReport-alt.cmd");
    assert_eq!(config.paths.tool_dir, "Tools");
    // Untouched fields keep their defaults.
    assert_eq!(config.scripts.report, "pcloa3report.cmd");

    std::env::remove_var("KEYSMITH_SCRIPT_ASSEMBLE");
    std::env::remove_var("KEYSMITH_SCRIPT_UPLOAD_REPORT");
    std::env::remove_var("KEYSMITH_TOOL_DIR");
}
