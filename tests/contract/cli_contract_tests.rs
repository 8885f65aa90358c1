//! CLI contract tests for stacksnap argument handling and exit codes.

use std::path::Path;

use stacksnap::Error;
use tempfile::tempdir;

const NO_CONFIG: &str = "/no/such/stacksnap/config.toml";

fn expect_error(args: &[&str], expected: Error) -> i32 {
    let err = stacksnap::run(args.iter().copied()).expect_err("command should fail");
    let actual = err
        .downcast_ref::<Error>()
        .unwrap_or_else(|| panic!("unexpected error type: {err:?}"));
    assert_eq!(
        std::mem::discriminant(actual),
        std::mem::discriminant(&expected),
        "got {actual:?}"
    );
    stacksnap::exit_code_for(&err)
}

fn add_unit(root: &Path, name: &str) {
    std::fs::create_dir_all(root.join(name)).unwrap();
    std::fs::write(root.join(name).join("compose.yaml"), "services: {}\n").unwrap();
}

fn selection(root: &Path) -> String {
    std::fs::read_to_string(root.join(".stacksnap/selection.conf")).unwrap()
}

#[test]
fn missing_config_without_root_is_a_configuration_error() {
    let code = expect_error(
        &["stacksnap", "--config", NO_CONFIG, "sync"],
        Error::Config(String::new()),
    );
    assert_eq!(stacksnap::EXIT_CONFIG, code);
}

#[test]
fn missing_backup_root_is_a_validation_error() {
    let code = expect_error(
        &["stacksnap", "--config", NO_CONFIG, "--root", "/no/such/root", "sync"],
        Error::InvalidRoot(String::new()),
    );
    assert_eq!(stacksnap::EXIT_VALIDATION, code);
}

#[test]
fn run_without_repository_fails_before_touching_anything() {
    let root = tempdir().unwrap();
    add_unit(root.path(), "app1");

    let code = expect_error(
        &[
            "stacksnap",
            "--config",
            NO_CONFIG,
            "--root",
            root.path().to_str().unwrap(),
        ],
        Error::Config(String::new()),
    );
    assert_eq!(stacksnap::EXIT_CONFIG, code);
    assert!(!root.path().join(".stacksnap").exists());
}

#[test]
fn sync_then_enable_then_disable() -> stacksnap::Result<()> {
    let root = tempdir()?;
    add_unit(root.path(), "app1");
    add_unit(root.path(), "app2");
    let root_arg = root.path().to_str().unwrap();

    let code = stacksnap::run(["stacksnap", "--config", NO_CONFIG, "--root", root_arg, "sync"])?;
    assert_eq!(stacksnap::EXIT_OK, code);
    assert_eq!("app1=false\napp2=false\n", selection(root.path()));

    stacksnap::run([
        "stacksnap", "--config", NO_CONFIG, "--root", root_arg, "enable", "app1", "app2",
    ])?;
    assert_eq!("app1=true\napp2=true\n", selection(root.path()));

    stacksnap::run([
        "stacksnap", "--config", NO_CONFIG, "--root", root_arg, "disable", "app2",
    ])?;
    assert_eq!("app1=true\napp2=false\n", selection(root.path()));

    // The guard file never outlives a command.
    assert!(!root.path().join(".stacksnap/run.pid").exists());
    Ok(())
}

#[test]
fn enable_rejects_unknown_units_without_partial_updates() -> stacksnap::Result<()> {
    let root = tempdir()?;
    add_unit(root.path(), "app1");
    let root_arg = root.path().to_str().unwrap();
    stacksnap::run(["stacksnap", "--config", NO_CONFIG, "--root", root_arg, "sync"])?;

    let code = expect_error(
        &[
            "stacksnap", "--config", NO_CONFIG, "--root", root_arg, "enable", "app1", "ghost",
        ],
        Error::UnknownUnit(String::new()),
    );
    assert_eq!(stacksnap::EXIT_VALIDATION, code);
    assert_eq!("app1=false\n", selection(root.path()));
    Ok(())
}

#[test]
fn enable_before_first_sync_is_a_validation_error() {
    let root = tempdir().unwrap();
    add_unit(root.path(), "app1");

    expect_error(
        &[
            "stacksnap",
            "--config",
            NO_CONFIG,
            "--root",
            root.path().to_str().unwrap(),
            "enable",
            "app1",
        ],
        Error::Validation(String::new()),
    );
}

#[test]
fn dry_run_writes_a_summary_and_changes_no_services() -> stacksnap::Result<()> {
    let root = tempdir()?;
    add_unit(root.path(), "app1");
    std::fs::create_dir_all(root.path().join(".stacksnap"))?;
    std::fs::write(root.path().join(".stacksnap/selection.conf"), "app1=true\n")?;

    let config_dir = tempdir()?;
    let config = config_dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "[paths]\nroot = {:?}\n\n[snapshot]\nrepository = \"/srv/restic\"\n",
            root.path()
        ),
    )?;
    let summary = config_dir.path().join("summary.json");

    let code = stacksnap::run([
        "stacksnap",
        "--config",
        config.to_str().unwrap(),
        "--dry-run",
        "run",
        "--summary",
        summary.to_str().unwrap(),
    ])?;

    assert_eq!(stacksnap::EXIT_OK, code);
    let report: serde_json::Value = serde_json::from_slice(&std::fs::read(&summary)?)?;
    assert_eq!(true, report["dry_run"]);
    assert_eq!("planned", report["units"][0]["outcome"]);
    assert_eq!("unknown", report["units"][0]["initial_state"]);
    Ok(())
}

#[test]
fn help_lists_global_flags_and_commands() {
    let cmd = stacksnap::cli::clap_command();
    let args: Vec<_> = cmd.get_arguments().map(|a| a.get_id().to_string()).collect();
    for flag in ["config", "root", "verbose", "dry_run"] {
        assert!(args.iter().any(|a| a == flag), "missing --{flag}");
    }
    let commands: Vec<_> = cmd.get_subcommands().map(|c| c.get_name().to_string()).collect();
    for name in ["run", "sync", "list", "enable", "disable"] {
        assert!(commands.iter().any(|c| c == name), "missing `{name}` command");
    }
}

#[test]
fn flags_are_accepted_without_a_subcommand() {
    let parsed = stacksnap::cli::parse_args(["stacksnap", "-v", "--dry-run"]).unwrap();
    assert!(parsed.global.verbose);
    assert!(parsed.global.dry_run);
    assert!(matches!(parsed.command, stacksnap::cli::Command::Run(_)));
}

#[test]
fn enable_requires_at_least_one_unit() {
    let code = expect_error(&["stacksnap", "enable"], Error::Usage(String::new()));
    assert_eq!(stacksnap::EXIT_CONFIG, code);
}

#[test]
fn unknown_flag_is_a_usage_error_not_a_validation_error() {
    let code = expect_error(&["stacksnap", "--bogus"], Error::Usage(String::new()));
    assert_eq!(stacksnap::EXIT_CONFIG, code);
    assert_ne!(stacksnap::EXIT_VALIDATION, code);

    let err = stacksnap::cli::parse_args(["stacksnap", "list", "--format", "yaml"])
        .expect_err("invalid value");
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::Usage(msg)) if msg.contains("yaml")
    ));
}

#[test]
fn help_and_version_exit_zero() -> stacksnap::Result<()> {
    assert_eq!(stacksnap::EXIT_OK, stacksnap::run(["stacksnap", "--help"])?);
    assert_eq!(stacksnap::EXIT_OK, stacksnap::run(["stacksnap", "sync", "--help"])?);
    assert_eq!(stacksnap::EXIT_OK, stacksnap::run(["stacksnap", "--version"])?);

    let err = stacksnap::cli::parse_args(["stacksnap", "--help"]).expect_err("help is not a command");
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::Help(text)) if text.contains("--dry-run")
    ));
    Ok(())
}
