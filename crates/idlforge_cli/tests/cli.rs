use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use insta_cmd::assert_cmd_snapshot;
use serde_json::Value;
use tempfile::TempDir;

fn fixtures() -> PathBuf {
	Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// A scratch directory holding the fixture documents and `pipeline.json`.
fn workspace() -> TempDir {
	let dir = tempfile::tempdir().unwrap_or_else(|error| panic!("failed to create tempdir: {error}"));
	for name in ["counter.json", "pipeline.json"] {
		fs::copy(fixtures().join(name), dir.path().join(name))
			.unwrap_or_else(|error| panic!("failed to copy {name}: {error}"));
	}
	dir
}

fn idlforge(dir: &Path) -> Command {
	let mut command = Command::new(env!("CARGO_BIN_EXE_idlforge"));
	command
		.current_dir(dir)
		.env_remove("RUST_LOG")
		.env_remove("FORCE_COLOR")
		.env_remove("CLICOLOR_FORCE");
	command
}

fn run(command: &mut Command) -> Output {
	command
		.output()
		.unwrap_or_else(|error| panic!("failed to run idlforge: {error}"))
}

fn stdout(output: &Output) -> String {
	String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
	String::from_utf8_lossy(&output.stderr).into_owned()
}

fn inspect_json(dir: &Path, extra: &[&str]) -> Value {
	let output = run(idlforge(dir).args(["inspect", "--config", "pipeline.json"]).args(extra));
	assert!(output.status.success(), "inspect failed: {}", stderr(&output));
	serde_json::from_slice(&output.stdout).unwrap_or_else(|error| panic!("inspect printed invalid JSON: {error}"))
}

#[test]
fn generate_renders_every_configured_target() {
	let dir = workspace();
	let output = run(idlforge(dir.path()).args(["generate", "--config", "pipeline.json"]));
	assert!(output.status.success(), "generate failed: {}", stderr(&output));

	let printed = stdout(&output);
	assert!(printed.lines().any(|line| line.starts_with("ok rust -> ")));
	assert!(printed.lines().any(|line| line.starts_with("ok codama -> ")));
	assert!(dir.path().join("out/rust/instructions/create.rs").is_file());
	assert!(dir.path().join("out/idl/counter.json").is_file());
}

#[test]
fn second_generate_writes_nothing() {
	let dir = workspace();
	let first = run(idlforge(dir.path()).args(["generate", "--config", "pipeline.json"]));
	assert!(first.status.success(), "first run failed: {}", stderr(&first));
	let before = fs::read_to_string(dir.path().join("out/rust/instructions/create.rs"))
		.unwrap_or_else(|error| panic!("missing create.rs: {error}"));

	let second = run(idlforge(dir.path()).args(["generate", "--config", "pipeline.json"]));
	assert!(second.status.success(), "second run failed: {}", stderr(&second));
	for line in stdout(&second).lines() {
		assert!(line.contains(": 0 written,"), "unexpected write: {line}");
		assert!(line.ends_with(", 0 removed"), "unexpected removal: {line}");
	}
	let after = fs::read_to_string(dir.path().join("out/rust/instructions/create.rs"))
		.unwrap_or_else(|error| panic!("missing create.rs: {error}"));
	assert_eq!(before, after);
}

#[test]
fn generate_can_select_targets() {
	let dir = workspace();
	let output = run(idlforge(dir.path()).args(["generate", "--config", "pipeline.json", "--target", "codama"]));
	assert!(output.status.success(), "generate failed: {}", stderr(&output));
	assert!(dir.path().join("out/idl/counter.json").is_file());
	assert!(!dir.path().join("out/rust").exists());
}

#[test]
fn generate_rejects_unconfigured_targets() {
	let dir = workspace();
	let mut command = idlforge(dir.path());
	command.args(["generate", "--config", "pipeline.json", "--target", "js"]);
	assert_cmd_snapshot!(command, @r"
	success: false
	exit_code: 1
	----- stdout -----

	----- stderr -----
	Error: no renderer is registered for target `js`
	");
	assert!(!dir.path().join("out").exists());
}

#[test]
fn failing_operations_stop_before_rendering() {
	let dir = workspace();
	let config = r#"{
		"idls": ["counter.json"],
		"operations": [
			{ "name": "renameMissing", "kind": "rename", "renames": { "programs/counter/accounts/Missing": "Other" } }
		],
		"renderers": [{ "target": "rust", "output": "out/rust" }]
	}"#;
	fs::write(dir.path().join("broken.json"), config).unwrap_or_else(|error| panic!("write config: {error}"));

	let output = run(idlforge(dir.path()).args(["generate", "--config", "broken.json"]));
	assert_eq!(output.status.code(), Some(1));
	assert!(
		stderr(&output).contains("operation `renameMissing` (step 1) failed"),
		"{}",
		stderr(&output)
	);
	assert!(!dir.path().join("out").exists());
}

#[test]
fn inspect_prints_each_stage() {
	let dir = workspace();
	let loaded = inspect_json(dir.path(), &["--stage", "0"]);
	assert!(loaded["programs"][0]["accounts"][0].get("seeds").is_none());

	let seeded = inspect_json(dir.path(), &["--stage", "1"]);
	assert_eq!(seeded["programs"][0]["accounts"][0]["seeds"].as_array().map(Vec::len), Some(2));
	assert!(seeded["programs"][0]["instructions"][0].get("discriminator").is_none());

	let last = inspect_json(dir.path(), &[]);
	assert_eq!(
		last["programs"][0]["instructions"][0]["accounts"][1]["defaultValue"],
		serde_json::json!({ "kind": "account", "name": "authority" })
	);
}

#[test]
fn inspect_rejects_missing_stages() {
	let dir = workspace();
	let mut command = idlforge(dir.path());
	command.args(["inspect", "--config", "pipeline.json", "--stage", "9"]);
	assert_cmd_snapshot!(command, @r"
	success: false
	exit_code: 1
	----- stdout -----

	----- stderr -----
	Error: Stage 9 does not exist; the pipeline produced stages 0 to 3
	");
}

#[test]
fn inspect_writes_to_a_file() {
	let dir = workspace();
	let output = run(idlforge(dir.path()).args(["inspect", "--config", "pipeline.json", "--output", "tree.json"]));
	assert!(output.status.success(), "inspect failed: {}", stderr(&output));
	assert_eq!(stdout(&output).trim(), "Wrote tree.json");

	let contents = fs::read_to_string(dir.path().join("tree.json")).unwrap_or_else(|error| panic!("read tree: {error}"));
	let tree: Value = serde_json::from_str(&contents).unwrap_or_else(|error| panic!("invalid JSON: {error}"));
	assert_eq!(tree["programs"][0]["name"], "counter");
}

#[test]
fn check_lists_builder_inputs() {
	let dir = workspace();
	let output = run(idlforge(dir.path()).args(["check", "--config", "pipeline.json"]));
	assert!(output.status.success(), "check failed: {}", stderr(&output));

	let printed = stdout(&output);
	let create = printed
		.lines()
		.find(|line| line.contains(" create "))
		.unwrap_or_else(|| panic!("no create row in\n{printed}"));
	assert!(create.contains("authority, initialValue"), "{create}");
	assert!(create.contains("counter, payer, systemProgram"), "{create}");
	assert!(!dir.path().join("out").exists());
}

#[test]
fn missing_config_files_are_reported() {
	let dir = workspace();
	let output = run(idlforge(dir.path()).args(["check", "--config", "absent.json"]));
	assert_eq!(output.status.code(), Some(1));
	assert!(stderr(&output).starts_with("Error: IO error at absent.json:"), "{}", stderr(&output));
}
