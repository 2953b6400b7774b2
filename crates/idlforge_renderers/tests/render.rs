use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use idlforge::NamedOperation;
use idlforge::NodePath;
use idlforge::RenderOptions;
use idlforge::RenderTarget;
use idlforge::RootNode;
use idlforge::load_paths;
use idlforge::nodes::DefaultValueNode;
use idlforge::nodes::DefinedTypeNode;
use idlforge::nodes::EnumVariantNode;
use idlforge::nodes::NumberFormat;
use idlforge::nodes::PdaSeedNode;
use idlforge::nodes::StructFieldNode;
use idlforge::nodes::TypeNode;
use idlforge::render::render_all;
use idlforge::run_operations;
use idlforge::visitors::AssignDiscriminators;
use idlforge::visitors::DiscriminatorSource;
use idlforge::visitors::Rename;
use idlforge::visitors::SetAccountSeeds;
use idlforge::visitors::SetDefaultValues;
use idlforge::visitors::SiblingSet;
use idlforge_renderers::TARGETS;
use idlforge_renderers::renderer_for;

fn fixture(name: &str) -> PathBuf {
	Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn operations() -> Vec<NamedOperation> {
	let create = |account: &str| NodePath::instruction_account("counter", "create", account);
	vec![
		NamedOperation::new(
			"counterSeeds",
			SetAccountSeeds::new(
				NodePath::account("counter", "Counter"),
				vec![
					PdaSeedNode::utf8("counter"),
					PdaSeedNode::variable("authority", TypeNode::PublicKey),
				],
			),
		),
		NamedOperation::new(
			"instructionTags",
			AssignDiscriminators::new(
				NodePath::program("counter"),
				SiblingSet::Instructions,
				DiscriminatorSource::sequential(0),
			),
		),
		NamedOperation::new(
			"accountTags",
			AssignDiscriminators::new(
				NodePath::program("counter"),
				SiblingSet::Accounts,
				DiscriminatorSource::sighash("account"),
			),
		),
		NamedOperation::new(
			"createDefaults",
			SetDefaultValues::new()
				.with(create("counter"), DefaultValueNode::pda("Counter"))
				.with(create("payer"), DefaultValueNode::account("authority"))
				.with(
					create("systemProgram"),
					DefaultValueNode::public_key("11111111111111111111111111111111"),
				),
		),
	]
}

fn final_tree(extra: &[NamedOperation]) -> RootNode {
	let base = load_paths(&[fixture("counter.json")]).unwrap_or_else(|e| panic!("load failed: {e}"));
	let mut operations = operations();
	operations.extend_from_slice(extra);
	run_operations(base, &operations)
		.unwrap_or_else(|e| panic!("pipeline failed: {e}"))
		.into_final_tree()
		.as_ref()
		.clone()
}

fn target(name: &str, output: &Path) -> RenderTarget {
	RenderTarget {
		renderer: renderer_for(name).unwrap_or_else(|e| panic!("{e}")),
		output: output.to_path_buf(),
		options: RenderOptions {
			format_code: true,
			..RenderOptions::default()
		},
	}
}

fn snapshot_dir(root: &Path) -> BTreeMap<PathBuf, String> {
	walk(root)
		.into_iter()
		.map(|path| {
			let contents = fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
			let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
			(relative, contents)
		})
		.collect()
}

fn walk(dir: &Path) -> Vec<PathBuf> {
	let mut files = Vec::new();
	let entries = fs::read_dir(dir).unwrap_or_else(|e| panic!("read_dir {}: {e}", dir.display()));
	for entry in entries {
		let path = entry.unwrap_or_else(|e| panic!("entry: {e}")).path();
		if path.is_dir() {
			files.extend(walk(&path));
		} else {
			files.push(path);
		}
	}
	files
}

#[test]
fn every_target_renders_the_counter_program() {
	let root = final_tree(&[]);
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let targets = TARGETS
		.iter()
		.map(|name| target(name, &dir.path().join(name)))
		.collect::<Vec<_>>();

	for outcome in render_all(&root, &targets) {
		let summary = outcome
			.result
			.unwrap_or_else(|e| panic!("{} failed: {e}", outcome.target));
		assert!(!summary.written.is_empty(), "{} wrote nothing", outcome.target);
	}

	let rust = snapshot_dir(&dir.path().join("rust"));
	let create = &rust[Path::new("instructions/create.rs")];
	assert!(create.contains("pub fn new(authority: solana_pubkey::Pubkey, initial_value: u64) -> Self"));
	assert!(create.contains("pub const CREATE_DISCRIMINATOR: [u8; 1] = [0];"));

	let js = snapshot_dir(&dir.path().join("js"));
	assert!(js[Path::new("accounts/counter.ts")].contains("export async function findCounterPda("));

	let codama = snapshot_dir(&dir.path().join("codama"));
	assert!(codama.contains_key(Path::new("counter.json")));
}

#[test]
fn rerunning_changes_nothing() {
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	for name in TARGETS {
		let output = dir.path().join(name);
		let first = target(name, &output)
			.run(&final_tree(&[]))
			.unwrap_or_else(|e| panic!("{name}: {e}"));
		let before = snapshot_dir(&output);

		let second = target(name, &output)
			.run(&final_tree(&[]))
			.unwrap_or_else(|e| panic!("{name}: {e}"));
		assert!(second.is_noop(), "{name} rewrote {:?}", second.written);
		assert_eq!(second.unchanged.len(), first.written.len());
		assert_eq!(snapshot_dir(&output), before);
	}
}

#[test]
fn renamed_instructions_replace_their_stale_modules() {
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let output = dir.path().join("rust");
	target("rust", &output)
		.run(&final_tree(&[]))
		.unwrap_or_else(|e| panic!("first run: {e}"));
	fs::write(output.join("lib_extra.rs"), "// hand written\n").unwrap_or_else(|e| panic!("seed: {e}"));

	let rename = NamedOperation::new(
		"renameIncrement",
		Rename::new().with(NodePath::instruction("counter", "increment"), "bump"),
	);
	let summary = target("rust", &output)
		.run(&final_tree(&[rename]))
		.unwrap_or_else(|e| panic!("second run: {e}"));

	assert_eq!(summary.removed, [PathBuf::from("instructions/increment.rs")]);
	assert!(output.join("instructions/bump.rs").exists());
	assert!(output.join("lib_extra.rs").exists());
}

#[test]
fn failed_render_leaves_existing_artifacts_untouched() {
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let output = dir.path().join("rust");
	target("rust", &output)
		.run(&final_tree(&[]))
		.unwrap_or_else(|e| panic!("first run: {e}"));
	let before = snapshot_dir(&output);

	// Data variants cannot carry explicit discriminants in the Rust client.
	let mut tagged = EnumVariantNode::empty("Idle");
	tagged.discriminant = Some(4);
	let mut broken = final_tree(&[]);
	let program = std::sync::Arc::make_mut(&mut broken.programs[0]);
	program.defined_types.push(std::sync::Arc::new(DefinedTypeNode::new(
		"Mode",
		TypeNode::Enum {
			variants: vec![
				tagged,
				EnumVariantNode {
					name: "Running".to_owned(),
					discriminant: None,
					fields: Some(vec![StructFieldNode::new("since", NumberFormat::I64)]),
				},
			],
		},
	)));

	let result = target("rust", &output).run(&broken);
	assert!(result.is_err());
	assert_eq!(snapshot_dir(&output), before);
}
