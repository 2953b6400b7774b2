//! Renaming, with back-references kept in sync.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use super::UpdateOperation;
use super::account_mut;
use super::check_node_name;
use super::instruction_mut;
use super::program_mut;
use crate::error::TransformError;
use crate::index::NodeIndex;
use crate::index::NodePath;
use crate::index::Position;
use crate::nodes::DefaultValueNode;
use crate::nodes::InputRef;
use crate::nodes::InstructionNode;
use crate::nodes::ProgramNode;
use crate::nodes::RootNode;

/// Rename nodes. Every path is resolved against the input snapshot, so the
/// renames in one operation apply together and cannot target each other's
/// new names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
	pub renames: BTreeMap<NodePath, String>,
}

impl Rename {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, path: NodePath, name: impl Into<String>) -> Self {
		self.renames.insert(path, name.into());
		self
	}
}

impl UpdateOperation for Rename {
	fn apply(&self, index: &NodeIndex<'_>) -> Result<RootNode, TransformError> {
		let mut planned = BTreeSet::new();
		let mut resolved = Vec::with_capacity(self.renames.len());

		for (path, new_name) in &self.renames {
			check_node_name(path, new_name)?;
			let entry = index.resolve(path)?;
			let target = path.with_name(new_name);
			let taken = &target != path
				&& index.contains(&target)
				&& !self.renames.contains_key(&target);
			if taken || !planned.insert(target) {
				return Err(TransformError::DuplicateName {
					scope: path.parent().map_or_else(|| "root".to_owned(), |p| p.to_string()),
					name: new_name.clone(),
				});
			}
			resolved.push((path, entry.position, new_name.as_str()));
		}

		let before = index.root();
		let mut root = before.clone();
		let mut references = References::default();
		for (path, position, new_name) in resolved {
			if path.name() == new_name {
				continue;
			}
			rename_node(&mut root, path, position, new_name)?;
			references.record(path, position, new_name)?;
			log::debug!("renamed `{path}` to `{new_name}`");
		}
		references.rewrite(before, &mut root);

		Ok(root)
	}
}

fn rename_node(
	root: &mut RootNode,
	path: &NodePath,
	position: Position,
	new_name: &str,
) -> Result<(), TransformError> {
	match path {
		NodePath::Program { .. } => {
			new_name.clone_into(&mut program_mut(root, path, position)?.name);
		}
		NodePath::Account { .. } => {
			new_name.clone_into(&mut account_mut(root, path, position)?.name);
		}
		NodePath::Instruction { .. } => {
			new_name.clone_into(&mut instruction_mut(root, path, position)?.name);
		}
		NodePath::InstructionAccount { .. } => {
			let member = member(path, position)?;
			if let Some(account) = instruction_mut(root, path, position)?.accounts.get_mut(member) {
				new_name.clone_into(&mut account.name);
			}
		}
		NodePath::InstructionArgument { .. } => {
			let member = member(path, position)?;
			if let Some(argument) = instruction_mut(root, path, position)?.arguments.get_mut(member) {
				new_name.clone_into(&mut argument.name);
			}
		}
		NodePath::DefinedType { .. } => {
			let item = item(path, position)?;
			let program = program_mut(root, path, position)?;
			if let Some(defined_type) = program.defined_types.get_mut(item) {
				new_name.clone_into(&mut Arc::make_mut(defined_type).name);
			}
		}
		NodePath::SharedType { .. } => {
			let item = item(path, position)?;
			if let Some(defined_type) = root.shared_types.get_mut(item) {
				new_name.clone_into(&mut Arc::make_mut(defined_type).name);
			}
		}
	}

	Ok(())
}

fn program_slot(path: &NodePath, position: Position) -> Result<usize, TransformError> {
	position.program.ok_or_else(|| TransformError::unresolved(path))
}

fn item(path: &NodePath, position: Position) -> Result<usize, TransformError> {
	position.item.ok_or_else(|| TransformError::unresolved(path))
}

fn member(path: &NodePath, position: Position) -> Result<usize, TransformError> {
	position.member.ok_or_else(|| TransformError::unresolved(path))
}

/// Old name to new name, per scope, for every node renamed by one operation.
/// References are rewritten from these maps in a single pass, so each one is
/// looked up against its snapshot name exactly once.
#[derive(Debug, Default)]
struct References {
	/// Keyed by program slot.
	accounts: BTreeMap<usize, BTreeMap<String, String>>,
	/// Keyed by program and instruction slot.
	inputs: BTreeMap<(usize, usize), BTreeMap<InputRef, String>>,
	/// Keyed by program slot.
	types: BTreeMap<usize, BTreeMap<String, String>>,
	shared_types: BTreeMap<String, String>,
}

impl References {
	fn record(&mut self, path: &NodePath, position: Position, new_name: &str) -> Result<(), TransformError> {
		let old_name = path.name().to_owned();
		let new_name = new_name.to_owned();
		match path {
			NodePath::Program { .. } | NodePath::Instruction { .. } => {}
			NodePath::Account { .. } => {
				self.accounts
					.entry(program_slot(path, position)?)
					.or_default()
					.insert(old_name, new_name);
			}
			NodePath::InstructionAccount { .. } => {
				self.inputs
					.entry((program_slot(path, position)?, item(path, position)?))
					.or_default()
					.insert(InputRef::Account(old_name), new_name);
			}
			NodePath::InstructionArgument { .. } => {
				self.inputs
					.entry((program_slot(path, position)?, item(path, position)?))
					.or_default()
					.insert(InputRef::Argument(old_name), new_name);
			}
			NodePath::DefinedType { .. } => {
				self.types
					.entry(program_slot(path, position)?)
					.or_default()
					.insert(old_name, new_name);
			}
			NodePath::SharedType { .. } => {
				self.shared_types.insert(old_name, new_name);
			}
		}
		Ok(())
	}

	fn rewrite(&self, before: &RootNode, root: &mut RootNode) {
		for (&slot, accounts) in &self.accounts {
			let Some(program) = root.programs.get_mut(slot) else {
				continue;
			};
			let program = Arc::make_mut(program);
			for instruction in &mut program.instructions {
				if references_pda(instruction, accounts) {
					rename_pda_references(Arc::make_mut(instruction), accounts);
				}
			}
		}

		for (&(program, item), inputs) in &self.inputs {
			let instruction = root
				.programs
				.get_mut(program)
				.map(Arc::make_mut)
				.and_then(|program| program.instructions.get_mut(item));
			if let Some(instruction) = instruction {
				rename_input_references(Arc::make_mut(instruction), inputs);
			}
		}

		if self.types.is_empty() && self.shared_types.is_empty() {
			return;
		}
		for defined_type in &mut root.shared_types {
			if defined_type
				.type_node
				.has_link(&|link| self.shared_types.contains_key(link))
			{
				Arc::make_mut(defined_type)
					.type_node
					.rename_links(&self.shared_types);
			}
		}
		for (slot, program) in root.programs.iter_mut().enumerate() {
			// A program-level type of the same name shadows the shared one.
			let mut links = self
				.shared_types
				.iter()
				.filter(|(old, _)| {
					before
						.programs
						.get(slot)
						.is_none_or(|program| program.defined_type(old).is_none())
				})
				.map(|(old, new)| (old.clone(), new.clone()))
				.collect::<BTreeMap<_, _>>();
			if let Some(types) = self.types.get(&slot) {
				links.extend(types.iter().map(|(old, new)| (old.clone(), new.clone())));
			}
			if !links.is_empty() && program_links_to(program, &links) {
				rename_links_in_program(Arc::make_mut(program), &links);
			}
		}
	}
}

fn references_pda(instruction: &InstructionNode, accounts: &BTreeMap<String, String>) -> bool {
	defaults(instruction).any(|value| {
		matches!(value, DefaultValueNode::Pda { account, .. } if accounts.contains_key(account))
	})
}

fn defaults(instruction: &InstructionNode) -> impl Iterator<Item = &DefaultValueNode> {
	instruction
		.accounts
		.iter()
		.filter_map(|account| account.default_value.as_ref())
		.chain(
			instruction
				.arguments
				.iter()
				.filter_map(|argument| argument.default_value.as_ref()),
		)
}

fn defaults_mut(instruction: &mut InstructionNode) -> impl Iterator<Item = &mut DefaultValueNode> {
	instruction
		.accounts
		.iter_mut()
		.filter_map(|account| account.default_value.as_mut())
		.chain(
			instruction
				.arguments
				.iter_mut()
				.filter_map(|argument| argument.default_value.as_mut()),
		)
}

fn rename_pda_references(instruction: &mut InstructionNode, accounts: &BTreeMap<String, String>) {
	for value in defaults_mut(instruction) {
		if let DefaultValueNode::Pda { account, .. } = value {
			if let Some(renamed) = accounts.get(account.as_str()) {
				renamed.clone_into(account);
			}
		}
	}
}

/// Point every default value reading a renamed input at its new name.
fn rename_input_references(instruction: &mut InstructionNode, inputs: &BTreeMap<InputRef, String>) {
	for value in defaults_mut(instruction) {
		match value {
			DefaultValueNode::Account { name } => {
				if let Some(renamed) = inputs.get(&InputRef::Account(name.clone())) {
					renamed.clone_into(name);
				}
			}
			DefaultValueNode::Argument { name } => {
				if let Some(renamed) = inputs.get(&InputRef::Argument(name.clone())) {
					renamed.clone_into(name);
				}
			}
			DefaultValueNode::Pda { seeds, .. } => {
				for binding in seeds {
					if let Some(renamed) = inputs.get(&binding.value) {
						binding.value = match binding.value {
							InputRef::Account(_) => InputRef::Account(renamed.clone()),
							InputRef::Argument(_) => InputRef::Argument(renamed.clone()),
						};
					}
				}
			}
			DefaultValueNode::Absent | DefaultValueNode::ProgramId | DefaultValueNode::Literal { .. } => {}
		}
	}
}

fn program_links_to(program: &ProgramNode, links: &BTreeMap<String, String>) -> bool {
	let matches = |link: &str| links.contains_key(link);
	program
		.accounts
		.iter()
		.any(|account| account.fields.iter().any(|f| f.type_node.has_link(&matches)))
		|| program
			.instructions
			.iter()
			.any(|instruction| instruction_links_to(instruction, links))
		|| program
			.defined_types
			.iter()
			.any(|defined_type| defined_type.type_node.has_link(&matches))
}

fn instruction_links_to(instruction: &InstructionNode, links: &BTreeMap<String, String>) -> bool {
	instruction
		.arguments
		.iter()
		.any(|argument| argument.type_node.has_link(&|link| links.contains_key(link)))
}

/// Rewrite links inside one program, copying only the nodes that mention a
/// renamed type.
fn rename_links_in_program(program: &mut ProgramNode, links: &BTreeMap<String, String>) {
	let matches = |link: &str| links.contains_key(link);

	for account in &mut program.accounts {
		if account.fields.iter().any(|f| f.type_node.has_link(&matches)) {
			for field in &mut Arc::make_mut(account).fields {
				field.type_node.rename_links(links);
			}
		}
	}
	for instruction in &mut program.instructions {
		if instruction_links_to(instruction, links) {
			for argument in &mut Arc::make_mut(instruction).arguments {
				argument.type_node.rename_links(links);
			}
		}
	}
	for defined_type in &mut program.defined_types {
		if defined_type.type_node.has_link(&matches) {
			Arc::make_mut(defined_type).type_node.rename_links(links);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::nodes::AccountNode;
	use crate::nodes::DefinedTypeNode;
	use crate::nodes::InstructionAccountNode;
	use crate::nodes::InstructionArgumentNode;
	use crate::nodes::NumberFormat;
	use crate::nodes::SeedBinding;
	use crate::nodes::StructFieldNode;
	use crate::nodes::TypeNode;

	fn sample_root() -> RootNode {
		let mut counter = InstructionAccountNode::new("counter", true, false);
		counter.default_value = Some(DefaultValueNode::Pda {
			account: "Counter".to_owned(),
			seeds: vec![SeedBinding::new(
				"authority",
				InputRef::Account("authority".to_owned()),
			)],
		});
		let mut payer = InstructionAccountNode::new("payer", true, true);
		payer.default_value = Some(DefaultValueNode::account("authority"));

		let program = ProgramNode::new("counter", "Counter111111111111111111111111111111111111")
			.add_defined_type(DefinedTypeNode::new(
				"Config",
				TypeNode::Struct {
					fields: vec![StructFieldNode::new("step", NumberFormat::U8)],
				},
			))
			.add_account(AccountNode::new(
				"Counter",
				vec![StructFieldNode::new("config", TypeNode::link("Config"))],
			))
			.add_instruction(
				InstructionNode::new("create")
					.add_account(counter)
					.add_account(payer)
					.add_account(InstructionAccountNode::new("authority", false, true))
					.add_argument(InstructionArgumentNode::new("config", TypeNode::link("Config"))),
			)
			.add_instruction(InstructionNode::new("noop"));
		RootNode::new(program)
	}

	fn apply(root: &RootNode, rename: &Rename) -> Result<RootNode, TransformError> {
		rename.apply(&NodeIndex::new(root))
	}

	#[test]
	fn renames_program() {
		let root = sample_root();
		let renamed = apply(&root, &Rename::new().with(NodePath::program("counter"), "tally"))
			.unwrap_or_else(|e| panic!("rename failed: {e}"));
		assert_eq!(renamed.programs[0].name, "tally");
		assert_eq!(root.programs[0].name, "counter", "input snapshot must not change");
	}

	#[test]
	fn account_rename_updates_pda_defaults() {
		let root = sample_root();
		let renamed = apply(
			&root,
			&Rename::new().with(NodePath::account("counter", "Counter"), "Tally"),
		)
		.unwrap_or_else(|e| panic!("rename failed: {e}"));

		let instruction = renamed.programs[0]
			.instruction("create")
			.unwrap_or_else(|| panic!("missing instruction"));
		assert!(matches!(
			&instruction.accounts[0].default_value,
			Some(DefaultValueNode::Pda { account, .. }) if account == "Tally"
		));
		// Instructions without PDA defaults keep sharing their node.
		assert!(Arc::ptr_eq(
			&root.programs[0].instructions[1],
			&renamed.programs[0].instructions[1]
		));
	}

	#[test]
	fn instruction_account_rename_updates_bindings_and_references() {
		let root = sample_root();
		let renamed = apply(
			&root,
			&Rename::new().with(
				NodePath::instruction_account("counter", "create", "authority"),
				"owner",
			),
		)
		.unwrap_or_else(|e| panic!("rename failed: {e}"));

		let instruction = renamed.programs[0]
			.instruction("create")
			.unwrap_or_else(|| panic!("missing instruction"));
		assert!(instruction.account("owner").is_some());
		assert_eq!(
			instruction.accounts[1].default_value,
			Some(DefaultValueNode::account("owner"))
		);
		assert!(matches!(
			&instruction.accounts[0].default_value,
			Some(DefaultValueNode::Pda { seeds, .. })
				if seeds[0].value == InputRef::Account("owner".to_owned())
		));
	}

	#[test]
	fn defined_type_rename_updates_links() {
		let root = sample_root();
		let renamed = apply(
			&root,
			&Rename::new().with(NodePath::defined_type("counter", "Config"), "Settings"),
		)
		.unwrap_or_else(|e| panic!("rename failed: {e}"));

		let program = &renamed.programs[0];
		assert!(program.defined_type("Settings").is_some());
		assert_eq!(program.accounts[0].fields[0].type_node, TypeNode::link("Settings"));
		assert_eq!(
			program.instructions[0].arguments[0].type_node,
			TypeNode::link("Settings")
		);
	}

	#[test]
	fn rejects_taken_names() {
		let root = sample_root();
		let error = apply(
			&root,
			&Rename::new().with(NodePath::instruction("counter", "noop"), "create"),
		)
		.expect_err("rename should fail");
		assert_eq!(
			error,
			TransformError::DuplicateName {
				scope: "programs/counter".to_owned(),
				name: "create".to_owned(),
			}
		);
	}

	#[test]
	fn allows_swapping_names_in_one_operation() {
		let root = sample_root();
		let renamed = apply(
			&root,
			&Rename::new()
				.with(NodePath::instruction("counter", "noop"), "create")
				.with(NodePath::instruction("counter", "create"), "noop"),
		)
		.unwrap_or_else(|e| panic!("rename failed: {e}"));
		assert_eq!(renamed.programs[0].instructions[0].name, "noop");
		assert_eq!(renamed.programs[0].instructions[1].name, "create");
	}

	#[test]
	fn unknown_path_is_unresolved() {
		let root = sample_root();
		let error = apply(
			&root,
			&Rename::new().with(NodePath::account("counter", "Missing"), "Other"),
		)
		.expect_err("rename should fail");
		assert!(matches!(error, TransformError::UnresolvedReference { .. }));
	}

	fn swap_root() -> RootNode {
		let mut first = InstructionAccountNode::new("first", true, false);
		first.default_value = Some(DefaultValueNode::pda("Alpha"));
		let mut second = InstructionAccountNode::new("second", true, false);
		second.default_value = Some(DefaultValueNode::Pda {
			account: "Beta".to_owned(),
			seeds: vec![SeedBinding::new("owner", InputRef::Account("x".to_owned()))],
		});
		let mut payer = InstructionAccountNode::new("payer", true, true);
		payer.default_value = Some(DefaultValueNode::account("y"));

		let program = ProgramNode::new("swap", "Swap111111111111111111111111111111111111111")
			.add_defined_type(DefinedTypeNode::new("Left", NumberFormat::U8))
			.add_defined_type(DefinedTypeNode::new("Right", TypeNode::Boolean))
			.add_account(AccountNode::new(
				"Alpha",
				vec![StructFieldNode::new("side", TypeNode::link("Left"))],
			))
			.add_account(AccountNode::new(
				"Beta",
				vec![StructFieldNode::new("side", TypeNode::link("Right"))],
			))
			.add_instruction(
				InstructionNode::new("run")
					.add_account(first)
					.add_account(second)
					.add_account(payer)
					.add_account(InstructionAccountNode::new("x", false, false))
					.add_account(InstructionAccountNode::new("y", false, true)),
			);
		RootNode::new(program)
	}

	fn run_instruction(root: &RootNode) -> &InstructionNode {
		root.programs[0]
			.instruction("run")
			.unwrap_or_else(|| panic!("missing instruction"))
	}

	#[test]
	fn swapping_accounts_swaps_pda_defaults() {
		let root = swap_root();
		let renamed = apply(
			&root,
			&Rename::new()
				.with(NodePath::account("swap", "Alpha"), "Beta")
				.with(NodePath::account("swap", "Beta"), "Alpha"),
		)
		.unwrap_or_else(|e| panic!("rename failed: {e}"));

		let program = &renamed.programs[0];
		assert_eq!(program.accounts[0].name, "Beta");
		assert_eq!(program.accounts[1].name, "Alpha");
		let instruction = run_instruction(&renamed);
		assert!(matches!(
			&instruction.accounts[0].default_value,
			Some(DefaultValueNode::Pda { account, .. }) if account == "Beta"
		));
		assert!(matches!(
			&instruction.accounts[1].default_value,
			Some(DefaultValueNode::Pda { account, .. }) if account == "Alpha"
		));
	}

	#[test]
	fn swapping_instruction_accounts_swaps_references() {
		let root = swap_root();
		let renamed = apply(
			&root,
			&Rename::new()
				.with(NodePath::instruction_account("swap", "run", "x"), "y")
				.with(NodePath::instruction_account("swap", "run", "y"), "x"),
		)
		.unwrap_or_else(|e| panic!("rename failed: {e}"));

		let instruction = run_instruction(&renamed);
		// The signer slot is now called `x`, and `payer` still reads it.
		assert!(instruction.accounts[4].is_signer);
		assert_eq!(instruction.accounts[4].name, "x");
		assert_eq!(
			instruction.accounts[2].default_value,
			Some(DefaultValueNode::account("x"))
		);
		assert!(matches!(
			&instruction.accounts[1].default_value,
			Some(DefaultValueNode::Pda { seeds, .. })
				if seeds[0].value == InputRef::Account("y".to_owned())
		));
	}

	#[test]
	fn swapping_defined_types_swaps_links() {
		let root = swap_root();
		let renamed = apply(
			&root,
			&Rename::new()
				.with(NodePath::defined_type("swap", "Left"), "Right")
				.with(NodePath::defined_type("swap", "Right"), "Left"),
		)
		.unwrap_or_else(|e| panic!("rename failed: {e}"));

		let program = &renamed.programs[0];
		assert_eq!(program.defined_types[0].name, "Right");
		assert_eq!(program.defined_types[0].type_node, TypeNode::from(NumberFormat::U8));
		assert_eq!(program.accounts[0].fields[0].type_node, TypeNode::link("Right"));
		assert_eq!(program.accounts[1].fields[0].type_node, TypeNode::link("Left"));
	}

	#[test]
	fn shared_type_rename_skips_programs_that_shadow_it() {
		let mut root = sample_root();
		root.shared_types.push(Arc::new(DefinedTypeNode::new("Config", TypeNode::Boolean)));
		let renamed = apply(
			&root,
			&Rename::new().with(NodePath::shared_type("Config"), "GlobalConfig"),
		)
		.unwrap_or_else(|e| panic!("rename failed: {e}"));

		assert_eq!(renamed.shared_types[0].name, "GlobalConfig");
		assert_eq!(
			renamed.programs[0].accounts[0].fields[0].type_node,
			TypeNode::link("Config")
		);
		assert!(Arc::ptr_eq(&root.programs[0], &renamed.programs[0]));
	}
}
