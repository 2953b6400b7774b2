//! Name-based lookup over one tree snapshot.
//!
//! Nodes refer to each other by name, so every update operation resolves its
//! textual targets through a [`NodeIndex`] built from the snapshot it
//! receives. The index borrows the snapshot and is rebuilt after every
//! operation because names may change.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::SelectorError;
use crate::error::TransformError;
use crate::nodes::AccountNode;
use crate::nodes::DefinedTypeNode;
use crate::nodes::InstructionAccountNode;
use crate::nodes::InstructionArgumentNode;
use crate::nodes::InstructionNode;
use crate::nodes::ProgramNode;
use crate::nodes::RootNode;

/// A textual selector for one node of the tree.
///
/// ```text
/// programs/<p>
/// programs/<p>/accounts/<a>
/// programs/<p>/instructions/<i>
/// programs/<p>/instructions/<i>/accounts/<a>
/// programs/<p>/instructions/<i>/arguments/<a>
/// programs/<p>/types/<t>
/// types/<t>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodePath {
	Program {
		program: String,
	},
	Account {
		program: String,
		account: String,
	},
	Instruction {
		program: String,
		instruction: String,
	},
	InstructionAccount {
		program: String,
		instruction: String,
		account: String,
	},
	InstructionArgument {
		program: String,
		instruction: String,
		argument: String,
	},
	DefinedType {
		program: String,
		name: String,
	},
	SharedType {
		name: String,
	},
}

impl NodePath {
	pub fn program(program: impl Into<String>) -> Self {
		Self::Program {
			program: program.into(),
		}
	}

	pub fn account(program: impl Into<String>, account: impl Into<String>) -> Self {
		Self::Account {
			program: program.into(),
			account: account.into(),
		}
	}

	pub fn instruction(program: impl Into<String>, instruction: impl Into<String>) -> Self {
		Self::Instruction {
			program: program.into(),
			instruction: instruction.into(),
		}
	}

	pub fn instruction_account(
		program: impl Into<String>,
		instruction: impl Into<String>,
		account: impl Into<String>,
	) -> Self {
		Self::InstructionAccount {
			program: program.into(),
			instruction: instruction.into(),
			account: account.into(),
		}
	}

	pub fn instruction_argument(
		program: impl Into<String>,
		instruction: impl Into<String>,
		argument: impl Into<String>,
	) -> Self {
		Self::InstructionArgument {
			program: program.into(),
			instruction: instruction.into(),
			argument: argument.into(),
		}
	}

	pub fn defined_type(program: impl Into<String>, name: impl Into<String>) -> Self {
		Self::DefinedType {
			program: program.into(),
			name: name.into(),
		}
	}

	pub fn shared_type(name: impl Into<String>) -> Self {
		Self::SharedType { name: name.into() }
	}

	/// The last segment of the path: the name of the selected node.
	pub fn name(&self) -> &str {
		match self {
			Self::Program { program } => program,
			Self::Account { account, .. } | Self::InstructionAccount { account, .. } => account,
			Self::Instruction { instruction, .. } => instruction,
			Self::InstructionArgument { argument, .. } => argument,
			Self::DefinedType { name, .. } | Self::SharedType { name } => name,
		}
	}

	/// The program the path lives in. Shared types live in no program.
	pub fn program_name(&self) -> Option<&str> {
		match self {
			Self::Program { program }
			| Self::Account { program, .. }
			| Self::Instruction { program, .. }
			| Self::InstructionAccount { program, .. }
			| Self::InstructionArgument { program, .. }
			| Self::DefinedType { program, .. } => Some(program),
			Self::SharedType { .. } => None,
		}
	}

	/// The same path with its last segment replaced.
	#[must_use]
	pub fn with_name(&self, new_name: &str) -> Self {
		let mut path = self.clone();
		match &mut path {
			Self::Program { program } => new_name.clone_into(program),
			Self::Account { account, .. } | Self::InstructionAccount { account, .. } => {
				new_name.clone_into(account);
			}
			Self::Instruction { instruction, .. } => new_name.clone_into(instruction),
			Self::InstructionArgument { argument, .. } => new_name.clone_into(argument),
			Self::DefinedType { name, .. } | Self::SharedType { name } => {
				new_name.clone_into(name);
			}
		}
		path
	}

	/// The path of the node that owns this one.
	pub fn parent(&self) -> Option<Self> {
		match self {
			Self::Program { .. } | Self::SharedType { .. } => None,
			Self::Account { program, .. }
			| Self::Instruction { program, .. }
			| Self::DefinedType { program, .. } => Some(Self::program(program.as_str())),
			Self::InstructionAccount {
				program,
				instruction,
				..
			}
			| Self::InstructionArgument {
				program,
				instruction,
				..
			} => Some(Self::instruction(program.as_str(), instruction.as_str())),
		}
	}

	pub fn kind(&self) -> NodeKind {
		match self {
			Self::Program { .. } => NodeKind::Program,
			Self::Account { .. } => NodeKind::Account,
			Self::Instruction { .. } => NodeKind::Instruction,
			Self::InstructionAccount { .. } => NodeKind::InstructionAccount,
			Self::InstructionArgument { .. } => NodeKind::InstructionArgument,
			Self::DefinedType { .. } | Self::SharedType { .. } => NodeKind::DefinedType,
		}
	}
}

impl fmt::Display for NodePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Program { program } => write!(f, "programs/{program}"),
			Self::Account { program, account } => write!(f, "programs/{program}/accounts/{account}"),
			Self::Instruction {
				program,
				instruction,
			} => write!(f, "programs/{program}/instructions/{instruction}"),
			Self::InstructionAccount {
				program,
				instruction,
				account,
			} => {
				write!(
					f,
					"programs/{program}/instructions/{instruction}/accounts/{account}"
				)
			}
			Self::InstructionArgument {
				program,
				instruction,
				argument,
			} => {
				write!(
					f,
					"programs/{program}/instructions/{instruction}/arguments/{argument}"
				)
			}
			Self::DefinedType { program, name } => write!(f, "programs/{program}/types/{name}"),
			Self::SharedType { name } => write!(f, "types/{name}"),
		}
	}
}

impl FromStr for NodePath {
	type Err = SelectorError;

	fn from_str(path: &str) -> Result<Self, Self::Err> {
		let error = |reason| {
			SelectorError {
				path: path.to_owned(),
				reason,
			}
		};
		let segments = path.split('/').collect::<Vec<_>>();
		if segments.iter().any(|segment| segment.is_empty()) {
			return Err(error("empty path segment"));
		}

		let parsed = match segments.as_slice() {
			["programs", program] => Self::program(*program),
			["programs", program, "accounts", account] => Self::account(*program, *account),
			["programs", program, "instructions", instruction] => {
				Self::instruction(*program, *instruction)
			}
			["programs", program, "instructions", instruction, "accounts", account] => {
				Self::instruction_account(*program, *instruction, *account)
			}
			["programs", program, "instructions", instruction, "arguments", argument] => {
				Self::instruction_argument(*program, *instruction, *argument)
			}
			["programs", program, "types", name] => Self::defined_type(*program, *name),
			["types", name] => Self::shared_type(*name),
			["programs", ..] => return Err(error("unknown node collection")),
			_ => return Err(error("paths start with `programs/` or `types/`")),
		};

		Ok(parsed)
	}
}

impl TryFrom<String> for NodePath {
	type Error = SelectorError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<NodePath> for String {
	fn from(path: NodePath) -> Self {
		path.to_string()
	}
}

/// The closed set of node kinds a path can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Program,
	Account,
	Instruction,
	InstructionAccount,
	InstructionArgument,
	DefinedType,
}

impl NodeKind {
	pub fn describe(self) -> &'static str {
		match self {
			Self::Program => "a program",
			Self::Account => "an account",
			Self::Instruction => "an instruction",
			Self::InstructionAccount => "an instruction account",
			Self::InstructionArgument => "an instruction argument",
			Self::DefinedType => "a defined type",
		}
	}
}

/// A borrowed node of any kind.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
	Program(&'a ProgramNode),
	Account(&'a AccountNode),
	Instruction(&'a InstructionNode),
	InstructionAccount(&'a InstructionAccountNode),
	InstructionArgument(&'a InstructionArgumentNode),
	DefinedType(&'a DefinedTypeNode),
}

/// Where a node sits in its snapshot, as positions in the owning vectors.
/// Operations use it to copy exactly the path they rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
	/// Index into `RootNode::programs`; `None` for shared types.
	pub program: Option<usize>,
	/// Index into the program's (or root's) collection for the node's kind.
	pub item: Option<usize>,
	/// Index into the instruction's accounts or arguments.
	pub member: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexEntry<'a> {
	pub node: NodeRef<'a>,
	pub position: Position,
}

/// The (scope, name) → node table of one snapshot.
#[derive(Debug)]
pub struct NodeIndex<'a> {
	root: &'a RootNode,
	entries: HashMap<NodePath, IndexEntry<'a>>,
}

impl<'a> NodeIndex<'a> {
	pub fn new(root: &'a RootNode) -> Self {
		let mut entries = HashMap::new();
		let mut insert = |path: NodePath, node: NodeRef<'a>, position: Position| {
			// The first declaration wins; the loader rejects duplicates so a
			// later one only appears in hand-built trees.
			entries.entry(path).or_insert(IndexEntry { node, position });
		};

		for (position, defined_type) in root.shared_types.iter().enumerate() {
			insert(
				NodePath::shared_type(defined_type.name.as_str()),
				NodeRef::DefinedType(defined_type),
				Position {
					program: None,
					item: Some(position),
					member: None,
				},
			);
		}

		for (program_position, program) in root.programs.iter().enumerate() {
			let name = program.name.as_str();
			let at = |item: Option<usize>, member: Option<usize>| {
				Position {
					program: Some(program_position),
					item,
					member,
				}
			};

			insert(NodePath::program(name), NodeRef::Program(program), at(None, None));

			for (position, account) in program.accounts.iter().enumerate() {
				insert(
					NodePath::account(name, account.name.as_str()),
					NodeRef::Account(account),
					at(Some(position), None),
				);
			}

			for (position, defined_type) in program.defined_types.iter().enumerate() {
				insert(
					NodePath::defined_type(name, defined_type.name.as_str()),
					NodeRef::DefinedType(defined_type),
					at(Some(position), None),
				);
			}

			for (position, instruction) in program.instructions.iter().enumerate() {
				let instruction_name = instruction.name.as_str();
				insert(
					NodePath::instruction(name, instruction_name),
					NodeRef::Instruction(instruction),
					at(Some(position), None),
				);

				for (member, account) in instruction.accounts.iter().enumerate() {
					insert(
						NodePath::instruction_account(name, instruction_name, account.name.as_str()),
						NodeRef::InstructionAccount(account),
						at(Some(position), Some(member)),
					);
				}

				for (member, argument) in instruction.arguments.iter().enumerate() {
					insert(
						NodePath::instruction_argument(
							name,
							instruction_name,
							argument.name.as_str(),
						),
						NodeRef::InstructionArgument(argument),
						at(Some(position), Some(member)),
					);
				}
			}
		}

		Self { root, entries }
	}

	/// The snapshot this index was built from.
	pub fn root(&self) -> &'a RootNode {
		self.root
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn contains(&self, path: &NodePath) -> bool {
		self.entries.contains_key(path)
	}

	pub fn resolve(&self, path: &NodePath) -> Result<IndexEntry<'a>, TransformError> {
		self.entries
			.get(path)
			.copied()
			.ok_or_else(|| TransformError::unresolved(path))
	}

	pub fn program(&self, path: &NodePath) -> Result<(&'a ProgramNode, Position), TransformError> {
		match self.resolve_kind(path, NodeKind::Program)? {
			IndexEntry {
				node: NodeRef::Program(node),
				position,
			} => Ok((node, position)),
			_ => Err(mismatch(path, NodeKind::Program)),
		}
	}

	pub fn account(&self, path: &NodePath) -> Result<(&'a AccountNode, Position), TransformError> {
		match self.resolve_kind(path, NodeKind::Account)? {
			IndexEntry {
				node: NodeRef::Account(node),
				position,
			} => Ok((node, position)),
			_ => Err(mismatch(path, NodeKind::Account)),
		}
	}

	pub fn instruction(
		&self,
		path: &NodePath,
	) -> Result<(&'a InstructionNode, Position), TransformError> {
		match self.resolve_kind(path, NodeKind::Instruction)? {
			IndexEntry {
				node: NodeRef::Instruction(node),
				position,
			} => Ok((node, position)),
			_ => Err(mismatch(path, NodeKind::Instruction)),
		}
	}

	pub fn defined_type(
		&self,
		path: &NodePath,
	) -> Result<(&'a DefinedTypeNode, Position), TransformError> {
		match self.resolve_kind(path, NodeKind::DefinedType)? {
			IndexEntry {
				node: NodeRef::DefinedType(node),
				position,
			} => Ok((node, position)),
			_ => Err(mismatch(path, NodeKind::DefinedType)),
		}
	}

	/// Resolve a path, first checking that its syntax selects `expected`.
	fn resolve_kind(
		&self,
		path: &NodePath,
		expected: NodeKind,
	) -> Result<IndexEntry<'a>, TransformError> {
		if path.kind() != expected {
			return Err(mismatch(path, expected));
		}
		self.resolve(path)
	}
}

fn mismatch(path: &NodePath, expected: NodeKind) -> TransformError {
	TransformError::InvalidSelector {
		path: path.to_string(),
		expected: expected.describe(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::nodes::InstructionAccountNode;
	use crate::nodes::NumberFormat;
	use crate::nodes::StructFieldNode;

	fn sample_root() -> RootNode {
		let program = ProgramNode::new("counter", "Counter111111111111111111111111111111111111")
			.add_account(AccountNode::new(
				"Counter",
				vec![StructFieldNode::new("count", NumberFormat::U64)],
			))
			.add_instruction(
				InstructionNode::new("create")
					.add_account(InstructionAccountNode::new("counter", true, false))
					.add_account(InstructionAccountNode::new("authority", false, true)),
			);
		RootNode::new(program)
	}

	#[test]
	fn parses_and_prints_every_path_form() {
		let paths = [
			"programs/counter",
			"programs/counter/accounts/Counter",
			"programs/counter/instructions/create",
			"programs/counter/instructions/create/accounts/authority",
			"programs/counter/instructions/create/arguments/amount",
			"programs/counter/types/Config",
			"types/Shared",
		];
		for text in paths {
			let path: NodePath = text
				.parse()
				.unwrap_or_else(|e| panic!("failed to parse {text}: {e}"));
			assert_eq!(path.to_string(), text);
		}
	}

	#[test]
	fn rejects_malformed_paths() {
		for text in ["", "programs", "programs//accounts/a", "accounts/a", "programs/p/errors/e"] {
			assert!(text.parse::<NodePath>().is_err(), "{text} should not parse");
		}
	}

	#[test]
	fn resolves_nested_nodes_with_positions() {
		let root = sample_root();
		let index = NodeIndex::new(&root);

		let entry = index
			.resolve(&NodePath::instruction_account("counter", "create", "authority"))
			.unwrap_or_else(|e| panic!("lookup failed: {e}"));
		assert!(matches!(entry.node, NodeRef::InstructionAccount(account) if account.is_signer));
		assert_eq!(
			entry.position,
			Position {
				program: Some(0),
				item: Some(0),
				member: Some(1),
			}
		);
	}

	#[test]
	fn missing_path_is_an_unresolved_reference() {
		let root = sample_root();
		let index = NodeIndex::new(&root);
		let error = index
			.account(&NodePath::account("counter", "Missing"))
			.expect_err("lookup should fail");
		assert_eq!(
			error,
			TransformError::UnresolvedReference {
				path: "programs/counter/accounts/Missing".to_owned(),
			}
		);
	}

	#[test]
	fn kind_mismatch_is_an_invalid_selector() {
		let root = sample_root();
		let index = NodeIndex::new(&root);
		let error = index
			.account(&NodePath::instruction("counter", "create"))
			.expect_err("lookup should fail");
		assert!(matches!(error, TransformError::InvalidSelector { expected: "an account", .. }));
	}
}
