//! Update operations.
//!
//! An operation is a pure function from a tree snapshot (seen through its
//! [`NodeIndex`]) to a new tree. It never mutates the snapshot it receives:
//! it clones the root, which only bumps reference counts, and copies the
//! nodes it rewrites with [`Arc::make_mut`]. Untouched subtrees stay shared
//! with the previous stage.

pub mod defaults;
pub mod discriminators;
pub mod rename;
pub mod seeds;

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

pub use self::defaults::DefaultValueRule;
pub use self::defaults::SetDefaultValues;
pub use self::discriminators::AssignDiscriminators;
pub use self::discriminators::DiscriminatorSource;
pub use self::discriminators::SiblingSet;
pub use self::rename::Rename;
pub use self::seeds::SetAccountSeeds;
use crate::error::TransformError;
use crate::index::NodeIndex;
use crate::index::NodePath;
use crate::index::Position;
use crate::nodes::AccountNode;
use crate::nodes::InstructionNode;
use crate::nodes::ProgramNode;
use crate::nodes::RootNode;

/// A pure tree transformation.
pub trait UpdateOperation {
	/// Produce the next tree from the snapshot `index` was built over.
	fn apply(&self, index: &NodeIndex<'_>) -> Result<RootNode, TransformError>;
}

/// The closed vocabulary of update operations, as they appear in a pipeline
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Operation {
	Rename(Rename),
	SetAccountSeeds(SetAccountSeeds),
	AssignDiscriminators(AssignDiscriminators),
	SetDefaultValues(SetDefaultValues),
}

impl Operation {
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Rename(_) => "rename",
			Self::SetAccountSeeds(_) => "setAccountSeeds",
			Self::AssignDiscriminators(_) => "assignDiscriminators",
			Self::SetDefaultValues(_) => "setDefaultValues",
		}
	}
}

impl UpdateOperation for Operation {
	fn apply(&self, index: &NodeIndex<'_>) -> Result<RootNode, TransformError> {
		match self {
			Self::Rename(operation) => operation.apply(index),
			Self::SetAccountSeeds(operation) => operation.apply(index),
			Self::AssignDiscriminators(operation) => operation.apply(index),
			Self::SetDefaultValues(operation) => operation.apply(index),
		}
	}
}

impl From<Rename> for Operation {
	fn from(operation: Rename) -> Self {
		Self::Rename(operation)
	}
}

impl From<SetAccountSeeds> for Operation {
	fn from(operation: SetAccountSeeds) -> Self {
		Self::SetAccountSeeds(operation)
	}
}

impl From<AssignDiscriminators> for Operation {
	fn from(operation: AssignDiscriminators) -> Self {
		Self::AssignDiscriminators(operation)
	}
}

impl From<SetDefaultValues> for Operation {
	fn from(operation: SetDefaultValues) -> Self {
		Self::SetDefaultValues(operation)
	}
}

/// An operation and the name it is reported under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedOperation {
	pub name: String,
	#[serde(flatten)]
	pub operation: Operation,
}

impl NamedOperation {
	pub fn new(name: impl Into<String>, operation: impl Into<Operation>) -> Self {
		Self {
			name: name.into(),
			operation: operation.into(),
		}
	}
}

// Copy-on-write accessors. `position` always comes from an index built over
// the snapshot `root` was cloned from, so the slots exist.

fn slot(path: &NodePath, slot: Option<usize>) -> Result<usize, TransformError> {
	slot.ok_or_else(|| TransformError::unresolved(path))
}

pub(crate) fn program_mut<'r>(
	root: &'r mut RootNode,
	path: &NodePath,
	position: Position,
) -> Result<&'r mut ProgramNode, TransformError> {
	let program = slot(path, position.program)?;
	root.programs
		.get_mut(program)
		.map(Arc::make_mut)
		.ok_or_else(|| TransformError::unresolved(path))
}

pub(crate) fn account_mut<'r>(
	root: &'r mut RootNode,
	path: &NodePath,
	position: Position,
) -> Result<&'r mut AccountNode, TransformError> {
	let item = slot(path, position.item)?;
	program_mut(root, path, position)?
		.accounts
		.get_mut(item)
		.map(Arc::make_mut)
		.ok_or_else(|| TransformError::unresolved(path))
}

pub(crate) fn instruction_mut<'r>(
	root: &'r mut RootNode,
	path: &NodePath,
	position: Position,
) -> Result<&'r mut InstructionNode, TransformError> {
	let item = slot(path, position.item)?;
	program_mut(root, path, position)?
		.instructions
		.get_mut(item)
		.map(Arc::make_mut)
		.ok_or_else(|| TransformError::unresolved(path))
}

/// Reject names the path grammar cannot express.
pub(crate) fn check_node_name(path: &NodePath, name: &str) -> Result<(), TransformError> {
	if name.is_empty() || name.contains('/') {
		return Err(TransformError::InvalidSelector {
			path: path.with_name(name).to_string(),
			expected: "a non-empty name without `/`",
		});
	}
	Ok(())
}
