//! The interface tree.
//!
//! A tree is an immutable snapshot. Children are held behind [`Arc`] so an
//! update operation clones the snapshot (cheap: reference counts only) and
//! copies just the nodes on the path it rewrites via [`Arc::make_mut`]. Nodes
//! refer to each other by name; the [`NodeIndex`](crate::index::NodeIndex)
//! resolves those names for a given snapshot.

mod types;
mod values;

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

pub use self::types::*;
pub use self::values::*;

/// The whole interface description: every program plus the type definitions
/// shared between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootNode {
	pub programs: Vec<Arc<ProgramNode>>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub shared_types: Vec<Arc<DefinedTypeNode>>,
}

impl RootNode {
	pub fn new(program: ProgramNode) -> Self {
		Self {
			programs: vec![Arc::new(program)],
			shared_types: Vec::new(),
		}
	}

	/// The primary program, i.e. the one loaded from the first document.
	pub fn primary(&self) -> Option<&ProgramNode> {
		self.programs.first().map(AsRef::as_ref)
	}

	pub fn program(&self, name: &str) -> Option<&ProgramNode> {
		self.programs
			.iter()
			.find(|program| program.name == name)
			.map(AsRef::as_ref)
	}
}

/// One on-chain program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramNode {
	pub name: String,
	pub public_key: String,
	#[serde(default)]
	pub version: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub docs: Vec<String>,
	#[serde(default)]
	pub accounts: Vec<Arc<AccountNode>>,
	#[serde(default)]
	pub instructions: Vec<Arc<InstructionNode>>,
	#[serde(default)]
	pub defined_types: Vec<Arc<DefinedTypeNode>>,
	#[serde(default)]
	pub errors: Vec<ErrorNode>,
}

impl ProgramNode {
	pub fn new(name: impl Into<String>, public_key: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			public_key: public_key.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn add_account(mut self, account: AccountNode) -> Self {
		self.accounts.push(Arc::new(account));
		self
	}

	#[must_use]
	pub fn add_instruction(mut self, instruction: InstructionNode) -> Self {
		self.instructions.push(Arc::new(instruction));
		self
	}

	#[must_use]
	pub fn add_defined_type(mut self, defined_type: DefinedTypeNode) -> Self {
		self.defined_types.push(Arc::new(defined_type));
		self
	}

	#[must_use]
	pub fn add_error(mut self, error: ErrorNode) -> Self {
		self.errors.push(error);
		self
	}

	pub fn account(&self, name: &str) -> Option<&AccountNode> {
		self.accounts
			.iter()
			.find(|account| account.name == name)
			.map(AsRef::as_ref)
	}

	pub fn instruction(&self, name: &str) -> Option<&InstructionNode> {
		self.instructions
			.iter()
			.find(|instruction| instruction.name == name)
			.map(AsRef::as_ref)
	}

	pub fn defined_type(&self, name: &str) -> Option<&DefinedTypeNode> {
		self.defined_types
			.iter()
			.find(|defined_type| defined_type.name == name)
			.map(AsRef::as_ref)
	}
}

/// The shape of an on-chain data record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNode {
	pub name: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub docs: Vec<String>,
	#[serde(default)]
	pub fields: Vec<StructFieldNode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub discriminator: Option<DiscriminatorNode>,
	/// The address-derivation recipe. Order is significant.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub seeds: Option<Vec<PdaSeedNode>>,
}

impl AccountNode {
	pub fn new(name: impl Into<String>, fields: Vec<StructFieldNode>) -> Self {
		Self {
			name: name.into(),
			fields,
			..Self::default()
		}
	}

	/// The variable seeds of the address recipe, i.e. the values a caller has
	/// to supply to derive the address. Empty when the account has no recipe.
	pub fn seed_inputs(&self) -> Vec<&VariablePdaSeedNode> {
		self.seeds
			.iter()
			.flatten()
			.filter_map(|seed| {
				match seed {
					PdaSeedNode::Variable(variable) => Some(variable),
					PdaSeedNode::Constant(_) => None,
				}
			})
			.collect()
	}
}

/// A callable entry point of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionNode {
	pub name: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub docs: Vec<String>,
	#[serde(default)]
	pub accounts: Vec<InstructionAccountNode>,
	#[serde(default)]
	pub arguments: Vec<InstructionArgumentNode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub discriminator: Option<DiscriminatorNode>,
}

impl InstructionNode {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn add_account(mut self, account: InstructionAccountNode) -> Self {
		self.accounts.push(account);
		self
	}

	#[must_use]
	pub fn add_argument(mut self, argument: InstructionArgumentNode) -> Self {
		self.arguments.push(argument);
		self
	}

	pub fn account(&self, name: &str) -> Option<&InstructionAccountNode> {
		self.accounts.iter().find(|account| account.name == name)
	}

	pub fn argument(&self, name: &str) -> Option<&InstructionArgumentNode> {
		self.arguments.iter().find(|argument| argument.name == name)
	}
}

/// An account slot inside an instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct InstructionAccountNode {
	pub name: String,
	#[serde(default)]
	pub is_writable: bool,
	#[serde(default)]
	pub is_signer: bool,
	#[serde(default)]
	pub is_optional: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub docs: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default_value: Option<DefaultValueNode>,
}

impl InstructionAccountNode {
	pub fn new(name: impl Into<String>, is_writable: bool, is_signer: bool) -> Self {
		Self {
			name: name.into(),
			is_writable,
			is_signer,
			..Self::default()
		}
	}
}

/// A typed argument of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionArgumentNode {
	pub name: String,
	#[serde(rename = "type")]
	pub type_node: TypeNode,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub docs: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default_value: Option<DefaultValueNode>,
}

impl InstructionArgumentNode {
	pub fn new(name: impl Into<String>, type_node: impl Into<TypeNode>) -> Self {
		Self {
			name: name.into(),
			type_node: type_node.into(),
			docs: Vec::new(),
			default_value: None,
		}
	}
}

/// A named type that fields and arguments can link to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinedTypeNode {
	pub name: String,
	#[serde(rename = "type")]
	pub type_node: TypeNode,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub docs: Vec<String>,
}

impl DefinedTypeNode {
	pub fn new(name: impl Into<String>, type_node: impl Into<TypeNode>) -> Self {
		Self {
			name: name.into(),
			type_node: type_node.into(),
			docs: Vec::new(),
		}
	}
}

/// A custom program error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNode {
	pub code: u32,
	pub name: String,
	#[serde(default)]
	pub message: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub docs: Vec<String>,
}

impl ErrorNode {
	pub fn new(code: u32, name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			code,
			name: name.into(),
			message: message.into(),
			docs: Vec::new(),
		}
	}
}

/// One seed of an address-derivation recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PdaSeedNode {
	Constant(ConstantPdaSeedNode),
	Variable(VariablePdaSeedNode),
}

impl PdaSeedNode {
	pub fn utf8(value: impl Into<String>) -> Self {
		Self::Constant(ConstantPdaSeedNode {
			value: ConstantSeedValue::Utf8(value.into()),
		})
	}

	pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
		Self::Constant(ConstantPdaSeedNode {
			value: ConstantSeedValue::Bytes(value.into()),
		})
	}

	pub fn program_id() -> Self {
		Self::Constant(ConstantPdaSeedNode {
			value: ConstantSeedValue::ProgramId,
		})
	}

	pub fn variable(name: impl Into<String>, type_node: impl Into<TypeNode>) -> Self {
		Self::Variable(VariablePdaSeedNode {
			name: name.into(),
			type_node: type_node.into(),
			docs: Vec::new(),
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantPdaSeedNode {
	pub value: ConstantSeedValue,
}

/// The value of a constant seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstantSeedValue {
	Utf8(String),
	Bytes(Vec<u8>),
	ProgramId,
}

impl ConstantSeedValue {
	/// The raw seed bytes, or `None` for the program id which is only known to
	/// the generated client.
	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Self::Utf8(value) => Some(value.as_bytes()),
			Self::Bytes(value) => Some(value),
			Self::ProgramId => None,
		}
	}
}

/// A seed supplied at derivation time from a same-named instruction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablePdaSeedNode {
	pub name: String,
	#[serde(rename = "type")]
	pub type_node: TypeNode,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub docs: Vec<String>,
}
