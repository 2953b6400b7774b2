//! Call-builder signatures: which inputs a generated instruction builder asks
//! its caller for.

use serde::Serialize;

use crate::nodes::DefaultValueNode;
use crate::nodes::InstructionNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
	Account,
	Argument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderInput<'a> {
	pub name: &'a str,
	pub kind: InputKind,
	/// Set for defaulted inputs.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub default_value: Option<&'a DefaultValueNode>,
}

/// The inputs of one instruction, partitioned by what the caller must do.
/// Accounts come before arguments, each in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallBuilderSignature<'a> {
	/// Inputs the caller always supplies.
	pub required: Vec<BuilderInput<'a>>,
	/// Inputs the builder fills in unless the caller overrides them.
	pub defaulted: Vec<BuilderInput<'a>>,
	/// Optional accounts with no default; omitted unless supplied.
	pub optional: Vec<BuilderInput<'a>>,
}

impl<'a> CallBuilderSignature<'a> {
	pub fn of(instruction: &'a InstructionNode) -> Self {
		let mut signature = Self::default();

		for account in &instruction.accounts {
			let input = BuilderInput {
				name: &account.name,
				kind: InputKind::Account,
				default_value: account.default_value.as_ref(),
			};
			if input.default_value.is_some() {
				signature.defaulted.push(input);
			} else if account.is_optional {
				signature.optional.push(input);
			} else {
				signature.required.push(input);
			}
		}

		for argument in &instruction.arguments {
			let input = BuilderInput {
				name: &argument.name,
				kind: InputKind::Argument,
				default_value: argument.default_value.as_ref(),
			};
			if input.default_value.is_some() {
				signature.defaulted.push(input);
			} else {
				signature.required.push(input);
			}
		}

		signature
	}

	pub fn required_names(&self) -> Vec<&'a str> {
		self.required.iter().map(|input| input.name).collect()
	}

	pub fn is_required(&self, name: &str) -> bool {
		self.required.iter().any(|input| input.name == name)
	}
}
