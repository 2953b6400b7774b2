//! Default values for instruction accounts and arguments.
//!
//! A default narrows what a generated call-builder asks its caller for. It
//! never changes the accounts or bytes an instruction carries on the wire.

use serde::Deserialize;
use serde::Serialize;

use super::UpdateOperation;
use super::instruction_mut;
use crate::error::TransformError;
use crate::index::NodeIndex;
use crate::index::NodePath;
use crate::index::NodeRef;
use crate::nodes::DefaultValueNode;
use crate::nodes::InputRef;
use crate::nodes::InstructionAccountNode;
use crate::nodes::InstructionArgumentNode;
use crate::nodes::InstructionNode;
use crate::nodes::LiteralValue;
use crate::nodes::RootNode;
use crate::nodes::SeedBinding;
use crate::nodes::TypeNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultValueRule {
	/// An instruction account or argument.
	pub target: NodePath,
	pub value: DefaultValueNode,
}

impl DefaultValueRule {
	pub fn new(target: NodePath, value: DefaultValueNode) -> Self {
		Self { target, value }
	}
}

/// Attach default values. Rules apply in order; a later rule for the same
/// target replaces an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDefaultValues {
	pub defaults: Vec<DefaultValueRule>,
}

impl SetDefaultValues {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, target: NodePath, value: DefaultValueNode) -> Self {
		self.defaults.push(DefaultValueRule::new(target, value));
		self
	}
}

#[derive(Clone, Copy)]
enum Target<'a> {
	Account(&'a InstructionAccountNode),
	Argument(&'a InstructionArgumentNode),
}

impl Target<'_> {
	fn input(self) -> InputRef {
		match self {
			Self::Account(account) => InputRef::Account(account.name.clone()),
			Self::Argument(argument) => InputRef::Argument(argument.name.clone()),
		}
	}

	/// Whether the target can hold an address.
	fn holds_address(self) -> bool {
		match self {
			Self::Account(_) => true,
			Self::Argument(argument) => unwrap_option(&argument.type_node) == &TypeNode::PublicKey,
		}
	}
}

impl UpdateOperation for SetDefaultValues {
	fn apply(&self, index: &NodeIndex<'_>) -> Result<RootNode, TransformError> {
		let mut root = index.root().clone();

		for rule in &self.defaults {
			let entry = index.resolve(&rule.target)?;
			let target = match entry.node {
				NodeRef::InstructionAccount(account) => Target::Account(account),
				NodeRef::InstructionArgument(argument) => Target::Argument(argument),
				_ => {
					return Err(TransformError::InvalidSelector {
						path: rule.target.to_string(),
						expected: "an instruction account or argument",
					});
				}
			};
			let instruction_path = rule
				.target
				.parent()
				.ok_or_else(|| TransformError::unresolved(&rule.target))?;
			let (instruction, _) = index.instruction(&instruction_path)?;

			let value = resolve_value(index, rule, instruction, target)?;
			let member = entry
				.position
				.member
				.ok_or_else(|| TransformError::unresolved(&rule.target))?;
			let instruction = instruction_mut(&mut root, &rule.target, entry.position)?;
			let slot = match target {
				Target::Account(_) => instruction.accounts.get_mut(member).map(|a| &mut a.default_value),
				Target::Argument(_) => instruction.arguments.get_mut(member).map(|a| &mut a.default_value),
			};
			*slot.ok_or_else(|| TransformError::unresolved(&rule.target))? = Some(value);
			log::debug!("set default value of `{}`", rule.target);
		}

		Ok(root)
	}
}

/// Check a rule against the instruction it targets and return the value to
/// store, with every seed binding of a derived address filled in.
fn resolve_value(
	index: &NodeIndex<'_>,
	rule: &DefaultValueRule,
	instruction: &InstructionNode,
	target: Target<'_>,
) -> Result<DefaultValueNode, TransformError> {
	let incompatible = |reason: &str| {
		TransformError::IncompatibleDefaultValue {
			target: rule.target.to_string(),
			reason: reason.to_owned(),
		}
	};
	let input_exists = |input: &InputRef| {
		match input {
			InputRef::Account(name) => instruction.account(name).is_some(),
			InputRef::Argument(name) => instruction.argument(name).is_some(),
		}
	};
	let optional_account = |input: &InputRef| {
		matches!(input, InputRef::Account(name)
			if instruction.account(name).is_some_and(|account| account.is_optional))
	};

	let value = match &rule.value {
		DefaultValueNode::Absent => {
			let absent_allowed = match target {
				Target::Account(account) => account.is_optional,
				Target::Argument(argument) => argument.type_node.is_option(),
			};
			if !absent_allowed {
				return Err(incompatible(
					"`absent` needs an optional account or an `option` argument",
				));
			}
			rule.value.clone()
		}
		DefaultValueNode::ProgramId => {
			if !target.holds_address() {
				return Err(incompatible("`programId` needs an address-typed target"));
			}
			rule.value.clone()
		}
		DefaultValueNode::Literal { value } => {
			let fits = match target {
				Target::Account(_) => matches!(value, LiteralValue::PublicKey(_)),
				Target::Argument(argument) => literal_fits(value, &argument.type_node),
			};
			if !fits {
				return Err(incompatible("the literal does not match the target type"));
			}
			rule.value.clone()
		}
		DefaultValueNode::Account { name } | DefaultValueNode::Argument { name } => {
			let input = match &rule.value {
				DefaultValueNode::Account { .. } => InputRef::Account(name.clone()),
				_ => InputRef::Argument(name.clone()),
			};
			if !input_exists(&input) {
				return Err(TransformError::target_missing(&rule.target, input.to_string()));
			}
			if input == target.input() {
				return Err(incompatible("a default cannot reference its own target"));
			}
			if matches!(input, InputRef::Account(_)) && !target.holds_address() {
				return Err(incompatible("an account reference needs an address-typed target"));
			}
			if optional_account(&input) {
				return Err(incompatible("an account reference cannot read an optional account"));
			}
			rule.value.clone()
		}
		DefaultValueNode::Pda { account, seeds } => {
			if !target.holds_address() {
				return Err(incompatible("a derived address needs an address-typed target"));
			}
			let program = rule
				.target
				.program_name()
				.ok_or_else(|| TransformError::unresolved(&rule.target))?;
			let (pda_account, _) = index
				.account(&NodePath::account(program, account.as_str()))
				.map_err(|_| TransformError::target_missing(&rule.target, format!("account `{account}`")))?;
			if pda_account.seeds.is_none() {
				return Err(TransformError::target_missing(
					&rule.target,
					format!("address recipe of account `{account}`"),
				));
			}

			let recipe = pda_account.seed_inputs();
			for binding in seeds {
				if !recipe.iter().any(|seed| seed.name == binding.seed) {
					return Err(TransformError::target_missing(
						&rule.target,
						format!("seed `{}` of account `{account}`", binding.seed),
					));
				}
			}

			let mut bound = Vec::with_capacity(recipe.len());
			for seed in recipe {
				let binding = match seeds.iter().find(|binding| binding.seed == seed.name) {
					Some(binding) => binding.clone(),
					None => {
						let implied = [
							InputRef::Account(seed.name.clone()),
							InputRef::Argument(seed.name.clone()),
						]
						.into_iter()
						.find(|input| input_exists(input))
						.ok_or_else(|| {
							TransformError::target_missing(
								&rule.target,
								format!("an input for seed `{}`", seed.name),
							)
						})?;
						SeedBinding::new(seed.name.as_str(), implied)
					}
				};
				if !input_exists(&binding.value) {
					return Err(TransformError::target_missing(
						&rule.target,
						binding.value.to_string(),
					));
				}
				if binding.value == target.input() {
					return Err(incompatible("a derived address cannot be seeded by its own target"));
				}
				if optional_account(&binding.value) {
					return Err(incompatible("a derived address cannot be seeded by an optional account"));
				}
				bound.push(binding);
			}

			DefaultValueNode::Pda {
				account: account.clone(),
				seeds: bound,
			}
		}
	};

	Ok(value)
}

fn unwrap_option(type_node: &TypeNode) -> &TypeNode {
	match type_node {
		TypeNode::Option { item } => item.as_ref(),
		other => other,
	}
}

/// Whether a literal can stand for a value of `type_node`. Links are
/// accepted as-is since the literal is only passed through.
fn literal_fits(literal: &LiteralValue, type_node: &TypeNode) -> bool {
	match (literal, unwrap_option(type_node)) {
		(_, TypeNode::Link { .. })
		| (LiteralValue::Number(_), TypeNode::Number { .. })
		| (LiteralValue::Boolean(_), TypeNode::Boolean)
		| (LiteralValue::String(_), TypeNode::String)
		| (LiteralValue::PublicKey(_), TypeNode::PublicKey)
		| (LiteralValue::Bytes(_), TypeNode::Bytes | TypeNode::FixedSize { .. }) => true,
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::nodes::AccountNode;
	use crate::nodes::NumberFormat;
	use crate::nodes::PdaSeedNode;
	use crate::nodes::ProgramNode;

	fn sample_root() -> RootNode {
		let mut counter = AccountNode::new("Counter", Vec::new());
		counter.seeds = Some(vec![
			PdaSeedNode::utf8("counter"),
			PdaSeedNode::variable("authority", TypeNode::PublicKey),
		]);
		let mut rent = InstructionAccountNode::new("rent", false, false);
		rent.is_optional = true;

		RootNode::new(
			ProgramNode::new("counter", "Counter111111111111111111111111111111111111")
				.add_account(counter)
				.add_account(AccountNode::new("Unseeded", Vec::new()))
				.add_instruction(
					InstructionNode::new("create")
						.add_account(InstructionAccountNode::new("counter", true, false))
						.add_account(InstructionAccountNode::new("payer", true, true))
						.add_account(InstructionAccountNode::new("authority", false, true))
						.add_account(rent)
						.add_argument(InstructionArgumentNode::new("step", NumberFormat::U8))
						.add_argument(InstructionArgumentNode::new(
							"memo",
							TypeNode::option(TypeNode::String),
						)),
				),
		)
	}

	fn create(name: &str) -> NodePath {
		NodePath::instruction_account("counter", "create", name)
	}

	fn argument(name: &str) -> NodePath {
		NodePath::instruction_argument("counter", "create", name)
	}

	fn apply(root: &RootNode, operation: &SetDefaultValues) -> Result<RootNode, TransformError> {
		operation.apply(&NodeIndex::new(root))
	}

	#[test]
	fn materializes_implied_seed_bindings() {
		let root = sample_root();
		let updated = apply(
			&root,
			&SetDefaultValues::new()
				.with(create("counter"), DefaultValueNode::pda("Counter"))
				.with(create("payer"), DefaultValueNode::account("authority")),
		)
		.unwrap_or_else(|e| panic!("apply failed: {e}"));

		let instruction = &updated.programs[0].instructions[0];
		assert_eq!(
			instruction.accounts[0].default_value,
			Some(DefaultValueNode::Pda {
				account: "Counter".to_owned(),
				seeds: vec![SeedBinding::new(
					"authority",
					InputRef::Account("authority".to_owned())
				)],
			})
		);
		assert_eq!(
			instruction.accounts[1].default_value,
			Some(DefaultValueNode::account("authority"))
		);
		assert!(root.programs[0].instructions[0].accounts[0].default_value.is_none());
	}

	#[test]
	fn pda_needs_an_address_recipe() {
		let root = sample_root();
		let error = apply(
			&root,
			&SetDefaultValues::new().with(create("counter"), DefaultValueNode::pda("Unseeded")),
		)
		.expect_err("apply should fail");
		insta::assert_snapshot!(error.to_string(), @"default value for `programs/counter/instructions/create/accounts/counter` references missing address recipe of account `Unseeded`");
	}

	#[test]
	fn pda_bindings_must_name_declared_seeds() {
		let root = sample_root();
		let error = apply(
			&root,
			&SetDefaultValues::new().with(
				create("counter"),
				DefaultValueNode::Pda {
					account: "Counter".to_owned(),
					seeds: vec![SeedBinding::new("owner", InputRef::Account("payer".to_owned()))],
				},
			),
		)
		.expect_err("apply should fail");
		assert!(matches!(error, TransformError::DefaultValueTargetMissing { .. }));
	}

	#[test]
	fn references_must_exist() {
		let root = sample_root();
		let error = apply(
			&root,
			&SetDefaultValues::new().with(create("payer"), DefaultValueNode::account("owner")),
		)
		.expect_err("apply should fail");
		insta::assert_snapshot!(error.to_string(), @"default value for `programs/counter/instructions/create/accounts/payer` references missing account `owner`");
	}

	#[test]
	fn absent_needs_an_optional_target() {
		let root = sample_root();
		assert!(
			apply(
				&root,
				&SetDefaultValues::new()
					.with(create("rent"), DefaultValueNode::Absent)
					.with(argument("memo"), DefaultValueNode::Absent),
			)
			.is_ok()
		);

		let error = apply(
			&root,
			&SetDefaultValues::new().with(argument("step"), DefaultValueNode::Absent),
		)
		.expect_err("apply should fail");
		assert!(matches!(error, TransformError::IncompatibleDefaultValue { .. }));
	}

	#[test]
	fn literals_must_match_the_argument_type() {
		let root = sample_root();
		let number = DefaultValueNode::Literal {
			value: LiteralValue::Number(1),
		};
		assert!(apply(&root, &SetDefaultValues::new().with(argument("step"), number.clone())).is_ok());

		let error = apply(&root, &SetDefaultValues::new().with(argument("memo"), number))
			.expect_err("apply should fail");
		assert!(matches!(error, TransformError::IncompatibleDefaultValue { .. }));
	}

	#[test]
	fn targets_must_be_instruction_inputs() {
		let root = sample_root();
		let error = apply(
			&root,
			&SetDefaultValues::new().with(
				NodePath::account("counter", "Counter"),
				DefaultValueNode::ProgramId,
			),
		)
		.expect_err("apply should fail");
		assert!(matches!(error, TransformError::InvalidSelector { .. }));
	}

	#[test]
	fn self_references_are_rejected() {
		let root = sample_root();
		let error = apply(
			&root,
			&SetDefaultValues::new().with(create("payer"), DefaultValueNode::account("payer")),
		)
		.expect_err("apply should fail");
		assert!(matches!(error, TransformError::IncompatibleDefaultValue { .. }));
	}

	#[test]
	fn optional_accounts_cannot_feed_defaults() {
		let root = sample_root();
		let error = apply(
			&root,
			&SetDefaultValues::new().with(create("payer"), DefaultValueNode::account("rent")),
		)
		.expect_err("apply should fail");
		insta::assert_snapshot!(error.to_string(), @"default value for `programs/counter/instructions/create/accounts/payer` is not applicable: an account reference cannot read an optional account");

		let seeded_by_rent = DefaultValueNode::Pda {
			account: "Counter".to_owned(),
			seeds: vec![SeedBinding::new("authority", InputRef::Account("rent".to_owned()))],
		};
		let error = apply(&root, &SetDefaultValues::new().with(create("counter"), seeded_by_rent))
			.expect_err("apply should fail");
		insta::assert_snapshot!(error.to_string(), @"default value for `programs/counter/instructions/create/accounts/counter` is not applicable: a derived address cannot be seeded by an optional account");
	}
}
