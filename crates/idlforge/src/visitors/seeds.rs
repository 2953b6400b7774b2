use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use super::UpdateOperation;
use super::account_mut;
use crate::error::TransformError;
use crate::index::NodeIndex;
use crate::index::NodePath;
use crate::nodes::PdaSeedNode;
use crate::nodes::RootNode;

/// The most seeds an address derivation accepts.
pub const MAX_SEEDS: usize = 16;
/// The longest constant seed, in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Attach an address-derivation recipe to one account, replacing any recipe
/// it already carries. Seeds keep the declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAccountSeeds {
	pub account: NodePath,
	pub seeds: Vec<PdaSeedNode>,
}

impl SetAccountSeeds {
	pub fn new(account: NodePath, seeds: Vec<PdaSeedNode>) -> Self {
		Self { account, seeds }
	}

	fn validate(&self) -> Result<(), TransformError> {
		let invalid = |reason: String| {
			TransformError::InvalidSeeds {
				account: self.account.to_string(),
				reason,
			}
		};

		if self.seeds.is_empty() {
			return Err(invalid("the seed list is empty".to_owned()));
		}
		if self.seeds.len() > MAX_SEEDS {
			return Err(invalid(format!(
				"{} seeds exceed the limit of {MAX_SEEDS}",
				self.seeds.len()
			)));
		}

		let mut variables = HashSet::new();
		for seed in &self.seeds {
			match seed {
				PdaSeedNode::Constant(constant) => {
					let len = constant.value.as_bytes().map_or(0, <[u8]>::len);
					if len > MAX_SEED_LEN {
						return Err(invalid(format!(
							"a constant seed of {len} bytes exceeds {MAX_SEED_LEN} bytes"
						)));
					}
				}
				PdaSeedNode::Variable(variable) => {
					if variable.name.is_empty() {
						return Err(invalid("a variable seed has no name".to_owned()));
					}
					if !variables.insert(variable.name.as_str()) {
						return Err(invalid(format!(
							"variable seed `{}` is declared twice",
							variable.name
						)));
					}
				}
			}
		}

		Ok(())
	}
}

impl UpdateOperation for SetAccountSeeds {
	fn apply(&self, index: &NodeIndex<'_>) -> Result<RootNode, TransformError> {
		let (_, position) = index.account(&self.account)?;
		self.validate()?;

		let mut root = index.root().clone();
		account_mut(&mut root, &self.account, position)?.seeds = Some(self.seeds.clone());
		log::debug!("set {} seeds on `{}`", self.seeds.len(), self.account);

		Ok(root)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::nodes::AccountNode;
	use crate::nodes::InstructionNode;
	use crate::nodes::NumberFormat;
	use crate::nodes::ProgramNode;
	use crate::nodes::StructFieldNode;
	use crate::nodes::TypeNode;

	fn sample_root() -> RootNode {
		RootNode::new(
			ProgramNode::new("counter", "Counter111111111111111111111111111111111111")
				.add_account(AccountNode::new(
					"Counter",
					vec![StructFieldNode::new("count", NumberFormat::U64)],
				))
				.add_account(AccountNode::new("Config", Vec::new()))
				.add_instruction(InstructionNode::new("create")),
		)
	}

	fn counter() -> NodePath {
		NodePath::account("counter", "Counter")
	}

	#[test]
	fn records_seeds_in_declared_order() {
		let root = sample_root();
		let seeds = vec![
			PdaSeedNode::utf8("counter"),
			PdaSeedNode::variable("authority", TypeNode::PublicKey),
			PdaSeedNode::program_id(),
		];
		let updated = SetAccountSeeds::new(counter(), seeds.clone())
			.apply(&NodeIndex::new(&root))
			.unwrap_or_else(|e| panic!("apply failed: {e}"));

		let account = updated.programs[0]
			.account("Counter")
			.unwrap_or_else(|| panic!("missing account"));
		assert_eq!(account.seeds.as_ref(), Some(&seeds));
		assert_eq!(account.seed_inputs().len(), 1);
		assert!(root.programs[0].accounts[0].seeds.is_none());
		assert!(Arc::ptr_eq(
			&root.programs[0].accounts[1],
			&updated.programs[0].accounts[1]
		));
	}

	#[test]
	fn replaces_an_existing_recipe() {
		let root = sample_root();
		let first = SetAccountSeeds::new(counter(), vec![PdaSeedNode::utf8("old")])
			.apply(&NodeIndex::new(&root))
			.unwrap_or_else(|e| panic!("apply failed: {e}"));
		let second = SetAccountSeeds::new(counter(), vec![PdaSeedNode::utf8("new")])
			.apply(&NodeIndex::new(&first))
			.unwrap_or_else(|e| panic!("apply failed: {e}"));

		assert_eq!(
			second.programs[0].accounts[0].seeds,
			Some(vec![PdaSeedNode::utf8("new")])
		);
	}

	#[test]
	fn rejects_empty_seed_lists() {
		let root = sample_root();
		let error = SetAccountSeeds::new(counter(), Vec::new())
			.apply(&NodeIndex::new(&root))
			.expect_err("apply should fail");
		insta::assert_snapshot!(error.to_string(), @"invalid seeds for `programs/counter/accounts/Counter`: the seed list is empty");
	}

	#[test]
	fn rejects_repeated_variable_seeds() {
		let root = sample_root();
		let error = SetAccountSeeds::new(
			counter(),
			vec![
				PdaSeedNode::variable("authority", TypeNode::PublicKey),
				PdaSeedNode::variable("authority", TypeNode::PublicKey),
			],
		)
		.apply(&NodeIndex::new(&root))
		.expect_err("apply should fail");
		assert!(matches!(error, TransformError::InvalidSeeds { .. }));
	}

	#[test]
	fn rejects_oversized_constants() {
		let root = sample_root();
		let error = SetAccountSeeds::new(counter(), vec![PdaSeedNode::bytes(vec![0; 33])])
			.apply(&NodeIndex::new(&root))
			.expect_err("apply should fail");
		assert!(matches!(error, TransformError::InvalidSeeds { .. }));
	}

	#[test]
	fn unknown_account_is_unresolved() {
		let root = sample_root();
		let error = SetAccountSeeds::new(
			NodePath::account("counter", "Missing"),
			vec![PdaSeedNode::utf8("x")],
		)
		.apply(&NodeIndex::new(&root))
		.expect_err("apply should fail");
		assert!(matches!(error, TransformError::UnresolvedReference { .. }));
	}
}
