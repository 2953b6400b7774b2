//! Discriminator assignment for the accounts or instructions of a program.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use heck::ToSnakeCase;
use heck::ToUpperCamelCase;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use super::UpdateOperation;
use super::program_mut;
use crate::error::TransformError;
use crate::index::NodeIndex;
use crate::index::NodePath;
use crate::nodes::DiscriminatorNode;
use crate::nodes::EnumVariantNode;
use crate::nodes::NumberFormat;
use crate::nodes::ProgramNode;
use crate::nodes::RootNode;
use crate::nodes::TypeNode;

/// Length of a sighash discriminator.
pub const SIGHASH_LEN: usize = 8;

/// Which collection of a program receives discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SiblingSet {
	Accounts,
	Instructions,
}

impl SiblingSet {
	fn collection(self) -> &'static str {
		match self {
			Self::Accounts => "accounts",
			Self::Instructions => "instructions",
		}
	}

	fn path(self, program: &str, name: &str) -> NodePath {
		match self {
			Self::Accounts => NodePath::account(program, name),
			Self::Instructions => NodePath::instruction(program, name),
		}
	}
}

fn default_size() -> NumberFormat {
	NumberFormat::U8
}

/// Where discriminator values come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiscriminatorSource {
	/// `start`, `start + 1`, ... in declaration order.
	Sequential {
		#[serde(default)]
		start: u64,
		#[serde(default = "default_size")]
		size: NumberFormat,
	},
	/// A value per sibling name.
	Explicit {
		values: BTreeMap<String, u64>,
		#[serde(default = "default_size")]
		size: NumberFormat,
	},
	/// The tag of the same-named variant of a defined enum.
	EnumVariants {
		#[serde(rename = "enumType")]
		enum_type: NodePath,
		#[serde(default = "default_size")]
		size: NumberFormat,
	},
	/// The first eight bytes of `sha256("<namespace>:<name>")`.
	Sighash { namespace: String },
}

impl DiscriminatorSource {
	pub fn sequential(start: u64) -> Self {
		Self::Sequential {
			start,
			size: default_size(),
		}
	}

	pub fn explicit<N: Into<String>>(values: impl IntoIterator<Item = (N, u64)>) -> Self {
		Self::Explicit {
			values: values.into_iter().map(|(name, value)| (name.into(), value)).collect(),
			size: default_size(),
		}
	}

	pub fn enum_variants(enum_type: NodePath) -> Self {
		Self::EnumVariants {
			enum_type,
			size: default_size(),
		}
	}

	pub fn sighash(namespace: impl Into<String>) -> Self {
		Self::Sighash {
			namespace: namespace.into(),
		}
	}
}

/// Assign a distinct discriminator to every node of a sibling set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDiscriminators {
	pub program: NodePath,
	pub siblings: SiblingSet,
	/// Restrict assignment to these names. Empty means every sibling.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub only: Vec<String>,
	pub source: DiscriminatorSource,
	#[serde(default)]
	pub offset: usize,
}

impl AssignDiscriminators {
	pub fn new(program: NodePath, siblings: SiblingSet, source: DiscriminatorSource) -> Self {
		Self {
			program,
			siblings,
			only: Vec::new(),
			source,
			offset: 0,
		}
	}

	#[must_use]
	pub fn only<N: Into<String>>(mut self, names: impl IntoIterator<Item = N>) -> Self {
		self.only = names.into_iter().map(Into::into).collect();
		self
	}

	#[must_use]
	pub fn at_offset(mut self, offset: usize) -> Self {
		self.offset = offset;
		self
	}

	fn scope(&self) -> String {
		format!("{}/{}", self.program, self.siblings.collection())
	}
}

/// The name and current discriminator of every sibling, in declaration order.
fn siblings(program: &ProgramNode, set: SiblingSet) -> Vec<(&str, Option<&DiscriminatorNode>)> {
	match set {
		SiblingSet::Accounts => {
			program
				.accounts
				.iter()
				.map(|account| (account.name.as_str(), account.discriminator.as_ref()))
				.collect()
		}
		SiblingSet::Instructions => {
			program
				.instructions
				.iter()
				.map(|instruction| (instruction.name.as_str(), instruction.discriminator.as_ref()))
				.collect()
		}
	}
}

impl UpdateOperation for AssignDiscriminators {
	fn apply(&self, index: &NodeIndex<'_>) -> Result<RootNode, TransformError> {
		let (program, position) = index.program(&self.program)?;
		let current = siblings(program, self.siblings);

		let known = current.iter().map(|(name, _)| *name).collect::<HashSet<_>>();
		if let Some(missing) = self.only.iter().find(|name| !known.contains(name.as_str())) {
			return Err(TransformError::unresolved(
				self.siblings.path(&program.name, missing),
			));
		}
		let selected = |name: &str| self.only.is_empty() || self.only.iter().any(|n| n == name);

		let variants = match &self.source {
			DiscriminatorSource::EnumVariants { enum_type, .. } => {
				Some(enum_variants(index, enum_type)?)
			}
			_ => None,
		};

		let scope = self.scope();
		let mut assigned = BTreeMap::new();
		for (ordinal, (name, _)) in current
			.iter()
			.filter(|(name, _)| selected(name))
			.enumerate()
		{
			let discriminator = self.value_for(&scope, name, ordinal, variants)?;
			assigned.insert(*name, discriminator);
		}

		// Siblings outside the narrowed set keep their discriminator but still
		// take part in the uniqueness check.
		let mut seen: HashMap<(usize, Vec<u8>), &str> = HashMap::new();
		for (name, existing) in &current {
			let Some(discriminator) = assigned.get(name).or(*existing) else {
				continue;
			};
			let key = (discriminator.offset, discriminator.encoded());
			if let Some(first) = seen.insert(key, *name) {
				return Err(TransformError::DiscriminatorCollision {
					scope,
					first: first.to_owned(),
					second: (*name).to_owned(),
					value: discriminator.to_string(),
				});
			}
		}

		let mut root = index.root().clone();
		let program = program_mut(&mut root, &self.program, position)?;
		match self.siblings {
			SiblingSet::Accounts => {
				for account in &mut program.accounts {
					let next = assigned.get(account.name.as_str());
					if next.is_some() && next != account.discriminator.as_ref() {
						Arc::make_mut(account).discriminator = next.cloned();
					}
				}
			}
			SiblingSet::Instructions => {
				for instruction in &mut program.instructions {
					let next = assigned.get(instruction.name.as_str());
					if next.is_some() && next != instruction.discriminator.as_ref() {
						Arc::make_mut(instruction).discriminator = next.cloned();
					}
				}
			}
		}
		log::debug!("assigned {} discriminators in `{scope}`", assigned.len());

		Ok(root)
	}
}

impl AssignDiscriminators {
	fn value_for(
		&self,
		scope: &str,
		name: &str,
		ordinal: usize,
		variants: Option<&[EnumVariantNode]>,
	) -> Result<DiscriminatorNode, TransformError> {
		let missing = |reason: String| {
			TransformError::DiscriminatorSourceMissing {
				scope: scope.to_owned(),
				name: name.to_owned(),
				reason,
			}
		};

		let (size, value) = match &self.source {
			DiscriminatorSource::Sequential { start, size } => {
				let value = u64::try_from(ordinal)
					.ok()
					.and_then(|ordinal| start.checked_add(ordinal))
					.ok_or_else(|| missing("the sequence overflows u64".to_owned()))?;
				(*size, value)
			}
			DiscriminatorSource::Explicit { values, size } => {
				let value = values
					.get(name)
					.ok_or_else(|| missing("no explicit value is listed".to_owned()))?;
				(*size, *value)
			}
			DiscriminatorSource::EnumVariants { enum_type, size } => {
				let wanted = name.to_snake_case();
				let value = variants
					.into_iter()
					.flatten()
					.enumerate()
					.find(|(_, variant)| variant.name.to_snake_case() == wanted)
					.map(|(position, variant)| variant.tag(position))
					.ok_or_else(|| missing(format!("`{enum_type}` has no matching variant")))?;
				(*size, value)
			}
			DiscriminatorSource::Sighash { namespace } => {
				let bytes = sighash(namespace, name);
				return Ok(DiscriminatorNode::bytes(bytes).with_offset(self.offset));
			}
		};

		if size.encode_unsigned(value).is_none() {
			return Err(missing(format!("{value} does not fit in {size}")));
		}

		Ok(DiscriminatorNode::number(size, value).with_offset(self.offset))
	}
}

fn enum_variants<'a>(
	index: &NodeIndex<'a>,
	enum_type: &NodePath,
) -> Result<&'a [EnumVariantNode], TransformError> {
	let (defined_type, _) = index.defined_type(enum_type)?;
	match &defined_type.type_node {
		TypeNode::Enum { variants } => Ok(variants),
		_ => {
			Err(TransformError::InvalidSelector {
				path: enum_type.to_string(),
				expected: "an enum type",
			})
		}
	}
}

/// Anchor-style sighash. Account names keep their type casing; everything
/// else hashes the snake-cased name.
pub fn sighash(namespace: &str, name: &str) -> [u8; SIGHASH_LEN] {
	let name = if namespace == "account" {
		name.to_upper_camel_case()
	} else {
		name.to_snake_case()
	};
	let hash = Sha256::digest(format!("{namespace}:{name}").as_bytes());

	let mut result = [0u8; SIGHASH_LEN];
	result.copy_from_slice(&hash[..SIGHASH_LEN]);
	result
}
