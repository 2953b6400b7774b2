use serde::Deserialize;
use serde::Serialize;

use super::NumberFormat;

/// A tag embedded in wire or storage data that identifies which variant a
/// blob represents. The rest of the pipeline treats it as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscriminatorNode {
	pub value: DiscriminatorValue,
	#[serde(default)]
	pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiscriminatorValue {
	Number { format: NumberFormat, value: u64 },
	Bytes { bytes: Vec<u8> },
}

impl DiscriminatorNode {
	pub fn number(format: NumberFormat, value: u64) -> Self {
		Self {
			value: DiscriminatorValue::Number { format, value },
			offset: 0,
		}
	}

	pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
		Self {
			value: DiscriminatorValue::Bytes {
				bytes: bytes.into(),
			},
			offset: 0,
		}
	}

	#[must_use]
	pub fn with_offset(mut self, offset: usize) -> Self {
		self.offset = offset;
		self
	}

	/// The bytes this discriminator occupies on the wire. Two discriminators
	/// collide when their offsets and encodings are equal.
	pub fn encoded(&self) -> Vec<u8> {
		match &self.value {
			DiscriminatorValue::Number { format, value } => {
				format
					.encode_unsigned(*value)
					.unwrap_or_else(|| value.to_le_bytes()[..format.size().min(8)].to_vec())
			}
			DiscriminatorValue::Bytes { bytes } => bytes.clone(),
		}
	}

	pub fn size(&self) -> usize {
		match &self.value {
			DiscriminatorValue::Number { format, .. } => format.size(),
			DiscriminatorValue::Bytes { bytes } => bytes.len(),
		}
	}
}

impl std::fmt::Display for DiscriminatorNode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.value {
			DiscriminatorValue::Number { format, value } => write!(f, "{value}{format}")?,
			DiscriminatorValue::Bytes { bytes } => {
				f.write_str("0x")?;
				for byte in bytes {
					write!(f, "{byte:02x}")?;
				}
			}
		}
		if self.offset > 0 {
			write!(f, "@{}", self.offset)?;
		}
		Ok(())
	}
}

/// A default-value expression attached to an instruction account or
/// argument. It narrows what a generated call-builder requires from its
/// caller; it never changes the wire encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DefaultValueNode {
	/// The address derived from the recipe of the named account.
	Pda {
		account: String,
		#[serde(default)]
		seeds: Vec<SeedBinding>,
	},
	/// Another account of the same instruction.
	Account { name: String },
	/// An argument of the same instruction.
	Argument { name: String },
	/// Explicitly nothing, for optional accounts and `option` arguments.
	Absent,
	/// The address of the program that owns the instruction.
	ProgramId,
	Literal { value: LiteralValue },
}

impl DefaultValueNode {
	pub fn pda(account: impl Into<String>) -> Self {
		Self::Pda {
			account: account.into(),
			seeds: Vec::new(),
		}
	}

	pub fn account(name: impl Into<String>) -> Self {
		Self::Account { name: name.into() }
	}

	pub fn argument(name: impl Into<String>) -> Self {
		Self::Argument { name: name.into() }
	}

	pub fn public_key(address: impl Into<String>) -> Self {
		Self::Literal {
			value: LiteralValue::PublicKey(address.into()),
		}
	}

	/// Every instruction input this expression reads from.
	pub fn dependencies(&self) -> Vec<&InputRef> {
		match self {
			Self::Pda { seeds, .. } => seeds.iter().map(|binding| &binding.value).collect(),
			Self::Account { .. }
			| Self::Argument { .. }
			| Self::Absent
			| Self::ProgramId
			| Self::Literal { .. } => Vec::new(),
		}
	}
}

/// Binds one variable seed of a recipe to an instruction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedBinding {
	pub seed: String,
	pub value: InputRef,
}

impl SeedBinding {
	pub fn new(seed: impl Into<String>, value: InputRef) -> Self {
		Self {
			seed: seed.into(),
			value,
		}
	}
}

/// A reference to an account or argument of the enclosing instruction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum InputRef {
	Account(String),
	Argument(String),
}

impl InputRef {
	pub fn name(&self) -> &str {
		match self {
			Self::Account(name) | Self::Argument(name) => name,
		}
	}
}

impl std::fmt::Display for InputRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Account(name) => write!(f, "account `{name}`"),
			Self::Argument(name) => write!(f, "argument `{name}`"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiteralValue {
	Number(i64),
	Boolean(bool),
	String(String),
	/// A base58 address.
	PublicKey(String),
	Bytes(Vec<u8>),
}
