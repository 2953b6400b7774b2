use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// A structural type. The variant set is closed: every operation and
/// renderer matches on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeNode {
	Number {
		format: NumberFormat,
	},
	Boolean,
	PublicKey,
	String,
	Bytes,
	FixedSize {
		#[serde(rename = "type")]
		inner: Box<TypeNode>,
		size: usize,
	},
	Option {
		item: Box<TypeNode>,
	},
	Array {
		item: Box<TypeNode>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		count: Option<usize>,
	},
	Struct {
		fields: Vec<StructFieldNode>,
	},
	Enum {
		variants: Vec<EnumVariantNode>,
	},
	/// A by-name reference to a defined type.
	Link {
		name: String,
	},
}

impl TypeNode {
	pub fn number(format: NumberFormat) -> Self {
		Self::Number { format }
	}

	pub fn fixed_size(inner: impl Into<TypeNode>, size: usize) -> Self {
		Self::FixedSize {
			inner: Box::new(inner.into()),
			size,
		}
	}

	pub fn option(item: impl Into<TypeNode>) -> Self {
		Self::Option {
			item: Box::new(item.into()),
		}
	}

	pub fn array(item: impl Into<TypeNode>, count: Option<usize>) -> Self {
		Self::Array {
			item: Box::new(item.into()),
			count,
		}
	}

	pub fn link(name: impl Into<String>) -> Self {
		Self::Link { name: name.into() }
	}

	/// The serialized tag of this variant.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Number { .. } => "number",
			Self::Boolean => "boolean",
			Self::PublicKey => "publicKey",
			Self::String => "string",
			Self::Bytes => "bytes",
			Self::FixedSize { .. } => "fixedSize",
			Self::Option { .. } => "option",
			Self::Array { .. } => "array",
			Self::Struct { .. } => "struct",
			Self::Enum { .. } => "enum",
			Self::Link { .. } => "link",
		}
	}

	pub fn is_option(&self) -> bool {
		matches!(self, Self::Option { .. })
	}

	/// Whether a link named `name` appears at any depth.
	pub fn links_to(&self, name: &str) -> bool {
		self.has_link(&|link| link == name)
	}

	/// Whether any link at any depth satisfies `matches`.
	pub fn has_link(&self, matches: &impl Fn(&str) -> bool) -> bool {
		match self {
			Self::Link { name } => matches(name),
			Self::FixedSize { inner, .. } => inner.has_link(matches),
			Self::Option { item } | Self::Array { item, .. } => item.has_link(matches),
			Self::Struct { fields } => fields.iter().any(|field| field.type_node.has_link(matches)),
			Self::Enum { variants } => {
				variants
					.iter()
					.flat_map(|v| v.fields.iter().flatten())
					.any(|field| field.type_node.has_link(matches))
			}
			Self::Number { .. } | Self::Boolean | Self::PublicKey | Self::String | Self::Bytes => false,
		}
	}

	/// Rewrite every link (at any depth) whose name is a key of `renames`.
	/// Each link is looked up once, so the map may swap names.
	pub fn rename_links(&mut self, renames: &BTreeMap<String, String>) {
		match self {
			Self::Link { name } => {
				if let Some(renamed) = renames.get(name.as_str()) {
					renamed.clone_into(name);
				}
			}
			Self::FixedSize { inner, .. } => inner.rename_links(renames),
			Self::Option { item } | Self::Array { item, .. } => item.rename_links(renames),
			Self::Struct { fields } => {
				for field in fields {
					field.type_node.rename_links(renames);
				}
			}
			Self::Enum { variants } => {
				for field in variants.iter_mut().flat_map(|v| v.fields.iter_mut().flatten()) {
					field.type_node.rename_links(renames);
				}
			}
			Self::Number { .. } | Self::Boolean | Self::PublicKey | Self::String | Self::Bytes => {}
		}
	}
}

impl From<NumberFormat> for TypeNode {
	fn from(format: NumberFormat) -> Self {
		Self::Number { format }
	}
}

/// Width and signedness of a number. Always little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberFormat {
	U8,
	U16,
	U32,
	U64,
	U128,
	I8,
	I16,
	I32,
	I64,
	I128,
	F32,
	F64,
}

impl NumberFormat {
	pub fn size(self) -> usize {
		match self {
			Self::U8 | Self::I8 => 1,
			Self::U16 | Self::I16 => 2,
			Self::U32 | Self::I32 | Self::F32 => 4,
			Self::U64 | Self::I64 | Self::F64 => 8,
			Self::U128 | Self::I128 => 16,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::U8 => "u8",
			Self::U16 => "u16",
			Self::U32 => "u32",
			Self::U64 => "u64",
			Self::U128 => "u128",
			Self::I8 => "i8",
			Self::I16 => "i16",
			Self::I32 => "i32",
			Self::I64 => "i64",
			Self::I128 => "i128",
			Self::F32 => "f32",
			Self::F64 => "f64",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		let format = match value {
			"u8" => Self::U8,
			"u16" => Self::U16,
			"u32" => Self::U32,
			"u64" => Self::U64,
			"u128" => Self::U128,
			"i8" => Self::I8,
			"i16" => Self::I16,
			"i32" => Self::I32,
			"i64" => Self::I64,
			"i128" => Self::I128,
			"f32" => Self::F32,
			"f64" => Self::F64,
			_ => return None,
		};
		Some(format)
	}

	/// Encode an unsigned value little-endian, or `None` when it does not fit.
	/// Only unsigned integer formats can tag a discriminator.
	pub fn encode_unsigned(self, value: u64) -> Option<Vec<u8>> {
		let bytes = match self {
			Self::U8 => u8::try_from(value).ok()?.to_le_bytes().to_vec(),
			Self::U16 => u16::try_from(value).ok()?.to_le_bytes().to_vec(),
			Self::U32 => u32::try_from(value).ok()?.to_le_bytes().to_vec(),
			Self::U64 => value.to_le_bytes().to_vec(),
			Self::U128 => u128::from(value).to_le_bytes().to_vec(),
			_ => return None,
		};
		Some(bytes)
	}
}

impl std::fmt::Display for NumberFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructFieldNode {
	pub name: String,
	#[serde(rename = "type")]
	pub type_node: TypeNode,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub docs: Vec<String>,
}

impl StructFieldNode {
	pub fn new(name: impl Into<String>, type_node: impl Into<TypeNode>) -> Self {
		Self {
			name: name.into(),
			type_node: type_node.into(),
			docs: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumVariantNode {
	pub name: String,
	/// Explicit discriminant, when the description declares one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub discriminant: Option<u64>,
	/// Struct payload; `None` for an empty variant.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fields: Option<Vec<StructFieldNode>>,
}

impl EnumVariantNode {
	pub fn empty(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			discriminant: None,
			fields: None,
		}
	}

	/// The tag this variant carries on the wire: its explicit discriminant,
	/// otherwise its position.
	pub fn tag(&self, position: usize) -> u64 {
		self.discriminant.unwrap_or(position as u64)
	}
}
