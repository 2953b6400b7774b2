//! Serde model of the accepted interface description documents: the Shank
//! and legacy Anchor IDL JSON shape, plus the top-level `address` and
//! per-item `discriminator` arrays of newer Anchor IDLs.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlDocument {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub metadata: IdlMetadata,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default)]
	pub instructions: Vec<IdlInstruction>,
	#[serde(default)]
	pub accounts: Vec<IdlAccountDef>,
	#[serde(default)]
	pub types: Vec<IdlTypeDef>,
	#[serde(default)]
	pub errors: Vec<IdlErrorCode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlMetadata {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlInstruction {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default)]
	pub accounts: Vec<IdlInstructionAccount>,
	#[serde(default)]
	pub args: Vec<IdlField>,
	/// Shank: `{ "type": "u8", "value": 0 }`.
	#[serde(default)]
	pub discriminant: Option<IdlDiscriminant>,
	/// Anchor: raw leading bytes.
	#[serde(default)]
	pub discriminator: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlInstructionAccount {
	pub name: String,
	#[serde(default, alias = "writable")]
	pub is_mut: bool,
	#[serde(default, alias = "signer")]
	pub is_signer: bool,
	#[serde(default, alias = "optional")]
	pub is_optional: bool,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default)]
	pub desc: Option<String>,
	/// Anchor account groups. Nested groups are not part of the supported
	/// vocabulary and are rejected by the loader.
	#[serde(default)]
	pub accounts: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlDiscriminant {
	#[serde(rename = "type")]
	pub ty: String,
	pub value: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlField {
	pub name: String,
	#[serde(rename = "type")]
	pub ty: IdlType,
	#[serde(default)]
	pub docs: Vec<String>,
}

/// An account entry. Legacy IDLs inline the struct layout; newer ones only
/// carry the name and discriminator and describe the layout in `types`.
#[derive(Debug, Clone, Deserialize)]
pub struct IdlAccountDef {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default, rename = "type")]
	pub ty: Option<IdlTypeDefTy>,
	#[serde(default)]
	pub discriminator: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlTypeDef {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(rename = "type")]
	pub ty: IdlTypeDefTy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum IdlTypeDefTy {
	Struct {
		#[serde(default)]
		fields: Vec<IdlField>,
	},
	Enum {
		variants: Vec<IdlEnumVariant>,
	},
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlEnumVariant {
	pub name: String,
	#[serde(default)]
	pub fields: Option<IdlEnumFields>,
	#[serde(default)]
	pub discriminant: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdlEnumFields {
	Named(Vec<IdlField>),
	Tuple(Vec<IdlType>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdlType {
	Primitive(String),
	Defined { defined: IdlDefined },
	Option { option: Box<IdlType> },
	Vec { vec: Box<IdlType> },
	Array { array: (Box<IdlType>, usize) },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdlDefined {
	Name(String),
	Named { name: String },
}

impl IdlDefined {
	pub fn name(&self) -> &str {
		match self {
			Self::Name(name) | Self::Named { name } => name,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlErrorCode {
	pub code: u32,
	pub name: String,
	#[serde(default)]
	pub msg: Option<String>,
}
