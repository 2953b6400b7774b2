//! Interface loader: raw description documents in, one [`RootNode`] out.
//!
//! The first document is the primary program; every later document adds one
//! more program to the same root. Loading is all-or-nothing.

pub mod idl;

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::LoadError;
use crate::nodes::AccountNode;
use crate::nodes::DefinedTypeNode;
use crate::nodes::DiscriminatorNode;
use crate::nodes::EnumVariantNode;
use crate::nodes::ErrorNode;
use crate::nodes::InstructionAccountNode;
use crate::nodes::InstructionArgumentNode;
use crate::nodes::InstructionNode;
use crate::nodes::NumberFormat;
use crate::nodes::ProgramNode;
use crate::nodes::RootNode;
use crate::nodes::StructFieldNode;
use crate::nodes::TypeNode;

use self::idl::IdlDocument;
use self::idl::IdlEnumFields;
use self::idl::IdlField;
use self::idl::IdlInstruction;
use self::idl::IdlType;
use self::idl::IdlTypeDefTy;

/// One raw description document and a label used in error messages
/// (usually its path).
#[derive(Debug, Clone)]
pub struct Document {
	pub label: String,
	pub contents: String,
}

impl Document {
	pub fn new(label: impl Into<String>, contents: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			contents: contents.into(),
		}
	}

	pub fn read(path: &Path) -> Result<Self, LoadError> {
		let contents = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
		Ok(Self::new(path.display().to_string(), contents))
	}
}

/// Read and load description files. The first path is the primary program.
pub fn load_paths(paths: &[PathBuf]) -> Result<RootNode, LoadError> {
	let documents = paths
		.iter()
		.map(|path| Document::read(path))
		.collect::<Result<Vec<_>, _>>()?;
	load_documents(&documents)
}

/// Merge documents into a single root.
pub fn load_documents(documents: &[Document]) -> Result<RootNode, LoadError> {
	if documents.is_empty() {
		return Err(LoadError::NoDocuments);
	}

	let mut root = RootNode::default();
	let mut addresses: BTreeMap<String, String> = BTreeMap::new();
	let mut names: HashSet<String> = HashSet::new();

	for document in documents {
		let program = parse_program(document)?;

		if let Some(first) = addresses.get(&program.public_key) {
			return Err(LoadError::DuplicateProgramAddress {
				address: program.public_key.clone(),
				first: first.clone(),
				second: program.name.clone(),
			});
		}
		if !names.insert(program.name.clone()) {
			return Err(LoadError::malformed(
				&document.label,
				format!("program name `{}` is declared by another document", program.name),
			));
		}

		addresses.insert(program.public_key.clone(), program.name.clone());
		log::debug!(
			"loaded program `{}` ({}) from {}",
			program.name,
			program.public_key,
			document.label
		);
		root.programs.push(Arc::new(program));
	}

	Ok(root)
}

/// Parse one document into a program.
pub fn parse_program(document: &Document) -> Result<ProgramNode, LoadError> {
	let label = document.label.as_str();
	let idl: IdlDocument = serde_json::from_str(&document.contents)
		.map_err(|e| LoadError::malformed(label, e.to_string()))?;

	let name = idl
		.name
		.clone()
		.or_else(|| idl.metadata.name.clone())
		.ok_or_else(|| LoadError::malformed(label, "missing program name"))?;
	let public_key = idl
		.address
		.clone()
		.or_else(|| idl.metadata.address.clone())
		.ok_or_else(|| LoadError::malformed(label, "missing program address"))?;
	let version = idl
		.version
		.clone()
		.or_else(|| idl.metadata.version.clone())
		.unwrap_or_default();

	check_name(label, "program", &name)?;

	let mut program = ProgramNode::new(name, public_key);
	program.version = version;
	program.docs.clone_from(&idl.docs);

	for type_def in &idl.types {
		check_name(label, "type", &type_def.name)?;
		let mut node =
			DefinedTypeNode::new(type_def.name.as_str(), type_def_to_node(label, &type_def.ty)?);
		node.docs.clone_from(&type_def.docs);
		program = program.add_defined_type(node);
	}

	for account in &idl.accounts {
		check_name(label, "account", &account.name)?;
		let fields = match &account.ty {
			Some(IdlTypeDefTy::Struct { fields }) => convert_fields(label, fields)?,
			Some(IdlTypeDefTy::Enum { .. }) => {
				return Err(LoadError::malformed(
					label,
					format!("account `{}` must be a struct", account.name),
				));
			}
			None => layout_from_types(label, &idl, &account.name)?,
		};
		let mut node = AccountNode::new(account.name.as_str(), fields);
		node.docs.clone_from(&account.docs);
		node.discriminator = account.discriminator.clone().map(DiscriminatorNode::bytes);
		program = program.add_account(node);
	}

	for instruction in &idl.instructions {
		program = program.add_instruction(convert_instruction(label, instruction)?);
	}

	for error in &idl.errors {
		check_name(label, "error", &error.name)?;
		let message = error.msg.clone().unwrap_or_default();
		program = program.add_error(ErrorNode::new(error.code, error.name.as_str(), message));
	}

	validate_program(label, &program)?;
	Ok(program)
}

fn convert_instruction(label: &str, instruction: &IdlInstruction) -> Result<InstructionNode, LoadError> {
	check_name(label, "instruction", &instruction.name)?;
	let mut node = InstructionNode::new(instruction.name.as_str());
	node.docs.clone_from(&instruction.docs);

	for account in &instruction.accounts {
		check_name(label, "instruction account", &account.name)?;
		if account.accounts.is_some() {
			return Err(LoadError::malformed(
				label,
				format!(
					"instruction `{}` uses a nested account group `{}`",
					instruction.name, account.name
				),
			));
		}
		let mut account_node =
			InstructionAccountNode::new(account.name.as_str(), account.is_mut, account.is_signer);
		account_node.is_optional = account.is_optional;
		account_node.docs.clone_from(&account.docs);
		if let Some(desc) = &account.desc {
			account_node.docs.push(desc.clone());
		}
		node = node.add_account(account_node);
	}

	for arg in &instruction.args {
		check_name(label, "instruction argument", &arg.name)?;
		let mut argument = InstructionArgumentNode::new(arg.name.as_str(), convert_type(label, &arg.ty)?);
		argument.docs.clone_from(&arg.docs);
		node = node.add_argument(argument);
	}

	node.discriminator = match (&instruction.discriminant, &instruction.discriminator) {
		(Some(discriminant), _) => {
			let format = NumberFormat::parse(&discriminant.ty)
				.filter(|format| format.encode_unsigned(discriminant.value).is_some())
				.ok_or_else(|| {
					LoadError::malformed(
						label,
						format!(
							"instruction `{}` has an invalid discriminant {} of type `{}`",
							instruction.name, discriminant.value, discriminant.ty
						),
					)
				})?;
			Some(DiscriminatorNode::number(format, discriminant.value))
		}
		(None, Some(bytes)) => Some(DiscriminatorNode::bytes(bytes.clone())),
		(None, None) => None,
	};

	Ok(node)
}

/// Newer Anchor IDLs describe account layouts in `types`.
fn layout_from_types(
	label: &str,
	idl: &IdlDocument,
	account: &str,
) -> Result<Vec<StructFieldNode>, LoadError> {
	let Some(type_def) = idl.types.iter().find(|type_def| type_def.name == account) else {
		return Err(LoadError::malformed(
			label,
			format!("account `{account}` has no layout"),
		));
	};
	match &type_def.ty {
		IdlTypeDefTy::Struct { fields } => convert_fields(label, fields),
		IdlTypeDefTy::Enum { .. } => {
			Err(LoadError::malformed(
				label,
				format!("account `{account}` must be a struct"),
			))
		}
	}
}

fn type_def_to_node(label: &str, ty: &IdlTypeDefTy) -> Result<TypeNode, LoadError> {
	match ty {
		IdlTypeDefTy::Struct { fields } => {
			Ok(TypeNode::Struct {
				fields: convert_fields(label, fields)?,
			})
		}
		IdlTypeDefTy::Enum { variants } => {
			let mut nodes = Vec::with_capacity(variants.len());
			for variant in variants {
				let fields = match &variant.fields {
					None => None,
					Some(IdlEnumFields::Named(fields)) => Some(convert_fields(label, fields)?),
					Some(IdlEnumFields::Tuple(types)) => {
						let mut fields = Vec::with_capacity(types.len());
						for (position, ty) in types.iter().enumerate() {
							fields.push(StructFieldNode::new(
								position.to_string(),
								convert_type(label, ty)?,
							));
						}
						Some(fields)
					}
				};
				nodes.push(EnumVariantNode {
					name: variant.name.clone(),
					discriminant: variant.discriminant,
					fields,
				});
			}
			Ok(TypeNode::Enum { variants: nodes })
		}
	}
}

fn convert_fields(label: &str, fields: &[IdlField]) -> Result<Vec<StructFieldNode>, LoadError> {
	fields
		.iter()
		.map(|field| {
			let mut node = StructFieldNode::new(field.name.as_str(), convert_type(label, &field.ty)?);
			node.docs.clone_from(&field.docs);
			Ok(node)
		})
		.collect()
}

/// Map an IDL type expression to a [`TypeNode`].
pub fn convert_type(label: &str, ty: &IdlType) -> Result<TypeNode, LoadError> {
	let node = match ty {
		IdlType::Primitive(name) => {
			match name.as_str() {
				"bool" => TypeNode::Boolean,
				"string" => TypeNode::String,
				"bytes" => TypeNode::Bytes,
				"publicKey" | "pubkey" => TypeNode::PublicKey,
				other => {
					let format = NumberFormat::parse(other).ok_or_else(|| {
						LoadError::malformed(label, format!("unknown type `{other}`"))
					})?;
					TypeNode::number(format)
				}
			}
		}
		IdlType::Defined { defined } => TypeNode::link(defined.name()),
		IdlType::Option { option } => TypeNode::option(convert_type(label, option)?),
		IdlType::Vec { vec } => TypeNode::array(convert_type(label, vec)?, None),
		IdlType::Array { array: (item, size) } => {
			match convert_type(label, item)? {
				TypeNode::Number {
					format: NumberFormat::U8,
				} => TypeNode::fixed_size(TypeNode::Bytes, *size),
				item => TypeNode::array(item, Some(*size)),
			}
		}
	};
	Ok(node)
}

fn check_name(label: &str, kind: &str, name: &str) -> Result<(), LoadError> {
	if name.is_empty() || name.contains('/') {
		return Err(LoadError::malformed(
			label,
			format!("invalid {kind} name `{name}`"),
		));
	}
	Ok(())
}

/// Names must be unique per scope, links must resolve and sibling
/// instructions must not share a discriminator.
fn validate_program(label: &str, program: &ProgramNode) -> Result<(), LoadError> {
	let duplicate = |kind: &str, name: Option<&str>| {
		match name {
			Some(name) => Err(LoadError::malformed(label, format!("duplicate {kind} `{name}`"))),
			None => Ok(()),
		}
	};

	duplicate("account", find_duplicate(program.accounts.iter().map(|a| a.name.as_str())))?;
	duplicate(
		"instruction",
		find_duplicate(program.instructions.iter().map(|i| i.name.as_str())),
	)?;
	duplicate(
		"type",
		find_duplicate(program.defined_types.iter().map(|t| t.name.as_str())),
	)?;
	duplicate("error", find_duplicate(program.errors.iter().map(|e| e.name.as_str())))?;

	for instruction in &program.instructions {
		duplicate(
			&format!("account in instruction `{}`", instruction.name),
			find_duplicate(instruction.accounts.iter().map(|a| a.name.as_str())),
		)?;
		duplicate(
			&format!("argument in instruction `{}`", instruction.name),
			find_duplicate(instruction.arguments.iter().map(|a| a.name.as_str())),
		)?;
	}

	let mut discriminators: BTreeMap<(usize, Vec<u8>), &str> = BTreeMap::new();
	for instruction in &program.instructions {
		let Some(discriminator) = &instruction.discriminator else {
			continue;
		};
		let key = (discriminator.offset, discriminator.encoded());
		if let Some(first) = discriminators.insert(key, instruction.name.as_str()) {
			return Err(LoadError::malformed(
				label,
				format!(
					"instructions `{first}` and `{}` share discriminator {discriminator}",
					instruction.name
				),
			));
		}
	}

	let mut links = Vec::new();
	for account in &program.accounts {
		for field in &account.fields {
			collect_links(&field.type_node, &mut links);
		}
	}
	for instruction in &program.instructions {
		for argument in &instruction.arguments {
			collect_links(&argument.type_node, &mut links);
		}
	}
	for defined_type in &program.defined_types {
		collect_links(&defined_type.type_node, &mut links);
	}
	if let Some(missing) = links
		.into_iter()
		.find(|link| program.defined_type(link).is_none())
	{
		return Err(LoadError::malformed(
			label,
			format!("type `{missing}` is referenced but never defined"),
		));
	}

	Ok(())
}

fn find_duplicate<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
	let mut seen = HashSet::new();
	names.into_iter().find(|name| !seen.insert(*name))
}

fn collect_links<'a>(type_node: &'a TypeNode, links: &mut Vec<&'a str>) {
	match type_node {
		TypeNode::Link { name } => links.push(name),
		TypeNode::FixedSize { inner, .. } => collect_links(inner, links),
		TypeNode::Option { item } | TypeNode::Array { item, .. } => collect_links(item, links),
		TypeNode::Struct { fields } => {
			for field in fields {
				collect_links(&field.type_node, links);
			}
		}
		TypeNode::Enum { variants } => {
			for field in variants.iter().flat_map(|v| v.fields.iter().flatten()) {
				collect_links(&field.type_node, links);
			}
		}
		TypeNode::Number { .. }
		| TypeNode::Boolean
		| TypeNode::PublicKey
		| TypeNode::String
		| TypeNode::Bytes => {}
	}
}
