//! Codama renderer: lowers the final tree to a `codama_nodes::RootNode` and
//! writes it as `<program>.json`.
//!
//! Nodes with a typed constructor are built directly. The remaining ones are
//! written in Codama's JSON form and read back through `serde`, so an invalid
//! shape fails the render instead of producing a broken file.

use std::fmt::Write as _;
use std::path::PathBuf;

use codama_nodes::AccountNode;
use codama_nodes::Base16;
use codama_nodes::BooleanTypeNode;
use codama_nodes::BytesTypeNode;
use codama_nodes::BytesValueNode;
use codama_nodes::ConstantDiscriminatorNode;
use codama_nodes::ConstantPdaSeedNode;
use codama_nodes::ConstantValueNode;
use codama_nodes::DiscriminatorNode;
use codama_nodes::ErrorNode;
use codama_nodes::FixedSizeTypeNode;
use codama_nodes::InstructionAccountNode;
use codama_nodes::InstructionArgumentNode;
use codama_nodes::InstructionInputValueNode;
use codama_nodes::InstructionNode;
use codama_nodes::IsAccountSigner;
use codama_nodes::NumberFormat;
use codama_nodes::NumberTypeNode;
use codama_nodes::NumberValueNode;
use codama_nodes::PdaNode;
use codama_nodes::PdaSeedNode;
use codama_nodes::ProgramNode;
use codama_nodes::PublicKeyTypeNode;
use codama_nodes::PublicKeyValueNode;
use codama_nodes::RootNode;
use codama_nodes::StringTypeNode;
use codama_nodes::StringValueNode;
use codama_nodes::StructFieldTypeNode;
use codama_nodes::StructTypeNode;
use codama_nodes::TypeNode;
use codama_nodes::VariablePdaSeedNode;
use heck::ToLowerCamelCase;
use idlforge::RenderError;
use idlforge::RenderOptions;
use idlforge::RenderedFiles;
use idlforge::Renderer;
use idlforge::nodes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;

pub struct CodamaRenderer;

impl Renderer for CodamaRenderer {
	fn name(&self) -> &str {
		"codama"
	}

	fn render(&self, root: &nodes::RootNode, options: &RenderOptions) -> Result<RenderedFiles, RenderError> {
		options.check_known(&[])?;
		let mut files = RenderedFiles::new();
		let Some(primary) = root.primary() else {
			return Ok(files);
		};

		let codama = to_root_node(root)?;
		log::debug!(
			"lowered `{}` with {} additional programs",
			primary.name,
			codama.additional_programs.len()
		);
		let json = if options.format_code {
			serde_json::to_string_pretty(&codama)
		} else {
			serde_json::to_string(&codama)
		};
		let json = json.map_err(|source| {
			RenderError::Serialize {
				context: primary.name.clone(),
				source,
			}
		})?;

		files.insert(PathBuf::from(format!("{}.json", primary.name)), format!("{json}\n"));
		Ok(files)
	}
}

/// Lower the whole tree. The primary program becomes the root program, the
/// rest become additional programs; shared types are attached to the primary
/// program unless it defines one of the same name.
pub fn to_root_node(root: &nodes::RootNode) -> Result<RootNode, RenderError> {
	let mut programs = root.programs.iter();
	let Some(primary) = programs.next() else {
		return Err(RenderError::UnsupportedType {
			context: "root".to_owned(),
			kind: "root",
			reason: "the tree has no programs".to_owned(),
		});
	};

	let mut program = build_program_node(primary)?;
	for shared in &root.shared_types {
		if primary.defined_type(&shared.name).is_none() {
			program.defined_types.push(build_defined_type(shared)?);
		}
	}

	let mut codama = RootNode::new(program);
	for additional in programs {
		codama.additional_programs.push(build_program_node(additional)?);
	}
	Ok(codama)
}

fn build_program_node(source: &nodes::ProgramNode) -> Result<ProgramNode, RenderError> {
	let mut program = ProgramNode::new(source.name.as_str(), source.public_key.as_str());

	for account in &source.accounts {
		program = program.add_account(build_account_node(account)?);
		if let Some(seeds) = &account.seeds {
			program = program.add_pda(build_pda_node(account, seeds)?);
		}
	}

	for instruction in &source.instructions {
		program = program.add_instruction(build_instruction_node(instruction)?);
	}

	for defined_type in &source.defined_types {
		program.defined_types.push(build_defined_type(defined_type)?);
	}

	for error in &source.errors {
		program = program.add_error(build_error_node(error));
	}

	if !source.docs.is_empty() {
		program.docs = source.docs.clone().into();
	}

	Ok(program)
}

fn build_account_node(account: &nodes::AccountNode) -> Result<AccountNode, RenderError> {
	let fields = account
		.fields
		.iter()
		.map(build_struct_field)
		.collect::<Result<Vec<_>, _>>()?;

	let data = StructTypeNode::new(fields);
	let mut node = AccountNode::new(account.name.as_str(), data);
	if let Some(discriminator) = &account.discriminator {
		node.discriminators = vec![build_discriminator_node(discriminator, &account.name)?];
	}

	if !account.docs.is_empty() {
		node.docs = account.docs.clone().into();
	}

	Ok(node)
}

fn build_instruction_node(instruction: &nodes::InstructionNode) -> Result<InstructionNode, RenderError> {
	let accounts = instruction
		.accounts
		.iter()
		.map(|account| build_instruction_account_node(account, &instruction.name))
		.collect::<Result<Vec<_>, _>>()?;

	let arguments = instruction
		.arguments
		.iter()
		.map(|argument| {
			let mut node = InstructionArgumentNode::new(argument.name.as_str(), type_node(&argument.type_node)?);
			if let Some(default_value) = &argument.default_value {
				let context = format!("{}/arguments/{}", instruction.name, argument.name);
				node.default_value = Some(build_default_value(
					default_value,
					argument.type_node.is_option(),
					&context,
				)?);
			}
			if !argument.docs.is_empty() {
				node.docs = argument.docs.clone().into();
			}
			Ok(node)
		})
		.collect::<Result<Vec<_>, RenderError>>()?;

	let discriminators = instruction
		.discriminator
		.as_ref()
		.map(|discriminator| build_discriminator_node(discriminator, &instruction.name))
		.transpose()?
		.into_iter()
		.collect();

	let mut node = InstructionNode {
		name: instruction.name.as_str().into(),
		accounts,
		arguments,
		discriminators,
		..Default::default()
	};

	if !instruction.docs.is_empty() {
		node.docs = instruction.docs.clone().into();
	}

	Ok(node)
}

fn build_instruction_account_node(
	account: &nodes::InstructionAccountNode,
	instruction: &str,
) -> Result<InstructionAccountNode, RenderError> {
	let is_signer = if account.is_signer {
		IsAccountSigner::True
	} else {
		IsAccountSigner::False
	};

	let mut node = InstructionAccountNode::new(account.name.as_str(), account.is_writable, is_signer);
	node.is_optional = account.is_optional;

	if !account.docs.is_empty() {
		node.docs = account.docs.clone().into();
	}

	if let Some(default_value) = &account.default_value {
		let context = format!("{instruction}/accounts/{}", account.name);
		node.default_value = Some(build_default_value(default_value, false, &context)?);
	}

	Ok(node)
}

fn build_default_value(
	default_value: &nodes::DefaultValueNode,
	wraps_option: bool,
	context: &str,
) -> Result<InstructionInputValueNode, RenderError> {
	let value = match default_value {
		nodes::DefaultValueNode::Literal {
			value: nodes::LiteralValue::PublicKey(address),
		} if !wraps_option => {
			return Ok(InstructionInputValueNode::PublicKey(PublicKeyValueNode::new(address.as_str())));
		}
		nodes::DefaultValueNode::Pda { account, seeds } => {
			let seeds = seeds
				.iter()
				.map(|binding| {
					json!({
						"kind": "pdaSeedValueNode",
						"name": binding.seed.to_lower_camel_case(),
						"value": input_json(&binding.value),
					})
				})
				.collect::<Vec<_>>();
			json!({
				"kind": "pdaValueNode",
				"pda": { "kind": "pdaLinkNode", "name": account.to_lower_camel_case() },
				"seeds": seeds,
			})
		}
		nodes::DefaultValueNode::Account { name } => {
			input_json(&nodes::InputRef::Account(name.clone()))
		}
		nodes::DefaultValueNode::Argument { name } => {
			input_json(&nodes::InputRef::Argument(name.clone()))
		}
		nodes::DefaultValueNode::Absent => json!({ "kind": "noneValueNode" }),
		nodes::DefaultValueNode::ProgramId => json!({ "kind": "programIdValueNode" }),
		nodes::DefaultValueNode::Literal { value } => literal_json(value),
	};

	let value = if wraps_option && !matches!(default_value, nodes::DefaultValueNode::Absent) {
		json!({ "kind": "someValueNode", "value": value })
	} else {
		value
	};
	from_json(value, context)
}

fn input_json(input: &nodes::InputRef) -> Value {
	match input {
		nodes::InputRef::Account(name) => {
			json!({ "kind": "accountValueNode", "name": name.to_lower_camel_case() })
		}
		nodes::InputRef::Argument(name) => {
			json!({ "kind": "argumentValueNode", "name": name.to_lower_camel_case() })
		}
	}
}

fn literal_json(value: &nodes::LiteralValue) -> Value {
	match value {
		nodes::LiteralValue::Number(number) => json!({ "kind": "numberValueNode", "number": number }),
		nodes::LiteralValue::Boolean(boolean) => json!({ "kind": "booleanValueNode", "boolean": boolean }),
		nodes::LiteralValue::String(string) => json!({ "kind": "stringValueNode", "string": string }),
		nodes::LiteralValue::PublicKey(address) => {
			json!({ "kind": "publicKeyValueNode", "publicKey": address })
		}
		nodes::LiteralValue::Bytes(bytes) => {
			json!({ "kind": "bytesValueNode", "data": hex(bytes), "encoding": "base16" })
		}
	}
}

fn build_struct_field(field: &nodes::StructFieldNode) -> Result<StructFieldTypeNode, RenderError> {
	let mut node = StructFieldTypeNode::new(field.name.as_str(), type_node(&field.type_node)?);

	if !field.docs.is_empty() {
		node.docs = field.docs.clone().into();
	}

	Ok(node)
}

fn build_discriminator_node(
	discriminator: &nodes::DiscriminatorNode,
	owner: &str,
) -> Result<DiscriminatorNode, RenderError> {
	match &discriminator.value {
		nodes::DiscriminatorValue::Number { format, value } => {
			Ok(DiscriminatorNode::Constant(ConstantDiscriminatorNode::new(
				ConstantValueNode::new(NumberTypeNode::le(number_format(*format)), NumberValueNode::new(*value)),
				discriminator.offset,
			)))
		}
		nodes::DiscriminatorValue::Bytes { bytes } => {
			from_json(
				json!({
					"kind": "constantDiscriminatorNode",
					"offset": discriminator.offset,
					"constant": {
						"kind": "constantValueNode",
						"type": { "kind": "bytesTypeNode" },
						"value": { "kind": "bytesValueNode", "data": hex(bytes), "encoding": "base16" },
					},
				}),
				owner,
			)
		}
	}
}

fn build_pda_node(account: &nodes::AccountNode, seeds: &[nodes::PdaSeedNode]) -> Result<PdaNode, RenderError> {
	let seeds = seeds
		.iter()
		.map(|seed| {
			let node = match seed {
				nodes::PdaSeedNode::Constant(constant) => {
					match &constant.value {
						nodes::ConstantSeedValue::Utf8(value) => {
							PdaSeedNode::Constant(ConstantPdaSeedNode::new(
								StringTypeNode::utf8(),
								StringValueNode::new(value.as_str()),
							))
						}
						nodes::ConstantSeedValue::Bytes(value) => {
							PdaSeedNode::Constant(ConstantPdaSeedNode::new(
								BytesTypeNode::new(),
								BytesValueNode::new(Base16, hex(value)),
							))
						}
						nodes::ConstantSeedValue::ProgramId => {
							from_json(
								json!({
									"kind": "constantPdaSeedNode",
									"type": { "kind": "publicKeyTypeNode" },
									"value": { "kind": "programIdValueNode" },
								}),
								&account.name,
							)?
						}
					}
				}
				nodes::PdaSeedNode::Variable(variable) => {
					PdaSeedNode::Variable(VariablePdaSeedNode::new(
						variable.name.as_str(),
						type_node(&variable.type_node)?,
					))
				}
			};
			Ok(node)
		})
		.collect::<Result<Vec<_>, RenderError>>()?;

	Ok(PdaNode::new(account.name.as_str(), seeds))
}

fn build_defined_type(defined: &nodes::DefinedTypeNode) -> Result<codama_nodes::DefinedTypeNode, RenderError> {
	let context = format!("types/{}", defined.name);
	from_json(
		json!({
			"kind": "definedTypeNode",
			"name": defined.name.to_lower_camel_case(),
			"type": type_json(&defined.type_node, &context)?,
			"docs": defined.docs,
		}),
		&context,
	)
}

fn build_error_node(error: &nodes::ErrorNode) -> ErrorNode {
	let mut node = ErrorNode::new(error.name.as_str(), error.code as usize, error.message.clone());

	if !error.docs.is_empty() {
		node.docs = error.docs.clone().into();
	}

	node
}

/// Lower a type. Leaves with a typed constructor are built directly.
fn type_node(source: &nodes::TypeNode) -> Result<TypeNode, RenderError> {
	let node = match source {
		nodes::TypeNode::Number { format } => NumberTypeNode::le(number_format(*format)).into(),
		nodes::TypeNode::Boolean => BooleanTypeNode::default().into(),
		nodes::TypeNode::PublicKey => PublicKeyTypeNode::new().into(),
		nodes::TypeNode::FixedSize { inner, size } if matches!(inner.as_ref(), nodes::TypeNode::Bytes) => {
			FixedSizeTypeNode::<TypeNode>::new(BytesTypeNode::new(), *size).into()
		}
		other => {
			let context = other.kind();
			from_json(type_json(other, context)?, context)?
		}
	};
	Ok(node)
}

fn type_json(source: &nodes::TypeNode, context: &str) -> Result<Value, RenderError> {
	let value = match source {
		nodes::TypeNode::Number { format } => number_json(*format),
		nodes::TypeNode::Boolean => json!({ "kind": "booleanTypeNode", "size": number_json(nodes::NumberFormat::U8) }),
		nodes::TypeNode::PublicKey => json!({ "kind": "publicKeyTypeNode" }),
		nodes::TypeNode::String => {
			json!({
				"kind": "sizePrefixTypeNode",
				"type": { "kind": "stringTypeNode", "encoding": "utf8" },
				"prefix": number_json(nodes::NumberFormat::U32),
			})
		}
		nodes::TypeNode::Bytes => {
			json!({
				"kind": "sizePrefixTypeNode",
				"type": { "kind": "bytesTypeNode" },
				"prefix": number_json(nodes::NumberFormat::U32),
			})
		}
		nodes::TypeNode::FixedSize { inner, size } => {
			let inner = match inner.as_ref() {
				nodes::TypeNode::String => json!({ "kind": "stringTypeNode", "encoding": "utf8" }),
				nodes::TypeNode::Bytes => json!({ "kind": "bytesTypeNode" }),
				other => {
					return Err(RenderError::UnsupportedType {
						context: context.to_owned(),
						kind: source.kind(),
						reason: format!("only bytes and strings can have a fixed size, found `{}`", other.kind()),
					});
				}
			};
			json!({ "kind": "fixedSizeTypeNode", "size": size, "type": inner })
		}
		nodes::TypeNode::Option { item } => {
			json!({
				"kind": "optionTypeNode",
				"fixed": false,
				"item": type_json(item, context)?,
				"prefix": number_json(nodes::NumberFormat::U8),
			})
		}
		nodes::TypeNode::Array { item, count } => {
			let count = match count {
				Some(value) => json!({ "kind": "fixedCountNode", "value": value }),
				None => json!({ "kind": "prefixedCountNode", "prefix": number_json(nodes::NumberFormat::U32) }),
			};
			json!({ "kind": "arrayTypeNode", "item": type_json(item, context)?, "count": count })
		}
		nodes::TypeNode::Struct { fields } => struct_json(fields, context)?,
		nodes::TypeNode::Enum { variants } => {
			let variants = variants
				.iter()
				.map(|variant| {
					let mut node = match &variant.fields {
						Some(fields) => {
							json!({
								"kind": "enumStructVariantTypeNode",
								"name": variant.name.to_lower_camel_case(),
								"struct": struct_json(fields, context)?,
							})
						}
						None => {
							json!({ "kind": "enumEmptyVariantTypeNode", "name": variant.name.to_lower_camel_case() })
						}
					};
					if let Some(discriminant) = variant.discriminant {
						node["discriminator"] = json!(discriminant);
					}
					Ok(node)
				})
				.collect::<Result<Vec<_>, RenderError>>()?;
			json!({ "kind": "enumTypeNode", "variants": variants, "size": number_json(nodes::NumberFormat::U8) })
		}
		nodes::TypeNode::Link { name } => {
			json!({ "kind": "definedTypeLinkNode", "name": name.to_lower_camel_case() })
		}
	};
	Ok(value)
}

fn struct_json(fields: &[nodes::StructFieldNode], context: &str) -> Result<Value, RenderError> {
	let fields = fields
		.iter()
		.map(|field| {
			Ok(json!({
				"kind": "structFieldTypeNode",
				"name": field.name.to_lower_camel_case(),
				"type": type_json(&field.type_node, context)?,
				"docs": field.docs,
			}))
		})
		.collect::<Result<Vec<_>, RenderError>>()?;
	Ok(json!({ "kind": "structTypeNode", "fields": fields }))
}

fn number_json(format: nodes::NumberFormat) -> Value {
	json!({ "kind": "numberTypeNode", "format": format.as_str(), "endian": "le" })
}

fn number_format(format: nodes::NumberFormat) -> NumberFormat {
	match format {
		nodes::NumberFormat::U8 => NumberFormat::U8,
		nodes::NumberFormat::U16 => NumberFormat::U16,
		nodes::NumberFormat::U32 => NumberFormat::U32,
		nodes::NumberFormat::U64 => NumberFormat::U64,
		nodes::NumberFormat::U128 => NumberFormat::U128,
		nodes::NumberFormat::I8 => NumberFormat::I8,
		nodes::NumberFormat::I16 => NumberFormat::I16,
		nodes::NumberFormat::I32 => NumberFormat::I32,
		nodes::NumberFormat::I64 => NumberFormat::I64,
		nodes::NumberFormat::I128 => NumberFormat::I128,
		nodes::NumberFormat::F32 => NumberFormat::F32,
		nodes::NumberFormat::F64 => NumberFormat::F64,
	}
}

fn from_json<T: DeserializeOwned>(value: Value, context: &str) -> Result<T, RenderError> {
	serde_json::from_value(value).map_err(|source| {
		RenderError::Serialize {
			context: context.to_owned(),
			source,
		}
	})
}

fn hex(bytes: &[u8]) -> String {
	bytes.iter().fold(String::new(), |mut acc, b| {
		let _ = write!(acc, "{b:02x}");
		acc
	})
}
