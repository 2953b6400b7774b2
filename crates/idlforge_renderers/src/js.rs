//! TypeScript client renderer targeting `@solana/kit`.
//!
//! Options:
//! - `formatter`: a command (as a list of words) run over the output root
//!   after writing, e.g. `["npx", "prettier", "--write"]`. Skipped when
//!   `formatCode` is off.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use heck::ToLowerCamelCase;
use heck::ToShoutySnakeCase;
use heck::ToUpperCamelCase;
use idlforge::CallBuilderSignature;
use idlforge::RenderError;
use idlforge::RenderOptions;
use idlforge::RenderedFiles;
use idlforge::Renderer;
use idlforge::RootNode;
use idlforge::builder::InputKind;
use idlforge::nodes::AccountNode;
use idlforge::nodes::ConstantSeedValue;
use idlforge::nodes::DefaultValueNode;
use idlforge::nodes::DefinedTypeNode;
use idlforge::nodes::DiscriminatorNode;
use idlforge::nodes::EnumVariantNode;
use idlforge::nodes::InputRef;
use idlforge::nodes::InstructionNode;
use idlforge::nodes::LiteralValue;
use idlforge::nodes::NumberFormat;
use idlforge::nodes::PdaSeedNode;
use idlforge::nodes::ProgramNode;
use idlforge::nodes::StructFieldNode;
use idlforge::nodes::TypeNode;
use idlforge::render::generated_header;

use crate::defaults::resolution_order;

const KIT: &str = "@solana/kit";

pub struct JsRenderer;

impl Renderer for JsRenderer {
	fn name(&self) -> &str {
		"js"
	}

	fn render(&self, root: &RootNode, options: &RenderOptions) -> Result<RenderedFiles, RenderError> {
		// Validate early so a bad option fails before anything is written.
		options.check_known(&["formatter"])?;
		options.string_list_option("formatter")?;

		let nested = root.programs.len() > 1;
		let mut files = RenderedFiles::new();
		let mut root_exports = Vec::new();

		if nested {
			for program in &root.programs {
				let name = program.name.to_lower_camel_case();
				let dir = PathBuf::from(&name);
				let context = Context {
					root,
					program,
					nested,
					depth: 1,
				};
				let children = context.render_program(&dir, &mut files)?;
				files.insert(dir.join("index.ts"), index_file(&children, false));
				root_exports.push(name);
			}
			if !root.shared_types.is_empty() {
				let shared = root.shared_types.iter().map(AsRef::as_ref).collect::<Vec<_>>();
				render_types(root, None, &shared, 0, Path::new(""), &mut files)?;
				root_exports.push("types".to_owned());
			}
			files.insert(PathBuf::from("index.ts"), index_file(&root_exports, true));
		} else if let Some(program) = root.primary() {
			let context = Context {
				root,
				program,
				nested,
				depth: 0,
			};
			let children = context.render_program(Path::new(""), &mut files)?;
			files.insert(PathBuf::from("index.ts"), index_file(&children, false));
		}

		let header = generated_header("//");
		Ok(files
			.into_iter()
			.map(|(path, body)| (path, format!("{header}\n{body}")))
			.collect())
	}

	fn after_write(&self, output: &Path, options: &RenderOptions) -> Result<(), RenderError> {
		let formatter = options.string_list_option("formatter")?;
		if !options.format_code || formatter.is_empty() {
			return Ok(());
		}
		run_formatter(&formatter, output)
	}
}

fn run_formatter(formatter: &[&str], output: &Path) -> Result<(), RenderError> {
	let Some((program, args)) = formatter.split_first() else {
		return Ok(());
	};
	let command = format!("{} {}", formatter.join(" "), output.display());
	log::debug!("running `{command}`");

	let result = Command::new(program)
		.args(args)
		.arg(output)
		.output()
		.map_err(|source| {
			RenderError::CommandExec {
				command: command.clone(),
				source,
			}
		})?;
	if result.status.success() {
		return Ok(());
	}

	let stdout = String::from_utf8_lossy(&result.stdout).trim().to_owned();
	let stderr = String::from_utf8_lossy(&result.stderr).trim().to_owned();
	let details = if !stderr.is_empty() {
		format!(": {stderr}")
	} else if !stdout.is_empty() {
		format!(": {stdout}")
	} else {
		String::new()
	};

	Err(RenderError::CommandFailed {
		command,
		status: result.status.code().unwrap_or(-1),
		details,
	})
}

/// Named imports of one module, grouped by source.
#[derive(Default)]
struct Imports {
	sources: BTreeMap<String, BTreeSet<String>>,
}

impl Imports {
	fn kit(&mut self, name: &str) -> String {
		self.add(KIT, name)
	}

	fn add(&mut self, source: &str, name: &str) -> String {
		self.sources
			.entry(source.to_owned())
			.or_default()
			.insert(name.to_owned());
		name.to_owned()
	}

	/// Prepend the import block to `body`.
	fn finish(self, body: &str) -> String {
		let mut out = String::new();
		for (source, names) in &self.sources {
			let names = names.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
			let _ = writeln!(out, "import {{ {names} }} from '{source}';");
		}
		if !self.sources.is_empty() {
			out.push('\n');
		}
		out.push_str(body);
		out
	}
}

struct Context<'a> {
	root: &'a RootNode,
	program: &'a ProgramNode,
	nested: bool,
	/// Directory depth of the program below the output root.
	depth: usize,
}

impl Context<'_> {
	fn render_program(&self, dir: &Path, files: &mut RenderedFiles) -> Result<Vec<String>, RenderError> {
		let program = self.program;
		let mut children = vec!["programs".to_owned()];
		files.insert(dir.join("programs.ts"), programs_module(program));

		if !program.accounts.is_empty() {
			let mut names = Vec::new();
			for account in &program.accounts {
				let name = account.name.to_lower_camel_case();
				let body = self.account_module(account)?;
				files.insert(dir.join("accounts").join(format!("{name}.ts")), body);
				names.push(name);
			}
			files.insert(dir.join("accounts/index.ts"), index_file(&names, false));
			children.push("accounts".to_owned());
		}

		if !program.instructions.is_empty() {
			let mut names = Vec::new();
			for instruction in &program.instructions {
				let name = instruction.name.to_lower_camel_case();
				let body = self.instruction_module(instruction)?;
				files.insert(dir.join("instructions").join(format!("{name}.ts")), body);
				names.push(name);
			}
			files.insert(dir.join("instructions/index.ts"), index_file(&names, false));
			children.push("instructions".to_owned());
		}

		if !program.errors.is_empty() {
			files.insert(dir.join("errors.ts"), errors_module(program));
			children.push("errors".to_owned());
		}

		let mut types = program.defined_types.iter().map(AsRef::as_ref).collect::<Vec<_>>();
		if !self.nested {
			let own = types.iter().map(|t| t.name.clone()).collect::<BTreeSet<_>>();
			types.extend(
				self.root
					.shared_types
					.iter()
					.filter(|shared| !own.contains(&shared.name))
					.map(AsRef::as_ref),
			);
		}
		if !types.is_empty() {
			render_types(self.root, Some(program), &types, self.depth, dir, files)?;
			children.push("types".to_owned());
		}

		Ok(children)
	}

	fn types(&self) -> Types<'_> {
		Types {
			program: Some(self.program),
			nested: self.nested,
			depth: self.depth + 1,
		}
	}

	fn account_module(&self, account: &AccountNode) -> Result<String, RenderError> {
		let at = format!("accounts/{}", account.name);
		let name = account.name.to_upper_camel_case();
		let mut imports = Imports::default();
		let types = self.types();
		let mut body = String::new();

		let data_start = match &account.discriminator {
			Some(discriminator) => {
				let constant = format!("{}_DISCRIMINATOR", account.name.to_shouty_snake_case());
				let _ = writeln!(body, "export const {constant} = {};\n", byte_array(&discriminator.encoded()));
				Some((constant, discriminator))
			}
			None => None,
		};

		body.push_str(&doc_block(&account.docs, ""));
		let _ = writeln!(body, "export type {name} = {{");
		for field in &account.fields {
			let ty = types.ts_type(&mut imports, &field.type_node, &format!("{at}/{}", field.name))?;
			body.push_str(&doc_block(&field.docs, "  "));
			let _ = writeln!(body, "  {}: {ty};", field.name.to_lower_camel_case());
		}
		body.push_str("};\n\n");

		let codec = types.struct_codec(&mut imports, &account.fields, &at)?;
		let _ = writeln!(body, "export function get{name}Codec() {{\n  return {codec};\n}}\n");

		let bytes = imports.kit("ReadonlyUint8Array");
		match data_start {
			Some((constant, discriminator)) => {
				let (start, end) = span(discriminator);
				let _ = writeln!(
					body,
					"export function decode{name}(data: {bytes}): {name} {{\n  const discriminator = data.slice({start}, {end});\n  if (discriminator.length !== {constant}.length || !discriminator.every((byte, i) => byte === {constant}[i])) {{\n    throw new Error('Invalid {name} account discriminator');\n  }}\n  return get{name}Codec().decode(data.slice({end}));\n}}"
				);
			}
			None => {
				let _ = writeln!(
					body,
					"export function decode{name}(data: {bytes}): {name} {{\n  return get{name}Codec().decode(data);\n}}"
				);
			}
		}

		if let Some(seeds) = &account.seeds {
			body.push('\n');
			body.push_str(&self.find_pda(&mut imports, account, seeds, &at)?);
		}

		Ok(imports.finish(&body))
	}

	fn find_pda(
		&self,
		imports: &mut Imports,
		account: &AccountNode,
		seeds: &[PdaSeedNode],
		at: &str,
	) -> Result<String, RenderError> {
		let name = account.name.to_upper_camel_case();
		let address = imports.kit("Address");
		let pda = imports.kit("ProgramDerivedAddress");
		let derive = imports.kit("getProgramDerivedAddress");
		let program_address = program_address_constant(self.program);
		imports.add("../programs", &program_address);
		let types = self.types();

		let mut params = Vec::new();
		let mut encoded = Vec::new();
		for seed in seeds {
			match seed {
				PdaSeedNode::Constant(constant) => {
					encoded.push(match &constant.value {
						ConstantSeedValue::Utf8(value) => {
							format!("{}().encode({})", imports.kit("getUtf8Encoder"), js_string(value))
						}
						ConstantSeedValue::Bytes(value) => byte_array(value),
						ConstantSeedValue::ProgramId => {
							format!("{}().encode(programAddress)", imports.kit("getAddressEncoder"))
						}
					});
				}
				PdaSeedNode::Variable(variable) => {
					let field = variable.name.to_lower_camel_case();
					let at = format!("{at}/seeds/{}", variable.name);
					let ty = types.ts_type(imports, &variable.type_node, &at)?;
					let encoder = match &variable.type_node {
						TypeNode::String => format!("{}()", imports.kit("getUtf8Encoder")),
						TypeNode::Bytes | TypeNode::FixedSize { .. } => {
							encoded.push(format!("seeds.{field}"));
							params.push(format!("{field}: {ty}"));
							continue;
						}
						other => types.codec(imports, other, &at)?,
					};
					encoded.push(format!("{encoder}.encode(seeds.{field})"));
					params.push(format!("{field}: {ty}"));
				}
			}
		}

		let mut out = String::new();
		let _ = writeln!(out, "/** Derive the address of a `{}` account. */", account.name);
		let _ = writeln!(
			out,
			"export async function find{name}Pda(\n  seeds: {{ {} }},\n  programAddress: {address} = {program_address},\n): Promise<{pda}> {{",
			params.join("; ")
		);
		let _ = writeln!(out, "  return {derive}({{\n    programAddress,\n    seeds: [");
		for seed in encoded {
			let _ = writeln!(out, "      {seed},");
		}
		out.push_str("    ],\n  });\n}\n");
		Ok(out)
	}

	fn instruction_module(&self, instruction: &InstructionNode) -> Result<String, RenderError> {
		let at = format!("instructions/{}", instruction.name);
		let name = instruction.name.to_upper_camel_case();
		let mut imports = Imports::default();
		let types = self.types();
		let inputs = InputNames::of(instruction);
		let mut body = String::new();

		let address = imports.kit("Address");
		let instruction_type = imports.kit("Instruction");
		let role = imports.kit("AccountRole");
		let merge = imports.kit("mergeBytes");
		let program_address = program_address_constant(self.program);
		imports.add("../programs", &program_address);

		let prefix = match &instruction.discriminator {
			Some(discriminator) => {
				let constant = format!("{}_DISCRIMINATOR", instruction.name.to_shouty_snake_case());
				let _ = writeln!(body, "export const {constant} = {};\n", byte_array(&discriminator.encoded()));
				let padding = if discriminator.offset > 0 {
					format!("new Uint8Array({}), ", discriminator.offset)
				} else {
					String::new()
				};
				format!("{padding}{constant}, ")
			}
			None => String::new(),
		};

		let _ = writeln!(body, "export type {name}InstructionData = {{");
		let mut argument_types = BTreeMap::new();
		for argument in &instruction.arguments {
			let ty = types.ts_type(&mut imports, &argument.type_node, &format!("{at}/arguments/{}", argument.name))?;
			body.push_str(&doc_block(&argument.docs, "  "));
			let _ = writeln!(body, "  {}: {ty};", argument.name.to_lower_camel_case());
			argument_types.insert(argument.name.as_str(), ty);
		}
		body.push_str("};\n\n");

		let fields = instruction
			.arguments
			.iter()
			.map(|argument| StructFieldNode::new(argument.name.clone(), argument.type_node.clone()))
			.collect::<Vec<_>>();
		let codec = types.struct_codec(&mut imports, &fields, &at)?;
		let _ = writeln!(body, "export function get{name}InstructionDataCodec() {{\n  return {codec};\n}}\n");

		// The input object: required keys, then defaulted and optional ones.
		let signature = CallBuilderSignature::of(instruction);
		let input_type = |kind: InputKind, input: &str| -> String {
			match kind {
				InputKind::Account => address.clone(),
				InputKind::Argument => argument_types.get(input).cloned().unwrap_or_default(),
			}
		};
		let _ = writeln!(body, "export type {name}Input = {{");
		for input in &signature.required {
			let _ = writeln!(body, "  {}: {};", inputs.key(input.kind, input.name), input_type(input.kind, input.name));
		}
		for input in signature.defaulted.iter().chain(&signature.optional) {
			let _ = writeln!(body, "  {}?: {};", inputs.key(input.kind, input.name), input_type(input.kind, input.name));
		}
		body.push_str("};\n\n");

		body.push_str(&doc_block(&instruction.docs, ""));
		let _ = writeln!(
			body,
			"export async function get{name}Instruction(\n  input: {name}Input,\n  programAddress: {address} = {program_address},\n): Promise<{instruction_type}> {{"
		);
		for input in signature.required.iter().chain(&signature.optional) {
			let key = inputs.key(input.kind, input.name);
			let _ = writeln!(body, "  const {key} = input.{key};");
		}
		for input in resolution_order(&signature, &at)? {
			let Some(value) = input.default_value else {
				continue;
			};
			let key = inputs.key(input.kind, input.name);
			let line = self.default_local(&mut imports, instruction, &inputs, input.kind, input.name, value, &at)?;
			let _ = writeln!(body, "  const {key} = {line};");
		}

		body.push_str("  return {\n    programAddress,\n    accounts: [\n");
		for account in &instruction.accounts {
			let key = account.name.to_lower_camel_case();
			let account_role = match (account.is_writable, account.is_signer) {
				(true, true) => "WRITABLE_SIGNER",
				(true, false) => "WRITABLE",
				(false, true) => "READONLY_SIGNER",
				(false, false) => "READONLY",
			};
			if account.is_optional {
				let _ = writeln!(
					body,
					"      {key} === undefined\n        ? {{ address: programAddress, role: {role}.READONLY }}\n        : {{ address: {key}, role: {role}.{account_role} }},"
				);
			} else {
				let _ = writeln!(body, "      {{ address: {key}, role: {role}.{account_role} }},");
			}
		}
		let data_fields = instruction
			.arguments
			.iter()
			.map(|argument| {
				let field = argument.name.to_lower_camel_case();
				let local = inputs.key(InputKind::Argument, &argument.name);
				if field == local { field } else { format!("{field}: {local}") }
			})
			.collect::<Vec<_>>()
			.join(", ");
		let _ = writeln!(
			body,
			"    ],\n    data: {merge}([{prefix}get{name}InstructionDataCodec().encode({{ {data_fields} }})]),\n  }};\n}}"
		);

		Ok(imports.finish(&body))
	}

	#[allow(clippy::too_many_arguments)]
	fn default_local(
		&self,
		imports: &mut Imports,
		instruction: &InstructionNode,
		inputs: &InputNames,
		kind: InputKind,
		input: &str,
		value: &DefaultValueNode,
		at: &str,
	) -> Result<String, RenderError> {
		let key = inputs.key(kind, input);
		let target_type = match kind {
			InputKind::Account => &TypeNode::PublicKey,
			InputKind::Argument => {
				instruction
					.argument(input)
					.map_or(&TypeNode::PublicKey, |argument| &argument.type_node)
			}
		};
		let wraps_option = kind == InputKind::Argument && target_type.is_option();

		let expr = match value {
			DefaultValueNode::Absent => {
				if wraps_option {
					let none = imports.kit("none");
					return Ok(format!("input.{key} ?? {none}()"));
				}
				return Ok(format!("input.{key}"));
			}
			DefaultValueNode::Pda { account, seeds } => {
				let node = self.program.account(account).ok_or_else(|| {
					RenderError::UnsupportedType {
						context: format!("{at}/{input}"),
						kind: "pda",
						reason: format!("account `{account}` does not exist"),
					}
				})?;
				let find = format!("find{}Pda", account.to_upper_camel_case());
				imports.add("../accounts", &find);
				let mut bound = Vec::new();
				for seed in node.seed_inputs() {
					let binding = seeds.iter().find(|binding| binding.seed == seed.name).ok_or_else(|| {
						RenderError::UnsupportedType {
							context: format!("{at}/{input}"),
							kind: "pda",
							reason: format!("seed `{}` is not bound", seed.name),
						}
					})?;
					bound.push(format!("{}: {}", seed.name.to_lower_camel_case(), inputs.reference(&binding.value)));
				}
				format!("(await {find}({{ {} }}, programAddress))[0]", bound.join(", "))
			}
			DefaultValueNode::Account { name } => name.to_lower_camel_case(),
			DefaultValueNode::Argument { name } => inputs.key(InputKind::Argument, name),
			DefaultValueNode::ProgramId => "programAddress".to_owned(),
			DefaultValueNode::Literal { value } => literal(imports, value, target_type),
		};

		if wraps_option {
			let some = imports.kit("some");
			Ok(format!("input.{key} ?? {some}({expr})"))
		} else {
			Ok(format!("input.{key} ?? {expr}"))
		}
	}
}

/// Type and codec expressions, with link imports resolved relative to the
/// module being written.
struct Types<'a> {
	program: Option<&'a ProgramNode>,
	nested: bool,
	/// Directory depth of the importing module below the output root.
	depth: usize,
}

impl Types<'_> {
	fn link_source(&self, name: &str) -> String {
		let local = match self.program {
			Some(program) => !self.nested || program.defined_type(name).is_some(),
			None => false,
		};
		let up = if local {
			// Sibling of the importing module's parent directory.
			1
		} else {
			self.depth
		};
		let prefix = if up == 0 { "./".to_owned() } else { "../".repeat(up) };
		format!("{prefix}types")
	}

	fn ts_type(&self, imports: &mut Imports, type_node: &TypeNode, at: &str) -> Result<String, RenderError> {
		let ty = match type_node {
			TypeNode::Number { format } => {
				if is_big(*format) {
					"bigint".to_owned()
				} else {
					"number".to_owned()
				}
			}
			TypeNode::Boolean => "boolean".to_owned(),
			TypeNode::PublicKey => imports.kit("Address"),
			TypeNode::String => "string".to_owned(),
			TypeNode::Bytes => imports.kit("ReadonlyUint8Array"),
			TypeNode::FixedSize { inner, .. } => {
				match inner.as_ref() {
					TypeNode::String => "string".to_owned(),
					TypeNode::Bytes => imports.kit("ReadonlyUint8Array"),
					other => {
						return Err(unsupported(
							at,
							type_node,
							format!("only bytes and strings can have a fixed size, found `{}`", other.kind()),
						));
					}
				}
			}
			TypeNode::Option { item } => {
				let item = self.ts_type(imports, item, at)?;
				format!("{}<{item}>", imports.kit("Option"))
			}
			TypeNode::Array { item, .. } => format!("Array<{}>", self.ts_type(imports, item, at)?),
			TypeNode::Struct { .. } | TypeNode::Enum { .. } => {
				return Err(unsupported(
					at,
					type_node,
					"nested structs and enums must be declared as defined types".to_owned(),
				));
			}
			TypeNode::Link { name } => {
				let ty = name.to_upper_camel_case();
				imports.add(&self.link_source(name), &format!("type {ty}"));
				ty
			}
		};
		Ok(ty)
	}

	fn codec(&self, imports: &mut Imports, type_node: &TypeNode, at: &str) -> Result<String, RenderError> {
		let codec = match type_node {
			TypeNode::Number { format } => {
				let mut name = format.as_str().to_upper_camel_case();
				name.insert_str(0, "get");
				name.push_str("Codec");
				format!("{}()", imports.kit(&name))
			}
			TypeNode::Boolean => format!("{}()", imports.kit("getBooleanCodec")),
			TypeNode::PublicKey => format!("{}()", imports.kit("getAddressCodec")),
			TypeNode::String => {
				format!(
					"{}({}(), {}())",
					imports.kit("addCodecSizePrefix"),
					imports.kit("getUtf8Codec"),
					imports.kit("getU32Codec")
				)
			}
			TypeNode::Bytes => {
				format!(
					"{}({}(), {}())",
					imports.kit("addCodecSizePrefix"),
					imports.kit("getBytesCodec"),
					imports.kit("getU32Codec")
				)
			}
			TypeNode::FixedSize { inner, size } => {
				let inner = match inner.as_ref() {
					TypeNode::String => imports.kit("getUtf8Codec"),
					TypeNode::Bytes => imports.kit("getBytesCodec"),
					other => {
						return Err(unsupported(
							at,
							type_node,
							format!("only bytes and strings can have a fixed size, found `{}`", other.kind()),
						));
					}
				};
				format!("{}({inner}(), {size})", imports.kit("fixCodecSize"))
			}
			TypeNode::Option { item } => {
				let item = self.codec(imports, item, at)?;
				format!("{}({item})", imports.kit("getOptionCodec"))
			}
			TypeNode::Array { item, count } => {
				let item = self.codec(imports, item, at)?;
				let array = imports.kit("getArrayCodec");
				match count {
					Some(count) => format!("{array}({item}, {{ size: {count} }})"),
					None => format!("{array}({item})"),
				}
			}
			TypeNode::Struct { .. } | TypeNode::Enum { .. } => {
				return Err(unsupported(
					at,
					type_node,
					"nested structs and enums must be declared as defined types".to_owned(),
				));
			}
			TypeNode::Link { name } => {
				let codec = format!("get{}Codec", name.to_upper_camel_case());
				imports.add(&self.link_source(name), &codec);
				format!("{codec}()")
			}
		};
		Ok(codec)
	}

	fn struct_codec(
		&self,
		imports: &mut Imports,
		fields: &[StructFieldNode],
		at: &str,
	) -> Result<String, RenderError> {
		let struct_codec = imports.kit("getStructCodec");
		if fields.is_empty() {
			return Ok(format!("{struct_codec}([])"));
		}
		let mut out = format!("{struct_codec}([\n");
		for field in fields {
			let codec = self.codec(imports, &field.type_node, &format!("{at}/{}", field.name))?;
			let _ = writeln!(out, "    ['{}', {codec}],", field.name.to_lower_camel_case());
		}
		out.push_str("  ])");
		Ok(out)
	}
}

fn render_types(
	root: &RootNode,
	program: Option<&ProgramNode>,
	types: &[&DefinedTypeNode],
	depth: usize,
	dir: &Path,
	files: &mut RenderedFiles,
) -> Result<(), RenderError> {
	let nested = root.programs.len() > 1;
	let context = Types {
		program,
		nested,
		depth: depth + 1,
	};
	let mut names = Vec::new();
	for defined in types {
		let name = defined.name.to_lower_camel_case();
		let body = defined_type_module(&context, defined)?;
		files.insert(dir.join("types").join(format!("{name}.ts")), body);
		names.push(name);
	}
	files.insert(dir.join("types/index.ts"), index_file(&names, false));
	Ok(())
}

fn defined_type_module(types: &Types<'_>, defined: &DefinedTypeNode) -> Result<String, RenderError> {
	let at = format!("types/{}", defined.name);
	let name = defined.name.to_upper_camel_case();
	let mut imports = Imports::default();
	let mut body = doc_block(&defined.docs, "");

	match &defined.type_node {
		TypeNode::Struct { fields } => {
			let _ = writeln!(body, "export type {name} = {{");
			for field in fields {
				let ty = types.ts_type(&mut imports, &field.type_node, &format!("{at}/{}", field.name))?;
				body.push_str(&doc_block(&field.docs, "  "));
				let _ = writeln!(body, "  {}: {ty};", field.name.to_lower_camel_case());
			}
			body.push_str("};\n\n");
			let codec = types.struct_codec(&mut imports, fields, &at)?;
			let _ = writeln!(body, "export function get{name}Codec() {{\n  return {codec};\n}}");
		}
		TypeNode::Enum { variants } if variants.iter().all(|variant| variant.fields.is_none()) => {
			let _ = writeln!(body, "export enum {name} {{");
			for variant in variants {
				match variant.discriminant {
					Some(tag) => {
						let _ = writeln!(body, "  {} = {tag},", variant.name.to_upper_camel_case());
					}
					None => {
						let _ = writeln!(body, "  {},", variant.name.to_upper_camel_case());
					}
				}
			}
			body.push_str("}\n\n");
			let enum_codec = imports.kit("getEnumCodec");
			let _ = writeln!(body, "export function get{name}Codec() {{\n  return {enum_codec}({name});\n}}");
		}
		TypeNode::Enum { variants } => data_enum(types, &mut imports, &mut body, &name, variants, &at)?,
		other => {
			let ty = types.ts_type(&mut imports, other, &at)?;
			let codec = types.codec(&mut imports, other, &at)?;
			let _ = writeln!(body, "export type {name} = {ty};\n");
			let _ = writeln!(body, "export function get{name}Codec() {{\n  return {codec};\n}}");
		}
	}

	Ok(imports.finish(&body))
}

/// A discriminated union keyed by `__kind`.
fn data_enum(
	types: &Types<'_>,
	imports: &mut Imports,
	body: &mut String,
	name: &str,
	variants: &[EnumVariantNode],
	at: &str,
) -> Result<(), RenderError> {
	if variants.iter().any(|variant| variant.discriminant.is_some()) {
		return Err(RenderError::UnsupportedType {
			context: at.to_owned(),
			kind: "enum",
			reason: "explicit discriminants are only supported on enums without data variants".to_owned(),
		});
	}

	let _ = writeln!(body, "export type {name} =");
	let mut codecs = Vec::new();
	for variant in variants {
		let kind = variant.name.to_upper_camel_case();
		let fields = variant.fields.as_deref().unwrap_or_default();
		let mut members = vec![format!("__kind: '{kind}'")];
		for field in fields {
			let ty = types.ts_type(imports, &field.type_node, &format!("{at}/{}", field.name))?;
			members.push(format!("{}: {ty}", field.name.to_lower_camel_case()));
		}
		let _ = writeln!(body, "  | {{ {} }}", members.join("; "));

		let codec = match &variant.fields {
			Some(fields) => types.struct_codec(imports, fields, &format!("{at}/{}", variant.name))?,
			None => format!("{}()", imports.kit("getUnitCodec")),
		};
		codecs.push(format!("    ['{kind}', {codec}],"));
	}
	body.push_str(";\n\n");

	let union = imports.kit("getDiscriminatedUnionCodec");
	let _ = writeln!(
		body,
		"export function get{name}Codec() {{\n  return {union}([\n{}\n  ]);\n}}",
		codecs.join("\n")
	);
	Ok(())
}

fn programs_module(program: &ProgramNode) -> String {
	let mut imports = Imports::default();
	let address = imports.kit("Address");
	let key = js_string(&program.public_key);
	let body = format!(
		"export const {} = {key} as {address}<{key}>;\n",
		program_address_constant(program)
	);
	imports.finish(&body)
}

fn errors_module(program: &ProgramNode) -> String {
	let prefix = format!("{}_ERROR__", program.name.to_shouty_snake_case());
	let error_type = format!("{}Error", program.name.to_upper_camel_case());
	let mut body = String::new();

	let mut constants = Vec::new();
	for error in &program.errors {
		let constant = format!("{prefix}{}", error.name.to_shouty_snake_case());
		let _ = writeln!(body, "/** {}: {} */", error.name, escape_doc(&error.message));
		let _ = writeln!(body, "export const {constant} = 0x{:x}; // {}", error.code, error.code);
		constants.push(constant);
	}
	body.push('\n');

	let members = constants
		.iter()
		.map(|constant| format!("typeof {constant}"))
		.collect::<Vec<_>>()
		.join(" | ");
	let _ = writeln!(body, "export type {error_type} = {members};\n");

	let messages = format!("{}ErrorMessages", program.name.to_lower_camel_case());
	let _ = writeln!(body, "const {messages}: Record<{error_type}, string> = {{");
	for (constant, error) in constants.iter().zip(&program.errors) {
		let _ = writeln!(body, "  [{constant}]: {},", js_string(&error.message));
	}
	body.push_str("};\n\n");
	let _ = writeln!(
		body,
		"export function get{error_type}Message(code: {error_type}): string {{\n  return {messages}[code];\n}}"
	);
	body
}

fn index_file(children: &[String], namespaced: bool) -> String {
	let mut out = String::new();
	for child in children {
		if namespaced && child != "types" {
			let _ = writeln!(out, "export * as {child} from './{child}';");
		} else {
			let _ = writeln!(out, "export * from './{child}';");
		}
	}
	out
}

/// Local and key names of an instruction's inputs. An argument that shares
/// its name with an account gets an `Arg` suffix.
struct InputNames {
	accounts: BTreeSet<String>,
}

impl InputNames {
	fn of(instruction: &InstructionNode) -> Self {
		Self {
			accounts: instruction
				.accounts
				.iter()
				.map(|account| account.name.to_lower_camel_case())
				.collect(),
		}
	}

	fn key(&self, kind: InputKind, name: &str) -> String {
		let camel = name.to_lower_camel_case();
		if kind == InputKind::Argument && self.accounts.contains(&camel) {
			format!("{camel}Arg")
		} else {
			camel
		}
	}

	fn reference(&self, input: &InputRef) -> String {
		match input {
			InputRef::Account(name) => self.key(InputKind::Account, name),
			InputRef::Argument(name) => self.key(InputKind::Argument, name),
		}
	}
}

fn literal(imports: &mut Imports, value: &LiteralValue, target: &TypeNode) -> String {
	let target = match target {
		TypeNode::Option { item } => item.as_ref(),
		other => other,
	};
	match value {
		LiteralValue::Number(number) => {
			match target {
				TypeNode::Number { format } if is_big(*format) => format!("{number}n"),
				_ => number.to_string(),
			}
		}
		LiteralValue::Boolean(value) => value.to_string(),
		LiteralValue::String(value) => js_string(value),
		LiteralValue::PublicKey(value) => format!("{}({})", imports.kit("address"), js_string(value)),
		LiteralValue::Bytes(bytes) => byte_array(bytes),
	}
}

fn is_big(format: NumberFormat) -> bool {
	matches!(
		format,
		NumberFormat::U64 | NumberFormat::U128 | NumberFormat::I64 | NumberFormat::I128
	)
}

fn span(discriminator: &DiscriminatorNode) -> (usize, usize) {
	(discriminator.offset, discriminator.offset + discriminator.size())
}

fn byte_array(bytes: &[u8]) -> String {
	let bytes = bytes.iter().map(u8::to_string).collect::<Vec<_>>().join(", ");
	format!("new Uint8Array([{bytes}])")
}

fn program_address_constant(program: &ProgramNode) -> String {
	format!("{}_PROGRAM_ADDRESS", program.name.to_shouty_snake_case())
}

/// A single-quoted string literal.
fn js_string(value: &str) -> String {
	let mut out = String::with_capacity(value.len() + 2);
	out.push('\'');
	for c in value.chars() {
		match c {
			'\'' => out.push_str("\\'"),
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			c => out.push(c),
		}
	}
	out.push('\'');
	out
}

fn escape_doc(line: &str) -> String {
	line.replace("*/", "*\\/")
}

fn doc_block(lines: &[String], indent: &str) -> String {
	match lines {
		[] => String::new(),
		[line] => format!("{indent}/** {} */\n", escape_doc(line)),
		lines => {
			let mut out = format!("{indent}/**\n");
			for line in lines {
				let _ = writeln!(out, "{indent} * {}", escape_doc(line));
			}
			let _ = writeln!(out, "{indent} */");
			out
		}
	}
}

fn unsupported(at: &str, type_node: &TypeNode, reason: String) -> RenderError {
	RenderError::UnsupportedType {
		context: at.to_owned(),
		kind: type_node.kind(),
		reason,
	}
}

#[cfg(test)]
mod tests {
	use idlforge::nodes::ErrorNode;
	use idlforge::nodes::InstructionAccountNode;
	use idlforge::nodes::InstructionArgumentNode;
	use idlforge::nodes::SeedBinding;

	use super::*;

	fn counter_root() -> RootNode {
		let mut counter = AccountNode::new(
			"Counter",
			vec![
				StructFieldNode::new("authority", TypeNode::PublicKey),
				StructFieldNode::new("value", NumberFormat::U64),
			],
		);
		counter.discriminator = Some(DiscriminatorNode::number(NumberFormat::U8, 1));
		counter.seeds = Some(vec![
			PdaSeedNode::utf8("counter"),
			PdaSeedNode::variable("authority", TypeNode::PublicKey),
		]);

		let mut counter_slot = InstructionAccountNode::new("counter", true, false);
		counter_slot.default_value = Some(DefaultValueNode::Pda {
			account: "Counter".to_owned(),
			seeds: vec![SeedBinding::new("authority", InputRef::Account("authority".to_owned()))],
		});
		let mut payer = InstructionAccountNode::new("payer", true, true);
		payer.default_value = Some(DefaultValueNode::account("authority"));
		let mut memo = InstructionAccountNode::new("memo", false, false);
		memo.is_optional = true;

		let create = InstructionNode::new("create")
			.add_account(counter_slot)
			.add_account(payer)
			.add_account(InstructionAccountNode::new("authority", false, true))
			.add_account(memo)
			.add_argument(InstructionArgumentNode::new("initialValue", NumberFormat::U64));

		RootNode::new(
			ProgramNode::new("counter", "Counter111111111111111111111111111111111111")
				.add_account(counter)
				.add_instruction(create)
				.add_error(ErrorNode::new(6000, "Overflow", "Counter overflowed")),
		)
	}

	fn render(root: &RootNode) -> RenderedFiles {
		JsRenderer
			.render(root, &RenderOptions::default())
			.unwrap_or_else(|e| panic!("render failed: {e}"))
	}

	#[test]
	fn lays_out_one_module_per_node() {
		let files = render(&counter_root());
		let paths = files.keys().map(|path| path.display().to_string()).collect::<Vec<_>>();
		assert_eq!(
			paths,
			[
				"accounts/counter.ts",
				"accounts/index.ts",
				"errors.ts",
				"index.ts",
				"instructions/create.ts",
				"instructions/index.ts",
				"programs.ts",
			]
		);
	}

	#[test]
	fn program_address_module() {
		let files = render(&counter_root());
		let body = files[Path::new("programs.ts")]
			.lines()
			.skip(4)
			.collect::<Vec<_>>()
			.join("\n");
		insta::assert_snapshot!(body, @r"
		import { Address } from '@solana/kit';

		export const COUNTER_PROGRAM_ADDRESS = 'Counter111111111111111111111111111111111111' as Address<'Counter111111111111111111111111111111111111'>;
		");
	}

	#[test]
	fn instruction_input_omits_defaulted_accounts_from_required_keys() {
		let files = render(&counter_root());
		let create = &files[Path::new("instructions/create.ts")];
		assert!(create.contains("  authority: Address;\n  initialValue: bigint;\n  counter?: Address;\n  payer?: Address;\n  memo?: Address;\n"), "{create}");
		assert!(create.contains("const payer = input.payer ?? authority;"));
		assert!(create.contains(
			"const counter = input.counter ?? (await findCounterPda({ authority: authority }, programAddress))[0];"
		));
		assert!(create.contains("memo === undefined"));
		assert!(create.contains("import { findCounterPda } from '../accounts';"));
	}

	#[test]
	fn pda_helper_encodes_seeds_in_order() {
		let files = render(&counter_root());
		let counter = &files[Path::new("accounts/counter.ts")];
		let constant = counter.find("getUtf8Encoder().encode('counter')");
		let variable = counter.find("getAddressCodec().encode(seeds.authority)");
		assert!(constant.is_some() && variable.is_some(), "{counter}");
		assert!(constant < variable);
		assert!(counter.contains("export const COUNTER_DISCRIMINATOR = new Uint8Array([1]);"));
	}

	#[test]
	fn errors_map_codes_to_messages() {
		let files = render(&counter_root());
		let errors = &files[Path::new("errors.ts")];
		assert!(errors.contains("export const COUNTER_ERROR__OVERFLOW = 0x1770; // 6000"));
		assert!(errors.contains("[COUNTER_ERROR__OVERFLOW]: 'Counter overflowed',"));
	}

	#[test]
	fn strings_are_escaped() {
		assert_eq!(js_string("it's"), "'it\\'s'");
		assert_eq!(escape_doc("a */ b"), "a *\\/ b");
	}

	#[test]
	fn invalid_formatter_option_fails_before_rendering() {
		let mut options = RenderOptions::default();
		options
			.options
			.insert("formatter".to_owned(), serde_json::Value::String("prettier".to_owned()));
		let error = JsRenderer
			.render(&counter_root(), &options)
			.expect_err("render should fail");
		insta::assert_snapshot!(error, @"invalid renderer option `formatter`: expected a list of strings");
	}

	#[test]
	fn failing_formatter_reports_status() {
		let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
		let error = run_formatter(&["false"], dir.path()).expect_err("formatter should fail");
		assert!(matches!(error, RenderError::CommandFailed { status: 1, .. }), "{error}");
	}
}
