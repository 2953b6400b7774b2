//! Rust client renderer.
//!
//! Every module is built as a [`TokenStream`] and, when `formatCode` is on,
//! pretty-printed through `syn` and `prettyplease`. The generated code
//! expects `borsh`, `solana-pubkey`, `solana-instruction` and `thiserror` in
//! the consuming crate.
//!
//! Options:
//! - `modulePath`: where the generated tree is mounted, default
//!   `crate::generated`.
//!
//! Any other option key is rejected.

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use heck::ToShoutySnakeCase;
use heck::ToSnakeCase;
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
use idlforge::nodes::ErrorNode;
use idlforge::nodes::InputRef;
use idlforge::nodes::InstructionNode;
use idlforge::nodes::LiteralValue;
use idlforge::nodes::PdaSeedNode;
use idlforge::nodes::ProgramNode;
use idlforge::nodes::StructFieldNode;
use idlforge::nodes::TypeNode;
use idlforge::render::generated_header;
use proc_macro2::Ident;
use proc_macro2::Literal;
use proc_macro2::Span;
use proc_macro2::TokenStream;
use quote::format_ident;
use quote::quote;

use crate::defaults::resolution_order;

pub struct RustRenderer;

impl Renderer for RustRenderer {
	fn name(&self) -> &str {
		"rust"
	}

	fn render(&self, root: &RootNode, options: &RenderOptions) -> Result<RenderedFiles, RenderError> {
		options.check_known(&["modulePath"])?;
		let module = match options.string_option("modulePath")? {
			Some(path) => {
				syn::parse_str::<syn::Path>(path).map_err(|error| {
					RenderError::InvalidOption {
						option: "modulePath".to_owned(),
						reason: error.to_string(),
					}
				})?
			}
			None => syn::parse_quote!(crate::generated),
		};
		let context = Context {
			root,
			module,
			nested: root.programs.len() > 1,
		};

		let mut modules = Vec::new();
		let mut root_modules = Vec::new();
		if context.nested {
			for program in &root.programs {
				let name = program.name.to_snake_case();
				let dir = PathBuf::from(&name);
				let children = context.render_program(program, &dir, &mut modules)?;
				modules.push((dir.join("mod.rs"), mod_file(&children)));
				root_modules.push(name);
			}
			let shared = root.shared_types.iter().map(AsRef::as_ref).collect::<Vec<_>>();
			if !shared.is_empty() {
				context.render_types(None, &shared, Path::new(""), &mut modules)?;
				root_modules.push("types".to_owned());
			}
		} else if let Some(program) = root.primary() {
			root_modules = context.render_program(program, Path::new(""), &mut modules)?;
		}
		modules.push((PathBuf::from("mod.rs"), mod_file(&root_modules)));
		log::debug!("built {} rust modules", modules.len());

		let header = generated_header("//");
		modules
			.into_iter()
			.map(|(path, tokens)| {
				let body = format_module(&path, tokens, options.format_code)?;
				Ok((path, format!("{header}\n{body}")))
			})
			.collect()
	}
}

struct Context<'a> {
	root: &'a RootNode,
	module: syn::Path,
	/// Whether each program gets its own sub-module.
	nested: bool,
}

impl Context<'_> {
	fn program_module(&self, program: &ProgramNode) -> TokenStream {
		let module = &self.module;
		if self.nested {
			let name = ident(&program.name.to_snake_case());
			quote!(#module::#name)
		} else {
			quote!(#module)
		}
	}

	fn program_id(&self, program: &ProgramNode) -> TokenStream {
		let module = self.program_module(program);
		let constant = program_id_ident(program);
		quote!(#module::programs::#constant)
	}

	fn type_path(&self, program: Option<&ProgramNode>, name: &str) -> TokenStream {
		let type_name = type_ident(name);
		match program {
			Some(program) if !self.nested || program.defined_type(name).is_some() => {
				let module = self.program_module(program);
				quote!(#module::types::#type_name)
			}
			_ => {
				let module = &self.module;
				quote!(#module::types::#type_name)
			}
		}
	}

	/// Render one program below `dir` and return the module names it
	/// produced there.
	fn render_program(
		&self,
		program: &ProgramNode,
		dir: &Path,
		out: &mut Vec<(PathBuf, TokenStream)>,
	) -> Result<Vec<String>, RenderError> {
		let mut children = vec!["programs".to_owned()];
		out.push((dir.join("programs.rs"), programs_module(program)));

		if !program.accounts.is_empty() {
			let mut names = Vec::new();
			for account in &program.accounts {
				let name = account.name.to_snake_case();
				let path = dir.join("accounts").join(format!("{name}.rs"));
				out.push((path, self.account_module(program, account)?));
				names.push(name);
			}
			out.push((dir.join("accounts/mod.rs"), reexport_file(&names)));
			children.push("accounts".to_owned());
		}

		if !program.instructions.is_empty() {
			let mut names = Vec::new();
			for instruction in &program.instructions {
				let name = instruction.name.to_snake_case();
				let path = dir.join("instructions").join(format!("{name}.rs"));
				out.push((path, self.instruction_module(program, instruction)?));
				names.push(name);
			}
			out.push((dir.join("instructions/mod.rs"), reexport_file(&names)));
			children.push("instructions".to_owned());
		}

		if !program.errors.is_empty() {
			out.push((dir.join("errors.rs"), errors_module(program)));
			children.push("errors".to_owned());
		}

		let mut types = program.defined_types.iter().map(AsRef::as_ref).collect::<Vec<_>>();
		if !self.nested {
			// A program-level definition shadows a shared one of the same name.
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
			self.render_types(Some(program), &types, dir, out)?;
			children.push("types".to_owned());
		}

		Ok(children)
	}

	fn render_types(
		&self,
		program: Option<&ProgramNode>,
		types: &[&DefinedTypeNode],
		dir: &Path,
		out: &mut Vec<(PathBuf, TokenStream)>,
	) -> Result<(), RenderError> {
		let mut names = Vec::new();
		for defined in types {
			let name = defined.name.to_snake_case();
			let path = dir.join("types").join(format!("{name}.rs"));
			out.push((path, self.defined_type(program, defined)?));
			names.push(name);
		}
		out.push((dir.join("types/mod.rs"), reexport_file(&names)));
		Ok(())
	}

	fn type_tokens(
		&self,
		program: Option<&ProgramNode>,
		type_node: &TypeNode,
		at: &str,
	) -> Result<TokenStream, RenderError> {
		let tokens = match type_node {
			TypeNode::Number { format } => {
				let name = format_ident!("{}", format.as_str());
				quote!(#name)
			}
			TypeNode::Boolean => quote!(bool),
			TypeNode::PublicKey => quote!(solana_pubkey::Pubkey),
			TypeNode::String => quote!(String),
			TypeNode::Bytes => quote!(Vec<u8>),
			TypeNode::FixedSize { inner, size } => {
				match inner.as_ref() {
					TypeNode::Bytes | TypeNode::String => {
						let size = Literal::usize_unsuffixed(*size);
						quote!([u8; #size])
					}
					other => {
						return Err(unsupported(
							at,
							type_node.kind(),
							format!("only bytes and strings can have a fixed size, found `{}`", other.kind()),
						));
					}
				}
			}
			TypeNode::Option { item } => {
				let item = self.type_tokens(program, item, at)?;
				quote!(Option<#item>)
			}
			TypeNode::Array { item, count } => {
				let item = self.type_tokens(program, item, at)?;
				match count {
					Some(count) => {
						let count = Literal::usize_unsuffixed(*count);
						quote!([#item; #count])
					}
					None => quote!(Vec<#item>),
				}
			}
			TypeNode::Struct { .. } | TypeNode::Enum { .. } => {
				return Err(unsupported(
					at,
					type_node.kind(),
					"nested structs and enums must be declared as defined types".to_owned(),
				));
			}
			TypeNode::Link { name } => self.type_path(program, name),
		};
		Ok(tokens)
	}

	fn fields(
		&self,
		program: Option<&ProgramNode>,
		fields: &[StructFieldNode],
		at: &str,
	) -> Result<Vec<TokenStream>, RenderError> {
		fields
			.iter()
			.map(|field| {
				let name = field_ident(&field.name);
				let docs = docs(&field.docs);
				let ty = self.type_tokens(program, &field.type_node, &format!("{at}/{}", field.name))?;
				Ok(quote! {
					#docs
					pub #name: #ty
				})
			})
			.collect()
	}

	fn defined_type(
		&self,
		program: Option<&ProgramNode>,
		defined: &DefinedTypeNode,
	) -> Result<TokenStream, RenderError> {
		let at = format!("types/{}", defined.name);
		let name = type_ident(&defined.name);
		let docs = docs(&defined.docs);

		let tokens = match &defined.type_node {
			TypeNode::Struct { fields } => {
				let fields = self.fields(program, fields, &at)?;
				quote! {
					#docs
					#[derive(borsh::BorshSerialize, borsh::BorshDeserialize, Clone, Debug, PartialEq)]
					pub struct #name {
						#(#fields),*
					}
				}
			}
			TypeNode::Enum { variants } => self.enum_type(program, &name, &docs, variants, &at)?,
			other => {
				let ty = self.type_tokens(program, other, &at)?;
				quote! {
					#docs
					pub type #name = #ty;
				}
			}
		};
		Ok(tokens)
	}

	fn enum_type(
		&self,
		program: Option<&ProgramNode>,
		name: &Ident,
		docs: &TokenStream,
		variants: &[EnumVariantNode],
		at: &str,
	) -> Result<TokenStream, RenderError> {
		let explicit = variants.iter().any(|variant| variant.discriminant.is_some());
		if explicit && variants.iter().any(|variant| variant.fields.is_some()) {
			return Err(unsupported(
				at,
				"enum",
				"explicit discriminants are only supported on enums without data variants".to_owned(),
			));
		}

		let mut tokens = Vec::with_capacity(variants.len());
		for (position, variant) in variants.iter().enumerate() {
			let ident = type_ident(&variant.name);
			let variant_tokens = match &variant.fields {
				Some(fields) => {
					let fields = self.fields(program, fields, &format!("{at}/{}", variant.name))?;
					quote!(#ident { #(#fields),* })
				}
				None if explicit => {
					let tag = u8::try_from(variant.tag(position)).map_err(|_| {
						unsupported(
							at,
							"enum",
							format!("the discriminant of `{}` does not fit in a u8", variant.name),
						)
					})?;
					let tag = Literal::u8_unsuffixed(tag);
					quote!(#ident = #tag)
				}
				None => quote!(#ident),
			};
			tokens.push(variant_tokens);
		}

		let attributes = if explicit {
			quote! {
				#[borsh(use_discriminant = true)]
				#[repr(u8)]
			}
		} else {
			TokenStream::new()
		};
		Ok(quote! {
			#docs
			#[derive(borsh::BorshSerialize, borsh::BorshDeserialize, Clone, Debug, PartialEq)]
			#attributes
			pub enum #name {
				#(#tokens),*
			}
		})
	}

	fn account_module(&self, program: &ProgramNode, account: &AccountNode) -> Result<TokenStream, RenderError> {
		let at = format!("accounts/{}", account.name);
		let name = type_ident(&account.name);
		let docs = docs(&account.docs);
		let fields = self.fields(Some(program), &account.fields, &at)?;

		let (constant, from_bytes) = match &account.discriminator {
			Some(discriminator) => {
				let constant = discriminator_ident(&account.name);
				let (declaration, start, end) = discriminator_const(&constant, discriminator);
				let start = Literal::usize_unsuffixed(start);
				let end_literal = Literal::usize_unsuffixed(end);
				let from_bytes = quote! {
					pub fn from_bytes(data: &[u8]) -> std::io::Result<Self> {
						if data.get(#start..#end_literal) != Some(&#constant[..]) {
							return Err(std::io::Error::new(
								std::io::ErrorKind::InvalidData,
								"invalid account discriminator",
							));
						}
						let mut data = &data[#end_literal..];
						borsh::BorshDeserialize::deserialize(&mut data)
					}
				};
				(declaration, from_bytes)
			}
			None => {
				let from_bytes = quote! {
					pub fn from_bytes(data: &[u8]) -> std::io::Result<Self> {
						let mut data = data;
						borsh::BorshDeserialize::deserialize(&mut data)
					}
				};
				(TokenStream::new(), from_bytes)
			}
		};

		let find_pda = match &account.seeds {
			Some(seeds) => find_pda(account, seeds, &at)?,
			None => TokenStream::new(),
		};

		Ok(quote! {
			#constant

			#docs
			#[derive(borsh::BorshSerialize, borsh::BorshDeserialize, Clone, Debug, PartialEq)]
			pub struct #name {
				#(#fields),*
			}

			impl #name {
				#from_bytes
				#find_pda
			}
		})
	}

	fn instruction_module(
		&self,
		program: &ProgramNode,
		instruction: &InstructionNode,
	) -> Result<TokenStream, RenderError> {
		let at = format!("instructions/{}", instruction.name);
		let name = type_ident(&instruction.name);
		let args_name = format_ident!("{}InstructionArgs", name);
		let docs = docs(&instruction.docs);
		let program_id = self.program_id(program);
		let inputs = InputNames::of(instruction);

		let (constant, data_init) = match &instruction.discriminator {
			Some(discriminator) => {
				let constant = discriminator_ident(&instruction.name);
				let (declaration, start, _) = discriminator_const(&constant, discriminator);
				let start = Literal::usize_unsuffixed(start);
				let init = quote! {
					let mut data = vec![0u8; #start];
					data.extend_from_slice(&#constant);
				};
				(declaration, init)
			}
			None => (TokenStream::new(), quote!(let mut data = Vec::new();)),
		};

		let mut arg_fields = Vec::new();
		for argument in &instruction.arguments {
			let field = inputs.argument(&argument.name);
			let docs = self::docs(&argument.docs);
			let ty = self.type_tokens(Some(program), &argument.type_node, &format!("{at}/arguments/{}", argument.name))?;
			arg_fields.push(quote! {
				#docs
				pub #field: #ty
			});
		}

		let mut account_fields = Vec::new();
		let mut metas = Vec::new();
		for account in &instruction.accounts {
			let field = field_ident(&account.name);
			let docs = self::docs(&account.docs);
			let constructor = if account.is_writable {
				quote!(new)
			} else {
				quote!(new_readonly)
			};
			let signer = account.is_signer;
			if account.is_optional {
				account_fields.push(quote! {
					#docs
					pub #field: Option<solana_pubkey::Pubkey>
				});
				metas.push(quote! {
					accounts.push(match self.#field {
						Some(key) => solana_instruction::AccountMeta::#constructor(key, #signer),
						None => solana_instruction::AccountMeta::new_readonly(#program_id, false),
					});
				});
			} else {
				account_fields.push(quote! {
					#docs
					pub #field: solana_pubkey::Pubkey
				});
				metas.push(quote! {
					accounts.push(solana_instruction::AccountMeta::#constructor(self.#field, #signer));
				});
			}
		}
		let account_count = Literal::usize_unsuffixed(instruction.accounts.len());
		let builder = self.builder(program, instruction, &inputs, &at)?;

		Ok(quote! {
			#constant

			#[derive(borsh::BorshSerialize, borsh::BorshDeserialize, Clone, Debug, PartialEq)]
			pub struct #args_name {
				#(#arg_fields),*
			}

			#docs
			#[derive(Clone, Debug, PartialEq)]
			pub struct #name {
				#(#account_fields),*
			}

			impl #name {
				pub fn instruction(&self, args: &#args_name) -> std::io::Result<solana_instruction::Instruction> {
					let mut accounts = Vec::with_capacity(#account_count);
					#(#metas)*
					#data_init
					data.extend(borsh::to_vec(args)?);
					Ok(solana_instruction::Instruction {
						program_id: #program_id,
						accounts,
						data,
					})
				}
			}

			#builder
		})
	}

	/// The call builder. Its constructor takes exactly the required inputs;
	/// defaulted and optional inputs get setters.
	fn builder(
		&self,
		program: &ProgramNode,
		instruction: &InstructionNode,
		inputs: &InputNames,
		at: &str,
	) -> Result<TokenStream, RenderError> {
		let name = type_ident(&instruction.name);
		let builder_name = format_ident!("{}Builder", name);
		let args_name = format_ident!("{}InstructionArgs", name);
		let signature = CallBuilderSignature::of(instruction);

		let input_type = |kind: InputKind, input: &str| -> Result<TokenStream, RenderError> {
			match kind {
				InputKind::Account => Ok(quote!(solana_pubkey::Pubkey)),
				InputKind::Argument => {
					let argument = instruction
						.argument(input)
						.map(|argument| &argument.type_node)
						.unwrap_or(&TypeNode::Bytes);
					self.type_tokens(Some(program), argument, &format!("{at}/arguments/{input}"))
				}
			}
		};

		let mut fields = Vec::new();
		let mut params = Vec::new();
		let mut assignments = Vec::new();
		let mut setters = Vec::new();
		let mut locals = Vec::new();

		for input in &signature.required {
			let field = inputs.ident(input.kind, input.name);
			let ty = input_type(input.kind, input.name)?;
			fields.push(quote!(#field: #ty));
			params.push(quote!(#field: #ty));
			assignments.push(quote!(#field));
			locals.push(match input.kind {
				InputKind::Account => quote!(let #field = self.#field;),
				InputKind::Argument => quote!(let #field = self.#field.clone();),
			});
		}

		for input in signature.optional.iter().chain(&signature.defaulted) {
			let field = inputs.ident(input.kind, input.name);
			let ty = input_type(input.kind, input.name)?;
			fields.push(quote!(#field: Option<#ty>));
			assignments.push(quote!(#field: None));
			setters.push(quote! {
				pub fn #field(&mut self, #field: #ty) -> &mut Self {
					self.#field = Some(#field);
					self
				}
			});
		}
		for input in &signature.optional {
			let field = inputs.ident(input.kind, input.name);
			locals.push(quote!(let #field = self.#field;));
		}

		for input in resolution_order(&signature, at)? {
			let Some(value) = input.default_value else {
				continue;
			};
			locals.push(self.default_local(program, instruction, inputs, input.kind, input.name, value, at)?);
		}

		let account_values = instruction.accounts.iter().map(|account| {
			let field = field_ident(&account.name);
			quote!(#field)
		});
		let arg_values = instruction.arguments.iter().map(|argument| {
			let field = inputs.argument(&argument.name);
			quote!(#field)
		});

		let doc = format!(" Builds a `{}` instruction from its required inputs.", instruction.name);
		Ok(quote! {
			#[doc = #doc]
			#[derive(Clone, Debug)]
			pub struct #builder_name {
				#(#fields),*
			}

			impl #builder_name {
				pub fn new(#(#params),*) -> Self {
					Self {
						#(#assignments),*
					}
				}

				#(#setters)*

				pub fn instruction(&self) -> std::io::Result<solana_instruction::Instruction> {
					#(#locals)*
					#name {
						#(#account_values),*
					}
					.instruction(&#args_name {
						#(#arg_values),*
					})
				}
			}
		})
	}

	#[allow(clippy::too_many_arguments)]
	fn default_local(
		&self,
		program: &ProgramNode,
		instruction: &InstructionNode,
		inputs: &InputNames,
		kind: InputKind,
		input: &str,
		value: &DefaultValueNode,
		at: &str,
	) -> Result<TokenStream, RenderError> {
		let field = inputs.ident(kind, input);
		let target_type = match kind {
			InputKind::Account => &TypeNode::PublicKey,
			InputKind::Argument => {
				instruction
					.argument(input)
					.map_or(&TypeNode::PublicKey, |argument| &argument.type_node)
			}
		};
		let is_optional = match kind {
			InputKind::Account => instruction.account(input).is_some_and(|account| account.is_optional),
			InputKind::Argument => target_type.is_option(),
		};

		if matches!(value, DefaultValueNode::Absent) {
			return Ok(match kind {
				InputKind::Account => quote!(let #field = self.#field;),
				InputKind::Argument => quote!(let #field = self.#field.clone().unwrap_or(None);),
			});
		}

		let expr = match value {
			DefaultValueNode::Pda { account, seeds } => {
				let node = program.account(account).ok_or_else(|| {
					RenderError::UnsupportedType {
						context: format!("{at}/{input}"),
						kind: "pda",
						reason: format!("account `{account}` does not exist"),
					}
				})?;
				let mut args = Vec::new();
				for seed in node.seed_inputs() {
					let binding = seeds.iter().find(|binding| binding.seed == seed.name).ok_or_else(|| {
						RenderError::UnsupportedType {
							context: format!("{at}/{input}"),
							kind: "pda",
							reason: format!("seed `{}` is not bound", seed.name),
						}
					})?;
					let local = inputs.reference(&binding.value);
					args.push(match &seed.type_node {
						TypeNode::Number { .. } | TypeNode::Boolean => quote!(#local),
						_ => quote!(&#local),
					});
				}
				let module = self.program_module(program);
				let account_type = type_ident(account);
				let program_id = self.program_id(program);
				quote!(#module::accounts::#account_type::find_pda(&#program_id, #(#args),*).0)
			}
			DefaultValueNode::Account { name } => {
				let local = field_ident(name);
				quote!(#local)
			}
			DefaultValueNode::Argument { name } => {
				let local = inputs.argument(name);
				quote!(#local.clone())
			}
			DefaultValueNode::ProgramId => self.program_id(program),
			DefaultValueNode::Literal { value } => literal(value, target_type),
			DefaultValueNode::Absent => quote!(None),
		};

		Ok(match (kind, is_optional) {
			(InputKind::Account, true) => quote!(let #field = self.#field.or_else(|| Some(#expr));),
			(InputKind::Account, false) => quote!(let #field = self.#field.unwrap_or_else(|| #expr);),
			(InputKind::Argument, true) => {
				quote!(let #field = self.#field.clone().unwrap_or_else(|| Some(#expr));)
			}
			(InputKind::Argument, false) => quote!(let #field = self.#field.clone().unwrap_or_else(|| #expr);),
		})
	}
}

/// Local and field names of an instruction's inputs. An argument that shares
/// its name with an account gets an `_arg` suffix.
struct InputNames {
	accounts: BTreeSet<String>,
}

impl InputNames {
	fn of(instruction: &InstructionNode) -> Self {
		Self {
			accounts: instruction
				.accounts
				.iter()
				.map(|account| account.name.to_snake_case())
				.collect(),
		}
	}

	fn argument(&self, name: &str) -> Ident {
		let snake = name.to_snake_case();
		if self.accounts.contains(&snake) {
			ident(&format!("{snake}_arg"))
		} else {
			ident(&snake)
		}
	}

	fn ident(&self, kind: InputKind, name: &str) -> Ident {
		match kind {
			InputKind::Account => field_ident(name),
			InputKind::Argument => self.argument(name),
		}
	}

	fn reference(&self, input: &InputRef) -> Ident {
		match input {
			InputRef::Account(name) => field_ident(name),
			InputRef::Argument(name) => self.argument(name),
		}
	}
}

fn literal(value: &LiteralValue, target: &TypeNode) -> TokenStream {
	let target = match target {
		TypeNode::Option { item } => item.as_ref(),
		other => other,
	};
	match value {
		LiteralValue::Number(number) => {
			let magnitude = Literal::u64_unsuffixed(number.unsigned_abs());
			if *number < 0 {
				quote!(-#magnitude)
			} else {
				quote!(#magnitude)
			}
		}
		LiteralValue::Boolean(true) => quote!(true),
		LiteralValue::Boolean(false) => quote!(false),
		LiteralValue::String(text) => quote!(String::from(#text)),
		LiteralValue::PublicKey(address) => quote!(solana_pubkey::Pubkey::from_str_const(#address)),
		LiteralValue::Bytes(bytes) => {
			let bytes = bytes.iter().map(|byte| Literal::u8_unsuffixed(*byte));
			if matches!(target, TypeNode::FixedSize { .. }) {
				quote!([#(#bytes),*])
			} else {
				quote!(vec![#(#bytes),*])
			}
		}
	}
}

fn find_pda(account: &AccountNode, seeds: &[PdaSeedNode], at: &str) -> Result<TokenStream, RenderError> {
	let mut params = Vec::new();
	let mut seed_exprs = Vec::new();
	for seed in seeds {
		match seed {
			PdaSeedNode::Constant(constant) => {
				let expr = match &constant.value {
					ConstantSeedValue::Utf8(value) => {
						let literal = Literal::byte_string(value.as_bytes());
						quote!(&#literal[..])
					}
					ConstantSeedValue::Bytes(value) => {
						let literal = Literal::byte_string(value);
						quote!(&#literal[..])
					}
					ConstantSeedValue::ProgramId => quote!(program_id.as_ref()),
				};
				seed_exprs.push(expr);
			}
			PdaSeedNode::Variable(variable) => {
				let name = field_ident(&variable.name);
				let (ty, expr) = seed_param(&name, &variable.type_node, &format!("{at}/seeds/{}", variable.name))?;
				params.push(quote!(#name: #ty));
				seed_exprs.push(expr);
			}
		}
	}

	let doc = format!(" Derive the address of a `{}` account.", account.name);
	Ok(quote! {
		#[doc = #doc]
		pub fn find_pda(
			program_id: &solana_pubkey::Pubkey,
			#(#params),*
		) -> (solana_pubkey::Pubkey, u8) {
			solana_pubkey::Pubkey::find_program_address(&[#(#seed_exprs),*], program_id)
		}
	})
}

fn seed_param(name: &Ident, type_node: &TypeNode, at: &str) -> Result<(TokenStream, TokenStream), RenderError> {
	let pair = match type_node {
		TypeNode::PublicKey => (quote!(&solana_pubkey::Pubkey), quote!(#name.as_ref())),
		TypeNode::String => (quote!(&str), quote!(#name.as_bytes())),
		TypeNode::Bytes | TypeNode::FixedSize { .. } => (quote!(&[u8]), quote!(#name)),
		TypeNode::Number { format } => {
			let ty = format_ident!("{}", format.as_str());
			(quote!(#ty), quote!(#name.to_le_bytes().as_ref()))
		}
		TypeNode::Boolean => (quote!(bool), quote!(&[u8::from(#name)])),
		other => {
			return Err(unsupported(
				at,
				other.kind(),
				"seeds must be addresses, strings, bytes, numbers or booleans".to_owned(),
			));
		}
	};
	Ok(pair)
}

fn programs_module(program: &ProgramNode) -> TokenStream {
	let constant = program_id_ident(program);
	let address = &program.public_key;
	let doc = format!(" `{}` program id.", program.name);
	quote! {
		#[doc = #doc]
		pub const #constant: solana_pubkey::Pubkey = solana_pubkey::Pubkey::from_str_const(#address);
	}
}

fn errors_module(program: &ProgramNode) -> TokenStream {
	let name = format_ident!("{}Error", program.name.to_upper_camel_case());
	let variants = program.errors.iter().map(|error: &ErrorNode| {
		let ident = type_ident(&error.name);
		let code = Literal::u32_unsuffixed(error.code);
		let doc = format!(" {} (0x{:x}) - {}", error.code, error.code, error.message);
		let message = &error.message;
		quote! {
			#[doc = #doc]
			#[error(#message)]
			#ident = #code
		}
	});
	quote! {
		#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
		#[repr(u32)]
		pub enum #name {
			#(#variants),*
		}

		impl From<#name> for u32 {
			fn from(error: #name) -> Self {
				error as u32
			}
		}
	}
}

fn discriminator_const(constant: &Ident, discriminator: &DiscriminatorNode) -> (TokenStream, usize, usize) {
	let encoded = discriminator.encoded();
	let len = Literal::usize_unsuffixed(encoded.len());
	let bytes = encoded.iter().map(|byte| Literal::u8_unsuffixed(*byte));
	let start = discriminator.offset;
	let end = start + encoded.len();
	(quote!(pub const #constant: [u8; #len] = [#(#bytes),*];), start, end)
}

fn mod_file(children: &[String]) -> TokenStream {
	let children = children.iter().map(|child| ident(child));
	quote!(#(pub mod #children;)*)
}

fn reexport_file(children: &[String]) -> TokenStream {
	let children = children.iter().map(|child| ident(child));
	quote! {
		#(
			pub mod #children;
			pub use self::#children::*;
		)*
	}
}

fn format_module(path: &Path, tokens: TokenStream, format_code: bool) -> Result<String, RenderError> {
	if !format_code {
		return Ok(format!("{tokens}\n"));
	}
	let file = syn::parse2::<syn::File>(tokens).map_err(|error| {
		RenderError::Format {
			path: path.display().to_string(),
			reason: error.to_string(),
		}
	})?;
	Ok(prettyplease::unparse(&file))
}

fn docs(lines: &[String]) -> TokenStream {
	let lines = lines.iter().map(|line| format!(" {line}"));
	quote!(#(#[doc = #lines])*)
}

fn unsupported(at: &str, kind: &'static str, reason: String) -> RenderError {
	RenderError::UnsupportedType {
		context: at.to_owned(),
		kind,
		reason,
	}
}

fn program_id_ident(program: &ProgramNode) -> Ident {
	ident(&format!("{}_ID", program.name.to_shouty_snake_case()))
}

fn discriminator_ident(name: &str) -> Ident {
	ident(&format!("{}_DISCRIMINATOR", name.to_shouty_snake_case()))
}

fn field_ident(name: &str) -> Ident {
	ident(&name.to_snake_case())
}

fn type_ident(name: &str) -> Ident {
	ident(&name.to_upper_camel_case())
}

/// A valid identifier for `name`, escaping keywords.
fn ident(name: &str) -> Ident {
	let mut sanitized = name
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
		.collect::<String>();
	if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
		sanitized.insert(0, '_');
	}
	if syn::parse_str::<Ident>(&sanitized).is_ok() {
		return Ident::new(&sanitized, Span::call_site());
	}
	match sanitized.as_str() {
		"self" | "Self" | "super" | "crate" | "_" => format_ident!("{}_", sanitized),
		_ => Ident::new_raw(&sanitized, Span::call_site()),
	}
}

#[cfg(test)]
mod tests {
	use idlforge::nodes::InstructionAccountNode;
	use idlforge::nodes::InstructionArgumentNode;
	use idlforge::nodes::NumberFormat;
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

		let mut create = InstructionNode::new("create")
			.add_account(counter_slot)
			.add_account(payer)
			.add_account(InstructionAccountNode::new("authority", false, true))
			.add_argument(InstructionArgumentNode::new("initialValue", NumberFormat::U64));
		create.discriminator = Some(DiscriminatorNode::number(NumberFormat::U8, 0));

		RootNode::new(
			ProgramNode::new("counter", "Counter111111111111111111111111111111111111")
				.add_account(counter)
				.add_instruction(create)
				.add_error(ErrorNode::new(6000, "Overflow", "Counter overflowed")),
		)
	}

	fn render(root: &RootNode) -> RenderedFiles {
		let options = RenderOptions {
			format_code: true,
			..RenderOptions::default()
		};
		RustRenderer
			.render(root, &options)
			.unwrap_or_else(|e| panic!("render failed: {e}"))
	}

	#[test]
	fn lays_out_one_module_per_node() {
		let files = render(&counter_root());
		let paths = files.keys().map(|path| path.display().to_string()).collect::<Vec<_>>();
		assert_eq!(
			paths,
			[
				"accounts/counter.rs",
				"accounts/mod.rs",
				"errors.rs",
				"instructions/create.rs",
				"instructions/mod.rs",
				"mod.rs",
				"programs.rs",
			]
		);
		assert!(files.values().all(|contents| idlforge::render::is_generated(contents)));
	}

	#[test]
	fn builder_constructor_takes_only_required_inputs() {
		let files = render(&counter_root());
		let create = &files[Path::new("instructions/create.rs")];
		assert!(
			create.contains("pub fn new(authority: solana_pubkey::Pubkey, initial_value: u64) -> Self"),
			"{create}"
		);
		assert!(create.contains("pub fn counter(&mut self, counter: solana_pubkey::Pubkey) -> &mut Self"));
		assert!(create.contains("pub const CREATE_DISCRIMINATOR: [u8; 1] = [0];"));
		assert!(create.contains("crate::generated::accounts::Counter::find_pda("));
	}

	#[test]
	fn accounts_carry_discriminator_and_pda_helper() {
		let files = render(&counter_root());
		let counter = &files[Path::new("accounts/counter.rs")];
		assert!(counter.contains("pub const COUNTER_DISCRIMINATOR: [u8; 1] = [1];"));
		assert!(counter.contains("pub fn find_pda("));
		assert!(counter.contains("authority: &solana_pubkey::Pubkey"));
		assert!(counter.contains("&b\"counter\"[..]"));
	}

	#[test]
	fn errors_keep_their_codes() {
		let files = render(&counter_root());
		let errors = &files[Path::new("errors.rs")];
		assert!(errors.contains("pub enum CounterError"));
		assert!(errors.contains("Overflow = 6000"));
	}

	#[test]
	fn data_carrying_enums_cannot_have_explicit_discriminants() {
		let mut tagged = EnumVariantNode::empty("Fast");
		tagged.discriminant = Some(3);
		let data = EnumVariantNode {
			name: "Slow".to_owned(),
			discriminant: None,
			fields: Some(vec![StructFieldNode::new("delay", NumberFormat::U32)]),
		};
		let root = RootNode::new(
			ProgramNode::new("p", "P111111111111111111111111111111111111111111").add_defined_type(
				DefinedTypeNode::new("Mode", TypeNode::Enum {
					variants: vec![tagged, data],
				}),
			),
		);
		let error = RustRenderer
			.render(&root, &RenderOptions::default())
			.expect_err("render should fail");
		insta::assert_snapshot!(error, @"unsupported type `enum` at `types/Mode`: explicit discriminants are only supported on enums without data variants");
	}

	#[test]
	fn keywords_are_escaped() {
		assert_eq!(ident("type").to_string(), "r#type");
		assert_eq!(ident("self").to_string(), "self_");
		assert_eq!(ident("2fa").to_string(), "_2fa");
		assert_eq!(ident("amount").to_string(), "amount");
	}

	#[test]
	fn rejects_an_invalid_module_path() {
		let mut options = RenderOptions::default();
		options
			.options
			.insert("modulePath".to_owned(), serde_json::Value::String("not a path".to_owned()));
		let error = RustRenderer
			.render(&counter_root(), &options)
			.expect_err("render should fail");
		assert!(matches!(error, RenderError::InvalidOption { .. }));
	}

	#[test]
	fn rejects_unknown_options() {
		let mut options = RenderOptions::default();
		options
			.options
			.insert("modulPath".to_owned(), serde_json::Value::String("crate::client".to_owned()));
		let error = RustRenderer
			.render(&counter_root(), &options)
			.expect_err("render should fail");
		insta::assert_snapshot!(error.to_string(), @"invalid renderer option `modulPath`: unknown option, expected one of `modulePath`");
	}
}
