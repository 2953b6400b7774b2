use std::collections::BTreeSet;

use idlforge::CallBuilderSignature;
use idlforge::RenderError;
use idlforge::builder::BuilderInput;
use idlforge::builder::InputKind;
use idlforge::nodes::DefaultValueNode;
use idlforge::nodes::InputRef;

pub(crate) fn input_ref(kind: InputKind, name: &str) -> InputRef {
	match kind {
		InputKind::Account => InputRef::Account(name.to_owned()),
		InputKind::Argument => InputRef::Argument(name.to_owned()),
	}
}

/// Every input a default value reads, including plain references.
pub(crate) fn default_inputs(value: &DefaultValueNode) -> Vec<InputRef> {
	match value {
		DefaultValueNode::Account { name } => vec![InputRef::Account(name.clone())],
		DefaultValueNode::Argument { name } => vec![InputRef::Argument(name.clone())],
		other => other.dependencies().into_iter().cloned().collect(),
	}
}

/// The defaulted inputs of `signature` in an order where each one comes
/// after every input its default reads.
pub(crate) fn resolution_order<'a>(
	signature: &CallBuilderSignature<'a>,
	context: &str,
) -> Result<Vec<BuilderInput<'a>>, RenderError> {
	let mut resolved = signature
		.required
		.iter()
		.chain(&signature.optional)
		.map(|input| input_ref(input.kind, input.name))
		.collect::<BTreeSet<_>>();
	let mut pending = signature.defaulted.clone();
	let mut ordered = Vec::with_capacity(pending.len());

	while !pending.is_empty() {
		let ready = pending.iter().position(|input| {
			input.default_value.is_none_or(|value| {
				default_inputs(value)
					.iter()
					.all(|dependency| resolved.contains(dependency))
			})
		});
		let Some(position) = ready else {
			let names = pending.iter().map(|input| input.name).collect::<Vec<_>>();
			return Err(RenderError::UnsupportedType {
				context: context.to_owned(),
				kind: "defaultValue",
				reason: format!("the defaults of {} depend on each other", names.join(", ")),
			});
		};
		let input = pending.remove(position);
		resolved.insert(input_ref(input.kind, input.name));
		ordered.push(input);
	}

	Ok(ordered)
}
