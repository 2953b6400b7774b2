//! The commands behind the `idlforge` binary.

pub mod error;

use std::path::Path;

use comfy_table::Table;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use idlforge::CallBuilderSignature;
use idlforge::PipelineConfig;
use idlforge::RootNode;
use idlforge::builder::BuilderInput;
use idlforge::render::TargetOutcome;
use idlforge::render::render_all;
use idlforge::run_config;
use idlforge_renderers::targets_from_config;

pub use crate::error::CliError;

/// Run the pipeline of `config_path` and render its targets, or only the
/// targets named in `only`. Every target is attempted; failures are reported
/// per outcome.
pub fn generate(config_path: &Path, only: &[String]) -> Result<Vec<TargetOutcome>, CliError> {
	let config = PipelineConfig::load(config_path)?;
	let targets = targets_from_config(&config, only)?;
	let run = run_config(&config)?;
	log::debug!(
		"rendering {} of {} configured target(s)",
		targets.len(),
		config.renderers.len()
	);
	Ok(render_all(run.final_tree(), &targets))
}

/// The tree after operation `stage` as pretty JSON. `None` selects the final
/// tree.
pub fn inspect(config_path: &Path, stage: Option<usize>) -> Result<String, CliError> {
	let config = PipelineConfig::load(config_path)?;
	let run = run_config(&config)?;
	let last = run.stages().len() - 1;
	let position = stage.unwrap_or(last);
	let selected = run.stage(position).ok_or(CliError::StageOutOfRange {
		requested: position,
		last,
	})?;
	let mut json = serde_json::to_string_pretty(selected.tree.as_ref())?;
	json.push('\n');
	Ok(json)
}

/// Run the pipeline without rendering and tabulate the inputs each
/// instruction builder takes.
pub fn check(config_path: &Path) -> Result<Table, CliError> {
	let config = PipelineConfig::load(config_path)?;
	let run = run_config(&config)?;
	Ok(signature_table(run.final_tree()))
}

pub fn signature_table(root: &RootNode) -> Table {
	let mut table = Table::new();
	table
		.load_preset(UTF8_FULL_CONDENSED)
		.set_header(vec!["program", "instruction", "required", "defaulted", "optional"]);

	for program in &root.programs {
		for instruction in &program.instructions {
			let signature = CallBuilderSignature::of(instruction);
			table.add_row(vec![
				program.name.clone(),
				instruction.name.clone(),
				names(&signature.required),
				names(&signature.defaulted),
				names(&signature.optional),
			]);
		}
	}

	table
}

fn names(inputs: &[BuilderInput<'_>]) -> String {
	if inputs.is_empty() {
		return "-".to_owned();
	}
	inputs.iter().map(|input| input.name).collect::<Vec<_>>().join(", ")
}
