use std::path::PathBuf;

use idlforge::ConfigError;
use idlforge::PipelineError;
use idlforge::RenderError;

/// Errors reported by the `idlforge` commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Pipeline(#[from] PipelineError),

	#[error(transparent)]
	Render(#[from] RenderError),

	#[error("Stage {requested} does not exist; the pipeline produced stages 0 to {last}")]
	StageOutOfRange { requested: usize, last: usize },

	#[error("Failed to serialize the tree: {0}")]
	Serialize(#[from] serde_json::Error),

	#[error("Failed to write {path}: {source}")]
	Write {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("{failed} of {total} target(s) failed")]
	TargetsFailed { failed: usize, total: usize },
}
