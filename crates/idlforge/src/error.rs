use std::path::PathBuf;

/// Errors produced while loading interface descriptions. No tree is produced
/// when any of them occurs.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
	#[error("IO error at {path}: {source}")]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("Malformed interface description `{document}`: {reason}")]
	MalformedDescription { document: String, reason: String },

	#[error(
		"Duplicate program address `{address}`: declared by both `{first}` and `{second}`"
	)]
	DuplicateProgramAddress {
		address: String,
		first: String,
		second: String,
	},

	#[error("No interface description documents were provided")]
	NoDocuments,
}

impl LoadError {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}

	pub fn malformed(document: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::MalformedDescription {
			document: document.into(),
			reason: reason.into(),
		}
	}
}

/// Errors produced by a single update operation. The engine wraps them with
/// the name of the operation that raised them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
	#[error("unresolved reference `{path}`")]
	UnresolvedReference { path: String },

	#[error("`{path}` does not select {expected}")]
	InvalidSelector {
		path: String,
		expected: &'static str,
	},

	#[error("cannot name a node `{name}` in `{scope}`: the name is already taken")]
	DuplicateName { scope: String, name: String },

	#[error("invalid seeds for `{account}`: {reason}")]
	InvalidSeeds { account: String, reason: String },

	#[error("discriminator collision in `{scope}`: `{first}` and `{second}` both resolve to {value}")]
	DiscriminatorCollision {
		scope: String,
		first: String,
		second: String,
		value: String,
	},

	#[error("no discriminator for `{name}` in `{scope}`: {reason}")]
	DiscriminatorSourceMissing {
		scope: String,
		name: String,
		reason: String,
	},

	#[error("default value for `{target}` references missing {reference}")]
	DefaultValueTargetMissing { target: String, reference: String },

	#[error("default value for `{target}` is not applicable: {reason}")]
	IncompatibleDefaultValue { target: String, reason: String },
}

impl TransformError {
	pub fn unresolved(path: impl ToString) -> Self {
		Self::UnresolvedReference {
			path: path.to_string(),
		}
	}

	pub fn target_missing(target: impl ToString, reference: impl Into<String>) -> Self {
		Self::DefaultValueTargetMissing {
			target: target.to_string(),
			reference: reference.into(),
		}
	}
}

/// Errors that abort a pipeline run. No final tree is returned.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
	#[error(transparent)]
	Load(#[from] LoadError),

	#[error("operation `{operation}` (step {position}) failed: {source}")]
	Operation {
		operation: String,
		position: usize,
		source: TransformError,
	},
}

impl PipelineError {
	/// The transform failure behind this error, if it came from an operation.
	pub fn transform(&self) -> Option<&TransformError> {
		match self {
			Self::Operation { source, .. } => Some(source),
			Self::Load(_) => None,
		}
	}
}

/// Errors produced while rendering or writing one target. They are fatal for
/// that target only.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
	#[error("failed to write `{path}`: {source}")]
	WriteFile {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("failed to read `{path}`: {source}")]
	ReadFile {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("unsupported type `{kind}` at `{context}`: {reason}")]
	UnsupportedType {
		context: String,
		kind: &'static str,
		reason: String,
	},

	#[error("failed to format generated `{path}`: {reason}")]
	Format { path: String, reason: String },

	#[error("failed to serialize `{context}`: {source}")]
	Serialize {
		context: String,
		source: serde_json::Error,
	},

	#[error("invalid renderer option `{option}`: {reason}")]
	InvalidOption { option: String, reason: String },

	#[error("failed to run command `{command}`: {source}")]
	CommandExec {
		command: String,
		source: std::io::Error,
	},

	#[error("command `{command}` failed with status {status}{details}")]
	CommandFailed {
		command: String,
		status: i32,
		details: String,
	},

	#[error("no renderer is registered for target `{target}`")]
	UnknownTarget { target: String },
}

/// Errors produced while reading a pipeline configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("IO error at {path}: {source}")]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("Invalid pipeline configuration {path}: {source}")]
	Parse {
		path: PathBuf,
		source: serde_json::Error,
	},
}

/// Errors produced when parsing a textual node path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node path `{path}`: {reason}")]
pub struct SelectorError {
	pub path: String,
	pub reason: &'static str,
}
