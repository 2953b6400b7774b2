//! Pipeline configuration files.
//!
//! ```json
//! {
//!   "idls": ["idl/counter.json"],
//!   "operations": [
//!     { "name": "seeds", "kind": "setAccountSeeds", "account": "programs/counter/accounts/Counter", "seeds": [...] }
//!   ],
//!   "renderers": [{ "target": "rust", "output": "clients/rust/src/generated", "formatCode": true }]
//! }
//! ```
//!
//! Relative paths resolve against the directory holding the file.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::ConfigError;
use crate::render::RenderOptions;
use crate::visitors::NamedOperation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
	/// Description documents; the first is the primary program.
	pub idls: Vec<PathBuf>,
	#[serde(default)]
	pub operations: Vec<NamedOperation>,
	#[serde(default)]
	pub renderers: Vec<RendererConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererConfig {
	pub target: String,
	pub output: PathBuf,
	#[serde(default = "default_format_code")]
	pub format_code: bool,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub options: Map<String, Value>,
}

fn default_format_code() -> bool {
	true
}

impl RendererConfig {
	pub fn render_options(&self) -> RenderOptions {
		RenderOptions {
			format_code: self.format_code,
			options: self.options.clone(),
		}
	}
}

impl PipelineConfig {
	/// Read a configuration file and resolve its paths.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path).map_err(|source| {
			ConfigError::Io {
				path: path.to_path_buf(),
				source,
			}
		})?;
		let mut config = Self::parse(path, &contents)?;
		let base = path.parent().unwrap_or_else(|| Path::new(""));
		config.resolve_paths(base);
		log::debug!(
			"loaded {} with {} operations and {} renderers",
			path.display(),
			config.operations.len(),
			config.renderers.len()
		);
		Ok(config)
	}

	/// Parse configuration text. `path` only labels errors; paths are left
	/// as written.
	pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
		serde_json::from_str(contents).map_err(|source| {
			ConfigError::Parse {
				path: path.to_path_buf(),
				source,
			}
		})
	}

	/// Make every relative path relative to `base` instead.
	pub fn resolve_paths(&mut self, base: &Path) {
		for idl in &mut self.idls {
			if idl.is_relative() {
				*idl = base.join(&*idl);
			}
		}
		for renderer in &mut self.renderers {
			if renderer.output.is_relative() {
				renderer.output = base.join(&renderer.output);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::index::NodePath;
	use crate::visitors::Operation;

	const CONFIG: &str = r#"{
		"idls": ["idl/counter.json", "/abs/extra.json"],
		"operations": [
			{
				"name": "counterSeeds",
				"kind": "setAccountSeeds",
				"account": "programs/counter/accounts/Counter",
				"seeds": [
					{ "kind": "constant", "value": { "utf8": "counter" } },
					{ "kind": "variable", "name": "authority", "type": { "kind": "publicKey" } }
				]
			},
			{
				"name": "tags",
				"kind": "assignDiscriminators",
				"program": "programs/counter",
				"siblings": "instructions",
				"source": { "kind": "sequential" }
			}
		],
		"renderers": [{ "target": "rust", "output": "out/rust", "options": { "modulePath": "crate::client" } }]
	}"#;

	#[test]
	fn parses_and_resolves_paths() {
		let mut config = PipelineConfig::parse(Path::new("pipeline.json"), CONFIG)
			.unwrap_or_else(|e| panic!("parse failed: {e}"));
		config.resolve_paths(Path::new("/work"));

		assert_eq!(
			config.idls,
			[PathBuf::from("/work/idl/counter.json"), PathBuf::from("/abs/extra.json")]
		);
		assert_eq!(config.renderers[0].output, PathBuf::from("/work/out/rust"));
		assert!(config.renderers[0].format_code);
		assert_eq!(config.operations[0].name, "counterSeeds");
		assert!(matches!(
			&config.operations[0].operation,
			Operation::SetAccountSeeds(op) if op.account == NodePath::account("counter", "Counter")
		));
		assert_eq!(config.operations[1].operation.kind(), "assignDiscriminators");
	}

	#[test]
	fn invalid_node_paths_are_parse_errors() {
		let text = r#"{
			"idls": [],
			"operations": [{ "name": "bad", "kind": "rename", "renames": { "accounts/x": "y" } }]
		}"#;
		let error = PipelineConfig::parse(Path::new("pipeline.json"), text)
			.expect_err("parse should fail");
		assert!(error.to_string().contains("invalid node path `accounts/x`"));
	}
}
