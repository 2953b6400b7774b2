//! The renderer seam and the artifact writer.
//!
//! A renderer turns the final tree into an in-memory file set. Only when that
//! succeeds does the writer synchronize the output directory: changed files
//! are written, unchanged files are left alone, and generated files that are
//! no longer produced are removed. Hand-written files are never touched.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use rayon::prelude::*;
use serde_json::Map;
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::RenderError;
use crate::nodes::RootNode;

/// Marks a file as owned by the generator.
pub const GENERATED_MARKER: &str = "This code was AUTOGENERATED using the idlforge library.";

/// The generated-code header, with each line behind `comment`.
pub fn generated_header(comment: &str) -> String {
	format!(
		"{comment} {GENERATED_MARKER}\n{comment} Please DO NOT EDIT THIS FILE, instead use update operations\n{comment} to add features, then rerun idlforge to update it.\n"
	)
}

/// Whether `contents` starts with a generated-code header.
pub fn is_generated(contents: &str) -> bool {
	contents.lines().take(3).any(|line| line.contains(GENERATED_MARKER))
}

/// Relative path → contents. Ordered so output is deterministic.
pub type RenderedFiles = BTreeMap<PathBuf, String>;

/// Per-target rendering options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
	pub format_code: bool,
	/// Renderer-specific settings, passed through untouched.
	pub options: Map<String, Value>,
}

impl RenderOptions {
	/// Fail on the first key outside `known`.
	pub fn check_known(&self, known: &[&str]) -> Result<(), RenderError> {
		let Some(key) = self.options.keys().find(|key| !known.contains(&key.as_str())) else {
			return Ok(());
		};
		let reason = if known.is_empty() {
			"this renderer takes no options".to_owned()
		} else {
			let expected = known.iter().map(|k| format!("`{k}`")).collect::<Vec<_>>();
			format!("unknown option, expected one of {}", expected.join(", "))
		};
		Err(RenderError::InvalidOption {
			option: key.clone(),
			reason,
		})
	}

	pub fn string_option(&self, key: &str) -> Result<Option<&str>, RenderError> {
		match self.options.get(key) {
			None | Some(Value::Null) => Ok(None),
			Some(Value::String(value)) => Ok(Some(value)),
			Some(_) => {
				Err(RenderError::InvalidOption {
					option: key.to_owned(),
					reason: "expected a string".to_owned(),
				})
			}
		}
	}

	pub fn string_list_option(&self, key: &str) -> Result<Vec<&str>, RenderError> {
		let invalid = || {
			RenderError::InvalidOption {
				option: key.to_owned(),
				reason: "expected a list of strings".to_owned(),
			}
		};
		match self.options.get(key) {
			None | Some(Value::Null) => Ok(Vec::new()),
			Some(Value::Array(values)) => {
				values
					.iter()
					.map(|value| value.as_str().ok_or_else(invalid))
					.collect()
			}
			Some(_) => Err(invalid()),
		}
	}
}

/// One rendering back end.
pub trait Renderer: Send + Sync {
	/// The target name used in pipeline configurations.
	fn name(&self) -> &str;

	/// Render the whole tree in memory.
	fn render(&self, root: &RootNode, options: &RenderOptions) -> Result<RenderedFiles, RenderError>;

	/// Run after the files were written, e.g. an external formatter.
	fn after_write(&self, _output: &Path, _options: &RenderOptions) -> Result<(), RenderError> {
		Ok(())
	}
}

/// What a write changed on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
	pub written: Vec<PathBuf>,
	pub unchanged: Vec<PathBuf>,
	pub removed: Vec<PathBuf>,
}

impl WriteSummary {
	pub fn is_noop(&self) -> bool {
		self.written.is_empty() && self.removed.is_empty()
	}
}

/// Synchronize `output` with `files`.
pub fn write_artifacts(output: &Path, files: &RenderedFiles) -> Result<WriteSummary, RenderError> {
	for relative in files.keys() {
		check_relative(relative)?;
	}
	fs::create_dir_all(output).map_err(|source| {
		RenderError::WriteFile {
			path: output.to_path_buf(),
			source,
		}
	})?;

	let mut summary = WriteSummary::default();
	for (relative, contents) in files {
		let path = output.join(relative);
		if fs::read_to_string(&path).is_ok_and(|existing| &existing == contents) {
			summary.unchanged.push(relative.clone());
			continue;
		}
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|source| {
				RenderError::WriteFile {
					path: parent.to_path_buf(),
					source,
				}
			})?;
		}
		fs::write(&path, contents).map_err(|source| {
			RenderError::WriteFile {
				path: path.clone(),
				source,
			}
		})?;
		log::debug!("wrote {}", path.display());
		summary.written.push(relative.clone());
	}

	let produced = files.keys().collect::<BTreeSet<_>>();
	for entry in WalkDir::new(output).sort_by_file_name() {
		let entry = entry.map_err(|error| {
			RenderError::ReadFile {
				path: output.to_path_buf(),
				source: error.into(),
			}
		})?;
		if !entry.file_type().is_file() {
			continue;
		}
		let Ok(relative) = entry.path().strip_prefix(output) else {
			continue;
		};
		if produced.contains(&relative.to_path_buf()) {
			continue;
		}
		// Unreadable or non-UTF-8 files are not ours.
		let Ok(contents) = fs::read_to_string(entry.path()) else {
			continue;
		};
		if is_generated(&contents) {
			fs::remove_file(entry.path()).map_err(|source| {
				RenderError::WriteFile {
					path: entry.path().to_path_buf(),
					source,
				}
			})?;
			log::debug!("removed stale {}", entry.path().display());
			summary.removed.push(relative.to_path_buf());
		}
	}

	Ok(summary)
}

fn check_relative(path: &Path) -> Result<(), RenderError> {
	let escapes = path
		.components()
		.any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
	if escapes || path.as_os_str().is_empty() {
		return Err(RenderError::WriteFile {
			path: path.to_path_buf(),
			source: std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				"generated paths must stay inside the output directory",
			),
		});
	}
	Ok(())
}

/// A renderer bound to its output directory and options.
pub struct RenderTarget {
	pub renderer: Box<dyn Renderer>,
	pub output: PathBuf,
	pub options: RenderOptions,
}

impl std::fmt::Debug for RenderTarget {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RenderTarget")
			.field("renderer", &self.renderer.name())
			.field("output", &self.output)
			.field("options", &self.options)
			.finish()
	}
}

impl RenderTarget {
	/// Render in memory, then write. A render failure leaves `output` as it
	/// was.
	pub fn run(&self, root: &RootNode) -> Result<WriteSummary, RenderError> {
		let files = self.renderer.render(root, &self.options)?;
		let summary = write_artifacts(&self.output, &files)?;
		self.renderer.after_write(&self.output, &self.options)?;
		log::info!(
			"{}: {} written, {} unchanged, {} removed",
			self.renderer.name(),
			summary.written.len(),
			summary.unchanged.len(),
			summary.removed.len()
		);
		Ok(summary)
	}
}

/// The result of one target of [`render_all`].
#[derive(Debug)]
pub struct TargetOutcome {
	pub target: String,
	pub output: PathBuf,
	pub result: Result<WriteSummary, RenderError>,
}

/// Render every target in parallel. Targets are independent: one failing
/// leaves the others' output in place.
pub fn render_all(root: &RootNode, targets: &[RenderTarget]) -> Vec<TargetOutcome> {
	targets
		.par_iter()
		.map(|target| {
			TargetOutcome {
				target: target.renderer.name().to_owned(),
				output: target.output.clone(),
				result: target.run(root),
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn generated(body: &str) -> String {
		format!("{}{body}", generated_header("//"))
	}

	#[test]
	fn unknown_options_are_rejected() {
		let mut options = RenderOptions::default();
		options
			.options
			.insert("modulePath".to_owned(), Value::String("crate::client".to_owned()));
		assert!(options.check_known(&["modulePath"]).is_ok());

		options
			.options
			.insert("crateFolder".to_owned(), Value::String(".".to_owned()));
		let error = options
			.check_known(&["modulePath"])
			.expect_err("unknown key should fail");
		insta::assert_snapshot!(error.to_string(), @"invalid renderer option `crateFolder`: unknown option, expected one of `modulePath`");

		let error = options.check_known(&[]).expect_err("unknown key should fail");
		insta::assert_snapshot!(error.to_string(), @"invalid renderer option `crateFolder`: this renderer takes no options");
	}

	#[test]
	fn header_is_recognized() {
		assert!(is_generated(&generated("pub struct A;\n")));
		assert!(!is_generated("pub struct A;\n"));
	}

	#[test]
	fn writes_changed_files_only() {
		let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
		let mut files = RenderedFiles::new();
		files.insert(PathBuf::from("a.rs"), generated("a"));
		files.insert(PathBuf::from("nested/b.rs"), generated("b"));

		let first = write_artifacts(dir.path(), &files).unwrap_or_else(|e| panic!("write: {e}"));
		assert_eq!(first.written.len(), 2);

		let second = write_artifacts(dir.path(), &files).unwrap_or_else(|e| panic!("write: {e}"));
		assert!(second.is_noop());
		assert_eq!(second.unchanged.len(), 2);
	}

	#[test]
	fn removes_stale_generated_files_but_keeps_hand_written_ones() {
		let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
		fs::write(dir.path().join("stale.rs"), generated("old"))
			.unwrap_or_else(|e| panic!("seed: {e}"));
		fs::write(dir.path().join("lib.rs"), "// mine\n").unwrap_or_else(|e| panic!("seed: {e}"));

		let mut files = RenderedFiles::new();
		files.insert(PathBuf::from("a.rs"), generated("a"));
		let summary = write_artifacts(dir.path(), &files).unwrap_or_else(|e| panic!("write: {e}"));

		assert_eq!(summary.removed, [PathBuf::from("stale.rs")]);
		assert!(!dir.path().join("stale.rs").exists());
		assert!(dir.path().join("lib.rs").exists());
	}

	#[test]
	fn rejects_paths_outside_the_output() {
		let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
		let mut files = RenderedFiles::new();
		files.insert(PathBuf::from("../escape.rs"), generated("x"));
		assert!(write_artifacts(dir.path(), &files).is_err());
	}

	#[test]
	fn reads_typed_options() {
		let mut options = RenderOptions::default();
		options
			.options
			.insert("formatter".to_owned(), Value::String("prettier".to_owned()));
		options.options.insert("bad".to_owned(), Value::Bool(true));

		assert_eq!(options.string_option("formatter").ok().flatten(), Some("prettier"));
		assert_eq!(options.string_option("missing").ok().flatten(), None);
		assert!(options.string_option("bad").is_err());
	}
}
