//! Interface-description transformation pipeline.
//!
//! Load one or more program interface descriptions into a [`RootNode`],
//! apply an ordered list of update operations, and hand the final tree to
//! per-language [`Renderer`]s.

pub mod builder;
pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod nodes;
pub mod pipeline;
pub mod render;
pub mod visitors;

pub use crate::builder::CallBuilderSignature;
pub use crate::config::PipelineConfig;
pub use crate::config::RendererConfig;
pub use crate::error::ConfigError;
pub use crate::error::LoadError;
pub use crate::error::PipelineError;
pub use crate::error::RenderError;
pub use crate::error::TransformError;
pub use crate::index::NodeIndex;
pub use crate::index::NodePath;
pub use crate::loader::Document;
pub use crate::loader::load_documents;
pub use crate::loader::load_paths;
pub use crate::nodes::RootNode;
pub use crate::pipeline::PipelineRun;
pub use crate::pipeline::run_operations;
pub use crate::pipeline::run_pipeline;
pub use crate::render::RenderOptions;
pub use crate::render::RenderTarget;
pub use crate::render::RenderedFiles;
pub use crate::render::Renderer;
pub use crate::visitors::NamedOperation;
pub use crate::visitors::Operation;
pub use crate::visitors::UpdateOperation;

/// Load the documents a configuration names and run its operations.
pub fn run_config(config: &PipelineConfig) -> Result<PipelineRun, PipelineError> {
	let base = load_paths(&config.idls)?;
	run_operations(base, &config.operations)
}
