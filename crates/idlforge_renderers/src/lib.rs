//! Rendering back ends for idlforge trees.
//!
//! Each renderer implements [`idlforge::Renderer`]; [`renderer_for`] maps a
//! configured target name to one.

pub mod codama;
mod defaults;
pub mod js;
pub mod rust;

use idlforge::PipelineConfig;
use idlforge::RenderError;
use idlforge::RenderTarget;
use idlforge::Renderer;

pub use crate::codama::CodamaRenderer;
pub use crate::js::JsRenderer;
pub use crate::rust::RustRenderer;

/// Every target name [`renderer_for`] accepts.
pub const TARGETS: [&str; 3] = ["rust", "js", "codama"];

pub fn renderer_for(target: &str) -> Result<Box<dyn Renderer>, RenderError> {
	let renderer: Box<dyn Renderer> = match target {
		"rust" => Box::new(RustRenderer),
		"js" => Box::new(JsRenderer),
		"codama" => Box::new(CodamaRenderer),
		_ => {
			return Err(RenderError::UnknownTarget {
				target: target.to_owned(),
			});
		}
	};
	Ok(renderer)
}

/// Bind the renderers of `config` to their outputs. When `only` is not
/// empty, keep just the targets it names; each of them must be configured.
pub fn targets_from_config(config: &PipelineConfig, only: &[String]) -> Result<Vec<RenderTarget>, RenderError> {
	for target in only {
		if !config.renderers.iter().any(|renderer| &renderer.target == target) {
			return Err(RenderError::UnknownTarget {
				target: target.clone(),
			});
		}
	}

	config
		.renderers
		.iter()
		.filter(|renderer| only.is_empty() || only.contains(&renderer.target))
		.map(|renderer| {
			Ok(RenderTarget {
				renderer: renderer_for(&renderer.target)?,
				output: renderer.output.clone(),
				options: renderer.render_options(),
			})
		})
		.collect()
}
