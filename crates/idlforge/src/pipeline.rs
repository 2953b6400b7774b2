//! The visitor engine: load, then apply named operations strictly in order.

use std::sync::Arc;

use crate::error::PipelineError;
use crate::index::NodeIndex;
use crate::loader::Document;
use crate::loader::load_documents;
use crate::nodes::RootNode;
use crate::visitors::NamedOperation;
use crate::visitors::UpdateOperation;

/// One tree snapshot and the operation that produced it. The base tree has
/// no operation.
#[derive(Debug, Clone)]
pub struct Stage {
	pub operation: Option<String>,
	pub tree: Arc<RootNode>,
}

/// Every stage of a successful run, base tree first.
#[derive(Debug, Clone)]
pub struct PipelineRun {
	stages: Vec<Stage>,
}

impl PipelineRun {
	pub fn stages(&self) -> &[Stage] {
		&self.stages
	}

	/// The tree after operation `position` (1-based); `0` is the base tree.
	pub fn stage(&self, position: usize) -> Option<&Stage> {
		self.stages.get(position)
	}

	pub fn final_tree(&self) -> &Arc<RootNode> {
		// A run always holds at least the base stage.
		&self.stages[self.stages.len() - 1].tree
	}

	pub fn into_final_tree(mut self) -> Arc<RootNode> {
		let last = self.stages.len() - 1;
		self.stages.swap_remove(last).tree
	}
}

/// Apply `operations` in order to `base`. Each operation sees the index of the
/// previous operation's output. The first failure aborts the run.
pub fn run_operations(
	base: RootNode,
	operations: &[NamedOperation],
) -> Result<PipelineRun, PipelineError> {
	let mut stages = Vec::with_capacity(operations.len() + 1);
	stages.push(Stage {
		operation: None,
		tree: Arc::new(base),
	});

	for (step, named) in operations.iter().enumerate() {
		let position = step + 1;
		let previous = Arc::clone(&stages[step].tree);
		let index = NodeIndex::new(&previous);
		log::debug!(
			"applying `{}` ({}) over {} indexed nodes",
			named.name,
			named.operation.kind(),
			index.len()
		);

		let tree = named.operation.apply(&index).map_err(|source| {
			PipelineError::Operation {
				operation: named.name.clone(),
				position,
				source,
			}
		})?;
		log::info!("step {position}: `{}` applied", named.name);

		stages.push(Stage {
			operation: Some(named.name.clone()),
			tree: Arc::new(tree),
		});
	}

	Ok(PipelineRun { stages })
}

/// Load `documents` and apply `operations` to the loaded tree.
pub fn run_pipeline(
	documents: &[Document],
	operations: &[NamedOperation],
) -> Result<PipelineRun, PipelineError> {
	let base = load_documents(documents)?;
	run_operations(base, operations)
}
