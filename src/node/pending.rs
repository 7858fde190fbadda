use std::collections::VecDeque;

use crate::reflect::Variant;

use super::{NodeUuid, SceneObject};

/// A structural edit or call requested during a traversal, applied once it completes.
#[derive(Debug)]
pub enum PendingOp {
	Attach { parent: NodeUuid, child: NodeUuid },
	Detach(NodeUuid),
	/// Detaches first if needed, then frees the subtree.
	Free(NodeUuid),
	Spawn { parent: NodeUuid, object: Box<dyn SceneObject> },
	Call { target: NodeUuid, method: String, args: Vec<Variant> },
}

#[derive(Debug, Default)]
pub struct PendingQueue {
	ops: VecDeque<PendingOp>,
}

impl PendingQueue {
	pub fn push(&mut self, op: PendingOp) {
		self.ops.push_back(op);
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	pub fn len(&self) -> usize {
		self.ops.len()
	}

	/// Takes the current batch. Operations queued while it is applied form the next batch.
	pub(crate) fn take_batch(&mut self) -> VecDeque<PendingOp> {
		std::mem::take(&mut self.ops)
	}
}
