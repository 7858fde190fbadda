use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::node::tree::{NodeTree, SceneError};
use crate::node::{NodeUuid, SceneObject};
use crate::reflect::{level_mut, ReflectionError, TypeRegistry};

use super::{
	deserialize_object, read_error, read_n, read_string, read_u16, read_u32, serialize_object, write_bytes, write_len,
	write_string, write_u32, PersistenceError,
};

/// Leading bytes of every saved scene.
pub const MAGIC: &[u8; 8] = b"SCNTREE\0";

/// A node whose record could not be decoded. Its subtree was not loaded.
#[derive(Debug)]
pub struct LoadFailure {
	/// Location in the saved scene, unnamed or failed nodes show their saved uuid.
	pub path: String,
	pub class: String,
	pub saved_uuid: u32,
	pub error: PersistenceError,
}

#[derive(Debug, Default)]
pub struct LoadReport {
	/// Top of the loaded subtree, parentless. `None` if the topmost record failed.
	pub root: Option<NodeUuid>,
	/// Every created node, in saved pre-order.
	pub loaded: Vec<NodeUuid>,
	pub failures: Vec<LoadFailure>,
	/// Records skipped because an ancestor failed.
	pub skipped: usize,
}

impl LoadReport {
	pub fn is_complete(&self) -> bool {
		self.failures.is_empty()
	}
}

struct Loader {
	registry: Arc<TypeRegistry>,
	report: LoadReport,
	/// Saved uuid to created node.
	remap: HashMap<NodeUuid, NodeUuid>,
}

/// An entry whose children are still being read.
struct Frame {
	/// `None` if the entry failed or was skipped, its children are skipped too.
	node: Option<NodeUuid>,
	name: String,
	remaining: u16,
}

/// Path of a child of the innermost frame.
fn frame_path(stack: &[Frame], leaf: &str) -> String {
	let mut path = String::new();
	for frame in stack {
		path.push('/');
		path.push_str(&frame.name);
	}
	path.push('/');
	path.push_str(leaf);
	path
}

fn read_record(source: &mut dyn Read, len: u32) -> Result<Vec<u8>, PersistenceError> {
	let mut record = Vec::new();
	source
		.take(u64::from(len))
		.read_to_end(&mut record)
		.map_err(read_error)?;
	if record.len() != len as usize {
		return Err(PersistenceError::UnexpectedEndOfData);
	}
	Ok(record)
}

fn decode(registry: &TypeRegistry, class: &str, record: &[u8]) -> Result<Box<dyn SceneObject>, PersistenceError> {
	let mut object = registry.instantiate(class)?;
	let mut cursor = Cursor::new(record);
	deserialize_object(registry, object.as_mut(), &mut cursor)?;
	if cursor.position() != record.len() as u64 {
		return Err(PersistenceError::invalid(
			class,
			format!("{} trailing bytes in record", record.len() as u64 - cursor.position()),
		));
	}
	Ok(object)
}

fn label(object: &dyn SceneObject, saved: NodeUuid) -> String {
	match object.node().map(|n| n.name()) {
		Some(name) if !name.is_empty() => name.to_owned(),
		_ => saved.to_string(),
	}
}

impl NodeTree {
	/// Writes `id` and its subtree as a scene.
	///
	/// Nothing is rolled back on failure: the sink may hold a truncated scene.
	pub fn save(&self, id: NodeUuid, sink: &mut dyn Write) -> Result<(), SceneError> {
		write_bytes(sink, MAGIC)?;

		let mut count = 0;
		let mut stack = vec![id];
		while let Some(id) = stack.pop() {
			let children = self.children(id)?;
			self.save_entry(id, children.len(), sink)?;
			stack.extend(children.into_iter().rev());
			count += 1;
		}
		debug!("Saved {count} nodes from {id}");
		Ok(())
	}

	fn save_entry(&self, id: NodeUuid, child_count: usize, sink: &mut dyn Write) -> Result<(), SceneError> {
		let object = self.object(id)?;
		let class = object.class_name();

		let mut record = Vec::new();
		serialize_object(self.registry(), object, &mut record)?;
		let record_len =
			u32::try_from(record.len()).map_err(|_| PersistenceError::invalid(class, "record does not fit in 4 GiB"))?;

		write_string(sink, class, "class")?;
		write_u32(sink, id.raw())?;
		write_len(sink, child_count, "children")?;
		write_u32(sink, record_len)?;
		write_bytes(sink, &record)?;
		Ok(())
	}

	/// Reads a scene into new parentless nodes. Attach the reported root, or make it the root,
	/// to bring the scene into the tree.
	///
	/// A node that fails to decode is reported and its subtree skipped. Errors in the framing
	/// itself abort the load and free every node created so far.
	pub fn load(&mut self, source: &mut dyn Read) -> Result<LoadReport, SceneError> {
		if &read_n::<_, 8>(source)? != MAGIC {
			return Err(PersistenceError::IncorrectMagic.into());
		}

		let mut loader = Loader {
			registry: Arc::clone(self.registry()),
			report: LoadReport::default(),
			remap: HashMap::new(),
		};

		let result = self
			.load_entries(source, &mut loader)
			.and_then(|()| self.remap_bindings(&loader));
		if let Err(e) = result {
			if let Some(&top) = loader.report.loaded.first() {
				self.free(top)?;
			}
			return Err(e);
		}

		let report = loader.report;
		debug!(
			"Loaded {} nodes, {} failed, {} skipped",
			report.loaded.len(),
			report.failures.len(),
			report.skipped
		);
		Ok(report)
	}

	/// Reads entries in saved pre-order until the top entry's subtree is complete.
	fn load_entries(&mut self, source: &mut dyn Read, loader: &mut Loader) -> Result<(), SceneError> {
		let mut stack: Vec<Frame> = Vec::new();
		loop {
			if let Some(frame) = stack.last_mut() {
				frame.remaining -= 1;
			}
			// `None` below a failed or skipped entry
			let parent = stack.last().map(|frame| frame.node);

			let class = read_string(source, "class")?;
			let saved = NodeUuid(read_u32(source)?);
			let child_count = read_u16(source)?;
			let record_len = read_u32(source)?;
			let record = read_record(source, record_len)?;

			let (node, name) = match parent {
				Some(None) => {
					loader.report.skipped += 1;
					(None, String::new())
				}
				_ => match decode(&loader.registry, &class, &record) {
					Ok(object) => {
						let name = label(object.as_ref(), saved);
						let id = self.create(object)?;
						match parent.flatten() {
							Some(parent) => self.attach_inner(parent, id)?,
							None => loader.report.root = Some(id),
						}
						loader.remap.insert(saved, id);
						loader.report.loaded.push(id);
						(Some(id), name)
					}
					Err(error) => {
						let path = frame_path(&stack, &saved.to_string());
						warn!("Could not load {class} at {path}, skipping its subtree: {error}");
						loader.report.failures.push(LoadFailure {
							path,
							class,
							saved_uuid: saved.raw(),
							error,
						});
						(None, String::new())
					}
				},
			};

			if child_count > 0 {
				stack.push(Frame {
					node,
					name,
					remaining: child_count,
				});
			}
			while stack.last().map_or(false, |frame| frame.remaining == 0) {
				stack.pop();
			}
			if stack.is_empty() {
				return Ok(());
			}
		}
	}

	/// Points persisted bindings at the created nodes, dropping those aimed outside the scene.
	fn remap_bindings(&mut self, loader: &Loader) -> Result<(), SceneError> {
		for &id in &loader.report.loaded {
			let node_id = self.node_id(id)?;
			let result = self.with_object_mut(node_id, |obj| -> Result<(), ReflectionError> {
				let chain = loader.registry.ancestry(obj.class_name())?;
				for (depth, class) in chain.into_iter().enumerate() {
					for signal in class.signals() {
						signal.get_mut(level_mut(obj, depth)?)?.retain_bindings(|binding| {
							match loader.remap.get(&binding.target) {
								Some(&target) => {
									binding.target = target;
									true
								}
								None => {
									warn!(
										"Dropped binding {}.{} -> {} of {id}, its target is not part of the scene",
										class.name, signal.name, binding.method
									);
									false
								}
							}
						});
					}
				}
				Ok(())
			});
			result?;
		}
		Ok(())
	}
}
