use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use glam::{Affine2, Mat4};
use indextree::{Arena, NodeEdge, NodeId};
use json::JsonValue;
use tracing::{debug, trace, warn};

use crate::config::{ConfigError, InputOrder, TreeConfig};
use crate::formats::PersistenceError;
use crate::math::transform::{TransformOffset2D, TransformOffset3D};
use crate::physics::PhysicsWorld2D;
use crate::reflect::{downcast, downcast_mut, ReflectionError, TypeRegistry, Variant};
use crate::render::{CameraState, RenderTarget};
use crate::signal::{Observer, SignalError};
use crate::texture::TextureError;

use super::spatial::{SpatialCache, TransformCache2D, TransformCache3D};
use super::{DrawContext, InputEvent, Lifecycle, NodeContext, NodeUuid, PendingOp, PendingQueue, SceneObject};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
	#[error("Node {0} already has a parent")]
	AlreadyAttached(NodeUuid),
	#[error("Node {0} has no parent")]
	NotAttached(NodeUuid),
	#[error("Node {0} is still in the tree")]
	StillAttached(NodeUuid),
	#[error("Node {child} cannot be attached under {parent}, which is inside its own subtree")]
	CyclicAttach { parent: NodeUuid, child: NodeUuid },
	#[error("Node {0} does not exist")]
	StaleNode(NodeUuid),
	#[error("The tree has no root")]
	NoRoot,
	#[error("The tree already has root {0}")]
	RootOccupied(NodeUuid),
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
	#[error(transparent)]
	Structural(#[from] StructuralError),
	#[error(transparent)]
	Reflection(#[from] ReflectionError),
	#[error(transparent)]
	Persistence(#[from] PersistenceError),
	#[error(transparent)]
	Signal(#[from] SignalError),
	#[error(transparent)]
	Texture(#[from] TextureError),
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("Node {0} is not a {1} node")]
	NotSpatial(NodeUuid, &'static str),
}

pub(crate) struct NodeEntry {
	pub uuid: NodeUuid,
	pub state: Lifecycle,
	pub object: Box<dyn SceneObject>,
}

fn cache_2d(obj: &dyn SceneObject) -> Option<&TransformCache2D> {
	obj.transform_2d()
}

fn cache_3d(obj: &dyn SceneObject) -> Option<&TransformCache3D> {
	obj.transform_3d()
}

fn spatially_dirty(obj: &dyn SceneObject) -> bool {
	obj.transform_2d().map_or(false, TransformCache2D::is_dirty) || obj.transform_3d().map_or(false, TransformCache3D::is_dirty)
}

fn locals(obj: &dyn SceneObject) -> (Option<TransformOffset2D>, Option<TransformOffset3D>) {
	(
		obj.transform_2d().map(|cache| *cache.local()),
		obj.transform_3d().map(|cache| *cache.local()),
	)
}

/// Whether a mutation of a node leaves its descendants stale. A node that was already dirty
/// only passes that on when its local transform changed.
fn needs_invalidation(
	was_dirty: bool,
	before: (Option<TransformOffset2D>, Option<TransformOffset3D>),
	obj: &dyn SceneObject,
) -> bool {
	spatially_dirty(obj) && (!was_dirty || locals(obj) != before)
}

/// Marks the spatial caches below `top` stale, `top` included if asked.
fn invalidate(arena: &Arena<NodeEntry>, top: NodeId, include_top: bool) {
	for id in top.descendants(arena).skip(usize::from(!include_top)) {
		let obj = arena[id].get().object.as_ref();
		if let Some(cache) = obj.transform_2d() {
			cache.mark_dirty();
		}
		if let Some(cache) = obj.transform_3d() {
			cache.mark_dirty();
		}
	}
}

/// Owns every node and drives their lifecycle.
///
/// Nodes are created parentless, then attached under other nodes. A node is in the tree, and
/// receives update, draw and input, while its topmost ancestor is the root.
pub struct NodeTree {
	arena: Arena<NodeEntry>,
	ids: HashMap<NodeUuid, NodeId>,
	root: Option<NodeId>,
	next_uuid: u32,
	registry: Arc<TypeRegistry>,
	config: TreeConfig,
	pending: PendingQueue,
	physics: Option<Box<dyn PhysicsWorld2D>>,
}

impl Default for NodeTree {
	fn default() -> Self {
		Self::new()
	}
}

impl NodeTree {
	/// A tree over the builtin classes.
	pub fn new() -> Self {
		Self::with_registry(TypeRegistry::global())
	}

	pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
		Self {
			arena: Arena::new(),
			ids: HashMap::new(),
			root: None,
			next_uuid: 1,
			registry,
			config: TreeConfig::default(),
			pending: PendingQueue::default(),
			physics: None,
		}
	}

	pub fn with_config(mut self, config: TreeConfig) -> Self {
		self.config = config;
		self
	}

	pub fn set_physics_world(&mut self, world: Box<dyn PhysicsWorld2D>) {
		self.physics = Some(world);
	}

	pub fn physics_world(&self) -> Option<&dyn PhysicsWorld2D> {
		self.physics.as_deref()
	}

	pub fn registry(&self) -> &Arc<TypeRegistry> {
		&self.registry
	}

	pub fn config(&self) -> &TreeConfig {
		&self.config
	}

	pub fn root(&self) -> Option<NodeUuid> {
		self.root.map(|id| self.arena[id].get().uuid)
	}

	/// Number of live nodes, in the tree or not.
	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	pub fn contains(&self, id: NodeUuid) -> bool {
		self.ids.contains_key(&id)
	}

	/// Deferred operations not applied yet.
	pub fn pending_len(&self) -> usize {
		self.pending.len()
	}

	pub(crate) fn node_id(&self, id: NodeUuid) -> Result<NodeId, StructuralError> {
		self.ids.get(&id).copied().ok_or(StructuralError::StaleNode(id))
	}

	fn uuid_of(&self, node_id: NodeId) -> NodeUuid {
		self.arena[node_id].get().uuid
	}

	fn is_in_tree(&self, node_id: NodeId) -> bool {
		self.root.map_or(false, |root| node_id.ancestors(&self.arena).any(|a| a == root))
	}

	/// Stores a new parentless node.
	pub fn create(&mut self, object: Box<dyn SceneObject>) -> Result<NodeUuid, SceneError> {
		let class = object.class_name();
		if !self.registry.contains(class) {
			return Err(ReflectionError::UnknownClass(class.to_owned()).into());
		}

		let uuid = NodeUuid(self.next_uuid);
		self.next_uuid += 1;
		let node_id = self.arena.new_node(NodeEntry {
			uuid,
			state: Lifecycle::Constructed,
			object,
		});
		self.ids.insert(uuid, node_id);
		trace!("Created {class} {uuid}");
		Ok(uuid)
	}

	/// Makes a parentless node the root, entering its subtree into the tree.
	pub fn set_root(&mut self, id: NodeUuid) -> Result<(), SceneError> {
		let node_id = self.node_id(id)?;
		if let Some(root) = self.root {
			return Err(StructuralError::RootOccupied(self.uuid_of(root)).into());
		}
		if self.arena[node_id].parent().is_some() {
			return Err(StructuralError::AlreadyAttached(id).into());
		}

		self.root = Some(node_id);
		debug!("Node {id} is now the root");
		invalidate(&self.arena, node_id, true);
		self.enter_subtree(node_id);
		self.flush_pending();
		Ok(())
	}

	/// Exits the root's subtree from the tree. The nodes stay alive, parentless root first.
	pub fn take_root(&mut self) -> Result<NodeUuid, SceneError> {
		let root = self.take_root_inner()?;
		self.flush_pending();
		Ok(root)
	}

	fn take_root_inner(&mut self) -> Result<NodeUuid, StructuralError> {
		let root = self.root.ok_or(StructuralError::NoRoot)?;
		self.exit_subtree(root);
		self.root = None;
		let uuid = self.uuid_of(root);
		debug!("Node {uuid} is no longer the root");
		Ok(uuid)
	}

	/// Appends `child` to `parent`'s children. Enter hooks run if `parent` is in the tree.
	pub fn attach(&mut self, parent: NodeUuid, child: NodeUuid) -> Result<(), SceneError> {
		self.attach_inner(parent, child)?;
		self.flush_pending();
		Ok(())
	}

	pub(crate) fn attach_inner(&mut self, parent: NodeUuid, child: NodeUuid) -> Result<(), StructuralError> {
		let parent_id = self.node_id(parent)?;
		let child_id = self.node_id(child)?;
		if self.arena[child_id].parent().is_some() || self.root == Some(child_id) {
			return Err(StructuralError::AlreadyAttached(child));
		}
		if parent_id.ancestors(&self.arena).any(|a| a == child_id) {
			return Err(StructuralError::CyclicAttach { parent, child });
		}
		parent_id
			.checked_append(child_id, &mut self.arena)
			.map_err(|_| StructuralError::CyclicAttach { parent, child })?;

		debug!("Attached {child} under {parent}");
		invalidate(&self.arena, child_id, true);
		if self.is_in_tree(parent_id) {
			self.enter_subtree(child_id);
		}
		Ok(())
	}

	/// Unlinks a node from its parent. Exit hooks run first if it was in the tree.
	///
	/// The subtree stays alive and can be attached again or freed.
	pub fn detach(&mut self, id: NodeUuid) -> Result<(), SceneError> {
		self.detach_inner(id)?;
		self.flush_pending();
		Ok(())
	}

	fn detach_inner(&mut self, id: NodeUuid) -> Result<(), StructuralError> {
		let node_id = self.node_id(id)?;
		if self.arena[node_id].parent().is_none() {
			return Err(StructuralError::NotAttached(id));
		}

		if self.is_in_tree(node_id) {
			self.exit_subtree(node_id);
		}
		node_id.detach(&mut self.arena);
		invalidate(&self.arena, node_id, true);
		debug!("Detached {id}");
		Ok(())
	}

	/// Destroys a node and its subtree. Nodes in the tree must be detached first.
	pub fn free(&mut self, id: NodeUuid) -> Result<(), SceneError> {
		let node_id = self.node_id(id)?;
		if self.is_in_tree(node_id) {
			return Err(StructuralError::StillAttached(id).into());
		}

		let freed: Vec<_> = node_id.descendants(&self.arena).map(|n| self.uuid_of(n)).collect();
		node_id.remove_subtree(&mut self.arena);
		for uuid in &freed {
			self.ids.remove(uuid);
		}
		debug!("Freed {id} and {} descendants", freed.len() - 1);
		Ok(())
	}

	pub fn parent(&self, id: NodeUuid) -> Result<Option<NodeUuid>, SceneError> {
		let node_id = self.node_id(id)?;
		Ok(self.arena[node_id].parent().map(|p| self.uuid_of(p)))
	}

	/// Children in insertion order.
	pub fn children(&self, id: NodeUuid) -> Result<Vec<NodeUuid>, SceneError> {
		let node_id = self.node_id(id)?;
		Ok(node_id.children(&self.arena).map(|c| self.uuid_of(c)).collect())
	}

	pub fn lifecycle(&self, id: NodeUuid) -> Result<Lifecycle, SceneError> {
		let node_id = self.node_id(id)?;
		Ok(self.arena[node_id].get().state)
	}

	pub fn object(&self, id: NodeUuid) -> Result<&dyn SceneObject, SceneError> {
		let node_id = self.node_id(id)?;
		Ok(self.arena[node_id].get().object.as_ref())
	}

	pub fn get<T: SceneObject>(&self, id: NodeUuid) -> Result<&T, SceneError> {
		Ok(downcast::<T>(self.object(id)?)?)
	}

	/// Mutates a node outside of any hook. Transform changes are propagated afterwards.
	pub fn with_mut<T: SceneObject, R>(&mut self, id: NodeUuid, f: impl FnOnce(&mut T) -> R) -> Result<R, SceneError> {
		let node_id = self.node_id(id)?;
		Ok(self.with_object_mut(node_id, |obj| downcast_mut::<T>(obj).map(f))?)
	}

	pub(crate) fn with_object_mut<R>(&mut self, node_id: NodeId, f: impl FnOnce(&mut dyn SceneObject) -> R) -> R {
		let obj = self.arena[node_id].get_mut().object.as_mut();
		let (was_dirty, before) = (spatially_dirty(obj), locals(obj));
		let result = f(obj);
		if needs_invalidation(was_dirty, before, obj) {
			invalidate(&self.arena, node_id, false);
		}
		result
	}

	/// Runs `f` on a node with a context wired to this tree.
	fn with_context<R>(
		&mut self,
		node_id: NodeId,
		f: impl FnOnce(&mut dyn SceneObject, &mut NodeContext<'_>) -> R,
	) -> R {
		let global_2d = self.resolve(node_id, cache_2d);
		let parent_id = self.arena[node_id].parent();
		let parent_global_2d = parent_id
			.and_then(|p| self.resolve(p, cache_2d))
			.unwrap_or(Affine2::IDENTITY);
		let parent = parent_id.map(|p| self.uuid_of(p));

		let entry = self.arena[node_id].get_mut();
		let (was_dirty, before) = (spatially_dirty(entry.object.as_ref()), locals(entry.object.as_ref()));
		let mut ctx = NodeContext::new(
			entry.uuid,
			parent,
			global_2d,
			parent_global_2d,
			&mut self.pending,
			self.physics.as_deref_mut(),
		);
		let result = f(entry.object.as_mut(), &mut ctx);

		if needs_invalidation(was_dirty, before, entry.object.as_ref()) {
			invalidate(&self.arena, node_id, false);
		}
		result
	}

	fn log_lifecycle(&self, what: &str, node_id: NodeId) {
		let entry = self.arena[node_id].get();
		if self.config.log_lifecycle {
			debug!("{what} {} {}", entry.object.class_name(), entry.uuid);
		} else {
			trace!("{what} {} {}", entry.object.class_name(), entry.uuid);
		}
	}

	/// Parents strictly before their children.
	fn enter_subtree(&mut self, top: NodeId) {
		let order: Vec<_> = top.descendants(&self.arena).collect();
		for node_id in order {
			self.arena[node_id].get_mut().state = Lifecycle::Attached;
			self.log_lifecycle("Enter", node_id);
			self.with_context(node_id, |obj, ctx| obj.after_tree_enter(ctx));
		}
	}

	/// Children strictly before their parent, siblings in order.
	fn exit_subtree(&mut self, top: NodeId) {
		let order: Vec<_> = top
			.traverse(&self.arena)
			.filter_map(|edge| match edge {
				NodeEdge::End(id) => Some(id),
				NodeEdge::Start(_) => None,
			})
			.collect();
		for node_id in order {
			self.log_lifecycle("Exit", node_id);
			self.with_context(node_id, |obj, ctx| obj.before_tree_exit(ctx));
			self.arena[node_id].get_mut().state = Lifecycle::Detached;
		}
	}

	/// Resolves the global transform of a node, recomputing stale ancestors top-down.
	///
	/// `None` if the node has no cache of this dimension. An ancestor without one ends the chain.
	fn resolve<C: SpatialCache>(&self, node_id: NodeId, cache_of: fn(&dyn SceneObject) -> Option<&C>) -> Option<C::Global> {
		let cache = cache_of(self.arena.get(node_id)?.get().object.as_ref())?;
		if let Some(global) = cache.cached() {
			return Some(global);
		}

		let mut stale = vec![node_id];
		let mut base = C::IDENTITY;
		let mut cursor = self.arena[node_id].parent();
		while let Some(id) = cursor {
			let Some(cache) = cache_of(self.arena[id].get().object.as_ref()) else {
				break;
			};
			if let Some(global) = cache.cached() {
				base = global;
				break;
			}
			stale.push(id);
			cursor = self.arena[id].parent();
		}

		for id in stale.into_iter().rev() {
			let cache = cache_of(self.arena[id].get().object.as_ref())?;
			base = cache.compose(base);
			cache.store(base);
		}
		Some(base)
	}

	pub fn local_2d(&self, id: NodeUuid) -> Result<TransformOffset2D, SceneError> {
		let obj = self.object(id)?;
		let cache = obj.transform_2d().ok_or(SceneError::NotSpatial(id, "2D"))?;
		Ok(*cache.local())
	}

	pub fn set_local_2d(&mut self, id: NodeUuid, local: TransformOffset2D) -> Result<(), SceneError> {
		let node_id = self.node_id(id)?;
		self.with_object_mut(node_id, |obj| {
			obj.transform_2d_mut()
				.map(|cache| cache.set_local(local))
				.ok_or(SceneError::NotSpatial(id, "2D"))
		})
	}

	pub fn global_transform_2d(&self, id: NodeUuid) -> Result<Affine2, SceneError> {
		let node_id = self.node_id(id)?;
		self.resolve(node_id, cache_2d).ok_or(SceneError::NotSpatial(id, "2D"))
	}

	pub fn local_3d(&self, id: NodeUuid) -> Result<TransformOffset3D, SceneError> {
		let obj = self.object(id)?;
		let cache = obj.transform_3d().ok_or(SceneError::NotSpatial(id, "3D"))?;
		Ok(*cache.local())
	}

	pub fn set_local_3d(&mut self, id: NodeUuid, local: TransformOffset3D) -> Result<(), SceneError> {
		let node_id = self.node_id(id)?;
		self.with_object_mut(node_id, |obj| {
			obj.transform_3d_mut()
				.map(|cache| cache.set_local(local))
				.ok_or(SceneError::NotSpatial(id, "3D"))
		})
	}

	pub fn global_transform_3d(&self, id: NodeUuid) -> Result<Mat4, SceneError> {
		let node_id = self.node_id(id)?;
		self.resolve(node_id, cache_3d).ok_or(SceneError::NotSpatial(id, "3D"))
	}

	pub fn get_property(&self, id: NodeUuid, name: &str) -> Result<Variant, SceneError> {
		Ok(self.registry.get_property(self.object(id)?, name)?)
	}

	pub fn set_property(&mut self, id: NodeUuid, name: &str, value: Variant) -> Result<(), SceneError> {
		let node_id = self.node_id(id)?;
		let registry = Arc::clone(&self.registry);
		Ok(self.with_object_mut(node_id, |obj| registry.set_property(obj, name, value))?)
	}

	/// Calls a registered method. Operations it queues are applied before returning.
	pub fn invoke(&mut self, id: NodeUuid, method: &str, args: &[Variant]) -> Result<Variant, SceneError> {
		let result = self.invoke_inner(id, method, args);
		self.flush_pending();
		result
	}

	fn invoke_inner(&mut self, id: NodeUuid, method: &str, args: &[Variant]) -> Result<Variant, SceneError> {
		let node_id = self.node_id(id)?;
		let registry = Arc::clone(&self.registry);
		Ok(self.with_context(node_id, |obj, ctx| registry.invoke(obj, ctx, method, args))?)
	}

	/// Connects a signal of `source` to a method of `target`. The connection is persisted.
	pub fn connect(&mut self, source: NodeUuid, signal: &str, target: NodeUuid, method: &str) -> Result<(), SceneError> {
		let target_class = self.object(target)?.class_name();
		self.registry.find_method(target_class, method)?;

		let node_id = self.node_id(source)?;
		let obj = self.arena[node_id].get_mut().object.as_mut();
		self.registry.signal_mut(obj, signal)?.connect_bound(target, method);
		Ok(())
	}

	pub fn disconnect(&mut self, source: NodeUuid, signal: &str, target: NodeUuid, method: &str) -> Result<bool, SceneError> {
		let node_id = self.node_id(source)?;
		let obj = self.arena[node_id].get_mut().object.as_mut();
		Ok(self.registry.signal_mut(obj, signal)?.disconnect_bound(target, method))
	}

	/// Connects an in-code observer. Observers are never persisted.
	pub fn connect_observer(&mut self, source: NodeUuid, signal: &str, observer: Observer) -> Result<(), SceneError> {
		let node_id = self.node_id(source)?;
		let obj = self.arena[node_id].get_mut().object.as_mut();
		self.registry.signal_mut(obj, signal)?.connect(observer);
		Ok(())
	}

	pub fn disconnect_observer(&mut self, source: NodeUuid, signal: &str, observer: &Observer) -> Result<bool, SceneError> {
		let node_id = self.node_id(source)?;
		let obj = self.arena[node_id].get_mut().object.as_mut();
		Ok(self.registry.signal_mut(obj, signal)?.disconnect(observer))
	}

	/// Emits a signal from outside any hook. Bound methods run before this returns.
	pub fn emit(&mut self, source: NodeUuid, signal: &str, args: &[Variant]) -> Result<(), SceneError> {
		let node_id = self.node_id(source)?;
		let obj = self.arena[node_id].get().object.as_ref();
		let pending = &mut self.pending;
		let result = self.registry.signal(obj, signal)?.emit(args, |binding| {
			pending.push(PendingOp::Call {
				target: binding.target,
				method: binding.method.clone(),
				args: args.to_vec(),
			})
		});
		self.flush_pending();
		Ok(result?)
	}

	/// Enabled nodes of the tree in pre-order, skipping disabled subtrees.
	fn enabled_pre_order(&self) -> Vec<NodeId> {
		let mut order = Vec::new();
		let mut stack: Vec<_> = self.root.into_iter().collect();
		while let Some(node_id) = stack.pop() {
			let enabled = self.arena[node_id].get().object.node().map_or(true, |n| n.enabled());
			if !enabled {
				continue;
			}
			order.push(node_id);
			let children: Vec<_> = node_id.children(&self.arena).collect();
			stack.extend(children.into_iter().rev());
		}
		order
	}

	/// Runs update hooks, parents before children. Structural edits queued by the hooks are
	/// applied once every node was updated.
	pub fn update(&mut self, delta: f32) {
		self.flush_pending();
		for node_id in self.enabled_pre_order() {
			self.with_context(node_id, |obj, ctx| obj.update(ctx, delta));
		}
		self.flush_pending();
	}

	/// Draws the tree in pre-order. Camera state set by a node is only seen by its own subtree.
	pub fn draw(&mut self, target: &mut dyn RenderTarget) {
		self.flush_pending();
		if let Some(root) = self.root {
			self.draw_subtree(root, target);
		}
	}

	fn draw_subtree(&self, top: NodeId, target: &mut dyn RenderTarget) {
		// camera state captured before each drawn node, restored once its subtree is done
		let mut saved = Vec::new();
		let mut edges = top.traverse(&self.arena);
		while let Some(edge) = edges.next() {
			match edge {
				NodeEdge::Start(node_id) => {
					let entry = self.arena[node_id].get();
					if !entry.object.node().map_or(true, |n| n.enabled()) {
						for edge in edges.by_ref() {
							if matches!(edge, NodeEdge::End(id) if id == node_id) {
								break;
							}
						}
						continue;
					}

					saved.push(CameraState::capture(target));
					let ctx = DrawContext {
						id: entry.uuid,
						global_2d: self.resolve(node_id, cache_2d),
						global_3d: self.resolve(node_id, cache_3d),
					};
					entry.object.draw(&ctx, target);
				}
				NodeEdge::End(_) => {
					if let Some(state) = saved.pop() {
						state.restore(target);
					}
				}
			}
		}
	}

	/// Offers an event to input hooks until one claims it, returning the claiming node.
	pub fn input(&mut self, event: &InputEvent) -> Option<NodeUuid> {
		self.flush_pending();
		let mut order = self.enabled_pre_order();
		if self.config.input_order == InputOrder::ReverseDraw {
			order.reverse();
		}

		let mut claimer = None;
		for node_id in order {
			if self.with_context(node_id, |obj, ctx| obj.input(ctx, event)) {
				claimer = Some(self.uuid_of(node_id));
				break;
			}
		}
		self.flush_pending();
		claimer
	}

	/// Applies queued operations. Operations queued meanwhile are applied in further passes, up to
	/// the configured limit. Returns how many operations were applied.
	pub fn flush_pending(&mut self) -> usize {
		let mut applied = 0;
		for _ in 0..self.config.max_flush_passes {
			if self.pending.is_empty() {
				break;
			}
			for op in self.pending.take_batch() {
				applied += 1;
				if let Err(e) = self.apply(op) {
					warn!("Deferred operation failed: {e}");
				}
			}
		}
		if !self.pending.is_empty() {
			warn!(
				"{} deferred operations left after {} passes",
				self.pending.len(),
				self.config.max_flush_passes
			);
		}
		applied
	}

	fn apply(&mut self, op: PendingOp) -> Result<(), SceneError> {
		match op {
			PendingOp::Attach { parent, child } => self.attach_inner(parent, child)?,
			PendingOp::Detach(id) => self.detach_inner(id)?,
			PendingOp::Free(id) => {
				let node_id = self.node_id(id)?;
				if self.root == Some(node_id) {
					self.take_root_inner()?;
				} else if self.arena[node_id].parent().is_some() {
					self.detach_inner(id)?;
				}
				self.free(id)?;
			}
			PendingOp::Spawn { parent, object } => {
				let child = self.create(object)?;
				if let Err(e) = self.attach_inner(parent, child) {
					self.free(child)?;
					return Err(e.into());
				}
			}
			PendingOp::Call { target, method, args } => {
				self.invoke_inner(target, &method, &args)?;
			}
		}
		Ok(())
	}

	/// Slash separated names from the topmost ancestor. Unnamed nodes show their uuid.
	pub fn path(&self, id: NodeUuid) -> Result<String, SceneError> {
		let node_id = self.node_id(id)?;
		let mut names: Vec<_> = node_id.ancestors(&self.arena).map(|a| self.display_name(a)).collect();
		names.reverse();
		Ok(format!("/{}", names.join("/")))
	}

	fn display_name(&self, node_id: NodeId) -> String {
		let entry = self.arena[node_id].get();
		match entry.object.node().map(|n| n.name()) {
			Some(name) if !name.is_empty() => name.to_owned(),
			_ => entry.uuid.to_string(),
		}
	}

	/// Every property of the node, grouped by declaring class, root class first.
	pub fn inspect(&self, id: NodeUuid) -> Result<JsonValue, SceneError> {
		let obj = self.object(id)?;

		let mut properties = JsonValue::new_object();
		for (class, property) in self.registry.property_list(obj.class_name())? {
			if !properties.has_key(class) {
				properties[class] = JsonValue::new_object();
			}
			properties[class][property.name] = self.registry.get_property(obj, property.name)?.to_json();
		}

		let mut out = JsonValue::new_object();
		out["uuid"] = id.raw().into();
		out["class"] = obj.class_name().into();
		out["path"] = self.path(id)?.into();
		out["state"] = format!("{:?}", self.lifecycle(id)?).to_lowercase().into();
		out["properties"] = properties;
		Ok(out)
	}
}

impl Display for NodeTree {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let Some(root) = self.root else {
			return write!(f, "(empty)");
		};

		let mut indent = 0;
		for edge in root.traverse(&self.arena) {
			let node_id = match edge {
				NodeEdge::Start(node_id) => node_id,
				NodeEdge::End(_) => {
					indent -= 1;
					continue;
				}
			};

			let entry = self.arena[node_id].get();
			let type_name = entry.object.class_name();
			#[cfg(feature = "owo")]
			let type_name = {
				use owo_colors::OwoColorize;
				type_name.magenta()
			};

			writeln!(
				f,
				"{}- [{}] {} {}",
				"  ".repeat(indent),
				type_name,
				self.display_name(node_id),
				entry.uuid
			)?;
			indent += 1;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::collections::HashMap;
	use std::rc::Rc;

	use glam::{Quat, Vec2, Vec3, Vec4};

	use super::*;
	use crate::impl_scene_object;
	use crate::node::classes::{
		Camera2D, Camera3D, MeshInstance3D, Node, Node2D, Node3D, PhysicsBody2D, Sprite2D, TouchArea2D,
	};
	use crate::physics::{BodyDesc, BodyHandle, BodyState};
	use crate::reflect::ClassDescriptor;
	use crate::render::{BlendMode, Camera2DState, Camera3DState};
	use crate::texture::Texture;

	type Log = Rc<RefCell<Vec<String>>>;

	/// Records its hooks into a shared log.
	#[derive(Debug, Default)]
	struct Recorder {
		node_2d: Node2D,
		log: Log,
	}

	impl Recorder {
		fn boxed(name: &str, log: &Log) -> Box<Self> {
			Box::new(Self {
				node_2d: Node2D::new(name),
				log: Rc::clone(log),
			})
		}

		fn name(&self) -> &str {
			self.node_2d.node().name()
		}

		fn record(&self, what: &str) {
			self.log.borrow_mut().push(format!("{what} {}", self.name()));
		}
	}

	impl SceneObject for Recorder {
		impl_scene_object!("Recorder", node_2d);

		fn after_tree_enter(&mut self, _ctx: &mut NodeContext<'_>) {
			self.record("enter");
		}

		fn before_tree_exit(&mut self, _ctx: &mut NodeContext<'_>) {
			self.record("exit");
		}

		fn update(&mut self, ctx: &mut NodeContext<'_>, _delta: f32) {
			self.record("update");
			if self.name() == "spawner" {
				ctx.queue_spawn(ctx.id(), Recorder::boxed("spawned", &self.log));
			}
		}

		fn input(&mut self, _ctx: &mut NodeContext<'_>, _event: &InputEvent) -> bool {
			self.record("input");
			self.name() == "claimer"
		}
	}

	fn registry() -> Arc<TypeRegistry> {
		let mut registry = TypeRegistry::builtin();
		registry
			.register(
				ClassDescriptor::new("Recorder")
					.inherits("Node2D")
					.constructor(|| Box::<Recorder>::default())
					.method("ping", &[], |obj, ctx, _args| {
						downcast::<Recorder>(obj)?.record("ping");
						ctx.call_deferred(ctx.id(), "ping", Vec::new());
						Ok(Variant::Nil)
					}),
			)
			.unwrap();
		Arc::new(registry)
	}

	fn recorder_tree() -> (NodeTree, Log) {
		(NodeTree::with_registry(registry()), Log::default())
	}

	fn take(log: &Log) -> Vec<String> {
		std::mem::take(&mut *log.borrow_mut())
	}

	#[test]
	fn lifecycle_order() {
		let (mut tree, log) = recorder_tree();
		let root = tree.create(Recorder::boxed("root", &log)).unwrap();
		let a = tree.create(Recorder::boxed("a", &log)).unwrap();
		let a1 = tree.create(Recorder::boxed("a1", &log)).unwrap();
		let b = tree.create(Recorder::boxed("b", &log)).unwrap();

		// building a detached subtree runs no hooks
		tree.attach(a, a1).unwrap();
		tree.attach(root, a).unwrap();
		tree.attach(root, b).unwrap();
		assert!(take(&log).is_empty());
		assert_eq!(tree.lifecycle(a1).unwrap(), Lifecycle::Constructed);

		tree.set_root(root).unwrap();
		assert_eq!(take(&log), ["enter root", "enter a", "enter a1", "enter b"]);
		assert_eq!(tree.lifecycle(a1).unwrap(), Lifecycle::Attached);

		tree.detach(a).unwrap();
		assert_eq!(take(&log), ["exit a1", "exit a"]);
		assert_eq!(tree.lifecycle(a).unwrap(), Lifecycle::Detached);
		assert_eq!(tree.parent(a).unwrap(), None);
		assert_eq!(tree.children(root).unwrap(), [b]);

		tree.attach(b, a).unwrap();
		assert_eq!(take(&log), ["enter a", "enter a1"]);

		tree.take_root().unwrap();
		assert_eq!(take(&log), ["exit a1", "exit a", "exit b", "exit root"]);
		assert_eq!(tree.root(), None);
	}

	#[test]
	fn structural_errors() {
		let mut tree = NodeTree::new();
		let root = tree.create(Box::new(Node::new("root"))).unwrap();
		let child = tree.create(Box::new(Node::new("child"))).unwrap();
		let grandchild = tree.create(Box::new(Node::new("grandchild"))).unwrap();
		tree.set_root(root).unwrap();
		tree.attach(root, child).unwrap();
		tree.attach(child, grandchild).unwrap();

		let structural = |result: Result<(), SceneError>| match result {
			Err(SceneError::Structural(e)) => e,
			other => panic!("expected a structural error, got {other:?}"),
		};

		assert_eq!(
			structural(tree.attach(root, grandchild)),
			StructuralError::AlreadyAttached(grandchild)
		);
		assert_eq!(structural(tree.detach(root)), StructuralError::NotAttached(root));
		assert_eq!(structural(tree.free(child)), StructuralError::StillAttached(child));
		assert_eq!(structural(tree.set_root(child)), StructuralError::RootOccupied(root));

		tree.detach(child).unwrap();
		assert_eq!(
			structural(tree.attach(grandchild, child)),
			StructuralError::CyclicAttach {
				parent: grandchild,
				child
			}
		);
		assert_eq!(
			structural(tree.attach(child, child)),
			StructuralError::CyclicAttach { parent: child, child }
		);

		tree.free(child).unwrap();
		assert!(!tree.contains(grandchild));
		assert_eq!(structural(tree.detach(grandchild)), StructuralError::StaleNode(grandchild));
		assert_eq!(tree.len(), 1);

		// uuids are never reused
		let again = tree.create(Box::new(Node::default())).unwrap();
		assert!(again.raw() > grandchild.raw());
	}

	#[test]
	fn unregistered_classes_are_rejected() {
		let mut tree = NodeTree::new();
		let log = Log::default();
		assert!(matches!(
			tree.create(Recorder::boxed("x", &log)),
			Err(SceneError::Reflection(ReflectionError::UnknownClass(_)))
		));
	}

	fn node_2d_at(tree: &mut NodeTree, name: &str, position: Vec2) -> NodeUuid {
		let mut node = Node2D::new(name);
		node.set_position(position);
		tree.create(Box::new(node)).unwrap()
	}

	fn translation(tree: &NodeTree, id: NodeUuid) -> Vec2 {
		tree.global_transform_2d(id).unwrap().translation
	}

	#[test]
	fn reparenting_recomposes_globals() {
		let mut tree = NodeTree::new();
		let root = node_2d_at(&mut tree, "root", Vec2::ZERO);
		let child = node_2d_at(&mut tree, "child", Vec2::new(0., 5.));
		let grandchild = node_2d_at(&mut tree, "grandchild", Vec2::new(1., 1.));
		tree.set_root(root).unwrap();
		tree.attach(root, child).unwrap();
		tree.attach(child, grandchild).unwrap();

		tree.set_local_2d(root, TransformOffset2D::new().with_translation(Vec2::new(10., 0.)))
			.unwrap();
		assert_eq!(translation(&tree, grandchild), Vec2::new(11., 6.));

		tree.detach(grandchild).unwrap();
		tree.attach(root, grandchild).unwrap();
		assert_eq!(translation(&tree, grandchild), Vec2::new(11., 1.));
	}

	#[test]
	fn globals_are_computed_once_per_write() {
		let mut tree = NodeTree::new();
		let root = node_2d_at(&mut tree, "root", Vec2::new(1., 0.));
		let child = node_2d_at(&mut tree, "child", Vec2::new(0., 1.));
		tree.set_root(root).unwrap();
		tree.attach(root, child).unwrap();

		let recomputes = |tree: &NodeTree| tree.get::<Node2D>(child).unwrap().transform().recompute_count();
		let first = tree.global_transform_2d(child).unwrap();
		let count = recomputes(&tree);
		let second = tree.global_transform_2d(child).unwrap();
		assert_eq!(first, second);
		assert_eq!(recomputes(&tree), count);

		// writing through reflection marks the descendants too
		tree.set_property(root, "rotation", Variant::Float(std::f32::consts::PI))
			.unwrap();
		assert!(tree.get::<Node2D>(child).unwrap().transform().is_dirty());
		let rotated = tree.global_transform_2d(child).unwrap();
		assert_eq!(recomputes(&tree), count + 1);
		assert!((rotated.translation - Vec2::new(1., -1.)).length() < 1e-5);

		tree.with_mut::<Node2D, _>(root, |n| n.set_scale(Vec2::splat(2.))).unwrap();
		assert!((translation(&tree, child) - Vec2::new(1., -2.)).length() < 1e-5);
	}

	#[test]
	fn dimensions_do_not_mix() {
		let mut tree = NodeTree::new();
		let root = tree.create(Box::new(Node3D::new("world"))).unwrap();
		let sprite = node_2d_at(&mut tree, "hud", Vec2::new(3., 3.));
		let mut mesh = Node3D::new("mesh");
		mesh.set_position(Vec3::new(0., 1., 0.));
		let mesh = tree.create(Box::new(mesh)).unwrap();
		tree.set_root(root).unwrap();
		tree.attach(root, sprite).unwrap();
		tree.attach(root, mesh).unwrap();

		tree.set_local_3d(root, TransformOffset3D::new().with_translation(Vec3::new(5., 0., 0.)))
			.unwrap();
		assert_eq!(translation(&tree, sprite), Vec2::new(3., 3.));
		assert_eq!(
			tree.global_transform_3d(mesh).unwrap().w_axis.truncate(),
			Vec3::new(5., 1., 0.)
		);
		assert!(matches!(
			tree.global_transform_2d(root),
			Err(SceneError::NotSpatial(_, "2D"))
		));
	}

	#[test]
	fn writes_to_a_dirty_node_still_reach_its_children() {
		let mut tree = NodeTree::new();
		let root = node_2d_at(&mut tree, "root", Vec2::ZERO);
		let child = node_2d_at(&mut tree, "child", Vec2::ZERO);
		tree.set_root(root).unwrap();
		tree.attach(root, child).unwrap();
		assert_eq!(translation(&tree, child), Vec2::ZERO);

		let moved = TransformOffset2D::new().with_translation(Vec2::new(10., 0.));
		tree.get::<Node2D>(root).unwrap().transform().mark_dirty();
		tree.set_local_2d(root, moved).unwrap();
		assert_eq!(translation(&tree, child), Vec2::new(10., 0.));

		// same local again: the child's global is still valid
		tree.get::<Node2D>(root).unwrap().transform().mark_dirty();
		tree.set_local_2d(root, moved).unwrap();
		assert!(!tree.get::<Node2D>(child).unwrap().transform().is_dirty());
		assert_eq!(translation(&tree, child), Vec2::new(10., 0.));
	}

	fn node_3d_at(tree: &mut NodeTree, name: &str, position: Vec3) -> NodeUuid {
		let mut node = Node3D::new(name);
		node.set_position(position);
		tree.create(Box::new(node)).unwrap()
	}

	fn translation_3d(tree: &NodeTree, id: NodeUuid) -> Vec3 {
		tree.global_transform_3d(id).unwrap().w_axis.truncate()
	}

	#[test]
	fn reparenting_recomposes_3d_globals() {
		let mut tree = NodeTree::new();
		let root = node_3d_at(&mut tree, "root", Vec3::ZERO);
		let child = node_3d_at(&mut tree, "child", Vec3::new(0., 5., 0.));
		let grandchild = node_3d_at(&mut tree, "grandchild", Vec3::new(1., 1., 0.));
		tree.set_root(root).unwrap();
		tree.attach(root, child).unwrap();
		tree.attach(child, grandchild).unwrap();

		tree.set_local_3d(root, TransformOffset3D::new().with_translation(Vec3::new(10., 0., 0.)))
			.unwrap();
		assert_eq!(translation_3d(&tree, grandchild), Vec3::new(11., 6., 0.));

		let recomputes = |tree: &NodeTree| tree.get::<Node3D>(grandchild).unwrap().transform().recompute_count();
		let count = recomputes(&tree);
		assert_eq!(translation_3d(&tree, grandchild), Vec3::new(11., 6., 0.));
		assert_eq!(recomputes(&tree), count);

		tree.detach(grandchild).unwrap();
		tree.attach(root, grandchild).unwrap();
		assert_eq!(translation_3d(&tree, grandchild), Vec3::new(11., 1., 0.));
		assert_eq!(recomputes(&tree), count + 1);

		tree.set_property(
			root,
			"rotation",
			Variant::Quat(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
		)
		.unwrap();
		assert!(tree.get::<Node3D>(grandchild).unwrap().transform().is_dirty());
		assert!((translation_3d(&tree, grandchild) - Vec3::new(9., 1., 0.)).length() < 1e-5);
		assert_eq!(recomputes(&tree), count + 2);
	}

	#[test]
	fn structural_edits_wait_for_the_traversal() {
		let (mut tree, log) = recorder_tree();
		let root = tree.create(Recorder::boxed("root", &log)).unwrap();
		let spawner = tree.create(Recorder::boxed("spawner", &log)).unwrap();
		tree.attach(root, spawner).unwrap();
		tree.set_root(root).unwrap();
		take(&log);

		tree.update(0.016);
		assert_eq!(take(&log), ["update root", "update spawner", "enter spawned"]);
		assert_eq!(tree.children(spawner).unwrap().len(), 1);

		tree.update(0.016);
		assert_eq!(
			take(&log),
			["update root", "update spawner", "update spawned", "enter spawned"]
		);
		assert_eq!(tree.children(spawner).unwrap().len(), 2);
	}

	#[test]
	fn disabled_subtrees_are_skipped() {
		let (mut tree, log) = recorder_tree();
		let root = tree.create(Recorder::boxed("root", &log)).unwrap();
		let a = tree.create(Recorder::boxed("a", &log)).unwrap();
		let a1 = tree.create(Recorder::boxed("a1", &log)).unwrap();
		tree.set_root(root).unwrap();
		tree.attach(root, a).unwrap();
		tree.attach(a, a1).unwrap();
		take(&log);

		tree.invoke(a, "set_enabled", &[Variant::Bool(false)]).unwrap();
		tree.update(1.);
		assert_eq!(take(&log), ["update root"]);
	}

	#[test]
	fn flush_passes_are_bounded() {
		let (tree, log) = recorder_tree();
		let mut tree = tree.with_config(TreeConfig::new().with_max_flush_passes(3));
		let root = tree.create(Recorder::boxed("root", &log)).unwrap();
		tree.set_root(root).unwrap();
		take(&log);

		tree.invoke(root, "ping", &[]).unwrap();
		assert_eq!(take(&log).len(), 4);
		assert_eq!(tree.pending_len(), 1);
	}

	#[derive(Default)]
	struct RecordingTarget {
		cam_2d: Option<Camera2DState>,
		cam_3d: Option<Camera3DState>,
		/// (texture width, camera active)
		quads: Vec<(u32, bool)>,
		/// (mesh, camera active)
		meshes: Vec<(String, bool)>,
	}

	impl RenderTarget for RecordingTarget {
		fn draw_textured_quad(&mut self, texture: &Texture, _: Affine2, _: Vec2, _: Vec4, _: BlendMode) {
			self.quads.push((texture.width(), self.cam_2d.is_some()));
		}

		fn draw_rect(&mut self, _: Affine2, _: Vec2, _: Vec4) {}

		fn draw_mesh(&mut self, mesh: &str, _: Mat4) {
			self.meshes.push((mesh.to_owned(), self.cam_3d.is_some()));
		}

		fn camera_2d(&self) -> Option<Camera2DState> {
			self.cam_2d
		}

		fn set_camera_2d(&mut self, camera: Camera2DState) {
			self.cam_2d = Some(camera);
		}

		fn clear_camera_2d(&mut self) {
			self.cam_2d = None;
		}

		fn camera_3d(&self) -> Option<Camera3DState> {
			self.cam_3d
		}

		fn set_camera_3d(&mut self, camera: Camera3DState) {
			self.cam_3d = Some(camera);
		}

		fn clear_camera_3d(&mut self) {
			self.cam_3d = None;
		}
	}

	fn sprite(tree: &mut NodeTree, width: u32) -> NodeUuid {
		let mut sprite = Sprite2D::default();
		sprite.set_texture(Arc::new(Texture::from_rgba(width, 1, vec![0; width as usize * 4]).unwrap()));
		tree.create(Box::new(sprite)).unwrap()
	}

	#[test]
	fn camera_state_is_scoped_to_the_subtree() {
		let mut tree = NodeTree::new();
		let root = tree.create(Box::new(Node2D::new("root"))).unwrap();
		let mut camera = Camera2D::default();
		camera.make_current();
		let camera = tree.create(Box::new(camera)).unwrap();
		let inside = sprite(&mut tree, 1);
		let after = sprite(&mut tree, 2);

		tree.set_root(root).unwrap();
		tree.attach(root, camera).unwrap();
		tree.attach(camera, inside).unwrap();
		tree.attach(root, after).unwrap();

		let mut target = RecordingTarget::default();
		tree.draw(&mut target);
		assert_eq!(target.quads, [(1, true), (2, false)]);
		assert_eq!(target.cam_2d, None);
	}

	#[test]
	fn camera_3d_state_is_scoped_to_the_subtree() {
		let mut tree = NodeTree::new();
		let root = tree.create(Box::new(Node3D::new("world"))).unwrap();
		let mut camera = Camera3D::default();
		camera.node_3d_mut().set_position(Vec3::new(0., 0., 5.));
		camera.make_current();
		let camera = tree.create(Box::new(camera)).unwrap();
		let mut hidden = Node3D::new("hidden");
		hidden.node_mut().set_enabled(false);
		let hidden = tree.create(Box::new(hidden)).unwrap();
		let hidden_mesh = tree.create(Box::new(MeshInstance3D::new("ghost", "ghost.mesh"))).unwrap();
		let inside = tree.create(Box::new(MeshInstance3D::new("inside", "inside.mesh"))).unwrap();
		let after = tree.create(Box::new(MeshInstance3D::new("after", "after.mesh"))).unwrap();

		tree.set_root(root).unwrap();
		tree.attach(root, camera).unwrap();
		tree.attach(camera, hidden).unwrap();
		tree.attach(hidden, hidden_mesh).unwrap();
		tree.attach(camera, inside).unwrap();
		tree.attach(root, after).unwrap();

		let mut target = RecordingTarget::default();
		tree.draw(&mut target);
		assert_eq!(
			target.meshes,
			[("inside.mesh".to_owned(), true), ("after.mesh".to_owned(), false)]
		);
		assert_eq!(target.cam_3d, None);

		// an outer camera comes back once the camera's subtree is drawn
		let mut target = RecordingTarget::default();
		target.set_camera_3d(Camera3DState {
			view: Mat4::IDENTITY,
			fov_y: 1.,
		});
		tree.draw(&mut target);
		assert_eq!(target.cam_3d.map(|c| c.fov_y), Some(1.));
	}

	/// Counts written lines without keeping them.
	#[derive(Default)]
	struct LineCount(usize);

	impl std::fmt::Write for LineCount {
		fn write_str(&mut self, s: &str) -> std::fmt::Result {
			self.0 += s.matches('\n').count();
			Ok(())
		}
	}

	#[test]
	fn deep_chains_are_drawn_and_printed() {
		const DEPTH: usize = 20_000;

		let mut tree = NodeTree::new();
		let mut camera = Camera2D::default();
		camera.make_current();
		let top = tree.create(Box::new(camera)).unwrap();
		let mut parent = top;
		for _ in 1..DEPTH {
			let child = node_2d_at(&mut tree, "", Vec2::X);
			tree.attach(parent, child).unwrap();
			parent = child;
		}
		let bottom = sprite(&mut tree, 3);
		tree.attach(parent, bottom).unwrap();
		let after = sprite(&mut tree, 4);
		tree.attach(top, after).unwrap();
		tree.set_root(top).unwrap();

		let mut target = RecordingTarget::default();
		tree.draw(&mut target);
		assert_eq!(target.quads, [(3, true), (4, true)]);
		assert_eq!(target.cam_2d, None);
		assert_eq!(translation(&tree, bottom), Vec2::new((DEPTH - 1) as f32, 0.));

		let mut lines = LineCount::default();
		std::fmt::write(&mut lines, format_args!("{tree}")).unwrap();
		assert_eq!(lines.0, DEPTH + 2);
	}

	#[test]
	fn input_goes_topmost_first_and_stops_when_claimed() {
		let (mut tree, log) = recorder_tree();
		let root = tree.create(Recorder::boxed("root", &log)).unwrap();
		let first = tree.create(Recorder::boxed("first", &log)).unwrap();
		let claimer = tree.create(Recorder::boxed("claimer", &log)).unwrap();
		let last = tree.create(Recorder::boxed("last", &log)).unwrap();
		tree.set_root(root).unwrap();
		for child in [first, claimer, last] {
			tree.attach(root, child).unwrap();
		}
		take(&log);

		let event = InputEvent::Key { code: 32, pressed: true };
		assert_eq!(tree.input(&event), Some(claimer));
		assert_eq!(take(&log), ["input last", "input claimer"]);

		let mut tree = tree.with_config(TreeConfig::new().with_input_order(InputOrder::Draw));
		assert_eq!(tree.input(&event), Some(claimer));
		assert_eq!(take(&log), ["input root", "input first", "input claimer"]);
	}

	#[test]
	fn touch_area_press_reaches_bound_method() {
		let mut tree = NodeTree::new();
		let root = tree.create(Box::new(Node2D::new("root"))).unwrap();
		let mut area = TouchArea2D::new("button", Vec2::splat(20.));
		area.node_2d_mut().set_position(Vec2::new(100., 100.));
		let area = tree.create(Box::new(area)).unwrap();
		let mover = tree.create(Box::new(Node2D::new("mover"))).unwrap();
		tree.set_root(root).unwrap();
		tree.attach(root, area).unwrap();
		tree.attach(root, mover).unwrap();

		assert!(matches!(
			tree.connect(area, "pressed", mover, "explode"),
			Err(SceneError::Reflection(ReflectionError::UnknownMethod { .. }))
		));
		tree.connect(area, "pressed", mover, "translate").unwrap();

		let presses = Rc::new(RefCell::new(Vec::new()));
		{
			let presses = Rc::clone(&presses);
			tree.connect_observer(
				area,
				"pressed",
				Rc::new(move |args| {
					presses.borrow_mut().push(args[0].clone());
					Ok(())
				}),
			)
			.unwrap();
		}

		let miss = InputEvent::PointerDown {
			position: Vec2::new(0., 0.),
		};
		assert_eq!(tree.input(&miss), None);

		let hit = InputEvent::PointerDown {
			position: Vec2::new(105., 95.),
		};
		assert_eq!(tree.input(&hit), Some(area));
		assert_eq!(*presses.borrow(), [Variant::Vec2(Vec2::new(5., -5.))]);
		assert_eq!(translation(&tree, mover), Vec2::new(5., -5.));

		assert!(tree.disconnect(area, "pressed", mover, "translate").unwrap());
		tree.emit(area, "pressed", &[Variant::Vec2(Vec2::ONE)]).unwrap();
		assert_eq!(translation(&tree, mover), Vec2::new(5., -5.));
	}

	#[test]
	fn emit_reports_failing_observers() {
		let mut tree = NodeTree::new();
		let node = tree.create(Box::new(Node::new("a"))).unwrap();
		tree.connect_observer(node, "renamed", Rc::new(|_| Err("nope".into())))
			.unwrap();

		assert!(matches!(
			tree.emit(node, "renamed", &[]),
			Err(SceneError::Signal(SignalError { total: 1, .. }))
		));
		assert!(matches!(
			tree.emit(node, "clicked", &[]),
			Err(SceneError::Reflection(ReflectionError::UnknownSignal { .. }))
		));

		// a failing observer does not fail the method that emitted
		tree.invoke(node, "rename", &[Variant::from("b")]).unwrap();
		assert_eq!(tree.get_property(node, "name").unwrap(), Variant::from("b"));
	}

	#[derive(Default)]
	struct World {
		next: u64,
		bodies: HashMap<BodyHandle, BodyDesc>,
		states: HashMap<BodyHandle, BodyState>,
	}

	#[derive(Clone, Default)]
	struct SharedWorld(Rc<RefCell<World>>);

	impl PhysicsWorld2D for SharedWorld {
		fn add_body(&mut self, desc: BodyDesc) -> BodyHandle {
			let mut world = self.0.borrow_mut();
			world.next += 1;
			let handle = BodyHandle(world.next);
			world.bodies.insert(handle, desc);
			handle
		}

		fn remove_body(&mut self, handle: BodyHandle) {
			self.0.borrow_mut().bodies.remove(&handle);
		}

		fn body_state(&self, handle: BodyHandle) -> Option<BodyState> {
			self.0.borrow().states.get(&handle).copied()
		}
	}

	#[test]
	fn physics_bodies_follow_the_lifecycle() {
		let world = SharedWorld::default();
		let mut tree = NodeTree::new();
		tree.set_physics_world(Box::new(world.clone()));

		let root = node_2d_at(&mut tree, "root", Vec2::new(10., 0.));
		let mut body = PhysicsBody2D::new("crate", 2., Vec2::splat(4.));
		body.node_2d_mut().set_position(Vec2::new(5., 0.));
		let body = tree.create(Box::new(body)).unwrap();
		tree.attach(root, body).unwrap();
		assert!(world.0.borrow().bodies.is_empty());

		tree.set_root(root).unwrap();
		let handle = tree.get::<PhysicsBody2D>(body).unwrap().handle().unwrap();
		assert_eq!(world.0.borrow().bodies[&handle].position, Vec2::new(15., 0.));

		world.0.borrow_mut().states.insert(
			handle,
			BodyState {
				position: Vec2::new(20., 0.),
				rotation: 0.,
				velocity: Vec2::new(1., 0.),
			},
		);
		tree.update(0.1);
		assert!((tree.local_2d(body).unwrap().translation - Vec2::new(10., 0.)).length() < 1e-5);
		assert!((translation(&tree, body) - Vec2::new(20., 0.)).length() < 1e-5);
		assert_eq!(tree.get_property(body, "velocity").unwrap(), Variant::Vec2(Vec2::new(1., 0.)));

		tree.detach(body).unwrap();
		assert!(world.0.borrow().bodies.is_empty());
		assert_eq!(tree.get::<PhysicsBody2D>(body).unwrap().handle(), None);
	}

	#[test]
	fn queued_free_of_the_root() {
		let mut tree = NodeTree::new();
		let root = tree.create(Box::new(Node::new("root"))).unwrap();
		let child = tree.create(Box::new(Node::new("child"))).unwrap();
		tree.set_root(root).unwrap();
		tree.attach(root, child).unwrap();

		tree.pending.push(PendingOp::Free(root));
		assert_eq!(tree.flush_pending(), 1);
		assert!(tree.is_empty());
		assert_eq!(tree.root(), None);
	}

	#[test]
	fn inspector_and_display() {
		let mut tree = NodeTree::new();
		let root = tree.create(Box::new(Node::new("level"))).unwrap();
		let player = node_2d_at(&mut tree, "player", Vec2::new(1., 2.));
		tree.set_root(root).unwrap();
		tree.attach(root, player).unwrap();

		assert_eq!(tree.path(player).unwrap(), "/level/player");

		let dump = tree.inspect(player).unwrap();
		assert_eq!(dump["class"], "Node2D");
		assert_eq!(dump["state"], "attached");
		assert_eq!(dump["properties"]["Node"]["name"], "player");
		assert_eq!(dump["properties"]["Node2D"]["position"][1].as_f32(), Some(2.));
		let classes: Vec<_> = dump["properties"].entries().map(|(class, _)| class).collect();
		assert_eq!(classes, ["Node", "Node2D"]);

		let sibling = tree.create(Box::new(Node::new("sibling"))).unwrap();
		let below = tree.create(Box::new(Node::new("below"))).unwrap();
		tree.attach(player, below).unwrap();
		tree.attach(root, sibling).unwrap();

		let text = tree.to_string();
		let lines: Vec<_> = text.lines().collect();
		assert_eq!(lines.len(), 4);
		let indents: Vec<_> = lines.iter().map(|l| l.find('-').unwrap()).collect();
		assert_eq!(indents, [0, 2, 4, 2]);
		for (line, name) in lines.iter().zip(["level", "player", "below", "sibling"]) {
			assert!(line.contains(name));
		}
	}
}
