pub mod classes;
mod pending;
pub mod spatial;
pub mod tree;

use std::any::Any;
use std::fmt;

use glam::{Affine2, Mat4, Vec2};
use tracing::warn;

use crate::physics::PhysicsWorld2D;
use crate::reflect::Variant;
use crate::render::RenderTarget;
use crate::signal::Signal;

use classes::Node;
pub use pending::{PendingOp, PendingQueue};
use spatial::{TransformCache2D, TransformCache3D};

/// Stable identity of a node within one tree. Never reused, even after the node is freed.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeUuid(pub(crate) u32);

impl NodeUuid {
	pub fn raw(self) -> u32 {
		self.0
	}
}

impl fmt::Display for NodeUuid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// `Constructed -> Attached <-> Detached`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	Constructed,
	Attached,
	Detached,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
	PointerDown { position: Vec2 },
	PointerUp { position: Vec2 },
	PointerMotion { position: Vec2 },
	Key { code: u32, pressed: bool },
}

impl InputEvent {
	pub fn position(&self) -> Option<Vec2> {
		match self {
			InputEvent::PointerDown { position }
			| InputEvent::PointerUp { position }
			| InputEvent::PointerMotion { position } => Some(*position),
			InputEvent::Key { .. } => None,
		}
	}
}

/// A value stored in a tree node.
///
/// Classes form a single inheritance chain by embedding their superclass value and returning it
/// from [`base`](SceneObject::base). Every hook delegates to the base unless overridden, so a
/// class only implements what it adds. Overrides that still want the inherited behaviour call
/// the base explicitly.
pub trait SceneObject: Any + fmt::Debug {
	/// Registered class name, used for descriptor lookup and persistence.
	fn class_name(&self) -> &'static str;

	fn as_any(&self) -> &dyn Any;

	fn as_any_mut(&mut self) -> &mut dyn Any;

	/// Embedded superclass value, absent for root classes.
	fn base(&self) -> Option<&dyn SceneObject>;

	fn base_mut(&mut self) -> Option<&mut dyn SceneObject>;

	fn after_tree_enter(&mut self, ctx: &mut NodeContext<'_>) {
		if let Some(base) = self.base_mut() {
			base.after_tree_enter(ctx);
		}
	}

	fn before_tree_exit(&mut self, ctx: &mut NodeContext<'_>) {
		if let Some(base) = self.base_mut() {
			base.before_tree_exit(ctx);
		}
	}

	fn update(&mut self, ctx: &mut NodeContext<'_>, delta: f32) {
		if let Some(base) = self.base_mut() {
			base.update(ctx, delta);
		}
	}

	fn draw(&self, ctx: &DrawContext, target: &mut dyn RenderTarget) {
		if let Some(base) = self.base() {
			base.draw(ctx, target);
		}
	}

	/// Returns `true` to claim the event, which stops its propagation.
	fn input(&mut self, ctx: &mut NodeContext<'_>, event: &InputEvent) -> bool {
		match self.base_mut() {
			Some(base) => base.input(ctx, event),
			None => false,
		}
	}

	fn node(&self) -> Option<&Node> {
		self.base()?.node()
	}

	fn node_mut(&mut self) -> Option<&mut Node> {
		self.base_mut()?.node_mut()
	}

	fn transform_2d(&self) -> Option<&TransformCache2D> {
		self.base()?.transform_2d()
	}

	fn transform_2d_mut(&mut self) -> Option<&mut TransformCache2D> {
		self.base_mut()?.transform_2d_mut()
	}

	fn transform_3d(&self) -> Option<&TransformCache3D> {
		self.base()?.transform_3d()
	}

	fn transform_3d_mut(&mut self) -> Option<&mut TransformCache3D> {
		self.base_mut()?.transform_3d_mut()
	}
}

/// Implements the identity part of [`SceneObject`] inside an `impl SceneObject for ...` block.
///
/// `impl_scene_object!("Name")` for a root class, `impl_scene_object!("Name", field)` for a class
/// embedding its superclass in `field`.
#[macro_export]
macro_rules! impl_scene_object {
	($class:literal) => {
		fn class_name(&self) -> &'static str {
			$class
		}

		fn as_any(&self) -> &dyn ::std::any::Any {
			self
		}

		fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
			self
		}

		fn base(&self) -> Option<&dyn $crate::node::SceneObject> {
			None
		}

		fn base_mut(&mut self) -> Option<&mut dyn $crate::node::SceneObject> {
			None
		}
	};
	($class:literal, $base:ident) => {
		fn class_name(&self) -> &'static str {
			$class
		}

		fn as_any(&self) -> &dyn ::std::any::Any {
			self
		}

		fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
			self
		}

		fn base(&self) -> Option<&dyn $crate::node::SceneObject> {
			Some(&self.$base)
		}

		fn base_mut(&mut self) -> Option<&mut dyn $crate::node::SceneObject> {
			Some(&mut self.$base)
		}
	};
}

/// What a hook may see and do outside its own object.
///
/// Structural edits are only queued; they are applied after the current traversal.
pub struct NodeContext<'a> {
	id: NodeUuid,
	parent: Option<NodeUuid>,
	global_2d: Option<Affine2>,
	parent_global_2d: Affine2,
	pending: &'a mut PendingQueue,
	physics: Option<&'a mut (dyn PhysicsWorld2D + 'static)>,
}

impl<'a> NodeContext<'a> {
	/// A context for an object that is not part of any tree.
	pub fn detached(id: NodeUuid, pending: &'a mut PendingQueue) -> Self {
		Self {
			id,
			parent: None,
			global_2d: None,
			parent_global_2d: Affine2::IDENTITY,
			pending,
			physics: None,
		}
	}

	pub(crate) fn new(
		id: NodeUuid,
		parent: Option<NodeUuid>,
		global_2d: Option<Affine2>,
		parent_global_2d: Affine2,
		pending: &'a mut PendingQueue,
		physics: Option<&'a mut (dyn PhysicsWorld2D + 'static)>,
	) -> Self {
		Self {
			id,
			parent,
			global_2d,
			parent_global_2d,
			pending,
			physics,
		}
	}

	pub fn id(&self) -> NodeUuid {
		self.id
	}

	pub fn parent(&self) -> Option<NodeUuid> {
		self.parent
	}

	/// Global transform of this node when the hook started, if it is a 2D node.
	pub fn global_2d(&self) -> Option<Affine2> {
		self.global_2d
	}

	/// What this node's local 2D transform is composed with. Identity when the parent is not 2D.
	pub fn parent_global_2d(&self) -> Affine2 {
		self.parent_global_2d
	}

	pub fn physics(&mut self) -> Option<&mut (dyn PhysicsWorld2D + 'static)> {
		self.physics.as_deref_mut()
	}

	pub fn queue_attach(&mut self, parent: NodeUuid, child: NodeUuid) {
		self.pending.push(PendingOp::Attach { parent, child });
	}

	pub fn queue_detach(&mut self, id: NodeUuid) {
		self.pending.push(PendingOp::Detach(id));
	}

	pub fn queue_free(&mut self, id: NodeUuid) {
		self.pending.push(PendingOp::Free(id));
	}

	pub fn queue_spawn(&mut self, parent: NodeUuid, object: Box<dyn SceneObject>) {
		self.pending.push(PendingOp::Spawn { parent, object });
	}

	pub fn call_deferred(&mut self, target: NodeUuid, method: impl Into<String>, args: Vec<Variant>) {
		self.pending.push(PendingOp::Call {
			target,
			method: method.into(),
			args,
		});
	}

	/// Emits a signal of the calling node. Bindings become deferred calls.
	pub fn emit(&mut self, signal: &Signal, args: &[Variant]) {
		let pending = &mut *self.pending;
		let result = signal.emit(args, |binding| {
			pending.push(PendingOp::Call {
				target: binding.target,
				method: binding.method.clone(),
				args: args.to_vec(),
			})
		});
		if let Err(e) = result {
			warn!("Signal of node {} had failing subscribers: {e}", self.id);
		}
	}
}

/// Read-only view handed to draw hooks.
#[derive(Debug, Clone, Copy)]
pub struct DrawContext {
	pub id: NodeUuid,
	pub global_2d: Option<Affine2>,
	pub global_3d: Option<Mat4>,
}
