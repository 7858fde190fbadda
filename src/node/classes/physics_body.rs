use glam::{Affine2, Vec2};
use tracing::{debug, warn};

use crate::impl_scene_object;
use crate::node::{NodeContext, SceneObject};
use crate::physics::{BodyDesc, BodyHandle};
use crate::reflect::{downcast, downcast_mut, extract, ClassDescriptor, Variant, VariantKind};

use super::Node2D;

/// A box body simulated by the tree's physics world.
///
/// Registered on tree enter, unregistered on tree exit. Each update copies the simulated
/// position and rotation back into the local transform.
#[derive(Debug)]
pub struct PhysicsBody2D {
	node_2d: Node2D,
	mass: f32,
	half_extents: Vec2,
	velocity: Vec2,
	handle: Option<BodyHandle>,
}

impl Default for PhysicsBody2D {
	fn default() -> Self {
		Self {
			node_2d: Node2D::default(),
			mass: 1.,
			half_extents: Vec2::splat(8.),
			velocity: Vec2::ZERO,
			handle: None,
		}
	}
}

impl PhysicsBody2D {
	pub fn new(name: impl Into<String>, mass: f32, half_extents: Vec2) -> Self {
		Self {
			node_2d: Node2D::new(name),
			mass,
			half_extents,
			..Default::default()
		}
	}

	pub fn node_2d(&self) -> &Node2D {
		&self.node_2d
	}

	pub fn node_2d_mut(&mut self) -> &mut Node2D {
		&mut self.node_2d
	}

	pub fn mass(&self) -> f32 {
		self.mass
	}

	pub fn half_extents(&self) -> Vec2 {
		self.half_extents
	}

	/// Last simulated velocity.
	pub fn velocity(&self) -> Vec2 {
		self.velocity
	}

	pub fn handle(&self) -> Option<BodyHandle> {
		self.handle
	}
}

impl SceneObject for PhysicsBody2D {
	impl_scene_object!("PhysicsBody2D", node_2d);

	fn after_tree_enter(&mut self, ctx: &mut NodeContext<'_>) {
		self.node_2d.after_tree_enter(ctx);

		let global = ctx
			.global_2d()
			.unwrap_or_else(|| ctx.parent_global_2d() * self.node_2d.transform().local().to_affine());
		let (_, rotation, position) = global.to_scale_angle_translation();
		let desc = BodyDesc {
			position,
			rotation,
			mass: self.mass,
			half_extents: self.half_extents,
		};

		match ctx.physics() {
			Some(world) => self.handle = Some(world.add_body(desc)),
			None => debug!("No physics world, body {} stays static", ctx.id()),
		}
	}

	fn before_tree_exit(&mut self, ctx: &mut NodeContext<'_>) {
		if let Some(handle) = self.handle.take() {
			match ctx.physics() {
				Some(world) => world.remove_body(handle),
				None => warn!("Body {} was registered but the physics world is gone", ctx.id()),
			}
		}
		self.node_2d.before_tree_exit(ctx);
	}

	fn update(&mut self, ctx: &mut NodeContext<'_>, delta: f32) {
		self.node_2d.update(ctx, delta);

		let Some(handle) = self.handle else {
			return;
		};
		let parent = ctx.parent_global_2d();
		let Some(state) = ctx.physics().and_then(|world| world.body_state(handle)) else {
			return;
		};
		self.velocity = state.velocity;

		let scale = self.node_2d.scale();
		let global = Affine2::from_angle_translation(state.rotation, state.position);
		let (_, rotation, translation) = (parent.inverse() * global).to_scale_angle_translation();
		self.node_2d.set_rotation(rotation);
		self.node_2d.set_position(translation);
		self.node_2d.set_scale(scale);
	}
}

pub(super) fn descriptor() -> ClassDescriptor {
	ClassDescriptor::new("PhysicsBody2D")
		.inherits("Node2D")
		.constructor(|| Box::<PhysicsBody2D>::default())
		.property(
			"mass",
			VariantKind::Float,
			|obj| Ok(Variant::Float(downcast::<PhysicsBody2D>(obj)?.mass)),
			|obj, value| {
				downcast_mut::<PhysicsBody2D>(obj)?.mass = extract(&value)?;
				Ok(())
			},
		)
		.property(
			"half_extents",
			VariantKind::Vec2,
			|obj| Ok(Variant::Vec2(downcast::<PhysicsBody2D>(obj)?.half_extents)),
			|obj, value| {
				downcast_mut::<PhysicsBody2D>(obj)?.half_extents = extract(&value)?;
				Ok(())
			},
		)
		.read_only_property("velocity", VariantKind::Vec2, |obj| {
			Ok(Variant::Vec2(downcast::<PhysicsBody2D>(obj)?.velocity))
		})
}
