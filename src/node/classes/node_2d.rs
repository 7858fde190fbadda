use glam::Vec2;

use crate::impl_scene_object;
use crate::node::spatial::TransformCache2D;
use crate::node::SceneObject;
use crate::reflect::{arg, downcast, downcast_mut, extract, ClassDescriptor, Variant, VariantKind};

use super::Node;

/// A node placed in 2D space, relative to its nearest 2D parent.
#[derive(Debug, Default)]
pub struct Node2D {
	node: Node,
	transform: TransformCache2D,
	/// Draw order among siblings is tree order; this is a hint for render targets that sort.
	z_index: i64,
}

impl Node2D {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			node: Node::new(name),
			..Default::default()
		}
	}

	pub fn node(&self) -> &Node {
		&self.node
	}

	pub fn node_mut(&mut self) -> &mut Node {
		&mut self.node
	}

	pub fn transform(&self) -> &TransformCache2D {
		&self.transform
	}

	pub fn position(&self) -> Vec2 {
		self.transform.local().translation
	}

	pub fn set_position(&mut self, position: Vec2) {
		let local = self.transform.local().with_translation(position);
		self.transform.set_local(local);
	}

	pub fn rotation(&self) -> f32 {
		self.transform.local().rotation
	}

	pub fn set_rotation(&mut self, rotation: f32) {
		let local = self.transform.local().with_rotation(rotation);
		self.transform.set_local(local);
	}

	pub fn scale(&self) -> Vec2 {
		self.transform.local().scale
	}

	pub fn set_scale(&mut self, scale: Vec2) {
		let local = self.transform.local().with_scale(scale);
		self.transform.set_local(local);
	}

	pub fn z_index(&self) -> i64 {
		self.z_index
	}

	pub fn set_z_index(&mut self, z_index: i64) {
		self.z_index = z_index;
	}

	pub fn translate(&mut self, offset: Vec2) {
		self.set_position(self.position() + offset);
	}

	pub fn rotate(&mut self, angle: f32) {
		self.set_rotation(self.rotation() + angle);
	}
}

impl SceneObject for Node2D {
	impl_scene_object!("Node2D", node);

	fn transform_2d(&self) -> Option<&TransformCache2D> {
		Some(&self.transform)
	}

	fn transform_2d_mut(&mut self) -> Option<&mut TransformCache2D> {
		Some(&mut self.transform)
	}
}

pub(super) fn descriptor() -> ClassDescriptor {
	ClassDescriptor::new("Node2D")
		.inherits("Node")
		.constructor(|| Box::<Node2D>::default())
		.property(
			"position",
			VariantKind::Vec2,
			|obj| Ok(Variant::Vec2(downcast::<Node2D>(obj)?.position())),
			|obj, value| {
				downcast_mut::<Node2D>(obj)?.set_position(extract(&value)?);
				Ok(())
			},
		)
		.property(
			"rotation",
			VariantKind::Float,
			|obj| Ok(Variant::Float(downcast::<Node2D>(obj)?.rotation())),
			|obj, value| {
				downcast_mut::<Node2D>(obj)?.set_rotation(extract(&value)?);
				Ok(())
			},
		)
		.property(
			"scale",
			VariantKind::Vec2,
			|obj| Ok(Variant::Vec2(downcast::<Node2D>(obj)?.scale())),
			|obj, value| {
				downcast_mut::<Node2D>(obj)?.set_scale(extract(&value)?);
				Ok(())
			},
		)
		.property(
			"z_index",
			VariantKind::Int,
			|obj| Ok(Variant::Int(downcast::<Node2D>(obj)?.z_index)),
			|obj, value| {
				downcast_mut::<Node2D>(obj)?.z_index = extract(&value)?;
				Ok(())
			},
		)
		.method("translate", &[VariantKind::Vec2], |obj, _ctx, args| {
			downcast_mut::<Node2D>(obj)?.translate(arg(args, 0)?);
			Ok(Variant::Nil)
		})
		.method("rotate", &[VariantKind::Float], |obj, _ctx, args| {
			downcast_mut::<Node2D>(obj)?.rotate(arg(args, 0)?);
			Ok(Variant::Nil)
		})
}
