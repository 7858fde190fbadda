use glam::{Quat, Vec3};

use crate::impl_scene_object;
use crate::node::spatial::TransformCache3D;
use crate::node::SceneObject;
use crate::reflect::{arg, downcast, downcast_mut, extract, ClassDescriptor, Variant, VariantKind};

use super::Node;

/// A node placed in 3D space, relative to its nearest 3D parent.
#[derive(Debug, Default)]
pub struct Node3D {
	node: Node,
	transform: TransformCache3D,
}

impl Node3D {
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

	pub fn transform(&self) -> &TransformCache3D {
		&self.transform
	}

	pub fn position(&self) -> Vec3 {
		self.transform.local().translation
	}

	pub fn set_position(&mut self, position: Vec3) {
		let local = self.transform.local().with_translation(position);
		self.transform.set_local(local);
	}

	pub fn rotation(&self) -> Quat {
		self.transform.local().rotation
	}

	pub fn set_rotation(&mut self, rotation: Quat) {
		let local = self.transform.local().with_rotation(rotation);
		self.transform.set_local(local);
	}

	pub fn scale(&self) -> Vec3 {
		self.transform.local().scale
	}

	pub fn set_scale(&mut self, scale: Vec3) {
		let local = self.transform.local().with_scale(scale);
		self.transform.set_local(local);
	}

	pub fn translate(&mut self, offset: Vec3) {
		self.set_position(self.position() + offset);
	}

	/// Applies `rotation` after the current one.
	pub fn rotate(&mut self, rotation: Quat) {
		self.set_rotation(rotation * self.rotation());
	}
}

impl SceneObject for Node3D {
	impl_scene_object!("Node3D", node);

	fn transform_3d(&self) -> Option<&TransformCache3D> {
		Some(&self.transform)
	}

	fn transform_3d_mut(&mut self) -> Option<&mut TransformCache3D> {
		Some(&mut self.transform)
	}
}

pub(super) fn descriptor() -> ClassDescriptor {
	ClassDescriptor::new("Node3D")
		.inherits("Node")
		.constructor(|| Box::<Node3D>::default())
		.property(
			"position",
			VariantKind::Vec3,
			|obj| Ok(Variant::Vec3(downcast::<Node3D>(obj)?.position())),
			|obj, value| {
				downcast_mut::<Node3D>(obj)?.set_position(extract(&value)?);
				Ok(())
			},
		)
		.property(
			"rotation",
			VariantKind::Quat,
			|obj| Ok(Variant::Quat(downcast::<Node3D>(obj)?.rotation())),
			|obj, value| {
				downcast_mut::<Node3D>(obj)?.set_rotation(extract(&value)?);
				Ok(())
			},
		)
		.property(
			"scale",
			VariantKind::Vec3,
			|obj| Ok(Variant::Vec3(downcast::<Node3D>(obj)?.scale())),
			|obj, value| {
				downcast_mut::<Node3D>(obj)?.set_scale(extract(&value)?);
				Ok(())
			},
		)
		.method("translate", &[VariantKind::Vec3], |obj, _ctx, args| {
			downcast_mut::<Node3D>(obj)?.translate(arg(args, 0)?);
			Ok(Variant::Nil)
		})
		.method("rotate", &[VariantKind::Quat], |obj, _ctx, args| {
			downcast_mut::<Node3D>(obj)?.rotate(arg(args, 0)?);
			Ok(Variant::Nil)
		})
}
