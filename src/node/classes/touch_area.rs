use glam::Vec2;

use crate::impl_scene_object;
use crate::node::{InputEvent, NodeContext, SceneObject};
use crate::reflect::{downcast, downcast_mut, extract, ClassDescriptor, ReflectionError, Variant, VariantKind};
use crate::signal::Signal;

use super::Node2D;

/// Rectangle centered on the node that claims pointer presses landing inside it.
#[derive(Debug)]
pub struct TouchArea2D {
	node_2d: Node2D,
	size: Vec2,
	/// Emitted with the press position, in the area's local space.
	pressed: Signal,
}

impl Default for TouchArea2D {
	fn default() -> Self {
		Self {
			node_2d: Node2D::default(),
			size: Vec2::splat(32.),
			pressed: Signal::new(),
		}
	}
}

impl TouchArea2D {
	pub fn new(name: impl Into<String>, size: Vec2) -> Self {
		Self {
			node_2d: Node2D::new(name),
			size,
			..Default::default()
		}
	}

	pub fn node_2d(&self) -> &Node2D {
		&self.node_2d
	}

	pub fn node_2d_mut(&mut self) -> &mut Node2D {
		&mut self.node_2d
	}

	pub fn size(&self) -> Vec2 {
		self.size
	}

	pub fn set_size(&mut self, size: Vec2) {
		self.size = size;
	}

	pub fn pressed(&self) -> &Signal {
		&self.pressed
	}

	pub fn pressed_mut(&mut self) -> &mut Signal {
		&mut self.pressed
	}

	pub fn contains_local(&self, point: Vec2) -> bool {
		let half = self.size / 2.;
		point.x.abs() <= half.x && point.y.abs() <= half.y
	}

	pub fn press(&self, ctx: &mut NodeContext<'_>, local: Vec2) {
		ctx.emit(&self.pressed, &[Variant::Vec2(local)]);
	}
}

impl SceneObject for TouchArea2D {
	impl_scene_object!("TouchArea2D", node_2d);

	fn input(&mut self, ctx: &mut NodeContext<'_>, event: &InputEvent) -> bool {
		if let (InputEvent::PointerDown { position }, Some(global)) = (event, ctx.global_2d()) {
			let local = global.inverse().transform_point2(*position);
			if self.contains_local(local) {
				self.press(ctx, local);
				return true;
			}
		}
		self.node_2d.input(ctx, event)
	}
}

fn pressed(obj: &dyn SceneObject) -> Result<&Signal, ReflectionError> {
	Ok(&downcast::<TouchArea2D>(obj)?.pressed)
}

fn pressed_mut(obj: &mut dyn SceneObject) -> Result<&mut Signal, ReflectionError> {
	Ok(&mut downcast_mut::<TouchArea2D>(obj)?.pressed)
}

pub(super) fn descriptor() -> ClassDescriptor {
	ClassDescriptor::new("TouchArea2D")
		.inherits("Node2D")
		.constructor(|| Box::<TouchArea2D>::default())
		.property(
			"size",
			VariantKind::Vec2,
			|obj| Ok(Variant::Vec2(downcast::<TouchArea2D>(obj)?.size)),
			|obj, value| {
				downcast_mut::<TouchArea2D>(obj)?.size = extract(&value)?;
				Ok(())
			},
		)
		.method("press", &[], |obj, ctx, _args| {
			downcast::<TouchArea2D>(obj)?.press(ctx, Vec2::ZERO);
			Ok(Variant::Nil)
		})
		.signal("pressed", pressed, pressed_mut)
}
