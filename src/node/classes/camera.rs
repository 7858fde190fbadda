use std::f32::consts::FRAC_PI_3;

use glam::Vec2;

use crate::impl_scene_object;
use crate::node::{DrawContext, SceneObject};
use crate::reflect::{downcast, downcast_mut, extract, ClassDescriptor, Variant, VariantKind};
use crate::render::{Camera2DState, Camera3DState, RenderTarget};

use super::{Node2D, Node3D};

/// Views its subtree from its own global transform while it is current.
#[derive(Debug)]
pub struct Camera2D {
	node_2d: Node2D,
	zoom: Vec2,
	current: bool,
}

impl Default for Camera2D {
	fn default() -> Self {
		Self {
			node_2d: Node2D::default(),
			zoom: Vec2::ONE,
			current: false,
		}
	}
}

impl Camera2D {
	pub fn node_2d(&self) -> &Node2D {
		&self.node_2d
	}

	pub fn node_2d_mut(&mut self) -> &mut Node2D {
		&mut self.node_2d
	}

	pub fn zoom(&self) -> Vec2 {
		self.zoom
	}

	pub fn set_zoom(&mut self, zoom: Vec2) {
		self.zoom = zoom;
	}

	pub fn is_current(&self) -> bool {
		self.current
	}

	pub fn make_current(&mut self) {
		self.current = true;
	}
}

impl SceneObject for Camera2D {
	impl_scene_object!("Camera2D", node_2d);

	fn draw(&self, ctx: &DrawContext, target: &mut dyn RenderTarget) {
		if let (true, Some(global)) = (self.current, ctx.global_2d) {
			target.set_camera_2d(Camera2DState {
				view: global.inverse(),
				zoom: self.zoom,
			});
		}
	}
}

#[derive(Debug)]
pub struct Camera3D {
	node_3d: Node3D,
	/// Vertical field of view, in radians
	fov_y: f32,
	current: bool,
}

impl Default for Camera3D {
	fn default() -> Self {
		Self {
			node_3d: Node3D::default(),
			fov_y: FRAC_PI_3,
			current: false,
		}
	}
}

impl Camera3D {
	pub fn node_3d(&self) -> &Node3D {
		&self.node_3d
	}

	pub fn node_3d_mut(&mut self) -> &mut Node3D {
		&mut self.node_3d
	}

	pub fn fov_y(&self) -> f32 {
		self.fov_y
	}

	pub fn set_fov_y(&mut self, fov_y: f32) {
		self.fov_y = fov_y;
	}

	pub fn is_current(&self) -> bool {
		self.current
	}

	pub fn make_current(&mut self) {
		self.current = true;
	}
}

impl SceneObject for Camera3D {
	impl_scene_object!("Camera3D", node_3d);

	fn draw(&self, ctx: &DrawContext, target: &mut dyn RenderTarget) {
		if let (true, Some(global)) = (self.current, ctx.global_3d) {
			target.set_camera_3d(Camera3DState {
				view: global.inverse(),
				fov_y: self.fov_y,
			});
		}
	}
}

pub(super) fn descriptor_2d() -> ClassDescriptor {
	ClassDescriptor::new("Camera2D")
		.inherits("Node2D")
		.constructor(|| Box::<Camera2D>::default())
		.property(
			"zoom",
			VariantKind::Vec2,
			|obj| Ok(Variant::Vec2(downcast::<Camera2D>(obj)?.zoom)),
			|obj, value| {
				downcast_mut::<Camera2D>(obj)?.zoom = extract(&value)?;
				Ok(())
			},
		)
		.property(
			"current",
			VariantKind::Bool,
			|obj| Ok(Variant::Bool(downcast::<Camera2D>(obj)?.current)),
			|obj, value| {
				downcast_mut::<Camera2D>(obj)?.current = extract(&value)?;
				Ok(())
			},
		)
		.method("make_current", &[], |obj, _ctx, _args| {
			downcast_mut::<Camera2D>(obj)?.make_current();
			Ok(Variant::Nil)
		})
}

pub(super) fn descriptor_3d() -> ClassDescriptor {
	ClassDescriptor::new("Camera3D")
		.inherits("Node3D")
		.constructor(|| Box::<Camera3D>::default())
		.property(
			"fov_y",
			VariantKind::Float,
			|obj| Ok(Variant::Float(downcast::<Camera3D>(obj)?.fov_y)),
			|obj, value| {
				downcast_mut::<Camera3D>(obj)?.fov_y = extract(&value)?;
				Ok(())
			},
		)
		.property(
			"current",
			VariantKind::Bool,
			|obj| Ok(Variant::Bool(downcast::<Camera3D>(obj)?.current)),
			|obj, value| {
				downcast_mut::<Camera3D>(obj)?.current = extract(&value)?;
				Ok(())
			},
		)
		.method("make_current", &[], |obj, _ctx, _args| {
			downcast_mut::<Camera3D>(obj)?.make_current();
			Ok(Variant::Nil)
		})
}
