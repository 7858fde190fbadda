use crate::impl_scene_object;
use crate::node::{DrawContext, SceneObject};
use crate::reflect::{downcast, downcast_mut, extract, ClassDescriptor, Variant, VariantKind};
use crate::render::RenderTarget;

use super::Node3D;

#[derive(Debug, Default)]
pub struct MeshInstance3D {
	node_3d: Node3D,
	/// Mesh resource name, opaque to the tree.
	mesh: String,
}

impl MeshInstance3D {
	pub fn new(name: impl Into<String>, mesh: impl Into<String>) -> Self {
		Self {
			node_3d: Node3D::new(name),
			mesh: mesh.into(),
		}
	}

	pub fn node_3d(&self) -> &Node3D {
		&self.node_3d
	}

	pub fn node_3d_mut(&mut self) -> &mut Node3D {
		&mut self.node_3d
	}

	pub fn mesh(&self) -> &str {
		&self.mesh
	}

	pub fn set_mesh(&mut self, mesh: impl Into<String>) {
		self.mesh = mesh.into();
	}
}

impl SceneObject for MeshInstance3D {
	impl_scene_object!("MeshInstance3D", node_3d);

	fn draw(&self, ctx: &DrawContext, target: &mut dyn RenderTarget) {
		if let (false, Some(global)) = (self.mesh.is_empty(), ctx.global_3d) {
			target.draw_mesh(&self.mesh, global);
		}
	}
}

pub(super) fn descriptor() -> ClassDescriptor {
	ClassDescriptor::new("MeshInstance3D")
		.inherits("Node3D")
		.constructor(|| Box::<MeshInstance3D>::default())
		.property(
			"mesh",
			VariantKind::String,
			|obj| Ok(Variant::String(downcast::<MeshInstance3D>(obj)?.mesh.clone())),
			|obj, value| {
				downcast_mut::<MeshInstance3D>(obj)?.mesh = extract(&value)?;
				Ok(())
			},
		)
}
