//! Builtin node classes.
//!
//! ```text
//! Node
//! ├── Node2D
//! │   ├── Sprite2D
//! │   ├── Camera2D
//! │   ├── TouchArea2D
//! │   └── PhysicsBody2D
//! └── Node3D
//!     ├── Camera3D
//!     └── MeshInstance3D
//! ```

mod base;
mod camera;
mod mesh_instance;
mod node_2d;
mod node_3d;
mod physics_body;
mod sprite;
mod touch_area;

use crate::reflect::{ReflectionError, TypeRegistry};

pub use base::Node;
pub use camera::{Camera2D, Camera3D};
pub use mesh_instance::MeshInstance3D;
pub use node_2d::Node2D;
pub use node_3d::Node3D;
pub use physics_body::PhysicsBody2D;
pub use sprite::Sprite2D;
pub use touch_area::TouchArea2D;

/// Registers the builtin classes, superclasses first.
pub fn register_builtin(registry: &mut TypeRegistry) -> Result<(), ReflectionError> {
	let classes = [
		base::descriptor(),
		node_2d::descriptor(),
		node_3d::descriptor(),
		sprite::descriptor(),
		camera::descriptor_2d(),
		camera::descriptor_3d(),
		touch_area::descriptor(),
		physics_body::descriptor(),
		mesh_instance::descriptor(),
	];
	for class in classes {
		registry.register(class)?;
	}
	Ok(())
}
