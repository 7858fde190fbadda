use std::io::{Read, Write};

use crate::node::{NodeUuid, SceneObject};
use crate::reflect::{level, level_mut, ClassDescriptor, TypeRegistry};

use super::{read_string, read_u16, read_u32, read_variant, write_len, write_string, write_u32, write_variant, PersistenceError};

/// Writes the record of `obj`: every class level from the root class down, each level appending
/// its stored properties, then the persistable bindings of its signals, then its custom fields.
pub fn serialize_object(
	registry: &TypeRegistry,
	obj: &dyn SceneObject,
	sink: &mut dyn Write,
) -> Result<(), PersistenceError> {
	let chain = registry.ancestry(obj.class_name())?;
	let levels = chain.len();
	for (i, class) in chain.into_iter().rev().enumerate() {
		let view = level(obj, levels - 1 - i)?;
		serialize_level(class, view, sink)?;
	}
	Ok(())
}

fn serialize_level(class: &ClassDescriptor, view: &dyn SceneObject, sink: &mut dyn Write) -> Result<(), PersistenceError> {
	for property in class.properties().iter().filter(|p| p.stored) {
		let field = format!("{}.{}", class.name, property.name);
		let value = property.read(view)?;
		if value.kind() != property.kind {
			return Err(PersistenceError::invalid(
				&field,
				format!("getter produced {}, declared {}", value.kind(), property.kind),
			));
		}
		write_variant(sink, &value, &field)?;
	}

	for signal in class.signals() {
		let field = format!("{}.{}", class.name, signal.name);
		let bindings: Vec<_> = signal.get(view)?.bindings().collect();
		write_len(sink, bindings.len(), &field)?;
		for binding in bindings {
			write_u32(sink, binding.target.raw())?;
			write_string(sink, &binding.method, &field)?;
		}
	}

	if let Some(custom) = class.custom() {
		(custom.write)(view, sink)?;
	}
	Ok(())
}

/// Reads a record written by [`serialize_object`] into `obj`, in the same order.
///
/// Stops at the first failing field, which may leave `obj` partially populated.
pub fn deserialize_object(
	registry: &TypeRegistry,
	obj: &mut dyn SceneObject,
	source: &mut dyn Read,
) -> Result<(), PersistenceError> {
	let chain = registry.ancestry(obj.class_name())?;
	let levels = chain.len();
	for (i, class) in chain.into_iter().rev().enumerate() {
		let view = level_mut(obj, levels - 1 - i)?;
		deserialize_level(class, view, source)?;
	}
	Ok(())
}

fn deserialize_level(
	class: &ClassDescriptor,
	view: &mut dyn SceneObject,
	source: &mut dyn Read,
) -> Result<(), PersistenceError> {
	for property in class.properties().iter().filter(|p| p.stored) {
		let field = format!("{}.{}", class.name, property.name);
		let value = read_variant(source, property.kind, &field)?;
		property
			.write(view, value)
			.map_err(|e| PersistenceError::invalid(&field, e.to_string()))?;
	}

	for signal in class.signals() {
		let field = format!("{}.{}", class.name, signal.name);
		let count = read_u16(source)?;
		let target = signal.get_mut(view)?;
		for _ in 0..count {
			let uuid = NodeUuid(read_u32(source)?);
			let method = read_string(source, &field)?;
			target.connect_bound(uuid, method);
		}
	}

	if let Some(custom) = class.custom() {
		(custom.read)(view, source)?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;
	use std::sync::Arc;

	use glam::{Quat, Vec2, Vec3, Vec4};

	use super::*;
	use crate::node::classes::{Node2D, Sprite2D, TouchArea2D};
	use crate::reflect::{ReflectionError, Variant};
	use crate::render::BlendMode;
	use crate::texture::Texture;

	fn to_bytes(registry: &TypeRegistry, obj: &dyn SceneObject) -> Vec<u8> {
		let mut bytes = Vec::new();
		serialize_object(registry, obj, &mut bytes).unwrap();
		bytes
	}

	#[test]
	fn chained_record_restores_every_level() {
		let registry = TypeRegistry::builtin();

		let texture = Arc::new(Texture::from_rgba(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap());
		let mut sprite = Sprite2D::default();
		sprite.node_2d_mut().node_mut().set_name("hero");
		sprite.node_2d_mut().set_position(Vec2::new(4., -2.));
		sprite.node_2d_mut().set_z_index(3);
		sprite.set_tint(Vec4::new(1., 0.5, 0.5, 1.));
		sprite.set_blend_mode(BlendMode::Screen);
		sprite.set_texture(Arc::clone(&texture));

		let bytes = to_bytes(&registry, &sprite);
		let mut loaded = Sprite2D::default();
		deserialize_object(&registry, &mut loaded, &mut Cursor::new(&bytes)).unwrap();

		for (_, property) in registry.property_list("Sprite2D").unwrap() {
			assert_eq!(
				registry.get_property(&loaded, property.name),
				registry.get_property(&sprite, property.name),
				"{}",
				property.name
			);
		}
		// in-memory textures travel inside the record
		assert_eq!(loaded.texture().map(|t| t.pixels()), Some(texture.pixels()));
	}

	/// A value of the same kind that differs from `value`.
	fn changed(value: Variant) -> Variant {
		match value {
			Variant::Bool(v) => Variant::Bool(!v),
			Variant::Int(v) => Variant::Int((v + 1) % 6),
			Variant::Float(v) => Variant::Float(v + 1.5),
			Variant::String(v) => Variant::String(format!("{v}changed")),
			Variant::Vec2(v) => Variant::Vec2(v + Vec2::new(1.5, -2.)),
			Variant::Vec3(v) => Variant::Vec3(v + Vec3::new(1., 2., 3.)),
			Variant::Vec4(v) => Variant::Vec4(v * 0.5),
			Variant::Quat(v) => Variant::Quat(Quat::from_rotation_y(0.5) * v),
			other => other,
		}
	}

	#[test]
	fn every_builtin_class_round_trips() {
		let registry = TypeRegistry::builtin();
		let mut classes: Vec<_> = registry.class_names().collect();
		classes.sort_unstable();
		assert_eq!(classes.len(), 9);

		for class in classes {
			let properties = registry.property_list(class).unwrap();
			let mut original = registry.instantiate(class).unwrap();
			for (_, property) in &properties {
				// a texture path would go through the resource cache
				if property.is_read_only() || property.name == "texture" {
					continue;
				}
				let before = registry.get_property(original.as_ref(), property.name).unwrap();
				let after = changed(before.clone());
				assert_ne!(before, after, "{class}.{}", property.name);
				registry
					.set_property(original.as_mut(), property.name, after)
					.unwrap();
			}

			let bytes = to_bytes(&registry, original.as_ref());
			let mut loaded = registry.instantiate(class).unwrap();
			let mut cursor = Cursor::new(&bytes);
			deserialize_object(&registry, loaded.as_mut(), &mut cursor).unwrap();
			assert_eq!(cursor.position(), bytes.len() as u64, "{class}");

			for (_, property) in &properties {
				assert_eq!(
					registry.get_property(loaded.as_ref(), property.name),
					registry.get_property(original.as_ref(), property.name),
					"{class}.{}",
					property.name
				);
			}
		}
	}

	#[test]
	fn bindings_are_persisted_observers_are_not() {
		let registry = TypeRegistry::builtin();

		let mut area = TouchArea2D::default();
		area.pressed_mut().connect(std::rc::Rc::new(|_| Ok(())));
		area.pressed_mut().connect_bound(NodeUuid(12), "rename");
		area.node_2d_mut().node_mut().renamed_mut().connect_bound(NodeUuid(4), "press");

		let bytes = to_bytes(&registry, &area);
		let mut loaded = TouchArea2D::default();
		deserialize_object(&registry, &mut loaded, &mut Cursor::new(&bytes)).unwrap();

		assert_eq!(loaded.pressed().len(), 1);
		let binding = loaded.pressed().bindings().next().unwrap();
		assert_eq!((binding.target, binding.method.as_str()), (NodeUuid(12), "rename"));
		assert_eq!(loaded.node_2d().node().renamed().len(), 1);
	}

	#[test]
	fn truncated_record() {
		let registry = TypeRegistry::builtin();
		let bytes = to_bytes(&registry, &Node2D::default());

		let mut loaded = Node2D::default();
		let result = deserialize_object(&registry, &mut loaded, &mut Cursor::new(&bytes[..bytes.len() - 3]));
		assert!(matches!(result, Err(PersistenceError::UnexpectedEndOfData)));
	}

	#[test]
	fn out_of_range_enum() {
		let registry = TypeRegistry::builtin();
		let mut bytes = to_bytes(&registry, &Sprite2D::default());

		// blend mode is the last property, followed by the one byte embedded texture guard
		let at = bytes.len() - 1 - 8;
		bytes[at..at + 8].copy_from_slice(&42_i64.to_le_bytes());

		let mut loaded = Sprite2D::default();
		let result = deserialize_object(&registry, &mut loaded, &mut Cursor::new(&bytes));
		assert!(matches!(result, Err(PersistenceError::InvalidData { field, .. }) if field == "Sprite2D.blend_mode"));
	}

	#[test]
	fn unknown_property_after_serialize() {
		let registry = TypeRegistry::builtin();
		let node = Node2D::default();
		to_bytes(&registry, &node);

		assert_eq!(
			registry.get_property(&node, "texture"),
			Err(ReflectionError::UnknownProperty {
				class: "Node2D".to_owned(),
				property: "texture".to_owned()
			})
		);
		assert_eq!(registry.get_property(&node, "z_index"), Ok(Variant::Int(0)));
	}
}
