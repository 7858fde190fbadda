use std::io::{Read, Write};
use std::sync::Arc;

use glam::{Vec2, Vec4};
use tracing::warn;

use crate::formats::{read_blob, read_bool, read_u16, write_blob, write_bool, write_u16, PersistenceError};
use crate::impl_scene_object;
use crate::node::{DrawContext, NodeContext, SceneObject};
use crate::reflect::{downcast, downcast_mut, extract, ClassDescriptor, CustomFields, ReflectionError, Variant, VariantKind};
use crate::render::{BlendMode, RenderTarget};
use crate::texture::{default_texture, resources, Texture};

use super::Node2D;

/// A textured quad the size of its texture, centered on the node.
#[derive(Debug)]
pub struct Sprite2D {
	node_2d: Node2D,
	/// Resource path, empty for none or for an in-memory texture.
	texture_path: String,
	texture: Option<Arc<Texture>>,
	tint: Vec4,
	blend_mode: BlendMode,
}

impl Default for Sprite2D {
	fn default() -> Self {
		Self {
			node_2d: Node2D::default(),
			texture_path: String::new(),
			texture: None,
			tint: Vec4::ONE,
			blend_mode: BlendMode::Normal,
		}
	}
}

impl Sprite2D {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			node_2d: Node2D::new(name),
			..Default::default()
		}
	}

	pub fn node_2d(&self) -> &Node2D {
		&self.node_2d
	}

	pub fn node_2d_mut(&mut self) -> &mut Node2D {
		&mut self.node_2d
	}

	pub fn texture(&self) -> Option<&Arc<Texture>> {
		self.texture.as_ref()
	}

	pub fn texture_path(&self) -> &str {
		&self.texture_path
	}

	/// Uses an already loaded texture. Its path, if any, is what gets persisted.
	pub fn set_texture(&mut self, texture: Arc<Texture>) {
		self.texture_path = texture.path().unwrap_or_default().to_owned();
		self.texture = Some(texture);
	}

	/// Points the sprite at a resource path, resolved through the process-wide resource cache.
	pub fn set_texture_path(&mut self, path: impl Into<String>) {
		let path = path.into();
		if path == self.texture_path && self.texture.is_some() {
			return;
		}
		self.texture_path = path;
		self.texture = None;
		self.resolve_texture();
	}

	fn resolve_texture(&mut self) {
		if self.texture.is_some() || self.texture_path.is_empty() {
			return;
		}
		match resources().load_texture(&self.texture_path) {
			Ok(texture) => self.texture = Some(texture),
			Err(e) => warn!("Sprite {:?} falls back to the default texture: {e}", self.node_2d.node().name()),
		}
	}

	pub fn tint(&self) -> Vec4 {
		self.tint
	}

	pub fn set_tint(&mut self, tint: Vec4) {
		self.tint = tint;
	}

	pub fn blend_mode(&self) -> BlendMode {
		self.blend_mode
	}

	pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
		self.blend_mode = blend_mode;
	}
}

impl SceneObject for Sprite2D {
	impl_scene_object!("Sprite2D", node_2d);

	fn after_tree_enter(&mut self, ctx: &mut NodeContext<'_>) {
		self.node_2d.after_tree_enter(ctx);
		self.resolve_texture();
	}

	fn draw(&self, ctx: &DrawContext, target: &mut dyn RenderTarget) {
		let Some(transform) = ctx.global_2d else {
			return;
		};
		let fallback;
		let texture = match &self.texture {
			Some(texture) => texture.as_ref(),
			None => {
				fallback = default_texture();
				fallback.as_ref()
			}
		};
		let size = Vec2::new(texture.width() as f32, texture.height() as f32);
		target.draw_textured_quad(texture, transform, size, self.tint, self.blend_mode);
	}
}

/// Pixel data of an embedded texture carries a `u16` length.
const MAX_EMBEDDED_BYTES: usize = u16::MAX as usize;

/// An in-memory texture has no path to be resolved again, so it is written into the record.
fn write_embedded_texture(obj: &dyn SceneObject, data: &mut dyn Write) -> Result<(), PersistenceError> {
	let sprite = downcast::<Sprite2D>(obj)?;
	let embedded = sprite.texture.as_ref().filter(|t| t.path().is_none());
	if let Some(texture) = embedded.filter(|t| t.pixels().len() > MAX_EMBEDDED_BYTES) {
		return Err(PersistenceError::invalid(
			"Sprite2D.texture",
			format!(
				"embedded {}x{} texture exceeds {MAX_EMBEDDED_BYTES} bytes of pixel data",
				texture.width(),
				texture.height()
			),
		));
	}
	write_bool(data, embedded.is_some())?;
	if let Some(texture) = embedded {
		for side in [texture.width(), texture.height()] {
			let side = u16::try_from(side)
				.map_err(|_| PersistenceError::invalid("Sprite2D.texture", "embedded texture is too large"))?;
			write_u16(data, side)?;
		}
		write_blob(data, texture.pixels(), "Sprite2D.texture")?;
	}
	Ok(())
}

fn read_embedded_texture(obj: &mut dyn SceneObject, data: &mut dyn Read) -> Result<(), PersistenceError> {
	let sprite = downcast_mut::<Sprite2D>(obj)?;
	if read_bool(data, "Sprite2D.texture")? {
		let width = read_u16(data)? as u32;
		let height = read_u16(data)? as u32;
		let pixels = read_blob(data)?;
		let texture = Texture::from_rgba(width, height, pixels)
			.map_err(|e| PersistenceError::invalid("Sprite2D.texture", e.to_string()))?;
		sprite.texture = Some(Arc::new(texture));
	}
	Ok(())
}

pub(super) fn descriptor() -> ClassDescriptor {
	ClassDescriptor::new("Sprite2D")
		.inherits("Node2D")
		.constructor(|| Box::<Sprite2D>::default())
		.property(
			"texture",
			VariantKind::String,
			|obj| Ok(Variant::String(downcast::<Sprite2D>(obj)?.texture_path.clone())),
			|obj, value| {
				downcast_mut::<Sprite2D>(obj)?.set_texture_path(extract::<String>(&value)?);
				Ok(())
			},
		)
		.property(
			"tint",
			VariantKind::Vec4,
			|obj| Ok(Variant::Vec4(downcast::<Sprite2D>(obj)?.tint)),
			|obj, value| {
				downcast_mut::<Sprite2D>(obj)?.tint = extract(&value)?;
				Ok(())
			},
		)
		.property(
			"blend_mode",
			VariantKind::Int,
			|obj| Ok(Variant::Int(downcast::<Sprite2D>(obj)?.blend_mode.index())),
			|obj, value| {
				let index: i64 = extract(&value)?;
				let blend_mode = BlendMode::from_index(index).ok_or_else(|| {
					ReflectionError::mismatch("blend_mode", format!("{index} is not a blend mode"))
				})?;
				downcast_mut::<Sprite2D>(obj)?.blend_mode = blend_mode;
				Ok(())
			},
		)
		.custom_fields(CustomFields {
			write: write_embedded_texture,
			read: read_embedded_texture,
		})
}
