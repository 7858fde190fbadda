use crate::impl_scene_object;
use crate::node::{NodeContext, SceneObject};
use crate::reflect::{arg, downcast, downcast_mut, extract, ClassDescriptor, ReflectionError, Variant, VariantKind};
use crate::signal::Signal;

/// Root of every builtin class.
#[derive(Debug)]
pub struct Node {
	name: String,
	enabled: bool,
	/// Emitted with the old and the new name.
	renamed: Signal,
}

impl Default for Node {
	fn default() -> Self {
		Self {
			name: String::new(),
			enabled: true,
			renamed: Signal::new(),
		}
	}
}

impl Node {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Sets the name without notifying anyone. See [`Node::rename`].
	pub fn set_name(&mut self, name: impl Into<String>) {
		self.name = name.into();
	}

	pub fn rename(&mut self, ctx: &mut NodeContext<'_>, name: impl Into<String>) {
		let old = std::mem::replace(&mut self.name, name.into());
		if old != self.name {
			ctx.emit(&self.renamed, &[Variant::String(old), Variant::String(self.name.clone())]);
		}
	}

	/// Disabled nodes and their descendants are skipped by update, draw and input.
	pub fn enabled(&self) -> bool {
		self.enabled
	}

	pub fn set_enabled(&mut self, enabled: bool) {
		self.enabled = enabled;
	}

	pub fn renamed(&self) -> &Signal {
		&self.renamed
	}

	pub fn renamed_mut(&mut self) -> &mut Signal {
		&mut self.renamed
	}
}

impl SceneObject for Node {
	impl_scene_object!("Node");

	fn node(&self) -> Option<&Node> {
		Some(self)
	}

	fn node_mut(&mut self) -> Option<&mut Node> {
		Some(self)
	}
}

fn renamed(obj: &dyn SceneObject) -> Result<&Signal, ReflectionError> {
	Ok(&downcast::<Node>(obj)?.renamed)
}

fn renamed_mut(obj: &mut dyn SceneObject) -> Result<&mut Signal, ReflectionError> {
	Ok(&mut downcast_mut::<Node>(obj)?.renamed)
}

pub(super) fn descriptor() -> ClassDescriptor {
	ClassDescriptor::new("Node")
		.constructor(|| Box::<Node>::default())
		.property(
			"name",
			VariantKind::String,
			|obj| Ok(Variant::String(downcast::<Node>(obj)?.name.clone())),
			|obj, value| {
				downcast_mut::<Node>(obj)?.name = extract(&value)?;
				Ok(())
			},
		)
		.property(
			"enabled",
			VariantKind::Bool,
			|obj| Ok(Variant::Bool(downcast::<Node>(obj)?.enabled)),
			|obj, value| {
				downcast_mut::<Node>(obj)?.enabled = extract(&value)?;
				Ok(())
			},
		)
		.method("set_enabled", &[VariantKind::Bool], |obj, _ctx, args| {
			downcast_mut::<Node>(obj)?.set_enabled(arg(args, 0)?);
			Ok(Variant::Nil)
		})
		.method("rename", &[VariantKind::String], |obj, ctx, args| {
			downcast_mut::<Node>(obj)?.rename(ctx, arg::<String>(args, 0)?);
			Ok(Variant::Nil)
		})
		.signal("renamed", renamed, renamed_mut)
}
