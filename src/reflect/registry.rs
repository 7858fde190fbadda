use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use lazy_static::lazy_static;
use tracing::{debug, error};

use crate::formats::PersistenceError;
use crate::node::{classes, NodeContext, SceneObject};
use crate::signal::Signal;

use super::variant::{FromVariant, Variant, VariantKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReflectionError {
	#[error("Unknown class {0:?}")]
	UnknownClass(String),
	#[error("Class {0:?} is already registered")]
	DuplicateClass(String),
	#[error("Class {0:?} cannot be instantiated")]
	AbstractClass(String),
	#[error("Class {class:?} has no property {property:?}")]
	UnknownProperty { class: String, property: String },
	#[error("Class {class:?} has no method {method:?}")]
	UnknownMethod { class: String, method: String },
	#[error("Class {class:?} has no signal {signal:?}")]
	UnknownSignal { class: String, signal: String },
	#[error("Property {property:?} of class {class:?} is read-only")]
	ReadOnlyProperty { class: String, property: String },
	#[error("Argument mismatch for {member:?}: {reason}")]
	ArgumentMismatch { member: String, reason: String },
	#[error("Expected an instance of {expected:?}, got {found:?}")]
	InstanceMismatch { expected: &'static str, found: &'static str },
	#[error("Invalid class declaration {class:?}: {reason}")]
	InvalidDeclaration { class: String, reason: String },
}

impl ReflectionError {
	pub fn mismatch(member: &str, reason: impl Into<String>) -> Self {
		Self::ArgumentMismatch {
			member: member.to_owned(),
			reason: reason.into(),
		}
	}
}

/// Downcasts a class level view to its concrete struct.
pub fn downcast<T: SceneObject>(obj: &dyn SceneObject) -> Result<&T, ReflectionError> {
	let found = obj.class_name();
	obj.as_any().downcast_ref::<T>().ok_or(ReflectionError::InstanceMismatch {
		expected: std::any::type_name::<T>(),
		found,
	})
}

pub fn downcast_mut<T: SceneObject>(obj: &mut dyn SceneObject) -> Result<&mut T, ReflectionError> {
	let found = obj.class_name();
	obj.as_any_mut()
		.downcast_mut::<T>()
		.ok_or(ReflectionError::InstanceMismatch {
			expected: std::any::type_name::<T>(),
			found,
		})
}

/// Extracts argument `index` of a method call. Kinds are checked before the call, so this only
/// fails for bindings that declared the wrong kind.
pub fn arg<T: FromVariant>(args: &[Variant], index: usize) -> Result<T, ReflectionError> {
	args.get(index)
		.and_then(Variant::get)
		.ok_or_else(|| ReflectionError::mismatch(&format!("argument #{index}"), format!("expected {}", T::KIND)))
}

/// Extracts the value handed to a property setter.
pub fn extract<T: FromVariant>(value: &Variant) -> Result<T, ReflectionError> {
	value
		.get()
		.ok_or_else(|| ReflectionError::mismatch("value", format!("expected {}, got {}", T::KIND, value.kind())))
}

pub type Getter = fn(&dyn SceneObject) -> Result<Variant, ReflectionError>;
pub type Setter = fn(&mut dyn SceneObject, Variant) -> Result<(), ReflectionError>;
pub type MethodFn = fn(&mut dyn SceneObject, &mut NodeContext<'_>, &[Variant]) -> Result<Variant, ReflectionError>;
pub type SignalGetter = fn(&dyn SceneObject) -> Result<&Signal, ReflectionError>;
pub type SignalGetterMut = fn(&mut dyn SceneObject) -> Result<&mut Signal, ReflectionError>;
pub type Constructor = fn() -> Box<dyn SceneObject>;

#[derive(Clone, Copy)]
pub struct PropertyInfo {
	pub name: &'static str,
	pub kind: VariantKind,
	/// Stored properties are part of the persisted record, in declaration order.
	pub stored: bool,
	get: Getter,
	set: Option<Setter>,
}

impl PropertyInfo {
	pub fn is_read_only(&self) -> bool {
		self.set.is_none()
	}

	/// Reads the property from the class level view that declares it.
	pub(crate) fn read(&self, level: &dyn SceneObject) -> Result<Variant, ReflectionError> {
		(self.get)(level)
	}

	pub(crate) fn write(&self, level: &mut dyn SceneObject, value: Variant) -> Result<(), ReflectionError> {
		match self.set {
			Some(set) => set(level, value),
			None => Err(ReflectionError::ReadOnlyProperty {
				class: level.class_name().to_owned(),
				property: self.name.to_owned(),
			}),
		}
	}
}

impl fmt::Debug for PropertyInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PropertyInfo")
			.field("name", &self.name)
			.field("kind", &self.kind)
			.field("stored", &self.stored)
			.field("read_only", &self.is_read_only())
			.finish()
	}
}

#[derive(Clone, Copy)]
pub struct MethodInfo {
	pub name: &'static str,
	pub args: &'static [VariantKind],
	call: MethodFn,
}

impl fmt::Debug for MethodInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MethodInfo")
			.field("name", &self.name)
			.field("args", &self.args)
			.finish()
	}
}

/// Accessors to a [`Signal`] field. Persistable bindings of every declared signal are part of the
/// persisted record, written after the stored properties of the same class level.
#[derive(Clone, Copy)]
pub struct SignalInfo {
	pub name: &'static str,
	get: SignalGetter,
	get_mut: SignalGetterMut,
}

impl SignalInfo {
	pub fn get<'a>(&self, obj: &'a dyn SceneObject) -> Result<&'a Signal, ReflectionError> {
		(self.get)(obj)
	}

	pub fn get_mut<'a>(&self, obj: &'a mut dyn SceneObject) -> Result<&'a mut Signal, ReflectionError> {
		(self.get_mut)(obj)
	}
}

impl fmt::Debug for SignalInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SignalInfo").field("name", &self.name).finish()
	}
}

/// Own-level state that is not expressible as properties, appended last in the level's record.
#[derive(Clone, Copy)]
pub struct CustomFields {
	pub write: fn(&dyn SceneObject, &mut dyn Write) -> Result<(), PersistenceError>,
	pub read: fn(&mut dyn SceneObject, &mut dyn Read) -> Result<(), PersistenceError>,
}

/// Registered metadata of one class.
pub struct ClassDescriptor {
	pub name: &'static str,
	pub superclass: Option<&'static str>,
	constructor: Option<Constructor>,
	properties: Vec<PropertyInfo>,
	methods: Vec<MethodInfo>,
	signals: Vec<SignalInfo>,
	custom: Option<CustomFields>,
}

impl ClassDescriptor {
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			superclass: None,
			constructor: None,
			properties: Vec::new(),
			methods: Vec::new(),
			signals: Vec::new(),
			custom: None,
		}
	}

	pub fn inherits(mut self, superclass: &'static str) -> Self {
		self.superclass = Some(superclass);
		self
	}

	pub fn constructor(mut self, constructor: Constructor) -> Self {
		self.constructor = Some(constructor);
		self
	}

	/// Stored, writable property.
	pub fn property(mut self, name: &'static str, kind: VariantKind, get: Getter, set: Setter) -> Self {
		self.properties.push(PropertyInfo {
			name,
			kind,
			stored: true,
			get,
			set: Some(set),
		});
		self
	}

	/// Runtime-only property, never persisted.
	pub fn read_only_property(mut self, name: &'static str, kind: VariantKind, get: Getter) -> Self {
		self.properties.push(PropertyInfo {
			name,
			kind,
			stored: false,
			get,
			set: None,
		});
		self
	}

	pub fn method(mut self, name: &'static str, args: &'static [VariantKind], call: MethodFn) -> Self {
		self.methods.push(MethodInfo { name, args, call });
		self
	}

	pub fn signal(mut self, name: &'static str, get: SignalGetter, get_mut: SignalGetterMut) -> Self {
		self.signals.push(SignalInfo { name, get, get_mut });
		self
	}

	pub fn custom_fields(mut self, custom: CustomFields) -> Self {
		self.custom = Some(custom);
		self
	}

	pub fn properties(&self) -> &[PropertyInfo] {
		&self.properties
	}

	pub fn methods(&self) -> &[MethodInfo] {
		&self.methods
	}

	pub fn signals(&self) -> &[SignalInfo] {
		&self.signals
	}

	pub fn custom(&self) -> Option<&CustomFields> {
		self.custom.as_ref()
	}

	pub fn is_instantiable(&self) -> bool {
		self.constructor.is_some()
	}

	fn own_property(&self, name: &str) -> Option<&PropertyInfo> {
		self.properties.iter().find(|p| p.name == name)
	}

	fn own_method(&self, name: &str) -> Option<&MethodInfo> {
		self.methods.iter().find(|m| m.name == name)
	}

	fn own_signal(&self, name: &str) -> Option<&SignalInfo> {
		self.signals.iter().find(|s| s.name == name)
	}
}

impl fmt::Debug for ClassDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClassDescriptor")
			.field("name", &self.name)
			.field("superclass", &self.superclass)
			.field("properties", &self.properties)
			.field("methods", &self.methods)
			.field("signals", &self.signals)
			.finish()
	}
}

lazy_static! {
	static ref GLOBAL_REGISTRY: Arc<TypeRegistry> = Arc::new(TypeRegistry::builtin());
}

/// Mapping from class name to descriptor.
///
/// Built once, then only read: share it behind an `Arc` between trees.
#[derive(Debug, Default)]
pub struct TypeRegistry {
	classes: HashMap<&'static str, ClassDescriptor>,
}

impl TypeRegistry {
	/// An empty registry, not even the `Node` root class.
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry holding the builtin node classes.
	pub fn builtin() -> Self {
		let mut registry = Self::new();
		if let Err(e) = classes::register_builtin(&mut registry) {
			error!("Could not register builtin classes: {e}");
		}
		registry
	}

	/// Process-wide builtin registry, built on first use.
	pub fn global() -> Arc<TypeRegistry> {
		Arc::clone(&GLOBAL_REGISTRY)
	}

	/// Registers a class. Its superclass must be registered before it.
	pub fn register(&mut self, class: ClassDescriptor) -> Result<(), ReflectionError> {
		if self.classes.contains_key(class.name) {
			return Err(ReflectionError::DuplicateClass(class.name.to_owned()));
		}
		if let Some(superclass) = class.superclass {
			if !self.classes.contains_key(superclass) {
				return Err(ReflectionError::UnknownClass(superclass.to_owned()));
			}
		}
		for (i, property) in class.properties.iter().enumerate() {
			if class.properties[..i].iter().any(|p| p.name == property.name) {
				return Err(ReflectionError::InvalidDeclaration {
					class: class.name.to_owned(),
					reason: format!("property {:?} declared twice", property.name),
				});
			}
		}

		debug!("Registered class {:?} (superclass {:?})", class.name, class.superclass);
		self.classes.insert(class.name, class);
		Ok(())
	}

	pub fn class(&self, name: &str) -> Result<&ClassDescriptor, ReflectionError> {
		self.classes
			.get(name)
			.ok_or_else(|| ReflectionError::UnknownClass(name.to_owned()))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.classes.contains_key(name)
	}

	pub fn class_names(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.classes.keys().copied()
	}

	/// The class followed by its ancestors, concrete class first.
	pub fn ancestry(&self, name: &str) -> Result<Vec<&ClassDescriptor>, ReflectionError> {
		let mut chain = vec![self.class(name)?];
		while let Some(superclass) = chain[chain.len() - 1].superclass {
			chain.push(self.class(superclass)?);
		}
		Ok(chain)
	}

	pub fn inherits(&self, name: &str, ancestor: &str) -> bool {
		self.ancestry(name)
			.map(|chain| chain.iter().any(|class| class.name == ancestor))
			.unwrap_or(false)
	}

	pub fn instantiate(&self, name: &str) -> Result<Box<dyn SceneObject>, ReflectionError> {
		let class = self.class(name)?;
		let constructor = class
			.constructor
			.ok_or_else(|| ReflectionError::AbstractClass(name.to_owned()))?;
		Ok(constructor())
	}

	/// Resolves a property binding, returning it with the number of levels above `class` it is declared at.
	pub fn find_property(&self, class: &str, name: &str) -> Result<(usize, &PropertyInfo), ReflectionError> {
		self.ancestry(class)?
			.into_iter()
			.enumerate()
			.find_map(|(depth, desc)| desc.own_property(name).map(|p| (depth, p)))
			.ok_or_else(|| ReflectionError::UnknownProperty {
				class: class.to_owned(),
				property: name.to_owned(),
			})
	}

	pub fn find_method(&self, class: &str, name: &str) -> Result<(usize, &MethodInfo), ReflectionError> {
		self.ancestry(class)?
			.into_iter()
			.enumerate()
			.find_map(|(depth, desc)| desc.own_method(name).map(|m| (depth, m)))
			.ok_or_else(|| ReflectionError::UnknownMethod {
				class: class.to_owned(),
				method: name.to_owned(),
			})
	}

	pub fn find_signal(&self, class: &str, name: &str) -> Result<(usize, &SignalInfo), ReflectionError> {
		self.ancestry(class)?
			.into_iter()
			.enumerate()
			.find_map(|(depth, desc)| desc.own_signal(name).map(|s| (depth, s)))
			.ok_or_else(|| ReflectionError::UnknownSignal {
				class: class.to_owned(),
				signal: name.to_owned(),
			})
	}

	/// All properties of a class, root class first, each with its declaring class.
	pub fn property_list(&self, class: &str) -> Result<Vec<(&'static str, &PropertyInfo)>, ReflectionError> {
		let chain = self.ancestry(class)?;
		Ok(chain
			.into_iter()
			.rev()
			.flat_map(|desc| desc.properties.iter().map(move |p| (desc.name, p)))
			.collect())
	}

	pub fn get_property(&self, obj: &dyn SceneObject, name: &str) -> Result<Variant, ReflectionError> {
		let (depth, property) = self.find_property(obj.class_name(), name)?;
		(property.get)(level(obj, depth)?)
	}

	pub fn set_property(&self, obj: &mut dyn SceneObject, name: &str, value: Variant) -> Result<(), ReflectionError> {
		let class = obj.class_name();
		let (depth, property) = self.find_property(class, name)?;
		let set = property.set.ok_or_else(|| ReflectionError::ReadOnlyProperty {
			class: class.to_owned(),
			property: name.to_owned(),
		})?;
		if value.kind() != property.kind {
			return Err(ReflectionError::mismatch(
				name,
				format!("expected {}, got {}", property.kind, value.kind()),
			));
		}
		set(level_mut(obj, depth)?, value)
	}

	pub fn invoke(
		&self,
		obj: &mut dyn SceneObject,
		ctx: &mut NodeContext<'_>,
		name: &str,
		args: &[Variant],
	) -> Result<Variant, ReflectionError> {
		let (depth, method) = self.find_method(obj.class_name(), name)?;
		if args.len() != method.args.len() {
			return Err(ReflectionError::mismatch(
				name,
				format!("expected {} arguments, got {}", method.args.len(), args.len()),
			));
		}
		if let Some((i, (expected, found))) = (method.args.iter().zip(args))
			.enumerate()
			.find(|(_, (expected, found))| **expected != found.kind())
		{
			return Err(ReflectionError::mismatch(
				name,
				format!("argument #{i}: expected {expected}, got {}", found.kind()),
			));
		}
		(method.call)(level_mut(obj, depth)?, ctx, args)
	}

	pub fn signal<'a>(&self, obj: &'a dyn SceneObject, name: &str) -> Result<&'a Signal, ReflectionError> {
		let (depth, signal) = self.find_signal(obj.class_name(), name)?;
		signal.get(level(obj, depth)?)
	}

	pub fn signal_mut<'a>(&self, obj: &'a mut dyn SceneObject, name: &str) -> Result<&'a mut Signal, ReflectionError> {
		let (depth, signal) = self.find_signal(obj.class_name(), name)?;
		signal.get_mut(level_mut(obj, depth)?)
	}
}

/// Walks `depth` superclass levels up an instance.
pub(crate) fn level(mut obj: &dyn SceneObject, depth: usize) -> Result<&dyn SceneObject, ReflectionError> {
	let class = obj.class_name();
	for _ in 0..depth {
		obj = match obj.base() {
			Some(base) => base,
			None => return Err(broken_chain(class)),
		};
	}
	Ok(obj)
}

pub(crate) fn level_mut(mut obj: &mut dyn SceneObject, depth: usize) -> Result<&mut dyn SceneObject, ReflectionError> {
	let class = obj.class_name();
	for _ in 0..depth {
		obj = match obj.base_mut() {
			Some(base) => base,
			None => return Err(broken_chain(class)),
		};
	}
	Ok(obj)
}

fn broken_chain(class: &str) -> ReflectionError {
	ReflectionError::InvalidDeclaration {
		class: class.to_owned(),
		reason: "instance base chain is shorter than its registered ancestry".to_owned(),
	}
}
