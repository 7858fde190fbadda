use std::fmt;

use glam::{Quat, Vec2, Vec3, Vec4};
use json::JsonValue;

/// Closed set of values that can cross the reflection boundary.
///
/// Not meant to carry references to other objects; nodes are referred to by
/// their uuid in `Int` form where needed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
	#[default]
	Nil,
	Bool(bool),
	Int(i64),
	Float(f32),
	String(String),
	Vec2(Vec2),
	Vec3(Vec3),
	Vec4(Vec4),
	Quat(Quat),
	Blob(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
	Nil,
	Bool,
	Int,
	Float,
	String,
	Vec2,
	Vec3,
	Vec4,
	Quat,
	Blob,
}

impl VariantKind {
	pub fn name(self) -> &'static str {
		match self {
			VariantKind::Nil => "nil",
			VariantKind::Bool => "bool",
			VariantKind::Int => "int",
			VariantKind::Float => "float",
			VariantKind::String => "string",
			VariantKind::Vec2 => "vec2",
			VariantKind::Vec3 => "vec3",
			VariantKind::Vec4 => "vec4",
			VariantKind::Quat => "quat",
			VariantKind::Blob => "blob",
		}
	}
}

impl fmt::Display for VariantKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl Variant {
	pub fn kind(&self) -> VariantKind {
		match self {
			Variant::Nil => VariantKind::Nil,
			Variant::Bool(_) => VariantKind::Bool,
			Variant::Int(_) => VariantKind::Int,
			Variant::Float(_) => VariantKind::Float,
			Variant::String(_) => VariantKind::String,
			Variant::Vec2(_) => VariantKind::Vec2,
			Variant::Vec3(_) => VariantKind::Vec3,
			Variant::Vec4(_) => VariantKind::Vec4,
			Variant::Quat(_) => VariantKind::Quat,
			Variant::Blob(_) => VariantKind::Blob,
		}
	}

	pub fn get<T: FromVariant>(&self) -> Option<T> {
		T::from_variant(self)
	}

	pub fn to_json(&self) -> JsonValue {
		fn floats(values: &[f32]) -> JsonValue {
			JsonValue::Array(values.iter().map(|&v| JsonValue::from(v)).collect())
		}

		match self {
			Variant::Nil => JsonValue::Null,
			Variant::Bool(v) => JsonValue::from(*v),
			Variant::Int(v) => JsonValue::from(*v),
			Variant::Float(v) => JsonValue::from(*v),
			Variant::String(v) => JsonValue::from(v.as_str()),
			Variant::Vec2(v) => floats(&v.to_array()),
			Variant::Vec3(v) => floats(&v.to_array()),
			Variant::Vec4(v) => floats(&v.to_array()),
			Variant::Quat(v) => floats(&v.to_array()),
			Variant::Blob(v) => JsonValue::Array(v.iter().map(|&b| JsonValue::from(b)).collect()),
		}
	}
}

/// Types that can be extracted from a [`Variant`] of exactly one kind.
pub trait FromVariant: Sized {
	const KIND: VariantKind;

	fn from_variant(value: &Variant) -> Option<Self>;
}

macro_rules! impl_variant_conversions {
	($t:ty, $kind:ident) => {
		impl FromVariant for $t {
			const KIND: VariantKind = VariantKind::$kind;

			fn from_variant(value: &Variant) -> Option<Self> {
				match value {
					Variant::$kind(v) => Some(v.clone()),
					_ => None,
				}
			}
		}

		impl From<$t> for Variant {
			fn from(value: $t) -> Self {
				Variant::$kind(value)
			}
		}
	};
}

impl_variant_conversions!(bool, Bool);
impl_variant_conversions!(i64, Int);
impl_variant_conversions!(f32, Float);
impl_variant_conversions!(String, String);
impl_variant_conversions!(Vec2, Vec2);
impl_variant_conversions!(Vec3, Vec3);
impl_variant_conversions!(Vec4, Vec4);
impl_variant_conversions!(Quat, Quat);
impl_variant_conversions!(Vec<u8>, Blob);

impl From<&str> for Variant {
	fn from(value: &str) -> Self {
		Variant::String(value.to_owned())
	}
}
