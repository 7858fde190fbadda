//! Binary persistence.
//!
//! Scalars are little-endian and fixed width. Variable-length fields (strings, blobs, lists)
//! carry a `u16` length prefix. No field carries a tag: layout is implied by the class chain
//! that wrote it, so changing a class's stored fields invalidates previously written data.

pub mod json;
mod object;
mod scene;

use std::io::{self, Read, Write};

use glam::{Quat, Vec2, Vec3, Vec4};

use crate::reflect::{ReflectionError, Variant, VariantKind};

pub use object::{deserialize_object, serialize_object};
pub use scene::{LoadFailure, LoadReport, MAGIC};

/// Longest string accepted in a record, in bytes.
pub const MAX_STRING_LEN: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
	#[error("Unexpected end of data")]
	UnexpectedEndOfData,
	#[error("Invalid data for {field}: {reason}")]
	InvalidData { field: String, reason: String },
	#[error("Could not write: {0}")]
	WriteFailed(#[source] io::Error),
	#[error("Could not read: {0}")]
	ReadFailed(#[source] io::Error),
	#[error("magic bytes do not match, the data is not a saved scene")]
	IncorrectMagic,
	#[error(transparent)]
	Reflection(#[from] ReflectionError),
}

impl PersistenceError {
	pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
		Self::InvalidData {
			field: field.to_owned(),
			reason: reason.into(),
		}
	}
}

fn read_error(e: io::Error) -> PersistenceError {
	match e.kind() {
		io::ErrorKind::UnexpectedEof => PersistenceError::UnexpectedEndOfData,
		_ => PersistenceError::ReadFailed(e),
	}
}

#[inline]
pub(crate) fn read_n<R: Read + ?Sized, const N: usize>(data: &mut R) -> Result<[u8; N], PersistenceError> {
	let mut buf = [0_u8; N];
	data.read_exact(&mut buf).map_err(read_error)?;
	Ok(buf)
}

#[inline]
pub(crate) fn read_vec<R: Read + ?Sized>(data: &mut R, n: usize) -> Result<Vec<u8>, PersistenceError> {
	let mut buf = vec![0_u8; n];
	data.read_exact(&mut buf).map_err(read_error)?;
	Ok(buf)
}

#[inline]
pub(crate) fn read_u8<R: Read + ?Sized>(data: &mut R) -> Result<u8, PersistenceError> {
	Ok(read_n::<_, 1>(data)?[0])
}

#[inline]
pub(crate) fn read_u16<R: Read + ?Sized>(data: &mut R) -> Result<u16, PersistenceError> {
	Ok(u16::from_le_bytes(read_n(data)?))
}

#[inline]
pub(crate) fn read_u32<R: Read + ?Sized>(data: &mut R) -> Result<u32, PersistenceError> {
	Ok(u32::from_le_bytes(read_n(data)?))
}

#[inline]
pub(crate) fn read_i64<R: Read + ?Sized>(data: &mut R) -> Result<i64, PersistenceError> {
	Ok(i64::from_le_bytes(read_n(data)?))
}

#[inline]
pub(crate) fn read_f32<R: Read + ?Sized>(data: &mut R) -> Result<f32, PersistenceError> {
	Ok(f32::from_le_bytes(read_n(data)?))
}

pub(crate) fn read_bool<R: Read + ?Sized>(data: &mut R, field: &str) -> Result<bool, PersistenceError> {
	match read_u8(data)? {
		0 => Ok(false),
		1 => Ok(true),
		n => Err(PersistenceError::invalid(field, format!("{n} is not a bool"))),
	}
}

fn read_floats<R: Read + ?Sized, const N: usize>(data: &mut R) -> Result<[f32; N], PersistenceError> {
	let mut out = [0.; N];
	for v in out.iter_mut() {
		*v = read_f32(data)?;
	}
	Ok(out)
}

/// `u16` length followed by raw bytes.
pub(crate) fn read_blob<R: Read + ?Sized>(data: &mut R) -> Result<Vec<u8>, PersistenceError> {
	let length = read_u16(data)? as usize;
	read_vec(data, length)
}

pub(crate) fn read_string<R: Read + ?Sized>(data: &mut R, field: &str) -> Result<String, PersistenceError> {
	let length = read_u16(data)? as usize;
	if length > MAX_STRING_LEN {
		return Err(PersistenceError::invalid(
			field,
			format!("string of {length} bytes exceeds {MAX_STRING_LEN}"),
		));
	}
	let bytes = read_vec(data, length)?;
	String::from_utf8(bytes).map_err(|e| PersistenceError::invalid(field, e.to_string()))
}

/// Reads an untagged value whose kind is known from the layout.
pub(crate) fn read_variant<R: Read + ?Sized>(
	data: &mut R,
	kind: VariantKind,
	field: &str,
) -> Result<Variant, PersistenceError> {
	Ok(match kind {
		VariantKind::Nil => Variant::Nil,
		VariantKind::Bool => Variant::Bool(read_bool(data, field)?),
		VariantKind::Int => Variant::Int(read_i64(data)?),
		VariantKind::Float => Variant::Float(read_f32(data)?),
		VariantKind::String => Variant::String(read_string(data, field)?),
		VariantKind::Vec2 => Variant::Vec2(Vec2::from_array(read_floats(data)?)),
		VariantKind::Vec3 => Variant::Vec3(Vec3::from_array(read_floats(data)?)),
		VariantKind::Vec4 => Variant::Vec4(Vec4::from_array(read_floats(data)?)),
		VariantKind::Quat => Variant::Quat(Quat::from_array(read_floats(data)?)),
		VariantKind::Blob => Variant::Blob(read_blob(data)?),
	})
}

#[inline]
pub(crate) fn write_bytes<W: Write + ?Sized>(data: &mut W, bytes: &[u8]) -> Result<(), PersistenceError> {
	data.write_all(bytes).map_err(PersistenceError::WriteFailed)
}

#[inline]
pub(crate) fn write_u8<W: Write + ?Sized>(data: &mut W, value: u8) -> Result<(), PersistenceError> {
	write_bytes(data, &[value])
}

#[inline]
pub(crate) fn write_u16<W: Write + ?Sized>(data: &mut W, value: u16) -> Result<(), PersistenceError> {
	write_bytes(data, &value.to_le_bytes())
}

#[inline]
pub(crate) fn write_u32<W: Write + ?Sized>(data: &mut W, value: u32) -> Result<(), PersistenceError> {
	write_bytes(data, &value.to_le_bytes())
}

#[inline]
pub(crate) fn write_i64<W: Write + ?Sized>(data: &mut W, value: i64) -> Result<(), PersistenceError> {
	write_bytes(data, &value.to_le_bytes())
}

#[inline]
pub(crate) fn write_f32<W: Write + ?Sized>(data: &mut W, value: f32) -> Result<(), PersistenceError> {
	write_bytes(data, &value.to_le_bytes())
}

#[inline]
pub(crate) fn write_bool<W: Write + ?Sized>(data: &mut W, value: bool) -> Result<(), PersistenceError> {
	write_u8(data, value as u8)
}

fn write_floats<W: Write + ?Sized>(data: &mut W, values: &[f32]) -> Result<(), PersistenceError> {
	values.iter().try_for_each(|&v| write_f32(data, v))
}

/// Length prefix of a list or blob, failing for lengths that do not fit.
pub(crate) fn write_len<W: Write + ?Sized>(data: &mut W, len: usize, field: &str) -> Result<(), PersistenceError> {
	let len = u16::try_from(len)
		.map_err(|_| PersistenceError::invalid(field, format!("length {len} does not fit in 16 bits")))?;
	write_u16(data, len)
}

pub(crate) fn write_blob<W: Write + ?Sized>(data: &mut W, bytes: &[u8], field: &str) -> Result<(), PersistenceError> {
	write_len(data, bytes.len(), field)?;
	write_bytes(data, bytes)
}

pub(crate) fn write_string<W: Write + ?Sized>(data: &mut W, value: &str, field: &str) -> Result<(), PersistenceError> {
	if value.len() > MAX_STRING_LEN {
		return Err(PersistenceError::invalid(
			field,
			format!("string of {} bytes exceeds {MAX_STRING_LEN}", value.len()),
		));
	}
	write_blob(data, value.as_bytes(), field)
}

pub(crate) fn write_variant<W: Write + ?Sized>(data: &mut W, value: &Variant, field: &str) -> Result<(), PersistenceError> {
	match value {
		Variant::Nil => Ok(()),
		Variant::Bool(v) => write_bool(data, *v),
		Variant::Int(v) => write_i64(data, *v),
		Variant::Float(v) => write_f32(data, *v),
		Variant::String(v) => write_string(data, v, field),
		Variant::Vec2(v) => write_floats(data, &v.to_array()),
		Variant::Vec3(v) => write_floats(data, &v.to_array()),
		Variant::Vec4(v) => write_floats(data, &v.to_array()),
		Variant::Quat(v) => write_floats(data, &v.to_array()),
		Variant::Blob(v) => write_blob(data, v, field),
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	#[test]
	fn scalars_are_little_endian() {
		let mut out = Vec::new();
		write_u32(&mut out, 0x0102_0304).unwrap();
		write_variant(&mut out, &Variant::from("hi"), "name").unwrap();
		assert_eq!(out, [4, 3, 2, 1, 2, 0, b'h', b'i']);
	}

	#[test]
	fn truncated_data() {
		let mut data = Cursor::new([1_u8, 0]);
		assert!(matches!(read_u32(&mut data), Err(PersistenceError::UnexpectedEndOfData)));

		// length prefix promises more than there is
		let mut data = Cursor::new([5_u8, 0, b'a']);
		assert!(matches!(
			read_string(&mut data, "name"),
			Err(PersistenceError::UnexpectedEndOfData)
		));
	}

	#[test]
	fn out_of_domain_values() {
		let mut data = Cursor::new([2_u8]);
		assert!(matches!(
			read_bool(&mut data, "enabled"),
			Err(PersistenceError::InvalidData { .. })
		));

		let mut data = Vec::new();
		write_u16(&mut data, (MAX_STRING_LEN + 1) as u16).unwrap();
		data.extend(std::iter::repeat(b'a').take(MAX_STRING_LEN + 1));
		assert!(matches!(
			read_string(&mut Cursor::new(data), "name"),
			Err(PersistenceError::InvalidData { .. })
		));

		let long = "a".repeat(MAX_STRING_LEN + 1);
		assert!(matches!(
			write_string(&mut Vec::new(), &long, "name"),
			Err(PersistenceError::InvalidData { .. })
		));
	}
}
