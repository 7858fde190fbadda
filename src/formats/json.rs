//! Typed accessors over `json` objects.

use json::JsonValue;

pub type JsonResult<T> = Result<T, JsonError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum JsonError {
	#[error("Key {0:?} does not exist")]
	KeyDoesNotExist(String),
	#[error("Value at {0:?} is not an object")]
	ValueIsNotObject(String),
	#[error("Value at {0:?} is not a string")]
	ValueIsNotString(String),
	#[error("Value at {0:?} is not a number")]
	ValueIsNotNumber(String),
	#[error("Value at {0:?} is not a bool")]
	ValueIsNotBool(String),
	#[error("Error while parsing int at {0:?}\n  - number out of scope")]
	ParseIntError(String),
}

pub struct JsonObject<'a>(pub &'a json::object::Object);

impl<'a> JsonObject<'a> {
	/// Wraps the root of a document, which must be an object.
	pub fn from_value(value: &'a JsonValue) -> JsonResult<Self> {
		match value {
			JsonValue::Object(obj) => Ok(JsonObject(obj)),
			_ => Err(JsonError::ValueIsNotObject("(root)".to_owned())),
		}
	}

	fn get(&self, key: &str) -> JsonResult<&JsonValue> {
		match self.0.get(key) {
			Some(value) => Ok(value),
			None => Err(JsonError::KeyDoesNotExist(key.to_owned())),
		}
	}

	pub fn has(&self, key: &str) -> bool {
		self.0.get(key).is_some()
	}

	pub fn get_str(&self, key: &str) -> JsonResult<&str> {
		match self.get(key)?.as_str() {
			Some(val) => Ok(val),
			None => Err(JsonError::ValueIsNotString(key.to_owned())),
		}
	}

	fn get_number(&self, key: &str) -> JsonResult<json::number::Number> {
		match self.get(key)?.as_number() {
			Some(val) => Ok(val),
			None => Err(JsonError::ValueIsNotNumber(key.to_owned())),
		}
	}

	pub fn get_u32(&self, key: &str) -> JsonResult<u32> {
		self.get_number(key)?
			.try_into()
			.map_err(|_| JsonError::ParseIntError(key.to_owned()))
	}

	pub fn get_bool(&self, key: &str) -> JsonResult<bool> {
		match self.get(key)?.as_bool() {
			Some(val) => Ok(val),
			None => Err(JsonError::ValueIsNotBool(key.to_owned())),
		}
	}
}
