use crate::formats::json::{JsonError, JsonObject};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Could not parse tree config\n  - {0}")]
	Parse(#[from] json::Error),
	#[error("Invalid tree config\n  - {0}")]
	Json(#[from] JsonError),
	#[error("Unknown input order {0:?}, expected \"reverse_draw\" or \"draw\"")]
	UnknownInputOrder(String),
	#[error("max_flush_passes must be at least 1")]
	NoFlushPasses,
}

/// Order in which input handlers are offered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputOrder {
	/// Topmost drawn node first.
	#[default]
	ReverseDraw,
	Draw,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeConfig {
	pub input_order: InputOrder,
	/// Deferred operations may queue more operations. This bounds how many batches one flush
	/// applies; the rest waits for the next flush.
	pub max_flush_passes: u32,
	/// Log every enter/exit hook at `debug` instead of `trace`.
	pub log_lifecycle: bool,
}

impl Default for TreeConfig {
	fn default() -> Self {
		Self {
			input_order: InputOrder::ReverseDraw,
			max_flush_passes: 16,
			log_lifecycle: false,
		}
	}
}

impl TreeConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_input_order(mut self, input_order: InputOrder) -> Self {
		self.input_order = input_order;
		self
	}

	/// At least one pass is always made.
	pub fn with_max_flush_passes(mut self, max_flush_passes: u32) -> Self {
		self.max_flush_passes = max_flush_passes.max(1);
		self
	}

	pub fn with_log_lifecycle(mut self, log_lifecycle: bool) -> Self {
		self.log_lifecycle = log_lifecycle;
		self
	}

	/// Parses a JSON document. Missing keys keep their default.
	pub fn from_json(text: &str) -> Result<Self, ConfigError> {
		let doc = json::parse(text)?;
		let obj = JsonObject::from_value(&doc)?;
		let mut config = Self::default();

		if obj.has("input_order") {
			config.input_order = match obj.get_str("input_order")? {
				"reverse_draw" => InputOrder::ReverseDraw,
				"draw" => InputOrder::Draw,
				other => return Err(ConfigError::UnknownInputOrder(other.to_owned())),
			};
		}
		if obj.has("max_flush_passes") {
			config.max_flush_passes = obj.get_u32("max_flush_passes")?;
			if config.max_flush_passes == 0 {
				return Err(ConfigError::NoFlushPasses);
			}
		}
		if obj.has("log_lifecycle") {
			config.log_lifecycle = obj.get_bool("log_lifecycle")?;
		}
		Ok(config)
	}
}
