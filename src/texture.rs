use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use image::{ImageBuffer, ImageError, Rgba};
use lazy_static::lazy_static;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
	#[error("Texture of {width}x{height} needs {expected} bytes of RGBA data, got {got}")]
	SizeMismatch {
		width: u32,
		height: u32,
		expected: usize,
		got: usize,
	},
	#[error("Could not decode texture")]
	Decode(
		#[from]
		#[source]
		ImageError,
	),
	#[error("Could not load {path:?}: {source}")]
	Load {
		path: String,
		#[source]
		source: io::Error,
	},
	#[error("No resource loader is installed, cannot load {0:?}")]
	NoLoader(String),
}

/// RGBA8 pixel data, shared between nodes as `Arc<Texture>`.
#[derive(Clone, PartialEq, Eq)]
pub struct Texture {
	path: Option<String>,
	pixels: Vec<u8>,
	width: u32,
	height: u32,
}

impl Texture {
	pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, TextureError> {
		let expected = width as usize * height as usize * 4;
		if pixels.len() != expected {
			return Err(TextureError::SizeMismatch {
				width,
				height,
				expected,
				got: pixels.len(),
			});
		}
		Ok(Self {
			path: None,
			pixels,
			width,
			height,
		})
	}

	/// Decodes any format the `image` crate is built with.
	pub fn decode(bytes: &[u8]) -> Result<Self, TextureError> {
		let img_buf = image::load_from_memory(bytes)?;
		Ok(Texture::from(img_buf.into_rgba8()))
	}

	/// A 1x1 opaque white texture.
	pub fn white() -> Self {
		Self {
			path: None,
			pixels: vec![255; 4],
			width: 1,
			height: 1,
		}
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	/// Where the texture was loaded from. `None` for in-memory textures.
	pub fn path(&self) -> Option<&str> {
		self.path.as_deref()
	}

	pub fn pixels(&self) -> &[u8] {
		&self.pixels
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}
}

impl From<ImageBuffer<Rgba<u8>, Vec<u8>>> for Texture {
	fn from(value: ImageBuffer<Rgba<u8>, Vec<u8>>) -> Self {
		Self {
			path: None,
			width: value.width(),
			height: value.height(),
			pixels: value.into_raw(),
		}
	}
}

impl std::fmt::Debug for Texture {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Texture")
			.field("path", &self.path)
			.field("width", &self.width)
			.field("height", &self.height)
			.finish()
	}
}

/// Raw file access, provided by the host.
pub trait ResourceLoader: Send {
	fn load_bytes(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Path-keyed texture cache.
///
/// Entries are weak: a texture lives as long as some node holds it, and is loaded again after that.
#[derive(Default)]
pub struct ResourceCache {
	loader: Option<Box<dyn ResourceLoader>>,
	textures: HashMap<String, Weak<Texture>>,
}

impl ResourceCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_loader(&mut self, loader: Box<dyn ResourceLoader>) {
		self.loader = Some(loader);
	}

	/// Returns the live texture for `path`, loading and decoding it if there is none.
	pub fn load_texture(&mut self, path: &str) -> Result<Arc<Texture>, TextureError> {
		if let Some(texture) = self.textures.get(path).and_then(Weak::upgrade) {
			return Ok(texture);
		}

		let loader = self
			.loader
			.as_ref()
			.ok_or_else(|| TextureError::NoLoader(path.to_owned()))?;
		let bytes = loader.load_bytes(path).map_err(|source| TextureError::Load {
			path: path.to_owned(),
			source,
		})?;
		let texture = Arc::new(Texture::decode(&bytes)?.with_path(path));
		debug!(
			"Loaded texture {:?} ({}x{})",
			path,
			texture.width(),
			texture.height()
		);

		self.textures.insert(path.to_owned(), Arc::downgrade(&texture));
		Ok(texture)
	}

	/// Makes an already decoded texture resolvable by its path.
	pub fn insert(&mut self, texture: &Arc<Texture>) {
		match texture.path() {
			Some(path) => {
				self.textures.insert(path.to_owned(), Arc::downgrade(texture));
			}
			None => warn!("Ignoring insertion of a texture without a path into the resource cache"),
		}
	}

	/// Number of textures still alive.
	pub fn live_count(&self) -> usize {
		self.textures.values().filter(|t| t.strong_count() > 0).count()
	}

	/// Forgets entries whose texture was dropped.
	pub fn purge(&mut self) {
		self.textures.retain(|_, t| t.strong_count() > 0);
	}
}

impl std::fmt::Debug for ResourceCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResourceCache")
			.field("has_loader", &self.loader.is_some())
			.field("textures", &self.textures.keys().collect::<Vec<_>>())
			.finish()
	}
}

lazy_static! {
	static ref RESOURCES: Mutex<ResourceCache> = Mutex::new(ResourceCache::new());
	static ref DEFAULT_TEXTURE: Arc<Texture> = Arc::new(Texture::white());
}

/// The process-wide resource cache.
pub fn resources() -> MutexGuard<'static, ResourceCache> {
	// the cache holds no invariant a panicking holder could break
	RESOURCES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared fallback for sprites without a usable texture.
pub fn default_texture() -> Arc<Texture> {
	Arc::clone(&DEFAULT_TEXTURE)
}
