use glam::{Affine2, Mat4, Vec2, Vec4};

use crate::texture::Texture;

/// Blending of a textured quad with what is already drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
	/// Normal blending mode.
	#[default]
	Normal,
	/// Multiply blending mode.
	Multiply,
	/// Color Dodge.
	ColorDodge,
	/// Linear Dodge.
	LinearDodge,
	/// Screen.
	Screen,
	/// Clip to Lower.
	/// Special blending mode that clips the drawable
	/// to a lower rendered area.
	ClipToLower,
	/// Slice from Lower.
	/// Special blending mode that slices the drawable
	/// via a lower rendered area.
	/// (Basically inverse ClipToLower.)
	SliceFromLower,
}

impl BlendMode {
	pub const VALUES: [BlendMode; 7] = [
		BlendMode::Normal,
		BlendMode::Multiply,
		BlendMode::ColorDodge,
		BlendMode::LinearDodge,
		BlendMode::Screen,
		BlendMode::ClipToLower,
		BlendMode::SliceFromLower,
	];

	pub fn from_index(index: i64) -> Option<Self> {
		usize::try_from(index).ok().and_then(|i| Self::VALUES.get(i).copied())
	}

	pub fn index(self) -> i64 {
		self as i64
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2DState {
	/// World to view.
	pub view: Affine2,
	pub zoom: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera3DState {
	/// World to view.
	pub view: Mat4,
	/// Vertical field of view, in radians
	pub fov_y: f32,
}

/// Whatever the tree draws into.
///
/// The tree never issues GPU commands itself. An implementor may be:
/// - a real renderer batching the primitives,
/// - a debug renderer intercepting draw calls for other purposes.
///
/// The tree saves the camera state before drawing a node and restores it after the node's
/// subtree, so a camera only affects its own descendants and later siblings never see it.
pub trait RenderTarget {
	/// Draw a `size` quad centered at the origin of `transform`.
	fn draw_textured_quad(&mut self, texture: &Texture, transform: Affine2, size: Vec2, tint: Vec4, blend: BlendMode);
	fn draw_rect(&mut self, transform: Affine2, size: Vec2, color: Vec4);
	/// Meshes are opaque resource names to the tree.
	fn draw_mesh(&mut self, mesh: &str, transform: Mat4);

	fn camera_2d(&self) -> Option<Camera2DState>;
	fn set_camera_2d(&mut self, camera: Camera2DState);
	fn clear_camera_2d(&mut self);

	fn camera_3d(&self) -> Option<Camera3DState>;
	fn set_camera_3d(&mut self, camera: Camera3DState);
	fn clear_camera_3d(&mut self);
}

/// Camera state of a target at one point of the traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CameraState {
	cam_2d: Option<Camera2DState>,
	cam_3d: Option<Camera3DState>,
}

impl CameraState {
	pub fn capture(target: &dyn RenderTarget) -> Self {
		Self {
			cam_2d: target.camera_2d(),
			cam_3d: target.camera_3d(),
		}
	}

	pub fn restore(&self, target: &mut dyn RenderTarget) {
		if target.camera_2d() != self.cam_2d {
			match self.cam_2d {
				Some(camera) => target.set_camera_2d(camera),
				None => target.clear_camera_2d(),
			}
		}
		if target.camera_3d() != self.cam_3d {
			match self.cam_3d {
				Some(camera) => target.set_camera_3d(camera),
				None => target.clear_camera_3d(),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blend_mode_indices() {
		assert_eq!(BlendMode::from_index(4), Some(BlendMode::Screen));
		assert_eq!(BlendMode::SliceFromLower.index(), 6);
		assert_eq!(BlendMode::from_index(7), None);
		assert_eq!(BlendMode::from_index(-1), None);
	}
}
