use glam::{Affine2, Mat4, Quat, Vec2, Vec3};

/// Relative transform of a 2D node.
///
/// Composition order is fixed: scale, then rotate, then translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformOffset2D {
	/// X Y
	pub translation: Vec2,
	/// Counter-clockwise, in radians
	pub rotation: f32,
	/// X Y zoom
	pub scale: Vec2,
}

impl Default for TransformOffset2D {
	fn default() -> Self {
		Self {
			translation: Vec2::ZERO,
			rotation: 0.,
			scale: Vec2::ONE,
		}
	}
}

impl TransformOffset2D {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_translation(mut self, translation: Vec2) -> Self {
		self.translation = translation;
		self
	}

	pub fn with_rotation(mut self, rotation: f32) -> Self {
		self.rotation = rotation;
		self
	}

	pub fn with_scale(mut self, scale: Vec2) -> Self {
		self.scale = scale;
		self
	}

	pub fn to_affine(&self) -> Affine2 {
		Affine2::from_scale_angle_translation(self.scale, self.rotation, self.translation)
	}
}

/// Relative transform of a 3D node, decomposed as translation/quaternion/scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformOffset3D {
	pub translation: Vec3,
	pub rotation: Quat,
	pub scale: Vec3,
}

impl Default for TransformOffset3D {
	fn default() -> Self {
		Self {
			translation: Vec3::ZERO,
			rotation: Quat::IDENTITY,
			scale: Vec3::ONE,
		}
	}
}

impl TransformOffset3D {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_translation(mut self, translation: Vec3) -> Self {
		self.translation = translation;
		self
	}

	pub fn with_rotation(mut self, rotation: Quat) -> Self {
		self.rotation = rotation;
		self
	}

	pub fn with_scale(mut self, scale: Vec3) -> Self {
		self.scale = scale;
		self
	}

	pub fn to_matrix(&self) -> Mat4 {
		Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
	}
}
