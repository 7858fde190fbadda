use glam::Vec2;

/// Opaque handle to a body owned by the physics world.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
#[repr(transparent)]
pub struct BodyHandle(pub u64);

/// What a body is registered with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
	/// World-space position
	pub position: Vec2,
	pub rotation: f32,
	pub mass: f32,
	pub half_extents: Vec2,
}

/// Simulated state read back after each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
	/// World-space position
	pub position: Vec2,
	pub rotation: f32,
	pub velocity: Vec2,
}

/// External simulation. The tree only wires bodies in and out of it and reads their state back.
pub trait PhysicsWorld2D {
	fn add_body(&mut self, desc: BodyDesc) -> BodyHandle;
	fn remove_body(&mut self, handle: BodyHandle);
	/// `None` for a handle the world does not know.
	fn body_state(&self, handle: BodyHandle) -> Option<BodyState>;
}
