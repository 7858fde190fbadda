use std::cell::Cell;

use glam::{Affine2, Mat4};

use crate::math::transform::{TransformOffset2D, TransformOffset3D};

/// Lazily resolved global transform, generic over the dimension.
pub(crate) trait SpatialCache {
	type Global: Copy;
	const IDENTITY: Self::Global;

	fn cached(&self) -> Option<Self::Global>;
	fn compose(&self, parent: Self::Global) -> Self::Global;
	fn store(&self, global: Self::Global);
}

macro_rules! transform_cache {
	($name:ident, $offset:ty, $global:ty, $identity:expr, $to_global:ident) => {
		/// Local transform plus the lazily recomputed global transform derived from it.
		///
		/// The cache only tracks its own dirty flag; marking descendants is the tree's job.
		#[derive(Debug, Clone)]
		pub struct $name {
			local: $offset,
			global: Cell<$global>,
			dirty: Cell<bool>,
			recomputes: Cell<u32>,
		}

		impl Default for $name {
			fn default() -> Self {
				Self::new(<$offset>::default())
			}
		}

		impl $name {
			pub fn new(local: $offset) -> Self {
				Self {
					local,
					global: Cell::new($identity),
					dirty: Cell::new(true),
					recomputes: Cell::new(0),
				}
			}

			pub fn local(&self) -> &$offset {
				&self.local
			}

			pub fn set_local(&mut self, local: $offset) {
				self.local = local;
				self.dirty.set(true);
			}

			pub(crate) fn mark_dirty(&self) {
				self.dirty.set(true);
			}

			pub fn is_dirty(&self) -> bool {
				self.dirty.get()
			}

			/// The global transform, unless it is stale.
			pub fn cached(&self) -> Option<$global> {
				(!self.dirty.get()).then(|| self.global.get())
			}

			/// How many times the global transform was recomputed.
			pub fn recompute_count(&self) -> u32 {
				self.recomputes.get()
			}
		}

		impl SpatialCache for $name {
			type Global = $global;
			const IDENTITY: $global = $identity;

			fn cached(&self) -> Option<$global> {
				$name::cached(self)
			}

			fn compose(&self, parent: $global) -> $global {
				parent * self.local.$to_global()
			}

			fn store(&self, global: $global) {
				self.global.set(global);
				self.dirty.set(false);
				self.recomputes.set(self.recomputes.get() + 1);
			}
		}
	};
}

transform_cache!(TransformCache2D, TransformOffset2D, Affine2, Affine2::IDENTITY, to_affine);
transform_cache!(TransformCache3D, TransformOffset3D, Mat4, Mat4::IDENTITY, to_matrix);
