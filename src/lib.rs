pub mod config;
pub mod formats;
pub mod math;
pub mod node;
pub mod physics;
pub mod reflect;
pub mod render;
pub mod signal;
pub mod texture;

pub use config::{InputOrder, TreeConfig};
pub use node::tree::{NodeTree, SceneError, StructuralError};
pub use node::{DrawContext, InputEvent, Lifecycle, NodeContext, NodeUuid, SceneObject};
pub use reflect::{TypeRegistry, Variant, VariantKind};
pub use signal::Signal;
