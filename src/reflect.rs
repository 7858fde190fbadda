/*!
Runtime type information for scene objects.

Every concrete object class is described once by a [`ClassDescriptor`]: its
superclass, named properties, invocable methods and signals. Lookups on a
class walk its descriptor first and then its ancestors, so a generic driver
(inspector, console, the persistence layer) can operate on any object
through one interface.
*/

mod registry;
mod variant;

pub use registry::{
	arg, downcast, downcast_mut, extract, ClassDescriptor, CustomFields, MethodInfo, PropertyInfo, ReflectionError,
	SignalInfo, TypeRegistry,
};
pub use variant::{FromVariant, Variant, VariantKind};

pub(crate) use registry::{level, level_mut};
