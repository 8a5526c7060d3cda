pub mod object;
pub mod wrapper;

pub use object::{Accessor, Export, Getter, Method, MethodFn, Object, Setter, Slot, SlotSnapshot, WrapRecord};
pub use wrapper::{unwrap_method, wrap_deprecated, wrap_export, wrap_method};
