pub mod form;
pub mod prelude;

pub use form::{FormField, FormManager, FormOptions, ValidationSchema, ValidatorDescriptor};
