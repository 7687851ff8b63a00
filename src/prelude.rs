pub use crate::form::{
    FieldState, FormData, FormError, FormField, FormManager, FormOptions, FormResult,
    FormSnapshot, FormStatus, Spawner, ThreadSpawner, ValidationSchema, Validator,
    ValidatorDescriptor,
};
