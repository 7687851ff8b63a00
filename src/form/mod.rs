mod controller;
mod poll;
mod validation;


pub use calmform_derive::FormField;
pub use controller::{
    FieldState, FormData, FormError, FormManager, FormOptions, FormResult, FormSnapshot,
    FormStatus,
};
pub use poll::{BoxedTask, PollTicket, Spawner, ThreadSpawner};
pub use validation::{FormField, ValidationSchema, Validator, ValidatorDescriptor};
