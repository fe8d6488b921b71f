pub use crate::form::validators::{self, Message, parse, transform};
pub use crate::form::{
    FieldLens, FieldOptions, FormController, FormError, FormModel, FormOptions, FormResult,
    RegistrationPolicy, SubmitError, SubmitOutcome, Validation, ValidationError, ValidationOutcome,
    Validator, Value,
};
