mod cancellable;
mod controller;
mod model;
mod reducer;
mod scheduler;
mod state;
mod submit;
mod validation;
pub mod validators;
mod value;


pub use calmform_derive::FormModel;
pub use cancellable::{CancelHandle, Cancellable, TaskError, TimedOut, cancellable, timeout};
pub use controller::{
    FieldOptions, FormController, FormError, FormId, FormOptions, FormResult, SubscriptionId,
};
pub use model::{FieldLens, FormModel, ModelError, model_field};
pub use reducer::{Action, reduce};
pub use scheduler::{Generation, ValidationOutcome, ValidationPass};
pub use state::{
    Field, FieldFunctions, FieldKey, FieldMeta, FieldValues, Fields, FormState, FormatFn,
    RegistrationPolicy, SharedValidator, ValueFn,
};
pub use submit::{SubmitError, SubmitEvent, SubmitFuture, SubmitOutcome};
pub use validation::{
    BoxedValidationFuture, Validation, ValidationError, Validator, ValidatorFault, WithTimeout,
    with_timeout,
};
pub use validators::Message;
pub use value::{FieldValue, FromValue, Value, ValueError};
