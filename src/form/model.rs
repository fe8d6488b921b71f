use std::future::Future;

use thiserror::Error;
use tracing::debug;

use super::controller::{FieldOptions, FormController, FormError, FormResult, read_lock};
use super::scheduler::ValidationPass;
use super::state::{FieldKey, FieldValues, FormState, RegistrationPolicy};
use super::submit::SubmitError;
use super::validation::ValidationError;
use super::value::{FromValue, Value, ValueError};

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ModelError {
    #[error("field `{0}` is missing from the form values")]
    Missing(FieldKey),
    #[error("field `{key}` holds an unexpected value")]
    Invalid {
        key: FieldKey,
        #[source]
        source: ValueError,
    },
}

/// A struct whose named fields map one-to-one onto form fields.
///
/// Implemented by `#[derive(FormModel)]`.
pub trait FormModel: Sized + Send + 'static {
    type Fields;

    fn fields() -> Self::Fields;

    /// Keys in declaration order.
    fn field_keys() -> Vec<FieldKey>;

    fn field_label(key: &str) -> Option<&'static str> {
        let _ = key;
        None
    }

    fn into_values(self) -> Vec<(FieldKey, Value)>;

    fn from_values(values: &FieldValues<Value>) -> Result<Self, ModelError>;
}

/// Typed handle on one field of a [`FormModel`].
pub trait FieldLens: Copy {
    type Model: FormModel;
    type Value;

    fn key(self) -> FieldKey;

    fn get(self, model: &Self::Model) -> &Self::Value;

    fn set(self, model: &mut Self::Model, value: Self::Value);
}

/// Decodes one model field. Used by the derive expansion.
pub fn model_field<T>(values: &FieldValues<Value>, key: &str) -> Result<T, ModelError>
where
    T: FromValue,
{
    let value = values
        .get(key)
        .ok_or_else(|| ModelError::Missing(FieldKey::from(key)))?;
    T::from_value(value).map_err(|source| ModelError::Invalid {
        key: FieldKey::from(key),
        source,
    })
}

impl<E> FormController<Value, E>
where
    E: ValidationError,
{
    /// Registers every field of `model` in declaration order, then starts a
    /// single validation pass. Under [`RegistrationPolicy::Reject`] a key
    /// that is already registered fails the call before any field is added.
    pub fn register_model<M>(
        &self,
        model: M,
        mut options: impl FnMut(&FieldKey) -> FieldOptions<Value, E>,
    ) -> FormResult<ValidationPass>
    where
        M: FormModel,
    {
        debug!(form = self.id.0, model = std::any::type_name::<M>(), "registering model");
        let values = model.into_values();
        if self.options.registration == RegistrationPolicy::Reject {
            let state = read_lock(&self.state, "checking model registration")?;
            if let Some((key, _)) = values
                .iter()
                .find(|(key, _)| state.fields.contains(key.as_str()))
            {
                return Err(FormError::DuplicateField(key.clone()));
            }
        }

        let mut inserted = false;
        for (key, value) in values {
            let field_options = options(&key);
            let label = M::field_label(key.as_str()).map(str::to_string);
            inserted |= self.insert_field(key, label, value, field_options)?;
        }
        if !inserted {
            return Ok(ValidationPass::idle());
        }
        self.dispatch_registered()
    }

    /// Registers a submit callback receiving the decoded model.
    pub fn register_model_submit<M, F, Fut>(&self, on_submit: F) -> FormResult<()>
    where
        M: FormModel,
        F: Fn(M, FormState<Value, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SubmitError<E>>> + Send + 'static,
    {
        self.register_submit(move |values, state| {
            let decoded = M::from_values(&values);
            let submitted = decoded.map(|model| on_submit(model, state));
            async move {
                match submitted {
                    Ok(task) => task.await,
                    Err(error) => Err(SubmitError::fatal(error)),
                }
            }
        })
    }

    /// Decodes the current field values into `M`.
    pub fn model<M>(&self) -> FormResult<M>
    where
        M: FormModel,
    {
        Ok(M::from_values(&self.field_values()?)?)
    }

    pub fn lens_value<L>(&self, lens: L) -> FormResult<L::Value>
    where
        L: FieldLens,
        L::Value: FromValue,
    {
        let key = lens.key();
        let values = self.field_values()?;
        Ok(model_field(&values, key.as_str())?)
    }

    pub fn handle_lens_change<L>(&self, lens: L, value: L::Value) -> FormResult<ValidationPass>
    where
        L: FieldLens,
        L::Value: Into<Value>,
    {
        self.handle_change(lens.key().as_str(), value.into())
    }
}
