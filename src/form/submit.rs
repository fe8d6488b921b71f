use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, warn};

use super::controller::{FormController, FormError, FormResult, read_lock, write_lock};
use super::reducer::Action;
use super::scheduler::{Dispatch, ValidationOutcome};
use super::state::{FieldKey, FieldValues, FormState};
use super::validation::ValidationError;
use super::value::FieldValue;

/// Rejection of a submit callback.
#[derive(Debug, Error)]
pub enum SubmitError<E> {
    /// Per-field errors; merged into the form state and not returned as an error.
    #[error("submission rejected for {} field(s)", .0.len())]
    Fields(BTreeMap<FieldKey, Vec<E>>),
    #[error("submission failed")]
    Fatal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl<E> SubmitError<E> {
    pub fn fatal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Fatal(error.into())
    }

    pub fn field(key: impl Into<FieldKey>, error: E) -> Self {
        Self::Fields(BTreeMap::from([(key.into(), vec![error])]))
    }

    pub fn fields<K, I>(errors: I) -> Self
    where
        K: Into<FieldKey>,
        I: IntoIterator<Item = (K, E)>,
    {
        let mut by_key: BTreeMap<FieldKey, Vec<E>> = BTreeMap::new();
        for (key, error) in errors {
            by_key.entry(key.into()).or_default().push(error);
        }
        Self::Fields(by_key)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    /// The callback ran and resolved.
    Submitted,
    /// At least one field was invalid after touch-all validation; the callback
    /// was not called.
    Invalid,
    /// A newer validation pass started while waiting; the callback was not called.
    Superseded,
    /// The callback rejected with field errors, which are now in the state.
    Rejected,
    /// No submit callback is registered.
    NoHandler,
}

/// Host event whose default behavior a submission suppresses.
pub trait SubmitEvent {
    fn prevent_default(&mut self);
}

pub type SubmitFuture<E> = BoxFuture<'static, Result<(), SubmitError<E>>>;

pub(super) type SubmitHandlerFn<V, E> =
    Arc<dyn Fn(FieldValues<V>, FormState<V, E>) -> SubmitFuture<E> + Send + Sync>;

impl<V, E> FormController<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    /// Stores the submit callback, replacing any previous one.
    pub fn register_submit<F, Fut>(&self, on_submit: F) -> FormResult<()>
    where
        F: Fn(FieldValues<V>, FormState<V, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SubmitError<E>>> + Send + 'static,
    {
        let handler: SubmitHandlerFn<V, E> =
            Arc::new(move |values, state| on_submit(values, state).boxed());
        *write_lock(&self.submit, "registering submit callback")? = Some(handler);
        debug!(form = self.id.0, "submit callback registered");
        self.dispatch(Action::RegisterSubmit)
    }

    /// Touches every field, waits for validation and calls the submit
    /// callback when the form is valid.
    pub async fn handle_submit(&self) -> FormResult<SubmitOutcome> {
        let Some(handler) = self.submit_handler()? else {
            debug!(form = self.id.0, "submit ignored without callback");
            return Ok(SubmitOutcome::NoHandler);
        };

        debug!(form = self.id.0, "submit started");
        let outcome = self.handle_touch_all()?.await?;
        if outcome == ValidationOutcome::Superseded {
            debug!(form = self.id.0, "submit abandoned for newer validation");
            return Ok(SubmitOutcome::Superseded);
        }
        if !self.is_valid()? {
            debug!(form = self.id.0, "submit aborted on invalid fields");
            return Ok(SubmitOutcome::Invalid);
        }

        let state = self.state()?;
        let values = state.fields.values();
        match handler(values, state).await {
            Ok(()) => {
                debug!(form = self.id.0, "submit done");
                Ok(SubmitOutcome::Submitted)
            }
            Err(SubmitError::Fields(errors)) => {
                self.inject_errors(errors)?;
                Ok(SubmitOutcome::Rejected)
            }
            Err(SubmitError::Fatal(source)) => Err(FormError::Submit(source)),
        }
    }

    /// Like [`handle_submit`](Self::handle_submit), suppressing the event's
    /// default behavior first.
    pub async fn handle_submit_event<Ev>(&self, event: &mut Ev) -> FormResult<SubmitOutcome>
    where
        Ev: SubmitEvent + ?Sized,
    {
        event.prevent_default();
        self.handle_submit().await
    }

    fn submit_handler(&self) -> FormResult<Option<SubmitHandlerFn<V, E>>> {
        Ok(read_lock(&self.submit, "reading submit callback")?.clone())
    }

    /// Appends callback-reported errors outside the reducer.
    fn inject_errors(&self, errors: BTreeMap<FieldKey, Vec<E>>) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "merging submit errors")?;
            for (key, field_errors) in errors {
                let Some(field) = state.fields.get_mut(key.as_str()) else {
                    debug!(form = self.id.0, field = %key, "dropping submit error for unknown field");
                    continue;
                };
                warn!(
                    form = self.id.0,
                    field = %key,
                    errors = field_errors.len(),
                    "submit callback rejected field"
                );
                if !field_errors.is_empty() {
                    field.errors.extend(field_errors);
                    field.meta.set_validity(false);
                }
            }
            self.revision.fetch_add(1, Ordering::SeqCst);
        }
        self.notify()
    }
}
