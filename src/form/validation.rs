use std::borrow::Cow;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;

use super::cancellable::timeout;
use super::state::{Field, Fields};

pub trait ValidationError: Clone + Debug + Send + Sync + 'static {
    fn message(&self) -> Cow<'_, str>;
}

impl ValidationError for String {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl ValidationError for &'static str {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

/// Unexpected validator failure. Never treated as a validation error.
#[derive(Debug, Error)]
pub enum ValidatorFault {
    #[error("{0}")]
    Message(String),
    #[error("validator failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ValidatorFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn from_error(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Source(error.into())
    }
}

pub type BoxedValidationFuture<E> = BoxFuture<'static, Result<Option<E>, ValidatorFault>>;

/// Result of invoking a validator against a field.
pub enum Validation<E> {
    Pass,
    Fail(E),
    Pending(BoxedValidationFuture<E>),
    Fault(ValidatorFault),
}

impl<E> Validation<E> {
    pub fn pending<F>(task: F) -> Self
    where
        F: Future<Output = Result<Option<E>, ValidatorFault>> + Send + 'static,
    {
        Self::Pending(task.boxed())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Validation::Pending(_))
    }
}

impl<E> From<Option<E>> for Validation<E> {
    fn from(error: Option<E>) -> Self {
        error.map_or(Validation::Pass, Validation::Fail)
    }
}

impl<E> From<Result<(), E>> for Validation<E> {
    fn from(result: Result<(), E>) -> Self {
        result.err().into()
    }
}

impl<E: Debug> Debug for Validation<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Validation::Pass => f.write_str("Pass"),
            Validation::Fail(error) => f.debug_tuple("Fail").field(error).finish(),
            Validation::Pending(_) => f.write_str("Pending"),
            Validation::Fault(fault) => f.debug_tuple("Fault").field(fault).finish(),
        }
    }
}

/// Validator contract: `(field, all_fields) -> pass | error | pending`.
///
/// Implementations receive snapshots and must not call back into the
/// controller that runs them.
pub trait Validator<V, E>: Send + Sync {
    fn validate(&self, field: &Field<V, E>, fields: &Fields<V, E>) -> Validation<E>;
}

impl<V, E, F> Validator<V, E> for F
where
    F: Fn(&Field<V, E>, &Fields<V, E>) -> Validation<E> + Send + Sync,
{
    fn validate(&self, field: &Field<V, E>, fields: &Fields<V, E>) -> Validation<E> {
        (self)(field, fields)
    }
}

/// Races the pending result of `inner` against a timer.
#[derive(Clone, Debug)]
pub struct WithTimeout<T, E> {
    inner: T,
    limit: Duration,
    error: E,
}

impl<V, E, T> Validator<V, E> for WithTimeout<T, E>
where
    T: Validator<V, E>,
    E: ValidationError,
{
    fn validate(&self, field: &Field<V, E>, fields: &Fields<V, E>) -> Validation<E> {
        match self.inner.validate(field, fields) {
            Validation::Pending(task) => {
                let limit = self.limit;
                let error = self.error.clone();
                Validation::pending(async move {
                    match timeout(task, limit).await {
                        Ok(result) => result,
                        Err(_) => Ok(Some(error)),
                    }
                })
            }
            settled => settled,
        }
    }
}

/// Reports `error` when the validator's pending result does not settle
/// within `limit`. Synchronous results pass through untouched.
pub fn with_timeout<T, E>(inner: T, limit: Duration, error: E) -> WithTimeout<T, E> {
    WithTimeout {
        inner,
        limit,
        error,
    }
}
