use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tracing::{debug, trace};

use super::cancellable::{CancelHandle, Cancellable, TaskError, cancellable};
use super::controller::{FormError, FormResult, lock};
use super::reducer::Action;
use super::state::{FieldKey, Fields};
use super::validation::{BoxedValidationFuture, Validation, ValidationError, ValidatorFault};
use super::value::FieldValue;

/// Identifies one triggered validation pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Generation(pub u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationOutcome {
    /// Every validator of the pass settled and its results were applied.
    Settled,
    /// A newer pass started before this one settled; its results were discarded.
    Superseded,
}

/// Where the scheduler reads fields from and sends its actions to.
pub(super) trait Dispatch<V, E>: Clone + Send + Sync + 'static {
    fn apply(&self, action: Action<V, E>) -> FormResult<()>;
    fn notify(&self) -> FormResult<()>;
    fn fields(&self) -> FormResult<Fields<V, E>>;
}

#[derive(Default)]
struct SchedulerState {
    generation: Generation,
    outstanding: Vec<CancelHandle>,
    form: Option<CancelHandle>,
}

impl SchedulerState {
    fn cancel_outstanding(&mut self) {
        if !self.outstanding.is_empty() {
            debug!(
                count = self.outstanding.len(),
                "canceling outstanding field validations"
            );
        }
        for handle in self.outstanding.drain(..) {
            handle.cancel();
        }
        if let Some(handle) = self.form.take() {
            handle.cancel();
        }
    }
}

enum PassFailure {
    Canceled,
    Fault { key: FieldKey, source: ValidatorFault },
    Form(FormError),
}

type FieldTask<E> = Cancellable<BoxedValidationFuture<E>>;

#[derive(Clone)]
pub(super) struct ValidationScheduler {
    state: Arc<Mutex<SchedulerState>>,
    first_error_only: bool,
}

impl ValidationScheduler {
    pub(super) fn new(first_error_only: bool) -> Self {
        Self {
            state: Arc::default(),
            first_error_only,
        }
    }

    pub(super) fn generation(&self) -> FormResult<Generation> {
        Ok(lock(&self.state, "reading validation generation")?.generation)
    }

    /// Invalidates every outstanding pass without starting a new one.
    pub(super) fn cancel_all(&self) -> FormResult<Generation> {
        let mut scheduler = lock(&self.state, "canceling validations")?;
        scheduler.cancel_outstanding();
        scheduler.generation = scheduler.generation.next();
        Ok(scheduler.generation)
    }

    /// Starts a pass: runs synchronous validators inline, marks every field
    /// validating, cancels older passes and returns the pass driving the
    /// asynchronous ones.
    pub(super) fn trigger<V, E, D>(&self, target: &D) -> FormResult<ValidationPass>
    where
        V: FieldValue,
        E: ValidationError,
        D: Dispatch<V, E>,
    {
        let mut scheduler = lock(&self.state, "starting validation pass")?;
        let fields = target.fields()?;
        if fields.is_empty() {
            return Ok(ValidationPass::idle());
        }

        // A fault leaves the state and any older pass untouched.
        let mut sync_errors = BTreeMap::new();
        let mut results = Vec::with_capacity(fields.len());
        for field in fields.iter() {
            let mut errors = Vec::new();
            let mut tasks = Vec::new();
            for validator in &field.functions.validate {
                match validator.validate(field, &fields) {
                    Validation::Pass => {}
                    Validation::Fail(error) => errors.push(error),
                    Validation::Pending(task) => tasks.push(task),
                    Validation::Fault(source) => {
                        debug!(field = %field.key, "validator fault aborted validation pass");
                        return Err(FormError::Validator {
                            key: field.key.clone(),
                            source,
                        });
                    }
                }
                if self.first_error_only && !errors.is_empty() {
                    break;
                }
            }
            sync_errors.insert(field.key.clone(), errors);
            results.push((field.key.clone(), tasks));
        }

        target.apply(Action::SetValidating)?;
        scheduler.cancel_outstanding();
        scheduler.generation = scheduler.generation.next();
        let generation = scheduler.generation;
        debug!(
            generation = generation.0,
            fields = fields.len(),
            "validation pass started"
        );

        let mut settled = Vec::new();
        let mut pending = Vec::new();
        for (key, tasks) in results {
            if tasks.is_empty() {
                settled.push(key);
                continue;
            }
            let tasks = tasks
                .into_iter()
                .map(|task| {
                    let (task, handle) = cancellable(task);
                    scheduler.outstanding.push(handle);
                    task
                })
                .collect::<Vec<FieldTask<E>>>();
            pending.push((key, tasks));
        }

        target.apply(Action::SetErrors(sync_errors))?;
        for key in settled {
            target.apply(Action::FieldValidationDone { key })?;
        }

        let field_passes = pending
            .into_iter()
            .map(|(key, tasks)| {
                self.settle_field::<V, E, D>(generation, key, tasks, target.clone())
            })
            .collect::<Vec<_>>();
        let (aggregate, handle) =
            cancellable(future::try_join_all(field_passes).map(|result| result.map(drop)));
        scheduler.form = Some(handle);
        drop(scheduler);

        target.notify()?;
        Ok(ValidationPass::new(generation, aggregate))
    }

    fn settle_field<V, E, D>(
        &self,
        generation: Generation,
        key: FieldKey,
        tasks: Vec<FieldTask<E>>,
        target: D,
    ) -> BoxFuture<'static, Result<(), PassFailure>>
    where
        V: FieldValue,
        E: ValidationError,
        D: Dispatch<V, E>,
    {
        let scheduler = self.clone();
        async move {
            let results = tasks.into_iter().map(|task| {
                let scheduler = scheduler.clone();
                let target = target.clone();
                let key = key.clone();
                async move {
                    match task.await {
                        Ok(None) => Ok(()),
                        Ok(Some(error)) => scheduler
                            .dispatch_current::<V, E, D>(
                                generation,
                                &target,
                                Action::AddError { key, error },
                            )
                            .map(drop)
                            .map_err(PassFailure::Form),
                        Err(TaskError::Canceled) => Err(PassFailure::Canceled),
                        Err(TaskError::Failed(source)) => Err(PassFailure::Fault { key, source }),
                    }
                }
            });
            future::try_join_all(results).await?;

            trace!(generation = generation.0, field = %key, "field validation done");
            scheduler
                .dispatch_current::<V, E, D>(
                    generation,
                    &target,
                    Action::FieldValidationDone { key },
                )
                .map(drop)
                .map_err(PassFailure::Form)
        }
        .boxed()
    }

    /// Applies `action` only while `generation` is still the latest pass.
    fn dispatch_current<V, E, D>(
        &self,
        generation: Generation,
        target: &D,
        action: Action<V, E>,
    ) -> FormResult<bool>
    where
        V: FieldValue,
        E: ValidationError,
        D: Dispatch<V, E>,
    {
        {
            let scheduler = lock(&self.state, "applying validation result")?;
            if scheduler.generation != generation {
                trace!(
                    generation = generation.0,
                    latest = scheduler.generation.0,
                    action = action.name(),
                    "discarding stale validation result"
                );
                return Ok(false);
            }
            target.apply(action)?;
        }
        target.notify()?;
        Ok(true)
    }
}

/// Completion of one validation pass.
///
/// Synchronous results are applied before the pass is returned. Asynchronous
/// validators only make progress while the pass is polled; dropping it
/// abandons their results.
#[must_use = "asynchronous validators only run while the validation pass is polled"]
pub struct ValidationPass {
    generation: Option<Generation>,
    task: Option<BoxFuture<'static, FormResult<ValidationOutcome>>>,
}

impl ValidationPass {
    pub(super) fn idle() -> Self {
        Self {
            generation: None,
            task: None,
        }
    }

    fn new<F>(generation: Generation, aggregate: Cancellable<F>) -> Self
    where
        F: Future<Output = Result<(), PassFailure>> + Send + 'static,
    {
        let task = async move {
            match aggregate.await {
                Ok(()) => {
                    debug!(generation = generation.0, "validation pass settled");
                    Ok(ValidationOutcome::Settled)
                }
                Err(TaskError::Canceled | TaskError::Failed(PassFailure::Canceled)) => {
                    debug!(generation = generation.0, "validation pass superseded");
                    Ok(ValidationOutcome::Superseded)
                }
                Err(TaskError::Failed(PassFailure::Fault { key, source })) => {
                    Err(FormError::Validator { key, source })
                }
                Err(TaskError::Failed(PassFailure::Form(error))) => Err(error),
            }
        };
        Self {
            generation: Some(generation),
            task: Some(task.boxed()),
        }
    }

    /// `None` when the trigger did not start a pass (no fields, or a no-op).
    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }
}

impl Future for ValidationPass {
    type Output = FormResult<ValidationOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.task.as_mut() {
            Some(task) => task.as_mut().poll(cx),
            None => Poll::Ready(Ok(ValidationOutcome::Settled)),
        }
    }
}

impl std::fmt::Debug for ValidationPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPass")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
