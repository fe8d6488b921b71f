use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, trace};

use super::model::ModelError;
use super::reducer::{Action, reduce};
use super::scheduler::{Dispatch, Generation, ValidationPass, ValidationScheduler};
use super::state::{
    Field, FieldFunctions, FieldKey, FieldValues, Fields, FormState, RegistrationPolicy,
};
use super::submit::SubmitHandlerFn;
use super::validation::{ValidationError, Validator, ValidatorFault};
use super::value::{FieldValue, Value};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub registration: RegistrationPolicy,
    pub validate_first_error_only: bool,
    pub validate_on_register: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            registration: RegistrationPolicy::Ignore,
            validate_first_error_only: false,
            validate_on_register: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("field `{0}` is not registered")]
    UnknownField(FieldKey),
    #[error("field `{0}` is already registered")]
    DuplicateField(FieldKey),
    #[error("validator for field `{key}` failed")]
    Validator {
        key: FieldKey,
        #[source]
        source: ValidatorFault,
    },
    #[error("submit callback failed")]
    Submit(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) type ListenerFn<V, E> = Arc<dyn Fn(&FormState<V, E>) + Send + Sync>;

/// Per-field normalization and validators passed to `register_field`.
pub struct FieldOptions<V, E> {
    functions: FieldFunctions<V, E>,
}

impl<V, E> FieldOptions<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    pub fn new() -> Self {
        Self {
            functions: FieldFunctions::default(),
        }
    }

    pub fn parse(mut self, parse: impl Fn(V) -> V + Send + Sync + 'static) -> Self {
        self.functions.parse = Arc::new(parse);
        self
    }

    pub fn transform(mut self, transform: impl Fn(V) -> V + Send + Sync + 'static) -> Self {
        self.functions.transform = Arc::new(transform);
        self
    }

    pub fn format(mut self, format: impl Fn(&V) -> V + Send + Sync + 'static) -> Self {
        self.functions.format = Arc::new(format);
        self
    }

    pub fn validator(mut self, validator: impl Validator<V, E> + 'static) -> Self {
        self.functions.validate.push(Arc::new(validator));
        self
    }

    pub fn validators(
        mut self,
        validators: impl IntoIterator<Item = Arc<dyn Validator<V, E>>>,
    ) -> Self {
        self.functions.validate.extend(validators);
        self
    }

    pub fn into_functions(self) -> FieldFunctions<V, E> {
        self.functions
    }
}

impl<V, E> Default for FieldOptions<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the form state and is the only place it is mutated.
///
/// Cloning is cheap and yields a handle to the same form.
#[derive(Clone)]
pub struct FormController<V = Value, E = String>
where
    V: FieldValue,
    E: ValidationError,
{
    pub(super) id: FormId,
    pub(super) options: FormOptions,
    pub(super) state: Arc<RwLock<FormState<V, E>>>,
    pub(super) revision: Arc<AtomicU64>,
    pub(super) scheduler: ValidationScheduler,
    pub(super) submit: Arc<RwLock<Option<SubmitHandlerFn<V, E>>>>,
    pub(super) listeners: Arc<RwLock<BTreeMap<SubscriptionId, ListenerFn<V, E>>>>,
    pub(super) next_subscription: Arc<AtomicU64>,
}

impl<V, E> FormController<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    pub fn new(options: FormOptions) -> Self {
        Self {
            id: FormId::next(),
            options,
            state: Arc::new(RwLock::new(FormState::new(options.registration))),
            revision: Arc::new(AtomicU64::new(0)),
            scheduler: ValidationScheduler::new(options.validate_first_error_only),
            submit: Arc::new(RwLock::new(None)),
            listeners: Arc::new(RwLock::new(BTreeMap::new())),
            next_subscription: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn form_id(&self) -> FormId {
        self.id
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn register_field(
        &self,
        key: impl Into<FieldKey>,
        label: Option<&str>,
        value: V,
        options: FieldOptions<V, E>,
    ) -> FormResult<ValidationPass> {
        let key = key.into();
        if !self.insert_field(key, label.map(str::to_string), value, options)? {
            return Ok(ValidationPass::idle());
        }
        self.dispatch_registered()
    }

    /// Dispatches `REGISTER_FIELD`; `false` when the registration was dropped.
    pub(super) fn insert_field(
        &self,
        key: FieldKey,
        label: Option<String>,
        value: V,
        options: FieldOptions<V, E>,
    ) -> FormResult<bool> {
        let exists = read_lock(&self.state, "checking field registration")?
            .fields
            .contains(key.as_str());
        if exists {
            match self.options.registration {
                RegistrationPolicy::Reject => return Err(FormError::DuplicateField(key)),
                RegistrationPolicy::Ignore => {
                    debug!(form = self.id.0, field = %key, "ignoring duplicate field registration");
                    return Ok(false);
                }
                RegistrationPolicy::Replace => {
                    debug!(form = self.id.0, field = %key, "replacing registered field");
                }
            }
        } else {
            debug!(form = self.id.0, field = %key, "registering field");
        }

        self.dispatch(Action::RegisterField {
            key,
            label,
            value,
            functions: options.into_functions(),
        })?;
        Ok(true)
    }

    pub(super) fn dispatch_registered(&self) -> FormResult<ValidationPass> {
        if self.options.validate_on_register {
            self.validate()
        } else {
            Ok(ValidationPass::idle())
        }
    }

    pub fn handle_change(&self, key: &str, value: V) -> FormResult<ValidationPass> {
        let (key, value) = {
            let state = read_lock(&self.state, "normalizing changed value")?;
            let field = known_field(&state.fields, key)?;
            (field.key.clone(), field.functions.normalize(value))
        };
        debug!(form = self.id.0, field = %key, value = ?value, "changing field value");
        self.dispatch(Action::ChangeFieldValue { key, value })?;
        self.validate()
    }

    /// Touching an already touched field dispatches nothing and starts no pass.
    /// The check and the touch share one write lock, so concurrent first
    /// touches dispatch once.
    pub fn handle_touch(&self, key: &str) -> FormResult<ValidationPass> {
        {
            let mut state = write_lock(&self.state, "touching field")?;
            let field = known_field(&state.fields, key)?;
            let key = field.key.clone();
            if field.meta.touched {
                trace!(form = self.id.0, field = %key, "field already touched");
                return Ok(ValidationPass::idle());
            }
            debug!(form = self.id.0, field = %key, "touching field");
            self.apply_locked(&mut state, Action::TouchField { key });
        }
        self.notify()?;
        self.validate()
    }

    pub fn handle_touch_all(&self) -> FormResult<ValidationPass> {
        debug!(form = self.id.0, "touching all fields");
        self.dispatch(Action::TouchAllFields)?;
        self.validate()
    }

    /// Resets one field. Outstanding validation results are discarded so they
    /// cannot land on the reset field.
    pub fn handle_reset_field(&self, key: &str) -> FormResult<()> {
        let key = {
            let state = read_lock(&self.state, "resetting field")?;
            known_field(&state.fields, key)?.key.clone()
        };
        debug!(form = self.id.0, field = %key, "resetting field");
        self.scheduler.cancel_all()?;
        self.dispatch(Action::ResetField { key })
    }

    pub fn handle_reset_form(&self) -> FormResult<()> {
        debug!(form = self.id.0, "resetting all fields");
        self.scheduler.cancel_all()?;
        self.dispatch(Action::ResetAllFields)
    }

    /// Explicit re-validation of the whole form.
    pub fn validate(&self) -> FormResult<ValidationPass> {
        self.scheduler.trigger(self)
    }

    pub fn cancel_validations(&self) -> FormResult<()> {
        let generation = self.scheduler.cancel_all()?;
        debug!(form = self.id.0, generation = generation.0, "validations canceled");
        Ok(())
    }

    pub fn generation(&self) -> FormResult<Generation> {
        self.scheduler.generation()
    }

    pub fn state(&self) -> FormResult<FormState<V, E>> {
        Ok(read_lock(&self.state, "creating form snapshot")?.clone())
    }

    pub fn field(&self, key: &str) -> FormResult<Option<Field<V, E>>> {
        Ok(read_lock(&self.state, "reading field")?
            .fields
            .get(key)
            .cloned())
    }

    pub fn formatted_value(&self, key: &str) -> FormResult<V> {
        let state = read_lock(&self.state, "formatting field value")?;
        Ok(known_field(&state.fields, key)?.formatted())
    }

    pub fn field_values(&self) -> FormResult<FieldValues<V>> {
        Ok(read_lock(&self.state, "collecting field values")?
            .fields
            .values())
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking form validity")?
            .fields
            .iter()
            .all(|field| !field.meta.invalid))
    }

    pub fn is_validating(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking validation progress")?
            .fields
            .iter()
            .any(|field| field.meta.validating))
    }

    pub fn is_submit_registered(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking submit registration")?.is_registered)
    }

    /// Number of state transitions applied so far.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// `listener` runs after every state change, outside the controller's locks.
    pub fn subscribe(
        &self,
        listener: impl Fn(&FormState<V, E>) + Send + Sync + 'static,
    ) -> FormResult<SubscriptionId> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        write_lock(&self.listeners, "subscribing listener")?.insert(id, Arc::new(listener));
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<bool> {
        Ok(write_lock(&self.listeners, "unsubscribing listener")?
            .remove(&id)
            .is_some())
    }

    fn apply_locked(&self, state: &mut FormState<V, E>, action: Action<V, E>) {
        let name = action.name();
        let current = std::mem::take(state);
        *state = reduce(current, action);
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(form = self.id.0, action = name, revision, "action applied");
    }

    pub(super) fn dispatch(&self, action: Action<V, E>) -> FormResult<()> {
        self.apply(action)?;
        self.notify()
    }
}

impl<V, E> Default for FormController<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    fn default() -> Self {
        Self::new(FormOptions::default())
    }
}

impl<V, E> Dispatch<V, E> for FormController<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    fn apply(&self, action: Action<V, E>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "applying action")?;
        self.apply_locked(&mut state, action);
        Ok(())
    }

    fn notify(&self) -> FormResult<()> {
        let listeners = read_lock(&self.listeners, "reading listeners")?
            .values()
            .cloned()
            .collect::<Vec<_>>();
        if listeners.is_empty() {
            return Ok(());
        }
        let snapshot = self.state()?;
        for listener in listeners {
            listener(&snapshot);
        }
        Ok(())
    }

    fn fields(&self) -> FormResult<Fields<V, E>> {
        Ok(read_lock(&self.state, "reading fields for validation")?
            .fields
            .clone())
    }
}

fn known_field<'a, V, E>(fields: &'a Fields<V, E>, key: &str) -> FormResult<&'a Field<V, E>>
where
    V: FieldValue,
    E: ValidationError,
{
    fields
        .get(key)
        .ok_or_else(|| FormError::UnknownField(FieldKey::from(key)))
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    context: &'static str,
) -> FormResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| FormError::StatePoisoned(context))
}
