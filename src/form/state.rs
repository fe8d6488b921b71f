use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use super::validation::{ValidationError, Validator};
use super::value::FieldValue;

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(Arc<str>);

impl FieldKey {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&FieldKey> for FieldKey {
    fn from(value: &FieldKey) -> Self {
        value.clone()
    }
}

/// Interaction and validity flags of a field.
///
/// `pristine`/`dirty`, `touched`/`untouched` and `valid`/`invalid` are always
/// negations of each other.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct FieldMeta {
    pub pristine: bool,
    pub dirty: bool,
    pub touched: bool,
    pub untouched: bool,
    pub valid: bool,
    pub invalid: bool,
    pub validating: bool,
}

impl FieldMeta {
    pub const INITIAL: Self = Self {
        pristine: true,
        dirty: false,
        touched: false,
        untouched: true,
        valid: true,
        invalid: false,
        validating: false,
    };

    pub(super) fn touch(&mut self) {
        self.pristine = false;
        self.dirty = true;
        self.touched = true;
        self.untouched = false;
    }

    pub(super) fn set_validity(&mut self, valid: bool) {
        self.valid = valid;
        self.invalid = !valid;
    }
}

impl Default for FieldMeta {
    fn default() -> Self {
        Self::INITIAL
    }
}

pub type ValueFn<V> = Arc<dyn Fn(V) -> V + Send + Sync>;
pub type FormatFn<V> = Arc<dyn Fn(&V) -> V + Send + Sync>;
pub type SharedValidator<V, E> = Arc<dyn Validator<V, E>>;

/// Normalization, display projection and validators attached to a field.
pub struct FieldFunctions<V, E> {
    pub parse: ValueFn<V>,
    pub transform: ValueFn<V>,
    pub format: FormatFn<V>,
    pub validate: Vec<SharedValidator<V, E>>,
}

impl<V, E> FieldFunctions<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    pub fn normalize(&self, raw: V) -> V {
        (self.transform)((self.parse)(raw))
    }

    pub fn format(&self, value: &V) -> V {
        (self.format)(value)
    }
}

impl<V, E> Default for FieldFunctions<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    fn default() -> Self {
        Self {
            parse: Arc::new(|value: V| value),
            transform: Arc::new(|value: V| value),
            format: Arc::new(|value: &V| value.clone()),
            validate: Vec::new(),
        }
    }
}

impl<V, E> Clone for FieldFunctions<V, E> {
    fn clone(&self) -> Self {
        Self {
            parse: self.parse.clone(),
            transform: self.transform.clone(),
            format: self.format.clone(),
            validate: self.validate.clone(),
        }
    }
}

impl<V, E> Debug for FieldFunctions<V, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldFunctions")
            .field("validators", &self.validate.len())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct Field<V, E> {
    pub key: FieldKey,
    pub label: String,
    pub value: V,
    pub initial_value: V,
    pub functions: FieldFunctions<V, E>,
    pub meta: FieldMeta,
    pub errors: Vec<E>,
}

impl<V, E> Field<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    pub(super) fn new(
        key: FieldKey,
        label: Option<String>,
        value: V,
        functions: FieldFunctions<V, E>,
    ) -> Self {
        let value = functions.normalize(value);
        let label = label
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| key.to_string());
        Self {
            key,
            label,
            initial_value: value.clone(),
            value,
            functions,
            meta: FieldMeta::INITIAL,
            errors: Vec::new(),
        }
    }

    pub fn formatted(&self) -> V {
        self.functions.format(&self.value)
    }

    pub(super) fn reset(&mut self) {
        self.value = self.initial_value.clone();
        self.meta = FieldMeta::INITIAL;
        self.errors.clear();
    }
}

pub type FieldValues<V> = BTreeMap<FieldKey, V>;

/// Registered fields: keyed lookup plus registration order.
#[derive(Clone, Debug)]
pub struct Fields<V, E> {
    by_id: BTreeMap<FieldKey, Field<V, E>>,
    all_ids: Vec<FieldKey>,
}

impl<V, E> Default for Fields<V, E> {
    fn default() -> Self {
        Self {
            by_id: BTreeMap::new(),
            all_ids: Vec::new(),
        }
    }
}

impl<V, E> Fields<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    pub fn get(&self, key: &str) -> Option<&Field<V, E>> {
        self.by_id.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_id.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.all_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_ids.is_empty()
    }

    pub fn ids(&self) -> &[FieldKey] {
        &self.all_ids
    }

    pub fn by_id(&self) -> &BTreeMap<FieldKey, Field<V, E>> {
        &self.by_id
    }

    /// Fields in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Field<V, E>> {
        self.all_ids.iter().filter_map(|key| self.by_id.get(key))
    }

    pub fn values(&self) -> FieldValues<V> {
        self.iter()
            .map(|field| (field.key.clone(), field.value.clone()))
            .collect()
    }

    pub(super) fn get_mut(&mut self, key: &str) -> Option<&mut Field<V, E>> {
        self.by_id.get_mut(key)
    }

    pub(super) fn for_each_mut(&mut self, mut f: impl FnMut(&mut Field<V, E>)) {
        for key in &self.all_ids {
            if let Some(field) = self.by_id.get_mut(key) {
                f(field);
            }
        }
    }

    pub(super) fn push(&mut self, field: Field<V, E>) {
        if !self.by_id.contains_key(&field.key) {
            self.all_ids.push(field.key.clone());
        }
        self.by_id.insert(field.key.clone(), field);
    }
}

/// What happens when a key is registered a second time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RegistrationPolicy {
    /// The first registration wins; later ones are dropped.
    #[default]
    Ignore,
    /// The field is rebuilt in place, keeping its registration position.
    Replace,
    /// The controller refuses the registration with `FormError::DuplicateField`.
    Reject,
}

#[derive(Clone, Debug)]
pub struct FormState<V, E> {
    pub fields: Fields<V, E>,
    pub is_registered: bool,
    pub registration: RegistrationPolicy,
}

impl<V, E> FormState<V, E> {
    pub fn new(registration: RegistrationPolicy) -> Self {
        Self {
            fields: Fields::default(),
            is_registered: false,
            registration,
        }
    }
}

impl<V, E> Default for FormState<V, E> {
    fn default() -> Self {
        Self::new(RegistrationPolicy::default())
    }
}
