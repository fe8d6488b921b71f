//! Built-in validators over [`Value`].
//!
//! Every factory takes the [`Message`] reported on failure: either a fixed
//! error or a function of the failing field. Text validators count
//! characters, list values count elements, and any other value fails them.
//! Numeric validators fail every non-numeric value.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use rust_decimal::Decimal;

use super::state::{Field, FieldKey, Fields};
use super::validation::{Validation, ValidationError, Validator};
use super::value::Value;

type MessageFn<E> = Arc<dyn Fn(&Field<Value, E>) -> E + Send + Sync>;

/// The error a built-in validator reports, resolved against the failing field.
pub struct Message<E>(MessageFn<E>);

impl<E: ValidationError> Message<E> {
    /// Builds the error from the field, e.g. to mention its label.
    pub fn from_fn(message: impl Fn(&Field<Value, E>) -> E + Send + Sync + 'static) -> Self {
        Self(Arc::new(message))
    }

    pub fn resolve(&self, field: &Field<Value, E>) -> E {
        (self.0)(field)
    }
}

impl<E: ValidationError> From<E> for Message<E> {
    fn from(error: E) -> Self {
        Self(Arc::new(move |_: &Field<Value, E>| error.clone()))
    }
}

impl<E> Clone for Message<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E> fmt::Debug for Message<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Message").finish_non_exhaustive()
    }
}

fn check<E, F>(message: impl Into<Message<E>>, accept: F) -> impl Validator<Value, E>
where
    E: ValidationError,
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    let message = message.into();
    move |field: &Field<Value, E>, _: &Fields<Value, E>| {
        if accept(&field.value) {
            Validation::Pass
        } else {
            Validation::Fail(message.resolve(field))
        }
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::Text(text) => Some(text.chars().count()),
        Value::List(values) => Some(values.len()),
        Value::Null | Value::Bool(_) | Value::Number(_) => None,
    }
}

/// Fails on `Null`, the empty string and the empty list.
pub fn required<E: ValidationError>(message: impl Into<Message<E>>) -> impl Validator<Value, E> {
    check(message, |value| !value.is_empty())
}

pub fn min_length<E: ValidationError>(
    min: usize,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    check(message, move |value| length_of(value).is_some_and(|len| len >= min))
}

pub fn max_length<E: ValidationError>(
    max: usize,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    check(message, move |value| length_of(value).is_some_and(|len| len <= max))
}

pub fn length<E: ValidationError>(
    min: usize,
    max: usize,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    check(message, move |value| {
        length_of(value).is_some_and(|len| (min..=max).contains(&len))
    })
}

/// Values of different variants are never equal.
pub fn is_equal<E: ValidationError>(
    expected: impl Into<Value>,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    let expected = expected.into();
    check(message, move |value| *value == expected)
}

pub fn is_not_equal<E: ValidationError>(
    rejected: impl Into<Value>,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    let rejected = rejected.into();
    check(message, move |value| *value != rejected)
}

pub fn is_in<E, I>(allowed: I, message: impl Into<Message<E>>) -> impl Validator<Value, E>
where
    E: ValidationError,
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let allowed = allowed.into_iter().map(Into::into).collect::<Vec<Value>>();
    check(message, move |value| allowed.contains(value))
}

pub fn is_not_in<E, I>(rejected: I, message: impl Into<Message<E>>) -> impl Validator<Value, E>
where
    E: ValidationError,
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let rejected = rejected.into_iter().map(Into::into).collect::<Vec<Value>>();
    check(message, move |value| !rejected.contains(value))
}

/// Passes text containing a match of `pattern`.
pub fn pattern<E: ValidationError>(
    pattern: Regex,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    check(message, move |value| {
        value.as_text().is_some_and(|text| pattern.is_match(text))
    })
}

pub fn is_email<E: ValidationError>(message: impl Into<Message<E>>) -> impl Validator<Value, E> {
    check(message, |value| value.as_text().is_some_and(is_email_address))
}

fn is_email_address(address: &str) -> bool {
    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.len() > 255 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~.".contains(ch));
    if !local_ok {
        return false;
    }

    let labels = domain.split('.').collect::<Vec<_>>();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        })
}

pub fn minimum<E: ValidationError>(
    min: impl Into<Decimal>,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    let min = min.into();
    check(message, move |value| {
        value.as_number().is_some_and(|number| number >= min)
    })
}

pub fn maximum<E: ValidationError>(
    max: impl Into<Decimal>,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    let max = max.into();
    check(message, move |value| {
        value.as_number().is_some_and(|number| number <= max)
    })
}

pub fn range<E: ValidationError>(
    min: impl Into<Decimal>,
    max: impl Into<Decimal>,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    let (min, max) = (min.into(), max.into());
    check(message, move |value| {
        value
            .as_number()
            .is_some_and(|number| number >= min && number <= max)
    })
}

pub fn is_number<E: ValidationError>(message: impl Into<Message<E>>) -> impl Validator<Value, E> {
    check(message, |value| value.as_number().is_some())
}

pub fn is_integer<E: ValidationError>(message: impl Into<Message<E>>) -> impl Validator<Value, E> {
    check(message, |value| {
        value.as_number().is_some_and(|number| number.fract().is_zero())
    })
}

/// Passes numbers with a non-zero fractional part.
pub fn is_float<E: ValidationError>(message: impl Into<Message<E>>) -> impl Validator<Value, E> {
    check(message, |value| {
        value.as_number().is_some_and(|number| !number.fract().is_zero())
    })
}

/// Passes when the field holds the same value as the field under `other`.
/// Fails when `other` is not registered.
pub fn matches_field<E: ValidationError>(
    other: impl Into<FieldKey>,
    message: impl Into<Message<E>>,
) -> impl Validator<Value, E> {
    let other = other.into();
    let message = message.into();
    move |field: &Field<Value, E>, fields: &Fields<Value, E>| match fields.get(other.as_str()) {
        Some(other) if other.value == field.value => Validation::Pass,
        _ => Validation::Fail(message.resolve(field)),
    }
}

pub mod parse {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use crate::form::value::Value;

    pub fn trim(value: Value) -> Value {
        match value {
            Value::Text(text) => Value::Text(text.trim().to_string()),
            other => other,
        }
    }

    /// Text that parses as a decimal becomes a number; anything else is kept.
    pub fn decimal(value: Value) -> Value {
        match value {
            Value::Text(text) => match Decimal::from_str(text.trim()) {
                Ok(number) => Value::Number(number),
                Err(_) => Value::Text(text),
            },
            other => other,
        }
    }
}

pub mod transform {
    use crate::form::value::Value;

    pub fn lowercase(value: Value) -> Value {
        match value {
            Value::Text(text) => Value::Text(text.to_lowercase()),
            other => other,
        }
    }

    pub fn uppercase(value: Value) -> Value {
        match value {
            Value::Text(text) => Value::Text(text.to_uppercase()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::state::FieldFunctions;
    use crate::form::reducer::{Action, reduce};
    use crate::form::state::FormState;

    fn fields_with(entries: &[(&str, Value)]) -> Fields<Value, &'static str> {
        entries
            .iter()
            .fold(FormState::default(), |state, (key, value)| {
                reduce(
                    state,
                    Action::RegisterField {
                        key: (*key).into(),
                        label: None,
                        value: value.clone(),
                        functions: FieldFunctions::default(),
                    },
                )
            })
            .fields
    }

    fn run(validator: &impl Validator<Value, &'static str>, value: impl Into<Value>) -> Option<&'static str> {
        let fields = fields_with(&[("field", value.into())]);
        let field = fields.get("field").expect("registered");
        match validator.validate(field, &fields) {
            Validation::Pass => None,
            Validation::Fail(error) => Some(error),
            other => panic!("unexpected validation result: {other:?}"),
        }
    }

    #[test]
    fn required_rejects_empty_values_only() {
        let validator = required("required");
        assert_eq!(run(&validator, ""), Some("required"));
        assert_eq!(run(&validator, Value::Null), Some("required"));
        assert_eq!(run(&validator, 0), None);
        assert_eq!(run(&validator, "test"), None);
    }

    #[test]
    fn length_validators_count_characters() {
        assert_eq!(run(&min_length(5, "short"), ""), Some("short"));
        assert_eq!(run(&min_length(5, "short"), "test"), Some("short"));
        assert_eq!(run(&min_length(3, "short"), "äöü"), None);
        assert_eq!(run(&max_length(5, "long"), ""), None);
        assert_eq!(run(&max_length(5, "long"), "this is a long test string"), Some("long"));
        let bounded = length(5, 12, "length");
        assert_eq!(run(&bounded, "sample text"), None);
        assert_eq!(run(&bounded, "test"), Some("length"));
        assert_eq!(run(&bounded, "this sample string is too long"), Some("length"));
        assert_eq!(run(&min_length(1, "short"), 5), Some("short"));
    }

    #[test]
    fn equality_is_type_sensitive() {
        let equal = is_equal("5", "not equal");
        assert_eq!(run(&equal, "5"), None);
        assert_eq!(run(&equal, 5), Some("not equal"));
        assert_eq!(run(&equal, ""), Some("not equal"));
        let not_equal = is_not_equal("5", "equal");
        assert_eq!(run(&not_equal, 5), None);
        assert_eq!(run(&not_equal, "5"), Some("equal"));
    }

    #[test]
    fn membership_checks_mixed_values() {
        let allowed = [Value::from("one"), Value::from(2), Value::from(true)];
        let is_in = is_in(allowed.clone(), "not in");
        assert_eq!(run(&is_in, "one"), None);
        assert_eq!(run(&is_in, 2), None);
        assert_eq!(run(&is_in, true), None);
        assert_eq!(run(&is_in, "2"), Some("not in"));
        assert_eq!(run(&is_in, false), Some("not in"));
        let is_not_in = is_not_in(allowed, "in");
        assert_eq!(run(&is_not_in, "test"), None);
        assert_eq!(run(&is_not_in, "one"), Some("in"));
    }

    #[test]
    fn pattern_matches_text_only() {
        let regex = Regex::new("(?i)[a-z]+").expect("valid pattern");
        let validator = pattern(regex, "pattern");
        assert_eq!(run(&validator, "abc"), None);
        assert_eq!(run(&validator, "123"), Some("pattern"));
        assert_eq!(run(&validator, 5), Some("pattern"));
    }

    #[test]
    fn email_structure() {
        let validator = is_email("email");
        assert_eq!(run(&validator, "validemail@address.com"), None);
        assert_eq!(run(&validator, "first.last+tag@sub.example.org"), None);
        assert_eq!(run(&validator, "notAValidEmail"), Some("email"));
        assert_eq!(run(&validator, "a@localhost"), Some("email"));
        assert_eq!(run(&validator, "a b@example.com"), Some("email"));
        assert_eq!(run(&validator, "a@-example.com"), Some("email"));
    }

    #[test]
    fn numeric_bounds() {
        assert_eq!(run(&minimum(5, "min"), 5), None);
        assert_eq!(run(&minimum(5, "min"), 0), Some("min"));
        assert_eq!(run(&minimum(5, "min"), "5"), Some("min"));
        assert_eq!(run(&maximum(5, "max"), 5.2), Some("max"));
        assert_eq!(run(&maximum(5, "max"), -5), None);
        let range = range(-5, 5, "range");
        assert_eq!(run(&range, -5), None);
        assert_eq!(run(&range, 5), None);
        assert_eq!(run(&range, -5.2), Some("range"));
        assert_eq!(run(&range, Value::Null), Some("range"));
    }

    #[test]
    fn number_kinds() {
        assert_eq!(run(&is_number("nan"), -5), None);
        assert_eq!(run(&is_number("nan"), "5"), Some("nan"));
        assert_eq!(run(&is_number("nan"), f64::INFINITY), Some("nan"));
        assert_eq!(run(&is_integer("int"), 0), None);
        assert_eq!(run(&is_integer("int"), 5.2), Some("int"));
        assert_eq!(run(&is_float("float"), 5.2), None);
        assert_eq!(run(&is_float("float"), 5.0), Some("float"));
        assert_eq!(run(&is_float("float"), 5), Some("float"));
    }

    #[test]
    fn matches_field_reads_other_fields() {
        let validator = matches_field("password", "mismatch");
        let fields = fields_with(&[("password", "secret".into()), ("confirm", "secret".into())]);
        let confirm = fields.get("confirm").expect("confirm");
        assert!(matches!(validator.validate(confirm, &fields), Validation::Pass));

        let fields = fields_with(&[("password", "secret".into()), ("confirm", "other".into())]);
        let confirm = fields.get("confirm").expect("confirm");
        assert!(matches!(
            validator.validate(confirm, &fields),
            Validation::Fail("mismatch")
        ));

        let lonely = matches_field("missing", "mismatch");
        assert_eq!(run(&lonely, "x"), Some("mismatch"));
    }

    #[test]
    fn message_functions_see_the_failing_field() {
        let state = reduce(
            FormState::<Value, String>::default(),
            Action::RegisterField {
                key: "username".into(),
                label: Some("Username".to_string()),
                value: Value::from("ab"),
                functions: FieldFunctions::default(),
            },
        );
        let field = state.fields.get("username").expect("registered");
        let validator = min_length(
            3,
            Message::from_fn(|field: &Field<Value, String>| {
                format!("{} needs at least 3 characters", field.label)
            }),
        );
        assert!(matches!(
            validator.validate(field, &state.fields),
            Validation::Fail(message) if message == "Username needs at least 3 characters"
        ));

        let fixed = required(Message::from("required".to_string()));
        assert!(matches!(
            fixed.validate(field, &state.fields),
            Validation::Pass
        ));
    }

    #[test]
    fn parse_and_transform_helpers() {
        assert_eq!(parse::trim(Value::from("  a ")), Value::from("a"));
        assert_eq!(
            parse::decimal(Value::from(" 12.50 ")),
            Value::Number(Decimal::new(1250, 2))
        );
        assert_eq!(parse::decimal(Value::from("abc")), Value::from("abc"));
        assert_eq!(transform::lowercase(Value::from("AbC")), Value::from("abc"));
        assert_eq!(transform::uppercase(Value::from("AbC")), Value::from("ABC"));
        assert_eq!(transform::uppercase(Value::from(1)), Value::from(1));
    }
}
