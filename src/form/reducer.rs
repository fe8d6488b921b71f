use std::collections::BTreeMap;

use super::state::{Field, FieldFunctions, FieldKey, FormState, RegistrationPolicy};
use super::validation::ValidationError;
use super::value::FieldValue;

#[derive(Clone, Debug)]
pub enum Action<V, E> {
    Initialize,
    RegisterField {
        key: FieldKey,
        label: Option<String>,
        value: V,
        functions: FieldFunctions<V, E>,
    },
    RegisterSubmit,
    ChangeFieldValue {
        key: FieldKey,
        value: V,
    },
    TouchField {
        key: FieldKey,
    },
    TouchAllFields,
    SetValidating,
    SetErrors(BTreeMap<FieldKey, Vec<E>>),
    AddError {
        key: FieldKey,
        error: E,
    },
    FieldValidationDone {
        key: FieldKey,
    },
    ResetField {
        key: FieldKey,
    },
    ResetAllFields,
}

impl<V, E> Action<V, E> {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Initialize => "INITIALIZE",
            Action::RegisterField { .. } => "REGISTER_FIELD",
            Action::RegisterSubmit => "REGISTER_SUBMIT",
            Action::ChangeFieldValue { .. } => "CHANGE_FIELD_VALUE",
            Action::TouchField { .. } => "TOUCH_FIELD",
            Action::TouchAllFields => "TOUCH_ALL_FIELDS",
            Action::SetValidating => "SET_VALIDATING",
            Action::SetErrors(_) => "SET_ERRORS",
            Action::AddError { .. } => "ADD_ERROR",
            Action::FieldValidationDone { .. } => "FIELD_VALIDATION_DONE",
            Action::ResetField { .. } => "RESET_FIELD",
            Action::ResetAllFields => "RESET_ALL_FIELDS",
        }
    }
}

/// Applies one action. Pure and total: actions naming an unregistered key
/// leave the state unchanged.
pub fn reduce<V, E>(mut state: FormState<V, E>, action: Action<V, E>) -> FormState<V, E>
where
    V: FieldValue,
    E: ValidationError,
{
    match action {
        Action::Initialize => {}
        Action::RegisterField {
            key,
            label,
            value,
            functions,
        } => {
            let replace = state.registration == RegistrationPolicy::Replace;
            if !state.fields.contains(key.as_str()) || replace {
                state.fields.push(Field::new(key, label, value, functions));
            }
        }
        Action::RegisterSubmit => state.is_registered = true,
        Action::ChangeFieldValue { key, value } => {
            if let Some(field) = state.fields.get_mut(key.as_str()) {
                field.value = value;
                field.meta.touch();
            }
        }
        Action::TouchField { key } => {
            if let Some(field) = state.fields.get_mut(key.as_str()) {
                field.meta.touch();
            }
        }
        Action::TouchAllFields => state.fields.for_each_mut(|field| field.meta.touch()),
        Action::SetValidating => state.fields.for_each_mut(|field| {
            field.meta.validating = true;
            field.errors.clear();
        }),
        Action::SetErrors(mut errors) => state.fields.for_each_mut(|field| {
            let field_errors = errors.remove(&field.key).unwrap_or_default();
            field.meta.set_validity(field_errors.is_empty());
            field.meta.validating = true;
            field.errors = field_errors;
        }),
        Action::AddError { key, error } => {
            if let Some(field) = state.fields.get_mut(key.as_str()) {
                field.errors.push(error);
                field.meta.set_validity(false);
            }
        }
        Action::FieldValidationDone { key } => {
            if let Some(field) = state.fields.get_mut(key.as_str()) {
                field.meta.validating = false;
            }
        }
        Action::ResetField { key } => {
            if let Some(field) = state.fields.get_mut(key.as_str()) {
                field.reset();
            }
        }
        Action::ResetAllFields => state.fields.for_each_mut(Field::reset),
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::state::FieldMeta;
    use std::sync::Arc;

    type State = FormState<String, String>;

    fn register(state: State, key: &str, value: &str) -> State {
        reduce(
            state,
            Action::RegisterField {
                key: key.into(),
                label: None,
                value: value.to_string(),
                functions: FieldFunctions::default(),
            },
        )
    }

    #[test]
    fn register_applies_parse_then_transform() {
        let functions = FieldFunctions::<String, String> {
            parse: Arc::new(|value: String| value.trim().to_string()),
            transform: Arc::new(|value: String| value.to_uppercase()),
            ..FieldFunctions::default()
        };
        let state = reduce(
            State::default(),
            Action::RegisterField {
                key: "code".into(),
                label: Some("Code".into()),
                value: "  ab ".to_string(),
                functions,
            },
        );
        let field = state.fields.get("code").expect("registered");
        assert_eq!(field.value, "AB");
        assert_eq!(field.initial_value, "AB");
        assert_eq!(field.label, "Code");
        assert_eq!(field.meta, FieldMeta::INITIAL);
        assert!(field.errors.is_empty());
    }

    #[test]
    fn label_defaults_to_key() {
        let state = register(State::default(), "email", "");
        assert_eq!(state.fields.get("email").expect("registered").label, "email");
    }

    #[test]
    fn re_registration_follows_policy() {
        let ignored = register(register(State::default(), "a", "first"), "a", "second");
        assert_eq!(ignored.fields.ids().len(), 1);
        assert_eq!(ignored.fields.get("a").expect("a").value, "first");

        let replaced = register(
            register(
                register(State::new(RegistrationPolicy::Replace), "a", "first"),
                "b",
                "",
            ),
            "a",
            "second",
        );
        assert_eq!(
            replaced.fields.ids(),
            &[FieldKey::from("a"), FieldKey::from("b")]
        );
        assert_eq!(replaced.fields.get("a").expect("a").value, "second");
    }

    #[test]
    fn change_overwrites_value_and_marks_touched() {
        let state = register(State::default(), "name", "");
        let state = reduce(
            state,
            Action::ChangeFieldValue {
                key: "name".into(),
                value: "ada".to_string(),
            },
        );
        let field = state.fields.get("name").expect("name");
        assert_eq!(field.value, "ada");
        assert!(field.meta.dirty && !field.meta.pristine);
        assert!(field.meta.touched && !field.meta.untouched);
    }

    #[test]
    fn set_errors_then_add_error_accumulates() {
        let state = register(register(State::default(), "a", ""), "b", "");
        let state = reduce(state, Action::SetValidating);
        assert!(state.fields.iter().all(|field| field.meta.validating));

        let state = reduce(
            state,
            Action::SetErrors(BTreeMap::from([(
                FieldKey::from("a"),
                vec!["required".to_string()],
            )])),
        );
        let a = state.fields.get("a").expect("a");
        assert!(a.meta.invalid && !a.meta.valid && a.meta.validating);
        let b = state.fields.get("b").expect("b");
        assert!(b.meta.valid && b.errors.is_empty());

        let state = reduce(
            state,
            Action::AddError {
                key: "a".into(),
                error: "taken".to_string(),
            },
        );
        let state = reduce(
            state,
            Action::FieldValidationDone { key: "a".into() },
        );
        let a = state.fields.get("a").expect("a");
        assert_eq!(a.errors, vec!["required".to_string(), "taken".to_string()]);
        assert!(!a.meta.validating);
        assert!(state.fields.get("b").expect("b").meta.validating);
    }

    #[test]
    fn set_validating_clears_previous_errors() {
        let state = register(State::default(), "a", "");
        let state = reduce(
            state,
            Action::AddError {
                key: "a".into(),
                error: "stale".to_string(),
            },
        );
        let state = reduce(state, Action::SetValidating);
        assert!(state.fields.get("a").expect("a").errors.is_empty());
    }

    #[test]
    fn reset_restores_initial_configuration() {
        let state = register(State::default(), "a", "init");
        let state = reduce(
            state,
            Action::ChangeFieldValue {
                key: "a".into(),
                value: "changed".to_string(),
            },
        );
        let state = reduce(
            state,
            Action::AddError {
                key: "a".into(),
                error: "bad".to_string(),
            },
        );
        let state = reduce(state, Action::ResetField { key: "a".into() });
        let field = state.fields.get("a").expect("a");
        assert_eq!(field.value, "init");
        assert_eq!(field.meta, FieldMeta::INITIAL);
        assert!(field.errors.is_empty());
    }

    #[test]
    fn unknown_keys_and_initialize_are_no_ops() {
        let state = register(State::default(), "a", "x");
        let state = reduce(state, Action::TouchField { key: "ghost".into() });
        let state = reduce(state, Action::Initialize);
        let field = state.fields.get("a").expect("a");
        assert_eq!(field.meta, FieldMeta::INITIAL);
        assert_eq!(state.fields.len(), 1);
        assert!(!state.is_registered);
        assert!(reduce(state, Action::RegisterSubmit).is_registered);
    }
}
