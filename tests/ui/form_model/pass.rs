use calmform::form::{FieldLens, FieldValues, FormModel, Value};

#[derive(Clone, Debug, PartialEq, calmform::form::FormModel)]
struct SignupForm {
    #[form(label = "E-mail")]
    email: String,
    age: Option<i64>,
    accept_terms: bool,
}

fn main() {
    let fields = SignupForm::fields();
    let lens = fields.email();
    let mut model = SignupForm {
        email: "a@calm.ui".to_string(),
        age: None,
        accept_terms: false,
    };
    lens.set(&mut model, "b@calm.ui".to_string());
    assert_eq!(lens.key().as_str(), "email");
    assert_eq!(lens.get(&model), "b@calm.ui");
    assert_eq!(fields.accept_terms().key().as_str(), "accept_terms");

    assert_eq!(SignupForm::field_label("email"), Some("E-mail"));
    assert_eq!(SignupForm::field_label("age"), None);
    assert_eq!(SignupForm::field_keys().len(), 3);

    let values: FieldValues<Value> = model.clone().into_values().into_iter().collect();
    assert_eq!(values.get("age"), Some(&Value::Null));
    assert_eq!(SignupForm::from_values(&values), Ok(model));
}
