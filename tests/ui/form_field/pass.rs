use calmform::form::{FormField, FormManager, ValidationSchema, ValidatorDescriptor};

#[derive(Clone, Copy, Debug, Eq, PartialEq, calmform::form::FormField)]
enum Contact {
    EmailAddress,
    #[form_field(rename = "tel")]
    Phone,
}

fn main() {
    assert_eq!(Contact::ALL, &[Contact::EmailAddress, Contact::Phone]);
    assert_eq!(Contact::EmailAddress.name(), "email_address");
    assert_eq!(Contact::from_name("tel"), Some(Contact::Phone));

    let schema = ValidationSchema::<Contact, String>::new().validator(
        Contact::EmailAddress,
        "format",
        ValidatorDescriptor::new(|value: Option<&String>| value.is_some_and(|v| v.contains('@'))),
    );
    let manager = FormManager::new(schema);
    manager
        .set_value(Contact::EmailAddress, "a@calm.ui".to_string())
        .expect("set value");
    manager.poll_now().expect("poll");
    assert!(manager.form().expect("form").valid);
}
