use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Closed set of field identifiers for one form.
///
/// Usually derived on a fieldless enum with `#[derive(FormField)]`; the
/// declaration order of the variants is the field order everywhere the
/// manager iterates fields.
pub trait FormField: Copy + Eq + Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    /// Position of this field in [`FormField::ALL`].
    fn index(self) -> usize;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.name() == name)
    }
}

pub trait Validator<V>: Send + Sync {
    fn validate(&self, value: Option<&V>) -> bool;
}

impl<V, F> Validator<V> for F
where
    F: Fn(Option<&V>) -> bool + Send + Sync,
{
    fn validate(&self, value: Option<&V>) -> bool {
        (self)(value)
    }
}

pub(super) type ValidatorFn<V> = Arc<dyn Validator<V>>;

/// One named rule attached to a field.
///
/// A descriptor without a validator function reports its stored `valid`
/// flag, which lets results computed elsewhere be pushed in through
/// [`FormManager::set_field_validation_status`](super::FormManager::set_field_validation_status).
pub struct ValidatorDescriptor<V> {
    pub(super) is_active: Option<bool>,
    pub(super) validator: Option<ValidatorFn<V>>,
    pub(super) valid: bool,
    pub(super) error_message: String,
}

impl<V> ValidatorDescriptor<V> {
    pub fn new(validator: impl Validator<V> + 'static) -> Self {
        Self {
            is_active: None,
            validator: Some(Arc::new(validator)),
            valid: false,
            error_message: String::new(),
        }
    }

    pub fn manual(valid: bool) -> Self {
        Self {
            is_active: None,
            validator: None,
            valid,
            error_message: String::new(),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }

    /// Unset activity counts as active.
    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    pub(super) fn outcome(&self, value: Option<&V>) -> bool {
        match &self.validator {
            Some(validator) => validator.validate(value),
            None => self.valid,
        }
    }
}

impl<V> Clone for ValidatorDescriptor<V> {
    fn clone(&self) -> Self {
        Self {
            is_active: self.is_active,
            validator: self.validator.clone(),
            valid: self.valid,
            error_message: self.error_message.clone(),
        }
    }
}

impl<V> Debug for ValidatorDescriptor<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorDescriptor")
            .field("is_active", &self.is_active)
            .field("has_validator", &self.validator.is_some())
            .field("valid", &self.valid)
            .field("error_message", &self.error_message)
            .finish()
    }
}

/// Named validators per field, in insertion order.
///
/// Every field of `F` has an entry, possibly empty, so the field set of a
/// schema is always exactly `F::ALL`.
pub struct ValidationSchema<F, V> {
    pub(super) nodes: Vec<(F, Vec<(String, ValidatorDescriptor<V>)>)>,
}

impl<F, V> ValidationSchema<F, V>
where
    F: FormField,
{
    pub fn new() -> Self {
        Self {
            nodes: F::ALL.iter().map(|field| (*field, Vec::new())).collect(),
        }
    }

    pub fn validator(
        mut self,
        field: F,
        name: impl Into<String>,
        descriptor: ValidatorDescriptor<V>,
    ) -> Self {
        self.insert(field, name, descriptor);
        self
    }

    /// Adds a validator, replacing one with the same name in place.
    pub fn insert(
        &mut self,
        field: F,
        name: impl Into<String>,
        descriptor: ValidatorDescriptor<V>,
    ) {
        let name = name.into();
        let validators = &mut self.nodes[field.index()].1;
        match validators.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = descriptor,
            None => validators.push((name, descriptor)),
        }
    }

    pub fn validators(&self, field: F) -> &[(String, ValidatorDescriptor<V>)] {
        &self.nodes[field.index()].1
    }

    pub fn descriptor(&self, field: F, name: &str) -> Option<&ValidatorDescriptor<V>> {
        self.nodes[field.index()]
            .1
            .iter()
            .find_map(|(existing, descriptor)| (existing == name).then_some(descriptor))
    }

    pub(super) fn descriptor_mut(
        &mut self,
        field: F,
        name: &str,
    ) -> Option<&mut ValidatorDescriptor<V>> {
        self.nodes[field.index()]
            .1
            .iter_mut()
            .find_map(|(existing, descriptor)| (existing == name).then_some(descriptor))
    }

    /// Descriptors of `field` matching `name`, or all of them when the
    /// filter is absent or empty.
    pub(super) fn matching_mut<'a>(
        &'a mut self,
        field: F,
        name: Option<&'a str>,
    ) -> impl Iterator<Item = &'a mut ValidatorDescriptor<V>> + 'a {
        self.nodes[field.index()]
            .1
            .iter_mut()
            .filter(move |(existing, _)| matches_filter(existing, name))
            .map(|(_, descriptor)| descriptor)
    }

    pub(super) fn resolve_activity(&mut self) {
        let descriptors = self
            .nodes
            .iter_mut()
            .flat_map(|(_, validators)| validators.iter_mut());
        for (_, descriptor) in descriptors {
            if descriptor.is_active.is_none() {
                descriptor.is_active = Some(true);
            }
        }
    }
}

impl<F, V> Default for ValidationSchema<F, V>
where
    F: FormField,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<F, V> Clone for ValidationSchema<F, V>
where
    F: Clone,
{
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
        }
    }
}

impl<F, V> Debug for ValidationSchema<F, V>
where
    F: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.nodes.iter().map(|(field, validators)| (field, validators)))
            .finish()
    }
}

fn matches_filter(name: &str, filter: Option<&str>) -> bool {
    match filter {
        None | Some("") => true,
        Some(filter) => name == filter,
    }
}

/// Field validation: AND over the active descriptors, with the message of
/// the last failing descriptor that carries one.
pub(super) fn evaluate<V>(
    validators: &[(String, ValidatorDescriptor<V>)],
    value: Option<&V>,
) -> (bool, String) {
    let mut valid = true;
    let mut error_message = String::new();
    for (_, descriptor) in validators {
        if !descriptor.is_active() {
            continue;
        }
        if !descriptor.outcome(value) {
            valid = false;
            if !descriptor.error_message.is_empty() {
                error_message = descriptor.error_message.clone();
            }
        }
    }
    (valid, error_message)
}
