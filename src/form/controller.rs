use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::future::AbortHandle;

use super::poll::{PollTicket, Spawner, ThreadSpawner};
use super::validation::{FormField, ValidationSchema, Validator, evaluate};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    /// Interval used by [`FormManager::start_default`].
    pub tick_speed: Duration,
    /// Delay before a blur marks its field touched.
    pub blur_delay: Duration,
    pub preserve_on_start: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            tick_speed: Duration::from_millis(500),
            blur_delay: Duration::from_millis(50),
            preserve_on_start: false,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldState<V> {
    pub value: Option<V>,
    pub object_value: Option<V>,
    pub original_value: Option<V>,
    pub dirty: bool,
    pub touched: bool,
    pub valid: bool,
    pub error_message: String,
    pub manual_override: bool,
}

impl<V> Default for FieldState<V> {
    fn default() -> Self {
        Self {
            value: None,
            object_value: None,
            original_value: None,
            dirty: false,
            touched: false,
            valid: true,
            error_message: String::new(),
            manual_override: false,
        }
    }
}

/// Aggregate over every field.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FormStatus {
    pub valid: bool,
    pub dirty: bool,
    pub touched: bool,
}

impl FormStatus {
    pub fn submittable(self) -> bool {
        self.dirty && self.valid
    }
}

/// Field values in field order, without the object channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormData<F, V> {
    entries: Vec<(F, Option<V>)>,
}

impl<F, V> FormData<F, V>
where
    F: FormField,
{
    pub fn get(&self, field: F) -> Option<&V> {
        self.entries
            .get(field.index())
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (F, Option<&V>)> {
        self.entries
            .iter()
            .map(|(field, value)| (*field, value.as_ref()))
    }

    pub fn into_entries(self) -> Vec<(F, Option<V>)> {
        self.entries
    }
}

#[derive(Clone, Debug)]
pub struct FormSnapshot<F, V> {
    pub form: FormStatus,
    pub running: bool,
    pub tick_speed: Duration,
    pub scheme: ValidationSchema<F, V>,
    pub fields: Vec<(F, FieldState<V>)>,
    pub data: FormData<F, V>,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("tick speed must be greater than zero")]
    InvalidTickSpeed,
    #[error("failed to spawn form task: {0}")]
    SpawnFailed(String),
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) struct PollHandle {
    pub(super) ticket: PollTicket,
    pub(super) abort: AbortHandle,
}

pub(super) struct FormState<F, V> {
    pub(super) scheme: ValidationSchema<F, V>,
    pub(super) fields: Vec<FieldState<V>>,
    pub(super) status: FormStatus,
    pub(super) running: bool,
    pub(super) tick_speed: Duration,
    pub(super) poll: Option<PollHandle>,
    pub(super) last_ticket: PollTicket,
}

impl<F, V> FormState<F, V>
where
    F: FormField,
{
    pub(super) fn field_mut(&mut self, field: F) -> &mut FieldState<V> {
        &mut self.fields[field.index()]
    }

    pub(super) fn validate_field(&mut self, field: F, cascade: bool) {
        let index = field.index();
        let (valid, error_message) =
            evaluate(&self.scheme.nodes[index].1, self.fields[index].value.as_ref());
        let state = &mut self.fields[index];
        state.valid = valid;
        state.error_message = error_message;
        if cascade {
            self.update_status();
        }
    }

    pub(super) fn update_status(&mut self) {
        self.status = FormStatus {
            valid: self.fields.iter().all(|field| field.valid),
            dirty: self.fields.iter().any(|field| field.dirty),
            touched: self.fields.iter().any(|field| field.touched),
        };
    }

    pub(super) fn reset_field(&mut self, field: F)
    where
        V: Clone,
    {
        let state = self.field_mut(field);
        state.dirty = false;
        state.touched = false;
        state.original_value = state.value.clone();
    }
}

/// Form-state manager over the fields of `F` holding values of type `V`.
///
/// Handles are cheap to clone and share one state. Validator functions run
/// while the state lock is held, so they must not call back into the same
/// manager.
#[derive(Clone)]
pub struct FormManager<F, V>
where
    F: FormField,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub(super) options: FormOptions,
    pub(super) spawner: Arc<dyn Spawner>,
    pub(super) state: Arc<RwLock<FormState<F, V>>>,
}

impl<F, V> FormManager<F, V>
where
    F: FormField,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(scheme: ValidationSchema<F, V>) -> Self {
        Self::with_options(scheme, FormOptions::default())
    }

    pub fn with_options(scheme: ValidationSchema<F, V>, options: FormOptions) -> Self {
        Self::with_spawner(scheme, options, ThreadSpawner::default())
    }

    pub fn with_spawner(
        mut scheme: ValidationSchema<F, V>,
        options: FormOptions,
        spawner: impl Spawner,
    ) -> Self {
        scheme.resolve_activity();
        Self {
            options,
            spawner: Arc::new(spawner),
            state: Arc::new(RwLock::new(FormState {
                scheme,
                fields: F::ALL.iter().map(|_| FieldState::default()).collect(),
                // Only the first aggregation pass makes the form valid.
                status: FormStatus::default(),
                running: false,
                tick_speed: Duration::ZERO,
                poll: None,
                last_ticket: PollTicket::default(),
            })),
        }
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn field_scheme(&self) -> FormResult<ValidationSchema<F, V>> {
        Ok(read_lock(&self.state, "reading field scheme")?.scheme.clone())
    }

    pub fn form(&self) -> FormResult<FormStatus> {
        Ok(read_lock(&self.state, "reading form status")?.status)
    }

    pub fn data(&self) -> FormResult<FormData<F, V>> {
        let state = read_lock(&self.state, "reading form data")?;
        Ok(data_of(&state))
    }

    pub fn running(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading running flag")?.running)
    }

    pub fn tick_speed(&self) -> FormResult<Duration> {
        Ok(read_lock(&self.state, "reading tick speed")?.tick_speed)
    }

    pub fn form_submittable(&self) -> FormResult<bool> {
        Ok(self.form()?.submittable())
    }

    pub fn all(&self) -> FormResult<FormSnapshot<F, V>> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            form: state.status,
            running: state.running,
            tick_speed: state.tick_speed,
            scheme: state.scheme.clone(),
            fields: F::ALL
                .iter()
                .map(|field| (*field, state.fields[field.index()].clone()))
                .collect(),
            data: data_of(&state),
        })
    }

    pub fn field(&self, field: F) -> FormResult<FieldState<V>> {
        Ok(read_lock(&self.state, "reading field state")?.fields[field.index()].clone())
    }

    pub fn fields(&self) -> FormResult<Vec<(F, FieldState<V>)>> {
        Ok(self.all()?.fields)
    }

    /// Errors are only shown once the user has interacted with the field.
    pub fn show_field_error(&self, field: F) -> FormResult<bool> {
        let state = read_lock(&self.state, "reading field error visibility")?;
        let field = &state.fields[field.index()];
        Ok(!field.valid && field.touched)
    }

    pub fn field_error_for_display(&self, field: F) -> FormResult<Option<String>> {
        let state = read_lock(&self.state, "reading display error message")?;
        let field = &state.fields[field.index()];
        if field.valid || !field.touched {
            return Ok(None);
        }
        Ok(Some(field.error_message.clone()))
    }

    pub fn set_value(&self, field: F, value: V) -> FormResult<()> {
        write_lock(&self.state, "setting field value")?
            .field_mut(field)
            .value = Some(value);
        Ok(())
    }

    pub fn clear_value(&self, field: F) -> FormResult<()> {
        write_lock(&self.state, "clearing field value")?
            .field_mut(field)
            .value = None;
        Ok(())
    }

    pub fn set_object_value(&self, field: F, value: V) -> FormResult<()> {
        write_lock(&self.state, "setting field object value")?
            .field_mut(field)
            .object_value = Some(value);
        Ok(())
    }

    pub fn set_values(&self, values: impl IntoIterator<Item = (F, V)>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "setting field values")?;
        for (field, value) in values {
            state.field_mut(field).value = Some(value);
        }
        Ok(())
    }

    /// Name-keyed variant of [`FormManager::set_values`]; names that are not
    /// fields of `F` are skipped.
    pub fn set_values_by_name<'a>(
        &self,
        values: impl IntoIterator<Item = (&'a str, V)>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "setting field values by name")?;
        for (name, value) in values {
            match F::from_name(name) {
                Some(field) => state.field_mut(field).value = Some(value),
                None => tracing::debug!(field = name, "ignoring value for unknown field"),
            }
        }
        Ok(())
    }

    /// Marks the field touched. Touched state is only cleared by a reset.
    pub fn set_touched(&self, field: F) -> FormResult<()> {
        write_lock(&self.state, "touching field")?
            .field_mut(field)
            .touched = true;
        Ok(())
    }

    pub fn reset_field(&self, field: F) -> FormResult<()> {
        write_lock(&self.state, "resetting field")?.reset_field(field);
        Ok(())
    }

    pub fn set_validator(
        &self,
        field: F,
        name: &str,
        validator: impl Validator<V> + 'static,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "replacing validator")?;
        match state.scheme.descriptor_mut(field, name) {
            Some(descriptor) => descriptor.validator = Some(Arc::new(validator)),
            None => tracing::debug!(
                field = field.name(),
                validator = name,
                "ignoring unknown validator"
            ),
        }
        Ok(())
    }

    pub fn set_error_message(
        &self,
        field: F,
        name: &str,
        message: impl Into<String>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "replacing validator message")?;
        match state.scheme.descriptor_mut(field, name) {
            Some(descriptor) => descriptor.error_message = message.into(),
            None => tracing::debug!(
                field = field.name(),
                validator = name,
                "ignoring unknown validator"
            ),
        }
        Ok(())
    }

    /// Sets `is_active` on the matching validators (all of them without a
    /// name), or flips it when `value` is `None`, then revalidates the field.
    pub fn toggle_validation_node(
        &self,
        field: F,
        name: Option<&str>,
        value: Option<bool>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "toggling validation node")?;
        for descriptor in state.scheme.matching_mut(field, name) {
            let next = value.unwrap_or(!descriptor.is_active());
            descriptor.is_active = Some(next);
        }
        state.validate_field(field, true);
        Ok(())
    }

    /// Sets the stored outcome of the matching active validators, or flips it
    /// when `value` is `None`. Meant for validators without a function.
    pub fn set_field_validation_status(
        &self,
        field: F,
        name: Option<&str>,
        value: Option<bool>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "setting field validation status")?;
        let mut matched = false;
        for descriptor in state.scheme.matching_mut(field, name) {
            if descriptor.is_active() {
                descriptor.valid = value.unwrap_or(!descriptor.valid);
                matched = true;
            }
        }
        if matched {
            state.validate_field(field, true);
        }
        Ok(())
    }

    /// Revalidates the field from its validators, then records
    /// `manual_override`. The given outcome only replaces the computed one
    /// while the validators pass; a failing field keeps its own error and the
    /// aggregate is left for the next pass.
    pub fn set_field_status(
        &self,
        field: F,
        manual_override: bool,
        is_valid: bool,
        error_message: impl Into<String>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "setting field status")?;
        state.validate_field(field, false);
        let target = state.field_mut(field);
        target.manual_override = manual_override;
        if target.valid {
            target.valid = is_valid;
            target.error_message = error_message.into();
            state.update_status();
        }
        tracing::debug!(
            field = field.name(),
            manual_override,
            is_valid,
            "applied manual field status"
        );
        Ok(())
    }

    /// Runs the field's active validators against its current value and
    /// recomputes the aggregate. Ignores `manual_override`.
    pub fn validate_field(&self, field: F) -> FormResult<()> {
        write_lock(&self.state, "validating field")?.validate_field(field, true);
        Ok(())
    }
}

fn data_of<F, V>(state: &FormState<F, V>) -> FormData<F, V>
where
    F: FormField,
    V: Clone,
{
    FormData {
        entries: F::ALL
            .iter()
            .map(|field| (*field, state.fields[field.index()].value.clone()))
            .collect(),
    }
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
