use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock, Weak};
use std::thread;
use std::time::Duration;

use futures::executor::block_on;
use futures::future::abortable;
use futures_timer::Delay;

use super::controller::{FormError, FormManager, FormResult, FormState, PollHandle, write_lock};
use super::validation::FormField;

pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Host event loop that deferred form work is handed to.
pub trait Spawner: Send + Sync + 'static {
    fn spawn(&self, task: BoxedTask) -> FormResult<()>;
}

impl<F> Spawner for F
where
    F: Fn(BoxedTask) -> FormResult<()> + Send + Sync + 'static,
{
    fn spawn(&self, task: BoxedTask) -> FormResult<()> {
        (self)(task)
    }
}

/// Runs every task to completion on its own named thread.
#[derive(Clone, Debug)]
pub struct ThreadSpawner {
    name: String,
}

impl ThreadSpawner {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ThreadSpawner {
    fn default() -> Self {
        Self::new("calmform")
    }
}

impl Spawner for ThreadSpawner {
    fn spawn(&self, task: BoxedTask) -> FormResult<()> {
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || block_on(task))
            .map(drop)
            .map_err(|error| FormError::SpawnFailed(error.to_string()))
    }
}

/// Generation of the poll loop. A tick carrying an older ticket than the
/// current one belongs to a stopped loop and must not touch state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PollTicket(pub u64);

impl<F, V> FormState<F, V>
where
    F: FormField,
    V: Clone + PartialEq,
{
    fn next_ticket(&mut self) -> PollTicket {
        self.last_ticket = PollTicket(self.last_ticket.0 + 1);
        self.last_ticket
    }

    fn stop_poll(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort.abort();
            tracing::debug!(ticket = poll.ticket.0, "stopped form poll loop");
        }
        // Invalidates a tick already waiting on the lock.
        self.next_ticket();
        self.running = false;
        self.tick_speed = Duration::ZERO;
    }

    /// One pass: dirty flags and validation for every field, then a single
    /// aggregate recompute.
    pub(super) fn poll_pass(&mut self) {
        for field in F::ALL {
            let state = self.field_mut(*field);
            state.dirty = state.original_value != state.value;
            if !state.manual_override {
                self.validate_field(*field, false);
            }
        }
        self.update_status();
    }

    fn reset_all(&mut self) {
        for field in F::ALL {
            self.reset_field(*field);
        }
        self.update_status();
    }
}

impl<F, V> FormManager<F, V>
where
    F: FormField,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Starts polling every `tick_speed`. Unless `preserve` is set, the
    /// current values become the dirty baseline. A loop that is already
    /// running is cancelled first.
    pub fn start(&self, tick_speed: Duration, preserve: bool) -> FormResult<()> {
        if tick_speed.is_zero() {
            return Err(FormError::InvalidTickSpeed);
        }
        let task = {
            let mut state = write_lock(&self.state, "starting poll loop")?;
            self.start_locked(&mut state, tick_speed, preserve)
        };
        self.spawn_poll(task)
    }

    pub fn start_default(&self) -> FormResult<()> {
        self.start(self.options.tick_speed, self.options.preserve_on_start)
    }

    /// Cancels the poll loop. Field state is kept as is.
    pub fn stop(&self) -> FormResult<()> {
        write_lock(&self.state, "stopping poll loop")?.stop_poll();
        Ok(())
    }

    /// Clears dirty and touched on every field and rebaselines them, keeping
    /// the poll loop running at the same speed if it was.
    pub fn reset_form(&self) -> FormResult<()> {
        let task = {
            let mut state = write_lock(&self.state, "resetting form")?;
            let running = state.running;
            let tick_speed = state.tick_speed;
            if running {
                state.stop_poll();
            }
            state.reset_all();
            tracing::debug!(running, "reset form");
            running.then(|| self.start_locked(&mut state, tick_speed, false))
        };
        match task {
            Some(task) => self.spawn_poll(task),
            None => Ok(()),
        }
    }

    /// Runs a single poll pass right away, whether or not the loop is running.
    pub fn poll_now(&self) -> FormResult<()> {
        write_lock(&self.state, "running poll pass")?.poll_pass();
        Ok(())
    }

    /// Marks the field touched after `FormOptions::blur_delay`, so a blur
    /// immediately followed by a refocus does not flash an error.
    pub fn on_blur(&self, field: F) -> FormResult<()> {
        let state = Arc::downgrade(&self.state);
        let delay = self.options.blur_delay;
        self.spawner.spawn(Box::pin(async move {
            Delay::new(delay).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            match write_lock(&state, "touching field after blur") {
                Ok(mut state) => state.field_mut(field).touched = true,
                Err(error) => tracing::warn!(%error, "dropping deferred blur"),
            }
        }))
    }

    fn start_locked(
        &self,
        state: &mut FormState<F, V>,
        tick_speed: Duration,
        preserve: bool,
    ) -> BoxedTask {
        state.stop_poll();
        if !preserve {
            for field in state.fields.iter_mut() {
                field.original_value = field.value.clone();
            }
        }
        let ticket = state.next_ticket();
        let (task, abort) = abortable(run_poll_loop(
            Arc::downgrade(&self.state),
            ticket,
            tick_speed,
        ));
        state.poll = Some(PollHandle { ticket, abort });
        state.running = true;
        state.tick_speed = tick_speed;
        tracing::debug!(ticket = ticket.0, ?tick_speed, preserve, "started form poll loop");
        Box::pin(async move {
            let _ = task.await;
        })
    }

    fn spawn_poll(&self, task: BoxedTask) -> FormResult<()> {
        if let Err(error) = self.spawner.spawn(task) {
            tracing::warn!(%error, "failed to spawn form poll loop");
            write_lock(&self.state, "rolling back failed start")?.stop_poll();
            return Err(error);
        }
        Ok(())
    }
}

async fn run_poll_loop<F, V>(
    state: Weak<RwLock<FormState<F, V>>>,
    ticket: PollTicket,
    tick_speed: Duration,
) where
    F: FormField,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    loop {
        Delay::new(tick_speed).await;
        let Some(state) = state.upgrade() else {
            tracing::debug!(ticket = ticket.0, "form dropped, ending poll loop");
            return;
        };
        let mut state = match write_lock(&state, "running poll tick") {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!(%error, ticket = ticket.0, "ending poll loop");
                return;
            }
        };
        if state.poll.as_ref().is_none_or(|poll| poll.ticket != ticket) {
            return;
        }
        state.poll_pass();
        tracing::trace!(ticket = ticket.0, status = ?state.status, "form poll tick");
    }
}
