use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::sink::{LogSink, Sink};
use crate::check::{Check, SharedCheck};
use crate::error::EngineError;

/// A check registered to run on a fixed period
#[derive(Clone)]
pub struct Binding {
    pub host: String,
    pub service: String,
    pub period: Duration,
    pub initial_delay: Duration,
    pub check: SharedCheck,
}

impl Binding {
    pub fn new(
        host: impl Into<String>,
        service: impl Into<String>,
        period: Duration,
        check: impl Check + 'static,
    ) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            period,
            initial_delay: Duration::ZERO,
            check: Arc::new(check),
        }
    }

    /// Delay the first execution; later ones follow every `period` after it
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("host", &self.host)
            .field("service", &self.service)
            .field("period", &self.period)
            .field("initial_delay", &self.initial_delay)
            .finish_non_exhaustive()
    }
}

/// Runs every registered binding on its own timer and reports each result to the sink
///
/// Each binding gets a dedicated task, so a slow check (or one sleeping between retries) never
/// holds back another binding. Within a binding at most one execution is in flight: a tick that
/// falls due while the previous execution is still running fires once it finishes and any further
/// missed ticks are skipped. This also keeps that binding's results in tick order.
///
/// Bindings live until the runtime shuts down; dropping the engine does not stop them.
pub struct CheckEngine {
    sink: Arc<dyn Sink>,
    handles: Vec<JoinHandle<()>>,
}

impl CheckEngine {
    /// Create an engine reporting to `sink`
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink, handles: Vec::new() }
    }

    /// Register a check by its parts. See [`CheckEngine::register`].
    pub fn add_check(
        &mut self,
        host: impl Into<String>,
        service: impl Into<String>,
        period: Duration,
        check: impl Check + 'static,
    ) -> Result<(), EngineError> {
        self.register(Binding::new(host, service, period, check))
    }

    /// Start running a binding in the background
    ///
    /// Returns as soon as the binding's task is spawned. Fails when the period is zero, when the
    /// initial delay cannot be represented as a point in time, or when called outside a tokio
    /// runtime; in every case nothing is scheduled.
    pub fn register(&mut self, binding: Binding) -> Result<(), EngineError> {
        if binding.period.is_zero() {
            return Err(EngineError::InvalidPeriod { host: binding.host, service: binding.service });
        }
        let Some(start) = Instant::now().checked_add(binding.initial_delay) else {
            return Err(EngineError::InvalidInitialDelay { host: binding.host, service: binding.service });
        };
        let handle = Handle::try_current()
            .map_err(|_| EngineError::NoRuntime { host: binding.host.clone(), service: binding.service.clone() })?;

        info!(
            host = %binding.host,
            service = %binding.service,
            period = ?binding.period,
            "Scheduling check"
        );

        let (host, service) = (binding.host.clone(), binding.service.clone());
        let span = info_span!("binding", host = %binding.host, service = %binding.service);
        let task = handle.spawn(run_binding(binding, start, self.sink.clone()).instrument(span));
        self.handles.push(handle.spawn(watch_binding(host, service, task)));
        Ok(())
    }

    /// Register several bindings, stopping at the first failure
    pub fn register_all(&mut self, bindings: impl IntoIterator<Item = Binding>) -> Result<(), EngineError> {
        bindings.into_iter().try_for_each(|binding| self.register(binding))
    }

    /// Number of registered bindings
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Default for CheckEngine {
    fn default() -> Self {
        Self::new(Arc::new(LogSink))
    }
}

/// A binding task only ends if its check panics or the runtime shuts down
async fn watch_binding(host: String, service: String, task: JoinHandle<()>) {
    match task.await {
        Err(e) if e.is_panic() => {
            error!(host = %host, service = %service, "Check panicked, binding stopped");
        }
        Err(_) => debug!(host = %host, service = %service, "Binding cancelled"),
        Ok(()) => warn!(host = %host, service = %service, "Binding stopped"),
    }
}

async fn run_binding(binding: Binding, start: Instant, sink: Arc<dyn Sink>) {
    let mut timer = interval_at(start, binding.period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        timer.tick().await;

        let started = Instant::now();
        let result = binding.check.execute().await;
        let elapsed = started.elapsed();

        if elapsed > binding.period {
            warn!(
                elapsed = ?elapsed,
                period = ?binding.period,
                "Check outlasted its period, skipping missed ticks"
            );
        } else {
            debug!(elapsed = ?elapsed, state = %result.state, "Check finished");
        }

        sink.report(result).await;
    }
}
