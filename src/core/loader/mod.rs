//=========================================================================
// Resource Loader
//=========================================================================
//
// Deduplicated, observable, timeout-bounded resource loading.
//
// One loader owns one URL-keyed cache of entries. Consumers preload
// manifests, start the batch, and pump `update` from the frame loop;
// everything else (signal draining, status sweeps, stall timeouts,
// listener notification) happens inside the pump.
//
// Architecture:
//
// ```text
//   preload(manifest) ──> entries (Queued) ──start()──> Waiting
//                                                          │
//   update(now_ms):  drain signals ── sweep ── timeout ── finalize
//                          │
//                    ProgressEvent ──> listeners ──> completion
// ```
//
// All mutation happens on the driving thread. Worker threads reach the
// loader only through the signal channel, and timing is taken entirely
// from the `now_ms` the caller passes in, which keeps every schedule
// decision reproducible under test.
//
//=========================================================================

//=== Standard Library Imports ============================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

//=== External Dependencies ===============================================

use crossbeam_channel::unbounded;
use log::{debug, info, warn};

//=== Internal Dependencies ===============================================

use crate::core::resource::{
    Fetcher, FsFetcher, ImageFactory, JsonFactory, LoadSignal, LoaderContext, Resource,
    ResourceData, ResourceFactory, ResourceSignal, SignalReceiver, SignalSender,
};
use crate::util;

//=== Module Declarations =================================================

mod entry;
mod listener;

//=== Public API ==========================================================

pub use entry::ResourceStatus;
pub use listener::{ListenerId, ProgressEvent};

use entry::ResourceEntry;
use listener::ListenerRegistry;

//=== Timing Constants ====================================================

/// The first status sweep runs this soon after the batch clock binds,
/// so resources that finish instantly resolve without waiting a full
/// status interval.
const QUICK_SWEEP_MS: f64 = 100.0;

//=== Manifest ============================================================

/// An ordered name-to-URL map describing what a consumer wants loaded.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<(String, String)>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, builder style. A repeated name replaces its URL.
    pub fn with(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.insert(name, url);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        let name = name.into();
        let url = url.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = url,
            None => self.entries.push((name, url)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, url)| (name.as_str(), url.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//=== LoaderError =========================================================

/// Synchronous rejection of a malformed load request.
#[derive(Debug)]
pub enum LoaderError {
    /// A manifest entry had an empty name or URL.
    InvalidUrl { name: String, url: String },
    /// No registered factory claims the URL's extension.
    UnknownExtension { url: String },
}

//--- Trait Implementations -----------------------------------------------

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { name, url } => {
                write!(f, "invalid manifest entry (name {:?}, url {:?})", name, url)
            }
            Self::UnknownExtension { url } => {
                write!(f, "no resource factory claims {:?}", url)
            }
        }
    }
}

impl std::error::Error for LoaderError {}

//=== LoaderOptions =======================================================

/// Tuning for a [`ResourceLoader`].
///
/// # Default Values
///
/// - **Resource root**: empty (URLs are used as given)
/// - **Status interval**: 5000 ms between polling sweeps
/// - **Logging delay**: 20000 ms of silence before overdue reports
/// - **Stall timeout**: disabled
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    resource_root: String,
    status_interval: f64,
    logging_delay: f64,
    timeout: Option<f64>,
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self {
            resource_root: String::new(),
            status_interval: 5_000.0,
            logging_delay: 20_000.0,
            timeout: None,
        }
    }

    /// Prefix joined onto relative URLs before cache lookup.
    pub fn with_resource_root(mut self, root: impl Into<String>) -> Self {
        self.resource_root = root.into();
        self
    }

    /// Milliseconds between status sweeps.
    ///
    /// # Panics
    ///
    /// Panics if `interval_ms` is not positive.
    pub fn with_status_interval(mut self, interval_ms: f64) -> Self {
        assert!(interval_ms > 0.0, "Status interval must be positive, got {}", interval_ms);
        self.status_interval = interval_ms;
        self
    }

    /// Milliseconds of batch silence before still-waiting entries are
    /// reported in the log.
    ///
    /// # Panics
    ///
    /// Panics if `delay_ms` is not positive.
    pub fn with_logging_delay(mut self, delay_ms: f64) -> Self {
        assert!(delay_ms > 0.0, "Logging delay must be positive, got {}", delay_ms);
        self.logging_delay = delay_ms;
        self
    }

    /// Milliseconds without any status change before waiting entries
    /// are timed out. Disabled unless set.
    ///
    /// # Panics
    ///
    /// Panics if `timeout_ms` is not positive.
    pub fn with_timeout(mut self, timeout_ms: f64) -> Self {
        assert!(timeout_ms > 0.0, "Stall timeout must be positive, got {}", timeout_ms);
        self.timeout = Some(timeout_ms);
        self
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::new()
    }
}

//=== ResourceLoader ======================================================

/// Batch-relative timing, bound at the first pump after `start`.
struct BatchClock {
    started_at: f64,
    last_change: f64,
    next_sweep: f64,
}

/// The engine's resource cache and load orchestrator.
///
/// Entries are keyed by resolved URL, created on first reference, and
/// never destroyed; re-requesting a URL always lands on the same entry.
pub struct ResourceLoader {
    options: LoaderOptions,
    context: LoaderContext,
    factories: Vec<Box<dyn ResourceFactory>>,
    entries: HashMap<String, ResourceEntry>,
    /// Insertion order of `entries`, for deterministic sweeps and logs.
    order: Vec<String>,
    listeners: ListenerRegistry,
    signal_tx: SignalSender,
    signal_rx: SignalReceiver,
    started: bool,
    clock: Option<BatchClock>,
    /// Most recent pump timestamp, used for transitions requested
    /// between pumps.
    last_now: f64,
}

impl ResourceLoader {
    //--- Construction -----------------------------------------------------

    /// Creates a loader reading files relative to the current directory,
    /// with the image and JSON factories installed.
    pub fn new(options: LoaderOptions) -> Self {
        Self::with_fetcher(options, Arc::new(FsFetcher::new(".")))
    }

    /// Creates a loader over a specific byte fetcher.
    pub fn with_fetcher(options: LoaderOptions, fetcher: Arc<dyn Fetcher>) -> Self {
        let (signal_tx, signal_rx) = unbounded();
        let mut loader = Self {
            options,
            context: LoaderContext::new(fetcher),
            factories: Vec::new(),
            entries: HashMap::new(),
            order: Vec::new(),
            listeners: ListenerRegistry::new(),
            signal_tx,
            signal_rx,
            started: false,
            clock: None,
            last_now: 0.0,
        };
        loader.register_factory(Box::new(ImageFactory));
        loader.register_factory(Box::new(JsonFactory));
        loader
    }

    /// Registers a resource factory. Later registrations win ties on
    /// extension.
    pub fn register_factory(&mut self, factory: Box<dyn ResourceFactory>) {
        self.factories.push(factory);
    }

    //--- Requesting Work --------------------------------------------------

    /// Ensures an entry exists for every manifest entry and returns live
    /// data handles keyed by manifest name.
    ///
    /// The whole manifest is validated before any entry is created, so a
    /// rejected manifest leaves the cache untouched. New entries queue
    /// until [`ResourceLoader::start`]; if a batch is already running
    /// they start immediately instead.
    ///
    /// # Errors
    ///
    /// [`LoaderError::InvalidUrl`] for an empty name or URL, and
    /// [`LoaderError::UnknownExtension`] when no factory claims a URL.
    pub fn preload(
        &mut self,
        manifest: &Manifest,
    ) -> Result<HashMap<String, ResourceData>, LoaderError> {
        for (name, url) in manifest.iter() {
            if name.is_empty() || url.is_empty() {
                return Err(LoaderError::InvalidUrl {
                    name: name.to_string(),
                    url: url.to_string(),
                });
            }
            let resolved = self.resolve(url);
            if !self.entries.contains_key(&resolved) && self.factory_for(&resolved).is_none() {
                return Err(LoaderError::UnknownExtension { url: resolved });
            }
        }

        let mut handles = HashMap::with_capacity(manifest.len());
        for (name, url) in manifest.iter() {
            let resolved = self.resolve(url);
            self.ensure_entry(&resolved);
            if let Some(entry) = self.entries.get(&resolved) {
                handles.insert(name.to_string(), entry.data());
            }
        }
        Ok(handles)
    }

    /// Returns the data handle for a URL only once it has loaded.
    ///
    /// An unknown URL is enqueued on the spot (and started, if a batch
    /// is running) so a later call can succeed; the current call still
    /// returns `None`. Empty URLs and URLs with no matching factory
    /// return `None` without creating anything.
    pub fn load(&mut self, url: &str) -> Option<ResourceData> {
        if url.is_empty() {
            return None;
        }
        let resolved = self.resolve(url);
        if let Some(entry) = self.entries.get(&resolved) {
            return match entry.status() {
                ResourceStatus::Loaded => Some(entry.data()),
                _ => None,
            };
        }
        if self.factory_for(&resolved).is_none() {
            warn!(target: "loader", "no resource factory for {}, request dropped", resolved);
            return None;
        }
        debug!(target: "loader", "lazily queueing {}", resolved);
        self.ensure_entry(&resolved);
        None
    }

    //--- Batch Lifecycle --------------------------------------------------

    /// Starts every queued entry. Idempotent while a batch is running.
    ///
    /// The batch clock binds at the next [`ResourceLoader::update`],
    /// which also schedules a quick first sweep.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let queued: Vec<String> = self
            .order
            .iter()
            .filter(|url| {
                matches!(self.entries.get(*url), Some(e) if e.status() == ResourceStatus::Queued)
            })
            .cloned()
            .collect();
        info!(
            target: "loader",
            "starting batch ({} queued, {} already settled)",
            queued.len(),
            self.entries.len() - queued.len()
        );
        for url in queued {
            if let Some(entry) = self.entries.get_mut(&url) {
                entry.mark(ResourceStatus::Waiting);
                entry.resource_mut().start(self.signal_tx.clone());
            }
        }
    }

    /// Pumps the loader. Called once per frame with the scheduler's
    /// monotonic millisecond clock.
    ///
    /// Order within one pump: bind the batch clock if needed, drain
    /// worker signals, run a status sweep when one is due, enforce the
    /// stall timeout, and finalize the batch once nothing is waiting.
    /// Sweeps run on the status interval; the stall timeout is checked
    /// on every pump so it fires close to its deadline.
    pub fn update(&mut self, now_ms: f64) {
        self.last_now = now_ms;
        if self.started && self.clock.is_none() {
            debug!(target: "loader", "batch clock bound at {:.0} ms", now_ms);
            self.clock = Some(BatchClock {
                started_at: now_ms,
                last_change: now_ms,
                next_sweep: now_ms + QUICK_SWEEP_MS,
            });
        }

        self.drain_signals();

        let sweep_due = self.clock.as_ref().is_some_and(|clock| now_ms >= clock.next_sweep);
        if sweep_due {
            self.sweep_status(now_ms);
            self.report_overdue(now_ms);
            if let Some(clock) = &mut self.clock {
                clock.next_sweep = now_ms + self.options.status_interval;
            }
        }

        self.enforce_timeout(now_ms);
        self.finalize_if_idle(now_ms);
    }

    //--- Observation ------------------------------------------------------

    /// (finished, total) over every entry the loader knows, current and
    /// previous batches alike.
    pub fn counts(&self) -> (usize, usize) {
        let total = self.entries.len();
        let finished = self.entries.values().filter(|e| e.status().is_terminal()).count();
        (finished, total)
    }

    /// The status of a URL's entry, if one exists. The URL is resolved
    /// against the resource root first.
    pub fn status(&self, url: &str) -> Option<ResourceStatus> {
        self.entries.get(&self.resolve(url)).map(|entry| entry.status())
    }

    /// True while a batch is running.
    pub fn is_running(&self) -> bool {
        self.started
    }

    //--- Listeners --------------------------------------------------------

    /// Registers a listener for terminal status transitions. Listeners
    /// registered later are notified first.
    pub fn add_progress_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
    {
        self.listeners.add_progress(Box::new(listener))
    }

    /// Registers a listener that fires once, when every known entry has
    /// finished, then detaches itself.
    pub fn add_completion_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
    {
        self.listeners.add_completion(Box::new(listener))
    }

    /// Removes a listener of either kind. Returns whether it existed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    //--- Internal Helpers -------------------------------------------------

    fn resolve(&self, url: &str) -> String {
        util::combine(&self.options.resource_root, url)
    }

    /// The newest factory claiming the URL's extension.
    fn factory_for(&self, url: &str) -> Option<&dyn ResourceFactory> {
        let ext = util::extension(url)?;
        self.factories
            .iter()
            .rev()
            .find(|factory| factory.extensions().iter().any(|e| e.eq_ignore_ascii_case(&ext)))
            .map(|factory| factory.as_ref())
    }

    /// Looks up or creates the entry for a resolved URL. Newly created
    /// entries start immediately when a batch is running.
    fn ensure_entry(&mut self, resolved: &str) {
        if self.entries.contains_key(resolved) {
            return;
        }
        let resource = {
            let Some(factory) = self.factory_for(resolved) else {
                return;
            };
            factory.create(resolved, &self.context)
        };
        let mut entry = ResourceEntry::new(resource);
        if self.started {
            entry.mark(ResourceStatus::Waiting);
            entry.resource_mut().start(self.signal_tx.clone());
            self.touch(self.last_now);
        }
        debug!(target: "loader", "entry created for {} ({})", resolved, entry.status());
        self.entries.insert(resolved.to_string(), entry);
        self.order.push(resolved.to_string());
    }

    /// Applies one reported signal. Entries that are no longer waiting
    /// ignore late or duplicate reports, so each entry finishes at most
    /// once.
    fn apply_transition(&mut self, url: &str, signal: LoadSignal, now: f64) {
        let Some(entry) = self.entries.get_mut(url) else {
            debug!(target: "loader", "signal for unknown entry {} ignored", url);
            return;
        };
        if entry.status() != ResourceStatus::Waiting {
            debug!(target: "loader", "late signal for {} ignored ({})", url, entry.status());
            return;
        }
        if let LoadSignal::Failed(reason) = &signal {
            warn!(target: "loader", "{} failed: {}", url, reason);
        }
        let status = ResourceStatus::from(&signal);
        entry.mark(status);
        self.touch(now);

        let (finished, total) = self.counts();
        debug!(target: "loader", "{} settled as {} ({}/{})", url, status, finished, total);
        self.listeners.notify(&ProgressEvent { url: url.to_string(), status, finished, total });
    }

    /// Moves the stall clock. No-op before the batch clock binds.
    fn touch(&mut self, now: f64) {
        if let Some(clock) = &mut self.clock {
            clock.last_change = now;
        }
    }

    fn drain_signals(&mut self) {
        while let Ok(ResourceSignal { url, signal }) = self.signal_rx.try_recv() {
            self.apply_transition(&url, signal, self.last_now);
        }
    }

    /// Polls `check_status` on every waiting entry and applies whatever
    /// the resources report about themselves.
    fn sweep_status(&mut self, now: f64) {
        let mut verdicts = Vec::new();
        for url in &self.order {
            if let Some(entry) = self.entries.get_mut(url) {
                if entry.status() == ResourceStatus::Waiting {
                    if let Some(signal) = entry.resource_mut().check_status() {
                        verdicts.push((url.clone(), signal));
                    }
                }
            }
        }
        for (url, signal) in verdicts {
            self.apply_transition(&url, signal, now);
        }
    }

    /// Times out every waiting entry once the batch has gone quiet for
    /// the configured stall timeout. The deadline is relative to the
    /// last status change, not batch start, so a batch that keeps
    /// making progress never trips it. Each entry gets a final word
    /// through `on_timeout` and may still resolve as loaded.
    fn enforce_timeout(&mut self, now: f64) {
        let Some(timeout) = self.options.timeout else {
            return;
        };
        let quiet = match &self.clock {
            Some(clock) => now - clock.last_change,
            None => return,
        };
        if quiet < timeout {
            return;
        }
        let stalled: Vec<String> = self
            .order
            .iter()
            .filter(|url| {
                matches!(self.entries.get(*url), Some(e) if e.status() == ResourceStatus::Waiting)
            })
            .cloned()
            .collect();
        if stalled.is_empty() {
            return;
        }
        warn!(
            target: "loader",
            "no status change for {:.0} ms, timing out {} resource(s)",
            quiet,
            stalled.len()
        );
        for url in stalled {
            let verdict = match self.entries.get_mut(&url) {
                Some(entry) => entry.resource_mut().on_timeout(),
                None => continue,
            };
            self.apply_transition(&url, verdict, now);
        }
    }

    /// Logs still-waiting entries once a batch has been quiet longer
    /// than the logging delay.
    fn report_overdue(&self, now: f64) {
        let Some(clock) = &self.clock else {
            return;
        };
        let quiet = now - clock.last_change;
        if quiet < self.options.logging_delay {
            return;
        }
        let waiting: Vec<&str> = self
            .order
            .iter()
            .filter(|url| {
                matches!(self.entries.get(*url), Some(e) if e.status() == ResourceStatus::Waiting)
            })
            .map(|url| url.as_str())
            .collect();
        if waiting.is_empty() {
            return;
        }
        warn!(
            target: "loader",
            "batch quiet for {:.0} ms, {} resource(s) outstanding",
            quiet,
            waiting.len()
        );
        for url in waiting {
            warn!(target: "loader", "  waiting on {}", url);
        }
    }

    /// Closes the batch once nothing is waiting: logs the summary and
    /// clears the running marker so the next batch can start.
    fn finalize_if_idle(&mut self, now: f64) {
        if !self.started {
            return;
        }
        if self.entries.values().any(|e| e.status() == ResourceStatus::Waiting) {
            return;
        }
        let elapsed = self.clock.as_ref().map_or(0.0, |clock| now - clock.started_at);
        let (finished, total) = self.counts();
        info!(
            target: "loader",
            "batch finished in {:.0} ms ({}/{} entries settled)",
            elapsed,
            finished,
            total
        );
        for url in &self.order {
            if let Some(entry) = self.entries.get(url) {
                info!(target: "loader", "  {}: {}", url, entry.status());
            }
        }
        self.started = false;
        self.clock = None;
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
