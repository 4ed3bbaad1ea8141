//! The dependency queue.
//!
//! [`ScriptLoader`] accepts requests of the form "run this callback once these namespaces
//! exist", fetches what is missing, and re-checks the queue every time a fetch
//! completes. A request fires exactly once, the moment its last requirement is met.
//!
//! ## Life of a request
//!
//! ```text
//! require(["A.B", "C.D"], cb)
//!      ↓
//! 1. drop names that already exist       (resolver / load state)
//! 2. nothing left?  → run cb now          (no callback → MissingCallback)
//! 3. queue it, fetch every name nobody has fetched yet
//!      ↓
//! fetch completes → script runs → drain:
//!      prune met names from every request,
//!      fire the ones left empty (in queue order),
//!      repeat while firing made progress
//! ```
//!
//! Each namespace is fetched at most once for the lifetime of the loader, no matter how
//! many requests name it. A fetch or script failure removes every request that depended
//! on the resource and hands them the error instead of their callback. Requests may
//! carry a deadline; [`ScriptLoader::expire_overdue`] fails the ones that outlived it.
//!
//! ## Callbacks and re-entrancy
//!
//! Callbacks receive a [`LoadContext`]: the registry, the request's scope, and a deferred
//! `require`. Requires made from a callback are queued as soon as the callback returns,
//! before the drain looks at the queue again, so a callback can chain further loads or
//! satisfy other pending requests within the same drain.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::runner::clock::{duration_millis, Clock, SystemClock};
use crate::runner::config::LoaderConfig;
use crate::runner::error::{join_names, LoaderError};
use crate::runner::mapper::UrlMapper;
use crate::runner::namespace::{Namespace, Requirements};
use crate::runner::registry::Registry;
use crate::runner::resolver::NamespaceResolver;
use crate::runner::script;
use crate::runner::transport::{Completion, Dispatch, ResourceChannel, TicketId, Transport};

pub type Callback = Box<dyn FnOnce(&mut LoadContext<'_>)>;
pub type ErrorCallback = Box<dyn FnOnce(&mut LoadContext<'_>, &LoaderError)>;

/// Boxes a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: FnOnce(&mut LoadContext<'_>) + 'static,
{
    Box::new(f)
}

/// The context a callback runs in. The global scope is the empty name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope(String);

impl Scope {
    pub fn global() -> Self {
        Scope(String::new())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Scope(name.into())
    }

    pub fn is_global(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            f.write_str("global")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// A `require` call in builder form.
pub struct Request {
    requires: Requirements,
    callback: Option<Callback>,
    on_error: Option<ErrorCallback>,
    scope: Scope,
    timeout: Option<Duration>,
    origin: Option<Namespace>,
}

impl Request {
    pub fn new(names: impl Into<Requirements>) -> Self {
        Request {
            requires: names.into(),
            callback: None,
            on_error: None,
            scope: Scope::global(),
            timeout: None,
            origin: None,
        }
    }

    /// Runs once every requirement exists.
    pub fn then<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut LoadContext<'_>) + 'static,
    {
        self.callback = Some(Box::new(f));
        self
    }

    /// Runs instead of the callback when a requirement fails to load or the deadline passes.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut LoadContext<'_>, &LoaderError) + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Overrides the configured request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What a callback gets to work with.
pub struct LoadContext<'a> {
    registry: &'a mut Registry,
    scope: &'a Scope,
    submissions: Vec<Request>,
    errors: Vec<LoaderError>,
}

impl<'a> LoadContext<'a> {
    fn new(registry: &'a mut Registry, scope: &'a Scope) -> Self {
        LoadContext {
            registry,
            scope,
            submissions: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &*self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut *self.registry
    }

    pub fn scope(&self) -> &Scope {
        self.scope
    }

    /// Creates the namespace chain for `path`.
    pub fn define(&mut self, path: &str) -> Result<(), LoaderError> {
        self.registry.create_namespaces(path)
    }

    /// Queues `request` once the current callback returns.
    pub fn require(&mut self, request: Request) {
        self.submissions.push(request);
    }

    /// Hands an error to the loader's error events.
    pub fn report(&mut self, error: LoaderError) {
        self.errors.push(error);
    }

    fn finish(self) -> (Vec<Request>, Vec<LoaderError>) {
        (self.submissions, self.errors)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequireOutcome {
    /// Everything already existed; the callback has run.
    Immediate,
    /// The request was queued. In blocking mode it may already have fired by the time
    /// `require` returns; see [`ScriptLoader::is_pending`].
    Queued(RequestId),
    /// A requirement had already failed to load; the error callback has run.
    Failed,
}

/// Entry of the load state table. Any entry means the resource is never fetched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Requested,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded_files: usize,
    pub waiting_files: usize,
    pub failed_files: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent {
    /// A resource finished loading.
    Progress {
        namespace: Namespace,
        loaded: usize,
        waiting: usize,
    },
    /// The queue ran empty with nothing left in flight.
    Complete,
    Error {
        namespace: Option<Namespace>,
        message: String,
    },
}

/// Snapshot taken when nothing else can make progress.
#[derive(Debug, Clone, PartialEq)]
pub struct IdleReport {
    /// Remaining requirements of every request still queued.
    pub stalled: Vec<Vec<Namespace>>,
    pub in_flight: usize,
    pub stats: LoadStats,
}

impl IdleReport {
    pub fn is_settled(&self) -> bool {
        self.stalled.is_empty() && self.in_flight == 0
    }
}

/// One fetch, shared by every namespace that maps to its URL.
struct FetchRecord {
    keys: Vec<Namespace>,
    state: LoadState,
    /// Payload loaded for external keys only, kept until a dotted key needs to run it.
    unexecuted_body: Option<String>,
}

struct PendingRequest {
    id: RequestId,
    requires: Vec<Namespace>,
    callback: Option<Callback>,
    on_error: Option<ErrorCallback>,
    scope: Scope,
    origin: Option<Namespace>,
    submitted_at: u64,
    deadline: Option<u64>,
}

/// Dotted names are met once they exist in the registry; external resources once loaded.
fn requirement_met(
    resolver: &mut NamespaceResolver,
    registry: &Registry,
    load_state: &HashMap<Namespace, LoadState>,
    namespace: &Namespace,
) -> bool {
    match namespace {
        Namespace::External(_) => load_state.get(namespace) == Some(&LoadState::Loaded),
        Namespace::Dotted(_) => resolver.exists(registry, namespace),
    }
}

fn completion_url(completion: &Completion) -> String {
    match completion {
        Completion::Loaded { url, .. } | Completion::Failed { url, .. } => url.clone(),
    }
}

pub struct ScriptLoader<C> {
    config: LoaderConfig,
    registry: Registry,
    resolver: NamespaceResolver,
    mapper: UrlMapper,
    transport: Transport<C>,
    queue: Vec<PendingRequest>,
    load_state: HashMap<Namespace, LoadState>,
    fetches: HashMap<String, FetchRecord>,
    failures: HashMap<Namespace, LoaderError>,
    stats: LoadStats,
    listeners: Vec<Box<dyn FnMut(&LoaderEvent)>>,
    clock: Box<dyn Clock>,
    next_request: u64,
    idle: bool,
}

impl<C: ResourceChannel> ScriptLoader<C> {
    pub fn new(config: LoaderConfig, channel: C) -> Self {
        Self::with_clock(config, channel, Box::new(SystemClock::new()))
    }

    pub fn with_clock(config: LoaderConfig, channel: C, clock: Box<dyn Clock>) -> Self {
        if config.use_cache {
            debug!("useCache is set; requests still carry a cache-busting token");
        }
        ScriptLoader {
            mapper: UrlMapper::new(config.base_path.clone()),
            config,
            registry: Registry::new(),
            resolver: NamespaceResolver::new(),
            transport: Transport::new(channel),
            queue: Vec::new(),
            load_state: HashMap::new(),
            fetches: HashMap::new(),
            failures: HashMap::new(),
            stats: LoadStats::default(),
            listeners: Vec::new(),
            clock,
            next_request: 0,
            idle: true,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Direct access for code that populates the registry outside of fetched scripts.
    /// Call [`drain_queue`](Self::drain_queue) afterwards to let waiting requests fire.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn resolver(&self) -> &NamespaceResolver {
        &self.resolver
    }

    pub fn mapper(&self) -> &UrlMapper {
        &self.mapper
    }

    pub fn transport(&self) -> &Transport<C> {
        &self.transport
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    pub fn load_state(&self, namespace: &Namespace) -> Option<LoadState> {
        self.load_state.get(namespace).copied()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.queue.iter().any(|r| r.id == id)
    }

    /// Remaining requirements of every queued request, in queue order.
    pub fn pending_requirements(&self) -> Vec<Vec<Namespace>> {
        self.queue.iter().map(|r| r.requires.clone()).collect()
    }

    /// Whether `name` already exists, as the queue would judge it.
    pub fn exists(&mut self, name: &str) -> bool {
        match Namespace::parse(name) {
            Some(ns) => self.is_met(&ns),
            None => false,
        }
    }

    pub fn on_event<F>(&mut self, listener: F)
    where
        F: FnMut(&LoaderEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Runs `callback` in `scope` once every name in `names` exists, loading what is missing.
    ///
    /// When everything already exists the callback runs before this returns; without a
    /// callback that is a [`LoaderError::MissingCallback`].
    pub fn require<R>(
        &mut self,
        names: R,
        callback: Option<Callback>,
        scope: Option<Scope>,
    ) -> Result<RequireOutcome, LoaderError>
    where
        R: Into<Requirements>,
    {
        let mut request = Request::new(names).in_scope(scope.unwrap_or_default());
        request.callback = callback;
        self.submit(request)
    }

    pub fn submit(&mut self, request: Request) -> Result<RequireOutcome, LoaderError> {
        let outcome = self.enqueue(request)?;
        self.drain_queue();
        Ok(outcome)
    }

    /// Fires every request whose requirements are met, repeating while that makes progress.
    pub fn drain_queue(&mut self) {
        loop {
            let ready = self.collect_ready();
            if ready.is_empty() {
                break;
            }
            for request in ready {
                self.fire(request);
            }
        }
        if self.queue.is_empty() && self.stats.waiting_files == 0 && !self.idle {
            self.idle = true;
            info!(loaded = self.stats.loaded_files, "all requests satisfied");
            self.emit(LoaderEvent::Complete);
        }
    }

    /// Completes at most one ready fetch. Returns whether anything completed.
    pub fn poll_once(&mut self) -> bool {
        self.expire_overdue();
        match self.transport.poll() {
            Some(completion) => {
                self.handle_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Forwards an external completion signal for a non-blocking fetch.
    pub fn notify(&mut self, ticket: TicketId) -> bool {
        match self.transport.notify(ticket) {
            Some(completion) => {
                self.handle_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Completes fetches until none is ready, then reports what is still waiting.
    pub fn run_until_idle(&mut self) -> IdleReport {
        while self.poll_once() {}
        self.expire_overdue();
        self.idle_report()
    }

    pub fn idle_report(&self) -> IdleReport {
        IdleReport {
            stalled: self.pending_requirements(),
            in_flight: self.transport.in_flight(),
            stats: self.stats,
        }
    }

    /// Fails every queued request whose deadline has passed. Returns how many expired.
    pub fn expire_overdue(&mut self) -> usize {
        let now = self.clock.now_millis();
        let (expired, kept): (Vec<PendingRequest>, Vec<PendingRequest>) = self
            .queue
            .drain(..)
            .partition(|r| r.deadline.map_or(false, |deadline| now >= deadline));
        self.queue = kept;
        let count = expired.len();
        for request in expired {
            let error = LoaderError::Timeout {
                pending: join_names(&request.requires),
                waited_ms: now.saturating_sub(request.submitted_at),
            };
            self.emit(LoaderEvent::Error {
                namespace: None,
                message: error.to_string(),
            });
            self.fail_request(request, &error);
        }
        if count > 0 {
            self.drain_queue();
        }
        count
    }

    fn is_met(&mut self, namespace: &Namespace) -> bool {
        requirement_met(
            &mut self.resolver,
            &self.registry,
            &self.load_state,
            namespace,
        )
    }

    fn enqueue(&mut self, request: Request) -> Result<RequireOutcome, LoaderError> {
        let Request {
            requires,
            callback,
            on_error,
            scope,
            timeout,
            origin,
        } = request;
        let requested = requires.into_vec();
        let remaining: Vec<Namespace> = requested
            .iter()
            .filter(|ns| !self.is_met(ns))
            .cloned()
            .collect();

        if remaining.is_empty() {
            return match callback {
                Some(cb) => {
                    self.run_callback(cb, &scope, origin);
                    Ok(RequireOutcome::Immediate)
                }
                None => Err(LoaderError::MissingCallback {
                    names: join_names(&requested),
                }),
            };
        }

        let id = RequestId(self.next_request);
        self.next_request += 1;
        let now = self.clock.now_millis();
        let deadline = timeout
            .or_else(|| self.config.request_timeout())
            .map(|t| now.saturating_add(duration_millis(t)));
        let request = PendingRequest {
            id,
            requires: remaining.clone(),
            callback,
            on_error,
            scope,
            origin,
            submitted_at: now,
            deadline,
        };

        // Failed resources are never fetched again, so waiting on one would never end.
        let failure = remaining
            .iter()
            .find_map(|ns| self.failures.get(ns))
            .cloned();
        if let Some(error) = failure {
            debug!(request = id.0, error = %error, "requirement already failed");
            self.fail_request(request, &error);
            return Ok(RequireOutcome::Failed);
        }

        debug!(request = id.0, requires = %join_names(&remaining), "request queued");
        self.idle = false;
        self.queue.push(request);

        for namespace in remaining {
            if self.load_state.contains_key(&namespace) || self.is_met(&namespace) {
                continue;
            }
            self.start_fetch(namespace);
        }
        Ok(RequireOutcome::Queued(id))
    }

    fn start_fetch(&mut self, namespace: Namespace) {
        let url = self.mapper.url_for(&namespace).to_string();
        if self.fetches.contains_key(&url) {
            self.share_fetch(namespace, url);
            return;
        }
        self.fetches.insert(
            url.clone(),
            FetchRecord {
                keys: vec![namespace.clone()],
                state: LoadState::Requested,
                unexecuted_body: None,
            },
        );
        self.load_state
            .insert(namespace.clone(), LoadState::Requested);
        self.stats.waiting_files += 1;
        let mode = self.config.fetch_mode();
        debug!(namespace = %namespace, url = %url, ?mode, "loading");
        match self.transport.fetch(namespace, &url, mode) {
            Dispatch::Completed(completion) => self.handle_completion(completion),
            Dispatch::InFlight(_) => {}
        }
    }

    /// Attaches `namespace` to the fetch already made for `url`.
    fn share_fetch(&mut self, namespace: Namespace, url: String) {
        let (state, first_key, body) = match self.fetches.get_mut(&url) {
            Some(record) => {
                record.keys.push(namespace.clone());
                let body = if namespace.is_external() {
                    None
                } else {
                    record.unexecuted_body.take()
                };
                (record.state, record.keys[0].clone(), body)
            }
            None => return,
        };
        debug!(namespace = %namespace, url = %url, ?state, "sharing fetch");
        self.load_state.insert(namespace.clone(), state);
        match state {
            LoadState::Requested => {}
            LoadState::Loaded => {
                if let Some(body) = body {
                    if let Err(e) = self.execute(&namespace, &url, &body) {
                        self.mark_failed(&namespace, e);
                    }
                    self.drain_queue();
                }
            }
            LoadState::Failed => {
                if let Some(error) = self.failures.get(&first_key).cloned() {
                    self.mark_failed(&namespace, error);
                }
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        self.stats.waiting_files = self.stats.waiting_files.saturating_sub(1);
        let keys = match self.fetches.get(&completion_url(&completion)) {
            Some(record) => record.keys.clone(),
            None => vec![completion.key().clone()],
        };
        match completion {
            Completion::Loaded { key, url, body } => {
                self.set_fetch_state(&url, &keys, LoadState::Loaded);
                self.stats.loaded_files += 1;
                // The payload runs once, as the first dotted namespace sharing the URL.
                let result = match keys.iter().find(|k| !k.is_external()) {
                    Some(runner) => self.execute(runner, &url, &body),
                    None => {
                        debug!(url = %url, "external resource retrieved");
                        if let Some(record) = self.fetches.get_mut(&url) {
                            record.unexecuted_body = Some(body);
                        }
                        Ok(())
                    }
                };
                match result {
                    Ok(()) => {
                        let event = LoaderEvent::Progress {
                            namespace: key,
                            loaded: self.stats.loaded_files,
                            waiting: self.stats.waiting_files,
                        };
                        self.emit(event);
                    }
                    Err(e) => {
                        for k in &keys {
                            self.mark_failed(k, e.clone());
                        }
                    }
                }
            }
            Completion::Failed { key, url, error } => {
                self.set_fetch_state(&url, &keys, LoadState::Failed);
                let error = LoaderError::FetchFailure {
                    namespace: key,
                    url,
                    source: error,
                };
                for k in &keys {
                    self.mark_failed(k, error.clone());
                }
            }
        }
        self.drain_queue();
    }

    fn set_fetch_state(&mut self, url: &str, keys: &[Namespace], state: LoadState) {
        if let Some(record) = self.fetches.get_mut(url) {
            record.state = state;
        }
        for k in keys {
            self.load_state.insert(k.clone(), state);
        }
    }

    /// Runs a fetched module script in the scope of `key`. External resources are opaque
    /// and count as available once retrieved.
    fn execute(&mut self, key: &Namespace, url: &str, body: &str) -> Result<(), LoaderError> {
        match key {
            Namespace::External(_) => Ok(()),
            Namespace::Dotted(name) => {
                let scope = Scope::named(name.clone());
                let mut ctx = LoadContext::new(&mut self.registry, &scope);
                let result = script::run_script(body, url, &mut ctx);
                let (submissions, errors) = ctx.finish();
                match result {
                    Ok(()) => self.flush(submissions, errors, Some(key.clone())),
                    Err(_) => self.flush(Vec::new(), errors, None),
                }
                result
            }
        }
    }

    fn mark_failed(&mut self, namespace: &Namespace, error: LoaderError) {
        self.load_state.insert(namespace.clone(), LoadState::Failed);
        self.failures.insert(namespace.clone(), error.clone());
        self.stats.failed_files += 1;
        self.emit(LoaderEvent::Error {
            namespace: Some(namespace.clone()),
            message: error.to_string(),
        });
        let (dependents, kept): (Vec<PendingRequest>, Vec<PendingRequest>) = self
            .queue
            .drain(..)
            .partition(|r| r.requires.contains(namespace));
        self.queue = kept;
        for request in dependents {
            self.fail_request(request, &error);
        }
    }

    fn fail_request(&mut self, request: PendingRequest, error: &LoaderError) {
        let PendingRequest {
            id,
            on_error,
            scope,
            origin,
            ..
        } = request;
        match on_error {
            Some(cb) => {
                let mut ctx = LoadContext::new(&mut self.registry, &scope);
                cb(&mut ctx, error);
                let (submissions, errors) = ctx.finish();
                self.flush(submissions, errors, origin.clone());
            }
            None => warn!(request = id.0, error = %error, "request dropped"),
        }
        // A script whose deferred part can no longer run never finishes defining itself.
        if let Some(origin) = origin {
            if self.load_state(&origin) == Some(LoadState::Loaded) && !self.is_met(&origin) {
                self.mark_failed(&origin, error.clone());
            }
        }
    }

    fn collect_ready(&mut self) -> Vec<PendingRequest> {
        let resolver = &mut self.resolver;
        let registry = &self.registry;
        let load_state = &self.load_state;
        for request in self.queue.iter_mut() {
            request
                .requires
                .retain(|ns| !requirement_met(resolver, registry, load_state, ns));
        }
        let (ready, waiting): (Vec<PendingRequest>, Vec<PendingRequest>) = self
            .queue
            .drain(..)
            .partition(|r| r.requires.is_empty());
        self.queue = waiting;
        ready
    }

    fn fire(&mut self, request: PendingRequest) {
        debug!(request = request.id.0, scope = %request.scope, "request satisfied");
        match request.callback {
            Some(cb) => self.run_callback(cb, &request.scope, request.origin),
            None => debug!(request = request.id.0, "no callback to run"),
        }
    }

    fn run_callback(&mut self, cb: Callback, scope: &Scope, origin: Option<Namespace>) {
        let mut ctx = LoadContext::new(&mut self.registry, scope);
        cb(&mut ctx);
        let (submissions, errors) = ctx.finish();
        self.flush(submissions, errors, origin);
    }

    /// Queues requires made from a callback and surfaces the errors it reported.
    fn flush(
        &mut self,
        submissions: Vec<Request>,
        errors: Vec<LoaderError>,
        origin: Option<Namespace>,
    ) {
        for e in errors {
            self.report(e);
        }
        for mut request in submissions {
            if request.origin.is_none() {
                request.origin = origin.clone();
            }
            if let Err(e) = self.enqueue(request) {
                self.report(e);
            }
        }
    }

    fn report(&mut self, error: LoaderError) {
        error!(error = %error, "loader error");
        self.emit(LoaderEvent::Error {
            namespace: error.namespace().cloned(),
            message: error.to_string(),
        });
    }

    fn emit(&mut self, event: LoaderEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}
