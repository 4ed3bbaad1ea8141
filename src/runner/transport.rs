//! Fetching of individual resources.
//!
//! A [`ResourceChannel`] is the raw capability to retrieve source text for a URL. The
//! [`Transport`] sits on top of it and adds what the loader needs:
//!
//! - a cache-busting token on every request,
//! - status normalization and the 2xx success check,
//! - blocking fetches that complete before `fetch` returns,
//! - non-blocking fetches that complete later, in whatever order the channel makes them
//!   ready, through [`Transport::poll`] or [`Transport::notify`],
//! - exactly one completion per fetch, however many signals arrive for it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::runner::error::FetchError;
use crate::runner::mapper::{append_query, strip_query};
use crate::runner::namespace::Namespace;

lazy_static! {
    /// Statuses some channels report in place of the real one.
    static ref STATUS_ALIASES: HashMap<u16, u16> = {
        let mut aliases = HashMap::new();
        aliases.insert(1223, 204);
        aliases
    };
}

pub fn normalize_status(status: u16) -> u16 {
    STATUS_ALIASES.get(&status).copied().unwrap_or(status)
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&normalize_status(status))
}

/// A fresh `nocache=<token>` query parameter.
pub fn cache_bust_token() -> String {
    format!("nocache={}", Uuid::new_v4().to_simple())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Response {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16) -> Self {
        Response {
            status,
            body: String::new(),
        }
    }
}

/// Raw retrieval of resource text. This is the boundary test doubles replace.
pub trait ResourceChannel {
    fn retrieve(&mut self, url: &str) -> Result<Response, FetchError>;

    /// Whether a non-blocking fetch of `url` can complete now.
    fn is_ready(&self, _url: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// The fetch completes before `fetch` returns.
    Blocking,
    /// The fetch completes later, through `poll` or `notify`.
    NonBlocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId(u64);

/// Lets exactly one completion through.
#[derive(Debug, Default)]
pub struct CompletionLatch {
    fired: bool,
}

impl CompletionLatch {
    pub fn new() -> Self {
        CompletionLatch { fired: false }
    }

    /// True the first time only.
    pub fn fire(&mut self) -> bool {
        if self.fired {
            false
        } else {
            self.fired = true;
            true
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Loaded {
        key: Namespace,
        url: String,
        body: String,
    },
    Failed {
        key: Namespace,
        url: String,
        error: FetchError,
    },
}

impl Completion {
    pub fn key(&self) -> &Namespace {
        match self {
            Completion::Loaded { key, .. } | Completion::Failed { key, .. } => key,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Dispatch {
    Completed(Completion),
    InFlight(TicketId),
}

#[derive(Debug)]
struct Ticket {
    id: TicketId,
    key: Namespace,
    url: String,
    latch: CompletionLatch,
}

pub struct Transport<C> {
    channel: C,
    tickets: Vec<Ticket>,
    next_ticket: u64,
}

impl<C: ResourceChannel> Transport<C> {
    pub fn new(channel: C) -> Self {
        Transport {
            channel,
            tickets: Vec::new(),
            next_ticket: 0,
        }
    }

    /// Starts fetching `url` on behalf of `key`.
    pub fn fetch(&mut self, key: Namespace, url: &str, mode: FetchMode) -> Dispatch {
        match mode {
            FetchMode::Blocking => Dispatch::Completed(self.retrieve(key, url)),
            FetchMode::NonBlocking => {
                let id = TicketId(self.next_ticket);
                self.next_ticket += 1;
                debug!(url, ticket = id.0, "fetch started");
                self.tickets.push(Ticket {
                    id,
                    key,
                    url: url.to_string(),
                    latch: CompletionLatch::new(),
                });
                Dispatch::InFlight(id)
            }
        }
    }

    /// Completes the oldest in-flight fetch whose resource is ready, if any.
    pub fn poll(&mut self) -> Option<Completion> {
        let channel = &self.channel;
        let id = self
            .tickets
            .iter()
            .find(|t| !t.latch.is_fired() && channel.is_ready(&t.url))
            .map(|t| t.id)?;
        self.notify(id)
    }

    /// Completion signal for a ticket. Repeated signals for the same ticket are ignored.
    pub fn notify(&mut self, id: TicketId) -> Option<Completion> {
        let ticket = self.tickets.iter_mut().find(|t| t.id == id)?;
        if !ticket.latch.fire() {
            trace!(ticket = id.0, "duplicate completion signal ignored");
            return None;
        }
        let (key, url) = (ticket.key.clone(), ticket.url.clone());
        Some(self.retrieve(key, &url))
    }

    /// Fetches that started but have not completed yet.
    pub fn in_flight(&self) -> usize {
        self.tickets.iter().filter(|t| !t.latch.is_fired()).count()
    }

    pub fn in_flight_urls(&self) -> Vec<&str> {
        self.tickets
            .iter()
            .filter(|t| !t.latch.is_fired())
            .map(|t| t.url.as_str())
            .collect()
    }

    fn retrieve(&mut self, key: Namespace, url: &str) -> Completion {
        let request_url = append_query(url, &cache_bust_token());
        let result = self
            .channel
            .retrieve(&request_url)
            .and_then(|response| {
                let status = normalize_status(response.status);
                if is_success(status) {
                    Ok(response.body)
                } else {
                    Err(FetchError::Status(status))
                }
            });
        match result {
            Ok(body) => {
                debug!(url, bytes = body.len(), "fetch complete");
                Completion::Loaded {
                    key,
                    url: url.to_string(),
                    body,
                }
            }
            Err(e) => {
                error!(url, error = %e, "cannot load resource");
                Completion::Failed {
                    key,
                    url: url.to_string(),
                    error: e,
                }
            }
        }
    }
}

/// Serves URLs from files below a root directory.
pub struct FileChannel {
    root: PathBuf,
}

impl FileChannel {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileChannel { root: root.into() }
    }
}

impl ResourceChannel for FileChannel {
    fn retrieve(&mut self, url: &str) -> Result<Response, FetchError> {
        let path = self.root.join(strip_query(url));
        match fs::read_to_string(&path) {
            Ok(body) => Ok(Response::ok(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Response::with_status(404)),
            Err(e) => Err(FetchError::Transport(format!("{}: {}", path.display(), e))),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    resources: HashMap<String, Response>,
    held: HashSet<String>,
    requests: Vec<String>,
}

/// In-memory channel. Clones share the same table, so a handle kept outside the loader
/// can add resources, hold or release them, and inspect the request log.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl Into<String>) {
        self.insert_response(url, Response::ok(body));
    }

    pub fn insert_response(&self, url: impl Into<String>, response: Response) {
        self.state.borrow_mut().resources.insert(url.into(), response);
    }

    /// Keeps non-blocking fetches of `url` from completing until released.
    pub fn hold(&self, url: impl Into<String>) {
        self.state.borrow_mut().held.insert(url.into());
    }

    pub fn release(&self, url: &str) {
        self.state.borrow_mut().held.remove(url);
    }

    /// Every request URL seen so far, query included.
    pub fn requests(&self) -> Vec<String> {
        self.state.borrow().requests.clone()
    }

    /// How many times `url` (query ignored) was requested.
    pub fn request_count(&self, url: &str) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|r| strip_query(r) == url)
            .count()
    }
}

impl ResourceChannel for MemoryChannel {
    fn retrieve(&mut self, url: &str) -> Result<Response, FetchError> {
        let mut state = self.state.borrow_mut();
        state.requests.push(url.to_string());
        Ok(state
            .resources
            .get(strip_query(url))
            .cloned()
            .unwrap_or_else(|| Response::with_status(404)))
    }

    fn is_ready(&self, url: &str) -> bool {
        !self.state.borrow().held.contains(strip_query(url))
    }
}
