pub mod clock;
pub mod config;
pub mod error;
pub mod mapper;
pub mod namespace;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod script;
pub mod transport;

pub use config::LoaderConfig;
pub use error::{FetchError, LoaderError};
pub use namespace::{Namespace, Requirements};
pub use registry::{Registry, Value};
pub use scheduler::{
    callback, LoadContext, LoadState, LoadStats, LoaderEvent, Request, RequireOutcome,
    Scope, ScriptLoader,
};
pub use transport::{FileChannel, MemoryChannel, ResourceChannel, Response};
