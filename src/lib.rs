//! # nsload - namespace-driven script loading
//!
//! Loads module scripts on demand, keyed by the namespaces they define:
//! - PEG parser for the module script language (`define`, `require`, `log`)
//! - Namespace registry with truthiness-aware lookup and a positive resolver cache
//! - Namespace to URL mapping with memoization
//! - Blocking and non-blocking fetch over a pluggable resource channel
//! - A dependency queue that fetches each resource once and fires callbacks exactly once
//!
//! ## Quick Start
//!
//! ```
//! use nsload::runner::{LoaderConfig, MemoryChannel, Request, ScriptLoader};
//!
//! let channel = MemoryChannel::new();
//! channel.insert("src/Shapes/Circle.js", "define Shapes.Circle;");
//!
//! let mut loader = ScriptLoader::new(LoaderConfig::new(), channel.clone());
//! loader
//!     .submit(Request::new("Shapes.Circle").then(|ctx| {
//!         assert!(ctx.registry().contains("Shapes.Circle"));
//!     }))
//!     .unwrap();
//!
//! let report = loader.run_until_idle();
//! assert!(report.is_settled());
//! assert_eq!(channel.request_count("src/Shapes/Circle.js"), 1);
//! ```
//!
//! ## Module scripts
//!
//! ```text
//! define Shapes.Circle;
//! define Shapes.Circle.sides = 0;
//! require Shapes.Base, lib/vendor.js {
//!     define Shapes.Ready;
//!     log "shapes ready";
//! }
//! ```
//!
//! A fetched dotted namespace is parsed and run against the registry. Names containing a
//! `/` are external resources: they are fetched as-is and count as available once
//! retrieved, without being parsed.
//!
//! ## Architecture
//!
//! - **[`parser`]** - PEG grammar and AST for module scripts
//! - **[`runner`]** - Loading machinery
//!   - **[`runner::registry`]** - The namespace tree
//!   - **[`runner::resolver`]** - Existence checks with a positive cache
//!   - **[`runner::mapper`]** - Namespace to URL mapping
//!   - **[`runner::transport`]** - Fetching, cache busting, completion latches
//!   - **[`runner::scheduler`]** - The dependency queue

#[macro_use]
extern crate lazy_static;

pub mod parser;
pub mod runner;
