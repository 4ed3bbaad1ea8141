//! Namespace existence checks against the registry, with a monotonic positive cache.

use std::collections::HashSet;

use crate::runner::namespace::Namespace;
use crate::runner::registry::Registry;

/// Answers "is this namespace already populated?".
///
/// Positive answers are cached for the whole name as given and never invalidated: the
/// registry is treated as append-only, so once a name resolved it stays resolved.
/// Negative answers are never cached.
///
/// External resource paths are never resolvable through the registry; whether they are
/// available is tracked by the loader's load state table instead.
#[derive(Debug, Default)]
pub struct NamespaceResolver {
    cache: HashSet<String>,
    walks: usize,
}

impl NamespaceResolver {
    pub fn new() -> Self {
        NamespaceResolver {
            cache: HashSet::new(),
            walks: 0,
        }
    }

    pub fn exists(&mut self, registry: &Registry, namespace: &Namespace) -> bool {
        match namespace {
            Namespace::External(_) => false,
            Namespace::Dotted(name) => {
                if self.cache.contains(name) {
                    return true;
                }
                self.walks += 1;
                if registry.contains(name) {
                    self.cache.insert(name.clone());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// True iff every name exists. Stops at the first missing one.
    pub fn exists_all(&mut self, registry: &Registry, namespaces: &[Namespace]) -> bool {
        namespaces.iter().all(|ns| self.exists(registry, ns))
    }

    /// Same as [`exists`](Self::exists) for an unclassified name; empty input never exists.
    pub fn exists_raw(&mut self, registry: &Registry, raw: &str) -> bool {
        match Namespace::parse(raw) {
            Some(ns) => self.exists(registry, &ns),
            None => false,
        }
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains(name)
    }

    /// How many registry walks have been performed (cache hits excluded).
    pub fn walk_count(&self) -> usize {
        self.walks
    }
}
