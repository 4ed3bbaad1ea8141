//! Namespace identifiers.
//!
//! A requirement is either a dotted path into the registry (`com.acme.Car`) or a
//! path-like reference to an external resource (`vendor/jquery.min.js`). The two are
//! told apart once, when the raw string is ingested, by the presence of a `/`.

use std::fmt;

pub const PATH_SEPARATOR: char = '/';
pub const NAMESPACE_SEPARATOR: char = '.';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// A position in the registry, e.g. `A.B.C`.
    Dotted(String),
    /// A direct resource path, e.g. `vendor/lib.js`.
    External(String),
}

impl Namespace {
    /// Classifies a raw name. Empty names carry no requirement and yield `None`.
    pub fn parse(raw: &str) -> Option<Namespace> {
        if raw.is_empty() {
            None
        } else if raw.contains(PATH_SEPARATOR) {
            Some(Namespace::External(raw.to_string()))
        } else {
            Some(Namespace::Dotted(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Namespace::Dotted(s) | Namespace::External(s) => s,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Namespace::External(_))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered list of requirements as accepted by `require`.
///
/// Conversions accept a single name or any sequence of names; empty entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements(Vec<Namespace>);

impl Requirements {
    pub fn new() -> Self {
        Requirements(Vec::new())
    }

    pub fn push(&mut self, raw: &str) {
        if let Some(ns) = Namespace::parse(raw) {
            self.0.push(ns);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[Namespace] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Namespace> {
        self.0
    }
}

impl<S: AsRef<str>> std::iter::FromIterator<S> for Requirements {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut requirements = Requirements::new();
        for raw in iter {
            requirements.push(raw.as_ref());
        }
        requirements
    }
}

impl From<&str> for Requirements {
    fn from(raw: &str) -> Self {
        std::iter::once(raw).collect()
    }
}

impl From<String> for Requirements {
    fn from(raw: String) -> Self {
        std::iter::once(raw).collect()
    }
}

impl From<&String> for Requirements {
    fn from(raw: &String) -> Self {
        std::iter::once(raw.as_str()).collect()
    }
}

impl From<Vec<&str>> for Requirements {
    fn from(raw: Vec<&str>) -> Self {
        raw.into_iter().collect()
    }
}

impl From<Vec<String>> for Requirements {
    fn from(raw: Vec<String>) -> Self {
        raw.into_iter().collect()
    }
}

impl From<&[&str]> for Requirements {
    fn from(raw: &[&str]) -> Self {
        raw.iter().collect()
    }
}

impl From<&[String]> for Requirements {
    fn from(raw: &[String]) -> Self {
        raw.iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for Requirements {
    fn from(raw: [&str; N]) -> Self {
        raw.iter().collect()
    }
}

impl From<Namespace> for Requirements {
    fn from(ns: Namespace) -> Self {
        Requirements(vec![ns])
    }
}

impl From<Vec<Namespace>> for Requirements {
    fn from(names: Vec<Namespace>) -> Self {
        Requirements(names)
    }
}
