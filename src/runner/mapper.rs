//! Translation of namespaces into resource locations.

use std::collections::HashMap;

use crate::runner::namespace::{Namespace, NAMESPACE_SEPARATOR, PATH_SEPARATOR};

pub const SCRIPT_SUFFIX: &str = ".js";
pub const MINIFIED_SUFFIX: &str = ".min.js";

/// Maps a namespace to its URL under `base_path`.
///
/// `com.acme.Car` becomes `<base>/com/acme/Car.js`; a dotted name already ending in
/// `.min.js` keeps that suffix. External paths are placed under the base path untouched.
pub fn namespace_to_url(namespace: &Namespace, base_path: &str) -> String {
    let relative = match namespace {
        Namespace::External(path) => path.clone(),
        Namespace::Dotted(name) => {
            let (stem, suffix) = if name.len() > MINIFIED_SUFFIX.len()
                && name.ends_with(MINIFIED_SUFFIX)
            {
                (&name[..name.len() - MINIFIED_SUFFIX.len()], MINIFIED_SUFFIX)
            } else {
                (name.as_str(), SCRIPT_SUFFIX)
            };
            format!(
                "{}{}",
                stem.replace(NAMESPACE_SEPARATOR, &PATH_SEPARATOR.to_string()),
                suffix
            )
        }
    };
    join_path(base_path, &relative)
}

fn join_path(base_path: &str, relative: &str) -> String {
    let base = base_path.trim_end_matches(PATH_SEPARATOR);
    if base.is_empty() {
        relative.to_string()
    } else {
        format!("{}{}{}", base, PATH_SEPARATOR, relative)
    }
}

/// Appends `query` to `url`, choosing `?` or `&` depending on what is already there.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query)
}

/// The URL without its query string.
pub fn strip_query(url: &str) -> &str {
    match url.find('?') {
        Some(idx) => &url[..idx],
        None => url,
    }
}

/// Memoizing mapper bound to the configured base path.
#[derive(Debug)]
pub struct UrlMapper {
    base_path: String,
    urls: HashMap<Namespace, String>,
}

impl UrlMapper {
    pub fn new(base_path: impl Into<String>) -> Self {
        UrlMapper {
            base_path: base_path.into(),
            urls: HashMap::new(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// URL for `namespace` under the configured base path, computed once per namespace.
    pub fn url_for(&mut self, namespace: &Namespace) -> &str {
        let base_path = &self.base_path;
        self.urls
            .entry(namespace.clone())
            .or_insert_with(|| namespace_to_url(namespace, base_path))
    }

    /// URL for `namespace`, optionally under a different base path for this call only.
    pub fn to_url(&self, namespace: &Namespace, base_path_override: Option<&str>) -> String {
        match base_path_override {
            Some(base) => namespace_to_url(namespace, base),
            None => match self.urls.get(namespace) {
                Some(url) => url.clone(),
                None => namespace_to_url(namespace, &self.base_path),
            },
        }
    }

    pub fn memoized(&self) -> usize {
        self.urls.len()
    }
}
