//! Namespace resolver tests: registry walks, truthiness, and the positive cache.

extern crate nsload;

use nsload::runner::namespace::Namespace;
use nsload::runner::registry::{Registry, Value};
use nsload::runner::resolver::NamespaceResolver;

fn ns(raw: &str) -> Namespace {
    Namespace::parse(raw).unwrap()
}

#[test]
fn test_existing_chain_resolves() {
    let mut registry = Registry::new();
    registry.create_namespaces("com.acme.Car").unwrap();
    let mut resolver = NamespaceResolver::new();

    assert!(resolver.exists(&registry, &ns("com.acme.Car")));
    assert!(resolver.exists(&registry, &ns("com.acme")));
    assert!(!resolver.exists(&registry, &ns("com.acme.Truck")));
    assert!(!resolver.exists(&registry, &ns("org")));
}

#[test]
fn test_only_the_whole_name_is_cached() {
    let mut registry = Registry::new();
    registry.create_namespaces("A.B.C").unwrap();
    let mut resolver = NamespaceResolver::new();

    assert!(resolver.exists(&registry, &ns("A.B.C")));
    assert!(resolver.is_cached("A.B.C"));
    assert!(!resolver.is_cached("A.B"));
    assert!(!resolver.is_cached("A"));
}

#[test]
fn test_negative_results_are_not_cached() {
    let mut registry = Registry::new();
    let mut resolver = NamespaceResolver::new();

    assert!(!resolver.exists(&registry, &ns("Late.Comer")));
    assert!(!resolver.is_cached("Late.Comer"));

    registry.create_namespaces("Late.Comer").unwrap();
    assert!(resolver.exists(&registry, &ns("Late.Comer")));
}

#[test]
fn test_cache_is_monotonic() {
    let mut registry = Registry::new();
    registry.create_namespaces("App.Model").unwrap();
    let mut resolver = NamespaceResolver::new();

    assert!(resolver.exists(&registry, &ns("App.Model")));
    let walks = resolver.walk_count();

    // Overwrite with a falsy value: a fresh walk would now fail.
    registry.assign("App.Model", Value::Number(0.0)).unwrap();
    assert!(!registry.contains("App.Model"));

    assert!(resolver.exists(&registry, &ns("App.Model")));
    assert_eq!(resolver.walk_count(), walks);
}

#[test]
fn test_falsy_leaf_does_not_resolve() {
    let mut registry = Registry::new();
    registry.assign("Config.debug", Value::Bool(false)).unwrap();
    registry.assign("Config.name", Value::Str(String::new())).unwrap();
    registry.assign("Config.level", Value::Number(3.0)).unwrap();
    let mut resolver = NamespaceResolver::new();

    assert!(resolver.exists(&registry, &ns("Config")));
    assert!(!resolver.exists(&registry, &ns("Config.debug")));
    assert!(!resolver.exists(&registry, &ns("Config.name")));
    assert!(resolver.exists(&registry, &ns("Config.level")));
    assert!(!resolver.exists(&registry, &ns("Config.level.deeper")));
}

#[test]
fn test_external_names_never_resolve_through_the_registry() {
    let mut registry = Registry::new();
    registry.create_namespaces("vendor").unwrap();
    let mut resolver = NamespaceResolver::new();

    let external = ns("vendor/jquery.js");
    assert!(external.is_external());
    assert!(!resolver.exists(&registry, &external));
    assert!(!resolver.is_cached("vendor/jquery.js"));
    assert_eq!(resolver.walk_count(), 0);
}

#[test]
fn test_exists_all_short_circuits() {
    let mut registry = Registry::new();
    registry.create_namespaces("A.B").unwrap();
    registry.create_namespaces("C.D").unwrap();
    let mut resolver = NamespaceResolver::new();

    assert!(resolver.exists_all(&registry, &[ns("A.B"), ns("C.D")]));
    assert_eq!(resolver.walk_count(), 2);

    let before = resolver.walk_count();
    assert!(!resolver.exists_all(&registry, &[ns("X.Y"), ns("Z")]));
    assert_eq!(resolver.walk_count(), before + 1);

    assert!(resolver.exists_all(&registry, &[]));
}

#[test]
fn test_malformed_input_does_not_exist() {
    let registry = Registry::new();
    let mut resolver = NamespaceResolver::new();

    assert!(!resolver.exists_raw(&registry, ""));
    assert!(!resolver.exists_raw(&registry, "Nope"));
}
