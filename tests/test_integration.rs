//! End-to-end tests: module scripts on disk, loaded through the file channel.

extern crate nsload;

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use nsload::runner::namespace::Namespace;
use nsload::runner::registry::Value;
use nsload::runner::scheduler::{LoadState, Request, ScriptLoader};
use nsload::runner::{FileChannel, LoaderConfig};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A small application: a main module that needs a utility module and a vendor file.
fn app_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "src/app/Main.js",
        r#"
        // Entry point.
        define app.Main;
        require app.Util, lib/vendor.js {
            define app.Main.ready = true;
            define app.Main.title = "demo";
            log "main ready";
        }
        "#,
    );
    write(
        dir.path(),
        "src/app/Util.js",
        "define app.Util;\ndefine app.Util.version = 2;\n",
    );
    write(dir.path(), "src/lib/vendor.js", "(function () { /* opaque */ })();");
    dir
}

fn run_app(config: LoaderConfig) -> (ScriptLoader<FileChannel>, Rc<Cell<bool>>, TempDir) {
    let dir = app_tree();
    let mut loader = ScriptLoader::new(config, FileChannel::new(dir.path()));

    let ready = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ready);
    loader
        .submit(Request::new("app.Main").then(move |ctx| {
            assert!(ctx.registry().contains("app.Main"));
            flag.set(true);
        }))
        .unwrap();
    let report = loader.run_until_idle();
    assert!(report.is_settled(), "stalled: {:?}", report.stalled);
    (loader, ready, dir)
}

fn assert_app_loaded(loader: &ScriptLoader<FileChannel>) {
    let registry = loader.registry();
    assert!(registry.contains("app.Main.ready"));
    assert_eq!(
        registry.lookup("app.Main.title").and_then(|n| n.as_value()),
        Some(&Value::Str("demo".to_string()))
    );
    assert_eq!(
        registry.lookup("app.Util.version").and_then(|n| n.as_value()),
        Some(&Value::Number(2.0))
    );
    assert_eq!(
        loader.load_state(&Namespace::parse("lib/vendor.js").unwrap()),
        Some(LoadState::Loaded)
    );
    assert_eq!(loader.stats().loaded_files, 3);
    assert_eq!(loader.stats().failed_files, 0);
}

#[test]
fn test_load_app_non_blocking() {
    let (loader, ready, _dir) = run_app(LoaderConfig::new());
    assert!(ready.get());
    assert_app_loaded(&loader);
}

#[test]
fn test_load_app_blocking() {
    let (loader, ready, _dir) = run_app(LoaderConfig::new().with_asynchronous(false));
    assert!(ready.get());
    assert_app_loaded(&loader);
    assert_eq!(
        loader.registry().names(),
        vec![
            "app",
            "app.Main",
            "app.Main.ready",
            "app.Main.title",
            "app.Util",
            "app.Util.version",
        ]
    );
}

#[test]
fn test_missing_file_fails_the_request() {
    let dir = tempfile::tempdir().unwrap();
    let mut loader = ScriptLoader::new(LoaderConfig::new(), FileChannel::new(dir.path()));

    let failed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&failed);
    loader
        .submit(
            Request::new("app.Missing")
                .then(|_| panic!("must not fire"))
                .on_error(move |_, e| {
                    assert!(e.to_string().contains("src/app/Missing.js"));
                    flag.set(true);
                }),
        )
        .unwrap();
    loader.run_until_idle();
    assert!(failed.get());
}

#[test]
fn test_config_file_drives_the_loader() {
    let dir = app_tree();
    fs::rename(dir.path().join("src"), dir.path().join("public")).unwrap();
    write(
        dir.path(),
        "nsload.toml",
        "[loader]\nbasePath = \"public\"\nuseAsynchronous = false\n",
    );

    let config = LoaderConfig::load(&dir.path().join("nsload.toml")).unwrap();
    let mut loader = ScriptLoader::new(config, FileChannel::new(dir.path()));
    loader.require("app.Main", None, None).unwrap();

    assert!(loader.registry().contains("app.Main.ready"));
    assert_eq!(loader.mapper().base_path(), "public");
}
