//! CLI wrapper for the nsload script loader.
//!
//! Usage:
//!   nsload [--config FILE] [--base-path DIR] [--root DIR] [--sync] NAME...
//!   nsload --tokens FILE
//!
//! Loads every NAME (dotted namespace or external path) from disk, runs until nothing is
//! left to do, then prints the namespaces the loaded scripts defined. `--tokens` prints the
//! parse tree of one module script instead.

use nsload::parser::parse_to_token_tree;
use nsload::runner::{FileChannel, LoaderConfig, LoaderEvent, Request, ScriptLoader};
use std::cell::Cell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

struct Options {
    config: Option<PathBuf>,
    base_path: Option<String>,
    root: PathBuf,
    sync: bool,
    tokens: Option<PathBuf>,
    names: Vec<String>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            print_usage();
            process::exit(1);
        }
    };

    let code = match &options.tokens {
        Some(path) => print_tokens(path),
        None => run(options),
    };
    process::exit(code);
}

fn print_usage() {
    eprintln!("nsload - namespace-driven script loader");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  nsload [OPTIONS] NAME...");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config FILE       Read [loader] settings from a TOML file");
    eprintln!("  --base-path DIR     Override the configured base path");
    eprintln!("  --root DIR          Directory URLs are resolved against (default: .)");
    eprintln!("  --sync              Use blocking fetches");
    eprintln!("  --tokens FILE       Print the parse tree of a module script and exit");
    eprintln!("  -h, --help          Show this help");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options {
        config: None,
        base_path: None,
        root: PathBuf::from("."),
        sync: false,
        tokens: None,
        names: Vec::new(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "--config" => options.config = Some(PathBuf::from(expect_value(&mut iter, arg)?)),
            "--base-path" => options.base_path = Some(expect_value(&mut iter, arg)?.to_string()),
            "--root" => options.root = PathBuf::from(expect_value(&mut iter, arg)?),
            "--sync" => options.sync = true,
            "--tokens" => options.tokens = Some(PathBuf::from(expect_value(&mut iter, arg)?)),
            flag if flag.starts_with("--") => return Err(format!("Unknown option '{}'", flag)),
            name => options.names.push(name.to_string()),
        }
    }

    if options.names.is_empty() && options.tokens.is_none() {
        return Err("No names to load".to_string());
    }
    Ok(options)
}

fn expect_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a str, String> {
    iter.next()
        .map(|s| s.as_str())
        .ok_or_else(|| format!("Missing value for '{}'", flag))
}

fn print_tokens(path: &Path) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", path.display(), e);
            return 1;
        }
    };
    match parse_to_token_tree(&source) {
        Ok(tree) => {
            println!("{}", tree);
            0
        }
        Err(e) => {
            eprintln!("{}", e.with_path(&path.display().to_string()));
            1
        }
    }
}

fn load_config(options: &Options) -> Result<LoaderConfig, String> {
    let mut config = match &options.config {
        Some(path) => LoaderConfig::load(path).map_err(|e| e.to_string())?,
        None => LoaderConfig::new(),
    };
    if let Some(base_path) = &options.base_path {
        config = config.with_base_path(base_path.clone());
    }
    if options.sync {
        config = config.with_asynchronous(false);
    }
    Ok(config)
}

fn run(options: Options) -> i32 {
    let config = match load_config(&options) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut loader = ScriptLoader::new(config, FileChannel::new(options.root.clone()));

    let errors = Rc::new(Cell::new(0usize));
    let error_count = Rc::clone(&errors);
    loader.on_event(move |event| match event {
        LoaderEvent::Progress {
            namespace,
            loaded,
            waiting,
        } => info!(%namespace, loaded, waiting, "loaded"),
        LoaderEvent::Complete => info!("all requests satisfied"),
        LoaderEvent::Error { .. } => error_count.set(error_count.get() + 1),
    });

    let done = Rc::new(Cell::new(false));
    let fired = Rc::clone(&done);
    let request = Request::new(options.names.clone())
        .then(move |_| fired.set(true))
        .on_error(|_, e| error!(error = %e, "load failed"));
    if let Err(e) = loader.submit(request) {
        warn!(error = %e, "request rejected");
        return 1;
    }

    let report = loader.run_until_idle();
    for name in loader.registry().names() {
        println!("{}", name);
    }

    if !report.is_settled() {
        for stalled in &report.stalled {
            let names: Vec<&str> = stalled.iter().map(|ns| ns.as_str()).collect();
            eprintln!("Still waiting for: {}", names.join(", "));
        }
    }
    if !done.get() || errors.get() > 0 || !report.is_settled() {
        1
    } else {
        0
    }
}
