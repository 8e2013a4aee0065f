// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, bail};
use config::Config;
use retrato_app::{AppState, ItemContext};
use retrato_testkit::{ArtFaker, StubLookup};
use runtime::HttpRuntime;
use std::env;
use std::fs;
use std::path::PathBuf;

const DEMO_SEED: u64 = 1;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `retrato --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let (base_url, context) = if options.demo {
        // The stub's serving thread lives for the rest of the process.
        let stub = StubLookup::spawn()?;
        let context = ArtFaker::new(DEMO_SEED).item_context();
        (stub.base_url().to_owned(), context)
    } else {
        let context = match options.item_path.clone().or_else(|| config.item_data_path()) {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("read item data {}", path.display()))?;
                ItemContext::from_json(&raw)
                    .with_context(|| format!("parse item data {}", path.display()))?
            }
            None if options.check_only => ItemContext::default(),
            None => bail!(
                "no item data; pass --item <file>, set [item].data_path, or run with --demo"
            ),
        };
        (config.lookup_base_url().to_owned(), context)
    };

    let client = retrato_lookup::Client::new(&base_url, config.lookup_timeout()?)
        .with_context(|| {
            format!(
                "invalid [lookup] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?;

    if options.check_only {
        return Ok(());
    }

    let mut state = AppState::default();
    let mut runtime = HttpRuntime::new(client);
    retrato_tui::run_app(&mut state, &mut runtime, context, config.debounce()?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    item_path: Option<PathBuf>,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        item_path: None,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--item" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--item requires a JSON file path"))?;
                options.item_path = Some(PathBuf::from(value.as_ref()));
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("retrato");
    println!("  --config <path>          Use a specific config path");
    println!("  --item <path>            Load item data from a JSON file");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch against an embedded stub lookup service");
    println!("  --check                  Validate config + item data + lookup client");
    println!("  --help                   Show this help");
}
