// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: recognise walls, openings and rooms in a drawing
//!
//! Input is a JSON page bundle (one page or an array of pages) or, with
//! `--raster`, an image file. Output is the JSON document result.
//!
//! Usage:
//!   recognize-plan <input> [options]

use anyhow::{bail, Context, Result};
use planscan_recognition::raster::load_page;
use planscan_recognition::{
    PageInput, RasterConfig, RecognitionConfig, RecognitionContext, RecognitionEngine,
};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// A bundle holds a single page or a list of pages
#[derive(Deserialize)]
#[serde(untagged)]
enum PageBundle {
    Many(Vec<PageInput>),
    One(Box<PageInput>),
}

impl PageBundle {
    fn into_pages(self) -> Vec<PageInput> {
        match self {
            PageBundle::Many(pages) => pages,
            PageBundle::One(page) => vec![*page],
        }
    }
}

struct Options {
    input: PathBuf,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    raster: bool,
    pretty: bool,
}

fn print_usage() {
    println!("Usage: recognize-plan <input> [options]");
    println!();
    println!("Arguments:");
    println!("  <input>              JSON page bundle, or an image with --raster");
    println!();
    println!("Options:");
    println!("  --config <path>      Recognition configuration (JSON, partial allowed)");
    println!("  --output <path>      Write the result here instead of stdout");
    println!("  --raster             Treat the input as a PNG/JPEG image");
    println!("  --pretty             Pretty-print the JSON output");
    println!("  -h, --help           Show this help");
    println!();
    println!("Logging is controlled by RUST_LOG (default: info).");
}

fn parse_args(args: &[String]) -> Result<Option<Options>> {
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        return Ok(None);
    }

    let mut options = Options {
        input: PathBuf::from(&args[1]),
        config: None,
        output: None,
        raster: false,
        pretty: false,
    };

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let value = args.get(i).context("--config needs a path")?;
                options.config = Some(PathBuf::from(value));
            }
            "--output" => {
                i += 1;
                let value = args.get(i).context("--output needs a path")?;
                options.output = Some(PathBuf::from(value));
            }
            "--raster" => options.raster = true,
            "--pretty" => options.pretty = true,
            other => bail!("unknown option: {other}"),
        }
        i += 1;
    }

    Ok(Some(options))
}

fn load_config(path: Option<&Path>) -> Result<RecognitionConfig> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("cannot read config '{}'", path.display()))?;
            RecognitionConfig::from_json(&json)
                .with_context(|| format!("invalid config '{}'", path.display()))
        }
        None => Ok(RecognitionConfig::default()),
    }
}

fn load_pages(options: &Options, ctx: &RecognitionContext) -> Result<Vec<PageInput>> {
    if options.raster {
        let page = load_page(&options.input, 0, &RasterConfig::default(), ctx)
            .with_context(|| format!("cannot extract lines from '{}'", options.input.display()))?;
        return Ok(vec![page]);
    }

    let json = fs::read_to_string(&options.input)
        .with_context(|| format!("cannot read '{}'", options.input.display()))?;
    let bundle: PageBundle = serde_json::from_str(&json)
        .with_context(|| format!("'{}' is not a page bundle", options.input.display()))?;
    Ok(bundle.into_pages())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(options) = parse_args(&args)? else {
        print_usage();
        return Ok(());
    };

    let engine = RecognitionEngine::new(load_config(options.config.as_deref())?)?;
    let ctx = RecognitionContext::new();

    let pages = load_pages(&options, &ctx)?;
    if pages.is_empty() {
        bail!("'{}' contains no pages", options.input.display());
    }

    let document = engine.recognize_document(&pages, &ctx)?;
    let json = if options.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };

    match &options.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("cannot write '{}'", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote recognition result");
        }
        None => println!("{json}"),
    }

    Ok(())
}
