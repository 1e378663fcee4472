use std::env;
use std::io::{self, Read};

use anyhow::{Context, bail};
use querynorm::{QueryNormConfig, SourceReport, normalize_query};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: querynorm [--config <file.yaml>] [QUERY...]\n\
                     Reads the query from stdin when none is given.";

fn main() -> anyhow::Result<()> {
    let mut config_path = None;
    let mut query_parts = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args.next().context("--config requires a path")?;
                config_path = Some(path);
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ => query_parts.push(arg),
        }
    }

    let config = match config_path {
        Some(path) => QueryNormConfig::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => QueryNormConfig::default(),
    };
    init_tracing(&config);

    let query = if query_parts.is_empty() {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading query from stdin")?;
        buf
    } else {
        query_parts.join(" ")
    };
    if query.trim().is_empty() {
        bail!("no query given\n{USAGE}");
    }

    let source = normalize_query(&query, &config.normalize_config())?;
    tracing::debug!(cache_key = %source.cache_key(), "query normalized");

    let report = SourceReport::from(&source);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_tracing(config: &QueryNormConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
