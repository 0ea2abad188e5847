//! Tracing helpers
// (c) 2024 Ross Younger

use std::{
    fs::File,
    io::Write,
    sync::{Arc, Mutex},
};

use anyhow::Context as _;
use indicatif::MultiProgress;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

const STANDARD_ENV_VAR: &str = "RUST_LOG";

/// Log filter setup:
/// `RUST_LOG` wins when present; otherwise log only skiff items at the
/// given trace level. The returned flag says whether the environment
/// variable was used, in which case log targets are worth showing.
fn filter_for(trace_level: &str) -> anyhow::Result<(EnvFilter, bool)> {
    match EnvFilter::try_from_env(STANDARD_ENV_VAR) {
        Ok(filter) => Ok((filter, true)),
        Err(e) => {
            if std::env::var(STANDARD_ENV_VAR).is_ok() {
                anyhow::bail!("{STANDARD_ENV_VAR} (set in environment) was invalid: {e}");
            }
            Ok((EnvFilter::new(format!("skiff={trace_level}")), false))
        }
    }
}

/// Set up rust tracing, to console (via an optional `MultiProgress`) and
/// optionally to file.
///
/// **CAUTION:** If this function fails, tracing won't be set up; callers
/// must take extra care to report the error.
pub fn setup(
    trace_level: &str,
    display: Option<&MultiProgress>,
    filename: Option<&str>,
) -> anyhow::Result<()> {
    let mut layers = Vec::new();

    let (filter, used_env) = filter_for(trace_level)?;
    // If the filter came from the environment it may span other crates,
    // so show targets; otherwise we're only logging skiff, don't bother.
    let console = fmt::layer().compact().with_target(used_env);
    match display {
        None => layers.push(
            console
                .with_writer(std::io::stderr)
                .with_filter(filter)
                .boxed(),
        ),
        Some(progress) => layers.push(
            console
                .with_writer(ProgressWriter::wrap(progress))
                .with_filter(filter)
                .boxed(),
        ),
    }

    if let Some(filename) = filename {
        let out_file = Arc::new(File::create(filename).context("Failed to open log file")?);
        let (filter, used_env) = filter_for(trace_level)?;
        layers.push(
            fmt::layer()
                .with_writer(out_file)
                .with_target(used_env)
                .compact()
                .with_ansi(false)
                .with_filter(filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).init();
    Ok(())
}

/// A wrapper type so tracing can output in a way that doesn't mess up
/// `MultiProgress`.
struct ProgressWriter {
    display: MultiProgress,
}

impl ProgressWriter {
    fn wrap(display: &MultiProgress) -> Mutex<Self> {
        Mutex::new(Self {
            display: display.clone(),
        })
    }
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = std::str::from_utf8(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if self.display.is_hidden() {
            eprint!("{msg}");
        } else {
            self.display.println(msg.trim_end_matches('\n'))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
