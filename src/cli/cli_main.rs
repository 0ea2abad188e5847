// Main CLI entrypoint
// (c) 2024 Ross Younger

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use human_repr::HumanCount as _;
use indicatif::MultiProgress;
use tracing::{debug, info};

use crate::config::{Configuration, Manager};
use crate::copy::{self, CopyJob, CopySummary, RemoteSpec, DEFAULT_BATCH_SIZE};
use crate::remote::{ConnectOptions, RemoteFs as _, SftpSession};
use crate::select::MATCH_EVERYTHING;
use crate::util::setup_tracing;

use super::args::CliArgs;

/// Environment variable consulted for password authentication.
const PASSWORD_ENV_VAR: &str = "SKIFF_PASSWORD";

/// Main CLI entrypoint
pub fn cli() -> Result<ExitCode> {
    let args = CliArgs::parse();
    run_client(&args)
}

#[tokio::main(flavor = "current_thread")]
async fn run_client(args: &CliArgs) -> Result<ExitCode> {
    let progress = MultiProgress::new(); // This writes to stderr
    let trace_level = if args.debug {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };
    setup_tracing(trace_level, Some(&progress), args.log_file.as_deref()).inspect_err(|e| {
        // tracing isn't up, so this is the only way the user hears about it
        let style = super::styles::ERROR;
        anstream::eprintln!("{style}error{style:#}: {e:?}");
    })?;

    client_main(args, &progress)
        .await
        .inspect_err(|e| tracing::error!("{e:#}"))
        .map_or(Ok(ExitCode::FAILURE), |()| Ok(ExitCode::SUCCESS))
}

fn configuration(args: &CliArgs) -> Result<Configuration> {
    let mut config: Configuration = Manager::new()
        .get()
        .with_context(|| format!("reading configuration ({})", Manager::config_files().join(", ")))?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(identity) = &args.identity {
        config.identity = identity.to_string_lossy().into_owned();
    }
    Ok(config)
}

fn username(destination: &RemoteSpec, config: &Configuration) -> Result<String> {
    if let Some(user) = &destination.user {
        return Ok(user.clone());
    }
    if !config.username.is_empty() {
        return Ok(config.username.clone());
    }
    std::env::var("USER").context("no username given and $USER is not set")
}

async fn client_main(args: &CliArgs, progress: &MultiProgress) -> Result<()> {
    let config = configuration(args)?;
    let source = args
        .source
        .as_ref()
        .ok_or(anyhow::anyhow!("source directory must be specified"))?;
    let destination = args
        .destination
        .as_ref()
        .ok_or(anyhow::anyhow!("destination must be specified"))?;

    // Trailing separators would upset the root-prefix stripping later on.
    let lossy = source.to_string_lossy();
    let trimmed = lossy.trim_end_matches(['/', '\\']);
    let source_root: std::path::PathBuf = if trimmed.is_empty() {
        source.clone()
    } else {
        trimmed.into()
    };

    let patterns = if args.globs.is_empty() {
        vec![MATCH_EVERYTHING.to_owned()]
    } else {
        args.globs.clone()
    };

    let target_folder = copy::normalize_target(&destination.folder);
    if target_folder != destination.folder {
        debug!("target folder {} rewritten to {target_folder}", destination.folder);
    }

    let job = CopyJob {
        source_root,
        patterns,
        target_folder,
        flatten: args.flatten,
        overwrite: !args.no_clobber,
        clean_target: args.clean_target,
        on_empty: args.on_empty,
        batch_size: DEFAULT_BATCH_SIZE,
    };

    let session = SftpSession::connect(ConnectOptions {
        host: destination.host.clone(),
        port: config.port,
        username: username(destination, &config)?,
        password: std::env::var(PASSWORD_ENV_VAR).ok(),
        identity: (!config.identity.is_empty()).then(|| config.identity.clone().into()),
        timeout: Duration::from_secs(u64::from(config.timeout)),
    })
    .await
    .with_context(|| format!("connecting to {}", destination.host))?;

    // The session must be released on every exit path, so hold the run's
    // outcome until after close().
    let result = copy::run(&session, &job, progress, args.quiet).await;
    session.close().await;
    let summary = result?;

    if !args.quiet {
        match summary {
            CopySummary::Files { copied, bytes } => {
                info!("copied {copied} file(s), {}", bytes.human_count_bytes());
            }
            CopySummary::Tree { remote_root } => {
                info!("copied the whole source tree to {remote_root}");
            }
        }
    }
    progress.clear()?;
    Ok(())
}
