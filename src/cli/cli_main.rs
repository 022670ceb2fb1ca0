//! Main CLI for mqft
// (c) 2026 The mqft authors

use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser as _;
use figment::providers::Serialized;
use tracing::{debug, info, warn};

use super::args::{CliArgs, MainMode};
use super::styles::{ERROR, RESET};
use crate::client::{Client, TransferStats};
use crate::config::{Configuration, Manager};
use crate::mailbox::PostOffice;
use crate::server::Server;
use crate::util::{
    setup_tracing, shutdown_signal, stats::transfer_summary, trace_level, tracing_is_initialised,
};

/// Main CLI entrypoint
///
/// Call this from `main`, passing the arguments to use.
/// Normally you will call `cli(std::env::args_os())` but you can pass in alternate arguments for CLI testing.
///
/// This function starts a tokio runtime and performs work in it.
#[must_use]
pub fn cli<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    cli_inner(args)
        .inspect_err(|e| {
            if tracing_is_initialised() {
                tracing::error!("{e:#}");
            } else {
                anstream::eprintln!("{ERROR}Error:{RESET} {e:#}");
            }
        })
        .map_or(ExitCode::FAILURE, |success| {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        })
}

/// Inner CLI logic
///
/// # Return
/// true indicates success. false indicates a failure that has already been reported.
fn cli_inner<I, T>(args: I) -> Result<bool>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let Some(args) = parse_args(args)? else {
        return Ok(true); // help/version shown; exit
    };

    // Command-line settings override every other source
    let mut manager = Manager::standard();
    manager.merge_provider(Serialized::defaults(&args.config));

    handle_mode(args, manager)
}

fn parse_args<I, T>(args: I) -> Result<Option<CliArgs>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    use clap::error::ErrorKind::{DisplayHelp, DisplayVersion};
    match CliArgs::try_parse_from(args) {
        Ok(args) => Ok(Some(args)),
        Err(e) if matches!(e.kind(), DisplayHelp | DisplayVersion) => {
            e.print()?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

// MODE HANDLERS ///////////////////////////////////////////////////////////

#[tokio::main(flavor = "current_thread")]
async fn handle_mode(args: CliArgs, manager: Manager) -> Result<bool> {
    match args.mode {
        MainMode::ConfigFiles => {
            for file in Manager::config_files() {
                anstream::println!("{file}");
            }
            Ok(true)
        }
        MainMode::ShowConfig => {
            anstream::print!("{}", manager.describe()?);
            Ok(true)
        }
        MainMode::Server => {
            let config = manager.get()?;
            start_tracing(args.log_file.as_deref(), args.debug, args.quiet, &config)?;
            run_server(&config).await
        }
        MainMode::Get { pathname, output } => {
            let config = manager.get()?;
            start_tracing(args.log_file.as_deref(), args.debug, args.quiet, &config)?;
            run_get(&config, pathname, output).await
        }
    }
}

fn start_tracing(
    log_file: Option<&str>,
    debug: bool,
    quiet: bool,
    config: &Configuration,
) -> Result<()> {
    // to provoke an error here: set RUST_LOG=.
    setup_tracing(
        trace_level(debug, quiet),
        log_file,
        config.time_format,
    )
}

#[cfg(unix)]
fn post_office(config: &Configuration) -> Result<crate::mailbox::posix::PosixPostOffice> {
    crate::mailbox::posix::PosixPostOffice::new(&config.namespace, config.queue_depth)
        .context("Invalid mailbox configuration")
}

#[cfg(not(unix))]
fn post_office(_config: &Configuration) -> Result<crate::mailbox::memory::MemoryPostOffice> {
    anyhow::bail!("kernel message queues are not available on this platform")
}

async fn run_server(config: &Configuration) -> Result<bool> {
    let office = post_office(config)?;
    let server = Server::start(office, config.server_mailbox(), config.server_options())?;
    let _stats = server
        .accept_loop(shutdown_signal())
        .await
        .context("Server failed")?;
    Ok(true)
}

async fn run_get(config: &Configuration, pathname: String, output: Option<PathBuf>) -> Result<bool> {
    let office = post_office(config)?;
    let client = Client::connect(office.clone(), config.server_mailbox(), config.client_options())?;
    let mailbox = client.id();

    // The mailbox calls block, so the transfer runs on its own thread.
    let (tx, rx) = tokio::sync::oneshot::channel();
    let thread_output = output.clone();
    let _ = std::thread::Builder::new()
        .name("mqft-client".into())
        .spawn(move || {
            let _ = tx.send(transfer(client, &pathname, thread_output.as_deref()));
        })?;

    tokio::select! {
        result = rx => {
            let stats = result.context("client thread exited unexpectedly")??;
            info!("{}", transfer_summary(&stats));
            Ok(true)
        }
        () = shutdown_signal() => {
            warn!("Interrupted; abandoning transfer");
            if let Err(e) = office.destroy(mailbox) {
                debug!("destroying mailbox {mailbox}: {e}");
            }
            if let Some(path) = output {
                remove_partial(&path);
            }
            Ok(false)
        }
    }
}

/// Requests one file and receives it to `output` (or stdout).
/// A partially written output file is removed if the transfer fails.
fn transfer<P: PostOffice>(
    mut client: Client<P>,
    pathname: &str,
    output: Option<&Path>,
) -> Result<TransferStats> {
    client.request(pathname)?;
    let Some(path) = output else {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        return Ok(client.receive_all(Some(&mut lock))?);
    };
    let file = File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let result = client.receive_all(Some(&mut writer));
    if result.is_err() {
        drop(writer);
        remove_partial(path);
    }
    Ok(result?)
}

fn remove_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!("removing partial output {}: {e}", path.display());
    }
}
