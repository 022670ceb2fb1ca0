//! Tracing helpers
// (c) 2026 The mqft authors

use std::fs::File;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context as _;
use serde::{Deserialize, Serialize, de};
use strum::VariantNames as _;
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        MakeWriter,
        time::{ChronoLocal, ChronoUtc},
    },
    prelude::*,
};

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

const FRIENDLY_FORMAT_LOCAL: &str = "%Y-%m-%d %H:%M:%SL";
const FRIENDLY_FORMAT_UTC: &str = "%Y-%m-%d %H:%M:%SZ";

/// Environment variable that controls what gets logged to stderr
const STANDARD_ENV_VAR: &str = "RUST_LOG";
/// Environment variable that controls what gets logged to file
const LOG_FILE_DETAIL_ENV_VAR: &str = "RUST_LOG_FILE_DETAIL";

/// Computes the trace level from the `--debug` and `--quiet` flags
#[must_use]
pub fn trace_level(debug: bool, quiet: bool) -> &'static str {
    if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    }
}

/// Selects the format of time stamps in output messages
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
    clap::ValueEnum,
    Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "kebab-case")]
pub enum TimeFormat {
    /// Local time (as best as we can figure it out), as "year-month-day HH:MM:SS"
    #[default]
    Local,
    /// UTC time, as "year-month-day HH:MM:SS"
    Utc,
    /// UTC time, in the format described in [RFC 3339](https://datatracker.ietf.org/doc/html/rfc3339).
    ///
    /// Examples:
    /// `1997-11-12T09:55:06-06:00`
    /// `2010-03-14T18:32:03Z`
    Rfc3339,
}

impl<'de> Deserialize<'de> for TimeFormat {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let lower = s.to_ascii_lowercase();
        // requires strum::EnumString && strum::VariantNames && #[strum(serialize_all = "lowercase")]
        std::str::FromStr::from_str(&lower)
            .map_err(|_| de::Error::unknown_variant(&s, TimeFormat::VARIANTS))
    }
}

/// Result type for `filter_for()`
struct FilterResult {
    filter: EnvFilter,
    used_env: bool, // Did we use the environment variable we were requested to?
}

/// Log filter setup:
/// Use a given environment variable; if it wasn't present, log only mqft items at a given trace level.
fn filter_for(trace_level: &str, key: &str) -> anyhow::Result<FilterResult> {
    EnvFilter::try_from_env(key)
        .map(|filter| FilterResult {
            filter,
            used_env: true,
        })
        .or_else(|e| {
            // The env var was unset or invalid. Which is it?
            if std::env::var(key).is_ok() {
                anyhow::bail!("{key} (set in environment) was not understood: {e}");
            }
            Ok(FilterResult {
                filter: EnvFilter::try_new(format!("mqft={trace_level}"))?,
                used_env: false,
            })
        })
}

fn make_tracing_layer<S, W, F>(
    writer: W,
    filter: F,
    time_format: TimeFormat,
    show_target: bool,
    ansi: bool,
) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static + Sync + Send,
    F: tracing_subscriber::layer::Filter<S> + 'static + Sync + Send,
{
    let layer = tracing_subscriber::fmt::layer::<S>()
        .compact()
        .with_target(show_target)
        .with_ansi(ansi);

    // The timer has to go on before the writer and filter, hence the repetition.
    match time_format {
        TimeFormat::Local => layer
            .with_timer(ChronoLocal::new(FRIENDLY_FORMAT_LOCAL.into()))
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        TimeFormat::Utc => layer
            .with_timer(ChronoUtc::new(FRIENDLY_FORMAT_UTC.into()))
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        TimeFormat::Rfc3339 => layer
            .with_timer(ChronoLocal::rfc_3339())
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

type Layers = Vec<Box<dyn tracing_subscriber::Layer<tracing_subscriber::Registry> + Send + Sync>>;

/// Set up rust tracing to stderr, and optionally to file.
///
/// By default we log only our events (mqft), at a given trace level.
/// This can be overridden by setting `RUST_LOG`.
/// The log file, if any, follows `RUST_LOG_FILE_DETAIL` if that is set.
///
/// **CAUTION:** If this function fails, tracing won't be set up; callers must take extra care to report the error.
///
/// **NOTE:** You can only run this once per process. A global bool prevents re-running.
pub fn setup(
    trace_level: &str,
    log_file: Option<&str>,
    time_format: TimeFormat,
) -> anyhow::Result<()> {
    if is_initialized() {
        tracing::warn!("tracing::setup called a second time (ignoring)");
        return Ok(());
    }
    let layers = setup_inner(trace_level, log_file, time_format)?;
    TRACING_INITIALIZED.store(true, Ordering::Relaxed);
    tracing_subscriber::registry().with(layers).init();
    Ok(())
}

fn setup_inner(
    trace_level: &str,
    log_file: Option<&str>,
    time_format: TimeFormat,
) -> anyhow::Result<Layers> {
    let mut layers = Vec::new();

    // If we used the environment variable, show log targets; if not, we're only logging mqft.
    let filter = filter_for(trace_level, STANDARD_ENV_VAR)?;
    layers.push(make_tracing_layer(
        std::io::stderr,
        filter.filter,
        time_format,
        filter.used_env,
        std::io::IsTerminal::is_terminal(&std::io::stderr()),
    ));

    if let Some(filename) = log_file {
        let out_file = Arc::new(File::create(filename).context("Failed to open log file")?);
        let filter = if std::env::var(LOG_FILE_DETAIL_ENV_VAR).is_ok() {
            FilterResult {
                filter: EnvFilter::try_from_env(LOG_FILE_DETAIL_ENV_VAR)?,
                used_env: true,
            }
        } else {
            filter_for(trace_level, STANDARD_ENV_VAR)?
        };
        layers.push(make_tracing_layer(
            out_file,
            filter.filter,
            time_format,
            filter.used_env,
            false,
        ));
    }
    Ok(layers)
}

/// Returns whether tracing has been initialized
#[must_use]
pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.load(Ordering::Relaxed)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rusty_fork::rusty_fork_test;

    use super::{TimeFormat, setup, setup_inner, trace_level};

    #[test]
    fn trace_levels() {
        assert_eq!(trace_level(true, true), "debug");
        assert_eq!(trace_level(false, true), "error");
        assert_eq!(trace_level(false, false), "info");
    }

    #[test]
    fn time_format_parsing() {
        use std::str::FromStr as _;
        assert_eq!(TimeFormat::from_str("utc").unwrap(), TimeFormat::Utc);
        assert_eq!(TimeFormat::Rfc3339.to_string(), "rfc3339");
        let tf: TimeFormat = serde_bare::from_slice(&serde_bare::to_vec("RFC3339").unwrap()).unwrap();
        assert_eq!(tf, TimeFormat::Rfc3339);
    }

    #[test]
    fn file_output_adds_a_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        let layers = setup_inner("info", path.to_str(), TimeFormat::Utc).unwrap();
        assert_eq!(layers.len(), 2);
        assert!(path.exists());
    }

    #[test]
    fn invalid_level() {
        assert!(setup_inner("invalid_level", None, TimeFormat::Local).is_err());
    }

    rusty_fork_test! {
        #[test]
        fn setup_once() {
            assert!(!super::is_initialized());
            setup("debug", None, TimeFormat::Rfc3339).unwrap();
            assert!(super::is_initialized());
            // second call is a harmless no-op
            setup("info", None, TimeFormat::Local).unwrap();
        }
    }
}
