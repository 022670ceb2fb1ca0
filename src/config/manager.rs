//! Configuration file wrangling
// (c) 2026 The mqft authors

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use figment::providers::{Env, Format as _, Serialized, Toml};
use figment::{Figment, Provider};
use tracing::debug;

use super::Configuration;

/// Prefix of environment variables we read
const ENV_PREFIX: &str = "MQFT_";

const SYSTEM_CONFIG_FILE: &str = "/etc/mqft.toml";
const USER_CONFIG_FILE: &str = ".mqft.toml";

/// The field names of [`Configuration`], in display order
const FIELDS: &[&str] = &[
    "namespace",
    "server_id",
    "queue_depth",
    "max_workers",
    "session_timeout",
    "send_timeout",
    "time_format",
];

/// Processes and merges all possible configuration sources.
///
/// To see which files apply for the current user, run `mqft config-files`.
#[derive(Debug, Clone)]
pub struct Manager {
    /// Configuration data
    data: Figment,
}

impl Manager {
    /// Constructor. Layers the defaults, then each file in `files` that exists, then
    /// (if `apply_env`) the environment.
    #[must_use]
    pub fn for_paths<P: AsRef<Path>>(files: &[P], apply_env: bool) -> Self {
        let mut new1 = Self {
            data: Figment::from(Serialized::defaults(Configuration::system_default())),
        };
        for path in files {
            let path = path.as_ref();
            if path.exists() {
                debug!("reading configuration file {}", path.display());
                new1.merge_provider(Toml::file(path));
            } else {
                debug!("configuration file {} not present", path.display());
            }
        }
        if apply_env {
            new1.merge_provider(Env::prefixed(ENV_PREFIX));
        }
        new1
    }

    /// General constructor for production use
    ///
    /// Reads the system and user configuration files and the environment.
    #[must_use]
    pub fn standard() -> Self {
        Self::for_paths(&Self::config_paths(), true)
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(USER_CONFIG_FILE));
        }
        paths
    }

    /// Returns the list of configuration files we read, lowest priority first.
    ///
    /// This is a function of the current user.
    #[must_use]
    pub fn config_files() -> Vec<String> {
        Self::config_paths()
            .iter()
            .map(|p| p.as_os_str().to_string_lossy().to_string())
            .collect()
    }

    /// Merges in a data set, which is some sort of [figment::Provider](https://docs.rs/figment/latest/figment/trait.Provider.html).
    /// This uses figment's `merge` operation, which prefers to _replace_ existing items.
    pub fn merge_provider<T>(&mut self, provider: T)
    where
        T: Provider,
    {
        let f = std::mem::take(&mut self.data);
        self.data = f.merge(provider);
    }

    /// Extracts and validates the merged configuration
    pub fn get(&self) -> Result<Configuration> {
        let config: Configuration = self
            .data
            .extract()
            .context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the merged configuration, noting where each value came from
    pub fn describe(&self) -> Result<String> {
        let config = self.get()?;
        let mut out = String::new();
        for (line, field) in config.to_string().lines().zip(FIELDS) {
            let source = self
                .data
                .find_metadata(field)
                .map_or_else(String::new, |md| match &md.source {
                    Some(src) => format!("{} ({src})", md.name),
                    None => md.name.to_string(),
                });
            let _ = writeln!(out, "{line:<32} # {source}");
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use assertables::assert_contains;
    use figment::Jail;
    use figment::providers::Serialized;
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    use super::Manager;
    use crate::config::Configuration;
    use crate::util::TimeFormat;

    #[test]
    fn defaults() {
        let mgr = Manager::for_paths::<&str>(&[], false);
        assert_eq!(mgr.get().unwrap(), Configuration::system_default());
    }

    #[test]
    fn config_files_listed() {
        let files = Manager::config_files();
        assert_eq!(files[0], "/etc/mqft.toml");
        assert!(files.iter().skip(1).all(|f| f.ends_with(".mqft.toml")));
    }

    #[test]
    fn layering() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file(
                "system.toml",
                r#"
                    namespace = "sys"
                    queue_depth = 4
                    server_id = 0x1234
                "#,
            )?;
            let _ = jail.create_file("user.toml", "queue_depth = 6\ntime_format = \"UTC\"")?;
            jail.set_env("MQFT_MAX_WORKERS", "3");

            let mgr = Manager::for_paths(&["system.toml", "user.toml", "absent.toml"], true);
            let cfg = mgr.get().unwrap();
            assert_eq!(cfg.namespace, "sys");
            assert_eq!(cfg.server_id, 0x1234);
            assert_eq!(cfg.queue_depth, 6);
            assert_eq!(cfg.time_format, TimeFormat::Utc);
            assert_eq!(cfg.max_workers, 3);
            assert_eq!(cfg.send_timeout, 30);
            Ok(())
        });
    }

    #[test]
    fn hex_id_from_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("MQFT_SERVER_ID", "0xabc");
            let cfg = Manager::for_paths::<&str>(&[], true).get().unwrap();
            assert_eq!(cfg.server_id, 0xabc);
            Ok(())
        });
    }

    #[test]
    fn overrides_win() {
        #[derive(Serialize)]
        struct Overrides {
            queue_depth: usize,
        }
        Jail::expect_with(|jail| {
            jail.set_env("MQFT_QUEUE_DEPTH", "7");
            let mut mgr = Manager::for_paths::<&str>(&[], true);
            mgr.merge_provider(Serialized::defaults(Overrides { queue_depth: 2 }));
            assert_eq!(mgr.get().unwrap().queue_depth, 2);
            Ok(())
        });
    }

    #[test]
    fn invalid_values() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file("bad.toml", "queue_depth = 0")?;
            let err = Manager::for_paths(&["bad.toml"], false).get().unwrap_err();
            assert_contains!(err.to_string(), "queue depth");

            let _ = jail.create_file("worse.toml", "queue_depth = \"lots\"")?;
            assert!(Manager::for_paths(&["worse.toml"], false).get().is_err());
            Ok(())
        });
    }

    #[test]
    fn describe_shows_sources() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file("mine.toml", "namespace = \"mine\"")?;
            let text = Manager::for_paths(&["mine.toml"], false).describe().unwrap();
            assert_contains!(text, "namespace = \"mine\"");
            assert_contains!(text, "TOML file");
            assert_contains!(text, "queue_depth = 10");
            Ok(())
        });
    }
}
