//! Configuration structure
// (c) 2026 The mqft authors

use std::fmt::Display;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::client::ClientOptions;
use crate::mailbox::MailboxId;
use crate::server::ServerOptions;
use crate::util::TimeFormat;

/// The well-known server mailbox, unless configured otherwise ("mqft" in ASCII)
const DEFAULT_SERVER_ID: u32 = 0x6d71_6674;

/// The configurable options of mqft.
///
/// Timeouts are in seconds; 0 means wait forever.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Configuration {
    /// Prefix of every queue name; client and server must agree on it.
    pub namespace: String,
    /// The server's well-known mailbox
    #[serde(deserialize_with = "deserialize_id")]
    pub server_id: u32,
    /// How many messages each mailbox can hold
    pub queue_depth: usize,
    /// How many requests the server serves concurrently
    pub max_workers: usize,
    /// How long a client waits for each response
    pub session_timeout: u64,
    /// How long a sender waits for room in a full mailbox
    pub send_timeout: u64,
    /// Format of log message timestamps
    pub time_format: TimeFormat,
}

impl Configuration {
    /// The hard-wired defaults
    #[must_use]
    pub fn system_default() -> Self {
        Self {
            namespace: "mqft".into(),
            server_id: DEFAULT_SERVER_ID,
            queue_depth: 10,
            max_workers: 64,
            session_timeout: 30,
            send_timeout: 30,
            time_format: TimeFormat::Local,
        }
    }

    /// Checks the values make sense together
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.contains(['/', '\0']) {
            anyhow::bail!(
                "The namespace ({:?}) must be non-empty and must not contain '/'",
                self.namespace
            );
        }
        if self.queue_depth == 0 {
            anyhow::bail!("The queue depth must be at least 1");
        }
        if self.max_workers == 0 {
            anyhow::bail!("The worker limit (max_workers) must be at least 1");
        }
        Ok(())
    }

    /// The server's well-known mailbox
    #[must_use]
    pub fn server_mailbox(&self) -> MailboxId {
        MailboxId(self.server_id)
    }

    fn seconds(s: u64) -> Option<Duration> {
        (s != 0).then_some(Duration::from_secs(s))
    }

    /// Client tuning from this configuration
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            session_timeout: Self::seconds(self.session_timeout),
            send_timeout: Self::seconds(self.send_timeout),
            ..Default::default()
        }
    }

    /// Server tuning from this configuration
    #[must_use]
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_workers: self.max_workers,
            send_timeout: Self::seconds(self.send_timeout),
            ..Default::default()
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::system_default()
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "namespace = {:?}", self.namespace)?;
        writeln!(f, "server_id = {:#010x}", self.server_id)?;
        writeln!(f, "queue_depth = {}", self.queue_depth)?;
        writeln!(f, "max_workers = {}", self.max_workers)?;
        writeln!(f, "session_timeout = {}", self.session_timeout)?;
        writeln!(f, "send_timeout = {}", self.send_timeout)?;
        write!(f, "time_format = \"{}\"", self.time_format)
    }
}

/// Parses a mailbox id, in decimal or `0x` hex
pub fn parse_mailbox_id(s: &str) -> Result<u32, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

/// Accepts an integer, or a string as understood by [`parse_mailbox_id`]
fn deserialize_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct IdVisitor;

    impl serde::de::Visitor<'_> for IdVisitor {
        type Value = u32;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a mailbox id (decimal or 0x hex)")
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<u32, E> {
            u32::try_from(v).map_err(|_| E::custom(format!("mailbox id {v} is out of range")))
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<u32, E> {
            u32::try_from(v).map_err(|_| E::custom(format!("mailbox id {v} is out of range")))
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<u32, E> {
            parse_mailbox_id(v.trim()).map_err(|e| E::custom(format!("mailbox id {v:?}: {e}")))
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::{Configuration, parse_mailbox_id};

    #[test]
    fn defaults_are_valid() {
        let cfg = Configuration::system_default();
        cfg.validate().unwrap();
        assert_eq!(cfg.server_mailbox().to_string(), "0x6d716674");
    }

    #[test]
    fn validate() {
        let mut cfg = Configuration::system_default();
        cfg.queue_depth = 0;
        assert!(cfg.validate().unwrap_err().to_string().contains("queue depth"));

        let mut cfg = Configuration::system_default();
        cfg.max_workers = 0;
        assert!(cfg.validate().unwrap_err().to_string().contains("max_workers"));

        for ns in ["", "a/b"] {
            let mut cfg = Configuration::system_default();
            cfg.namespace = ns.into();
            assert!(cfg.validate().is_err(), "{ns:?}");
        }
    }

    #[test]
    fn mailbox_ids() {
        assert_eq!(parse_mailbox_id("0x10").unwrap(), 16);
        assert_eq!(parse_mailbox_id("0X6d716674").unwrap(), 0x6d71_6674);
        assert_eq!(parse_mailbox_id("42").unwrap(), 42);
        assert!(parse_mailbox_id("0xnope").is_err());
        assert!(parse_mailbox_id("99999999999").is_err());
    }

    #[test]
    fn zero_timeout_means_forever() {
        let mut cfg = Configuration::system_default();
        cfg.session_timeout = 0;
        cfg.send_timeout = 5;
        let opts = cfg.client_options();
        assert_eq!(opts.session_timeout, None);
        assert_eq!(opts.send_timeout, Some(Duration::from_secs(5)));
        assert_eq!(cfg.server_options().send_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn display() {
        let s = Configuration::system_default().to_string();
        assert!(s.contains("server_id = 0x6d716674"));
        assert!(s.contains("time_format = \"local\""));
    }
}
