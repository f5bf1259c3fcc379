//! Endpoint configuration
//!
//! Hosts own the parameter UI; these structs are the values it hands to the
//! endpoints. Both deserialize from TOML with the documented defaults:
//!
//! ```toml
//! name = "feedback"
//! start_frame = 1
//! policy = "black"
//! timeout_ms = 2000
//! wait = "notify"
//! ```

use crate::{Error, Frame, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default first frame of a sequence
pub const DEFAULT_START_FRAME: Frame = 1;

/// Recovery applied to ordering violations and timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingPolicy {
    /// Fail the frame; the slot stays put until reset
    #[default]
    Error,
    /// Return an empty payload and advance the slot
    Black,
    /// Return the last stored payload, however old, and advance the slot
    Last,
}

/// How `acquire` waits for the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    /// Park on the slot's condition variable, woken by publish and reset
    #[default]
    Notify,
    /// Unlock, sleep, relock
    Poll,
}

impl OrderingPolicy {
    /// Name as written in config files
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderingPolicy::Error => "error",
            OrderingPolicy::Black => "black",
            OrderingPolicy::Last => "last",
        }
    }
}

impl WaitStrategy {
    /// Name as written in config files
    pub const fn as_str(&self) -> &'static str {
        match self {
            WaitStrategy::Notify => "notify",
            WaitStrategy::Poll => "poll",
        }
    }
}

impl fmt::Display for OrderingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(OrderingPolicy::Error),
            "black" => Ok(OrderingPolicy::Black),
            "last" => Ok(OrderingPolicy::Last),
            other => Err(Error::Config(format!("unknown policy '{}'", other))),
        }
    }
}

impl FromStr for WaitStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "notify" => Ok(WaitStrategy::Notify),
            "poll" => Ok(WaitStrategy::Poll),
            other => Err(Error::Config(format!("unknown wait strategy '{}'", other))),
        }
    }
}

/// Reader-side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Buffer name; empty leaves the reader unbound
    pub name: String,
    /// Frames at or before this return an empty payload
    pub start_frame: Frame,
    pub policy: OrderingPolicy,
    /// Wait budget in milliseconds, 0 waits forever
    pub timeout_ms: u64,
    pub wait: WaitStrategy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            start_frame: DEFAULT_START_FRAME,
            policy: OrderingPolicy::default(),
            timeout_ms: 0,
            wait: WaitStrategy::default(),
        }
    }
}

impl ReaderConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_start_frame(mut self, start_frame: Frame) -> Self {
        self.start_frame = start_frame;
        self
    }

    pub fn with_policy(mut self, policy: OrderingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Writer-side settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Buffer name; empty leaves the writer unbound
    pub name: String,
}

impl WriterConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_defaults() {
        let config = ReaderConfig::from_toml_str("").unwrap();
        assert_eq!(config, ReaderConfig::default());
        assert_eq!(config.start_frame, 1);
        assert_eq!(config.policy, OrderingPolicy::Error);
        assert_eq!(config.timeout_ms, 0);
        assert_eq!(config.wait, WaitStrategy::Notify);
    }

    #[test]
    fn test_reader_from_toml() {
        let config = ReaderConfig::from_toml_str(
            r#"
            name = "feedback"
            start_frame = 10
            policy = "last"
            timeout_ms = 250
            wait = "poll"
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "feedback");
        assert_eq!(config.start_frame, 10);
        assert_eq!(config.policy, OrderingPolicy::Last);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.wait, WaitStrategy::Poll);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = ReaderConfig::from_toml_str(r#"policy = "retry""#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_names_match_config_files() {
        for policy in [OrderingPolicy::Error, OrderingPolicy::Black, OrderingPolicy::Last] {
            assert_eq!(policy.as_str().parse::<OrderingPolicy>().unwrap(), policy);
            let config = ReaderConfig::from_toml_str(&format!("policy = \"{}\"", policy)).unwrap();
            assert_eq!(config.policy, policy);
        }
        for wait in [WaitStrategy::Notify, WaitStrategy::Poll] {
            assert_eq!(wait.as_str().parse::<WaitStrategy>().unwrap(), wait);
            let config = ReaderConfig::from_toml_str(&format!("wait = \"{}\"", wait)).unwrap();
            assert_eq!(config.wait, wait);
        }
        assert!(matches!("retry".parse::<OrderingPolicy>(), Err(Error::Config(_))));
        assert!(matches!("spin".parse::<WaitStrategy>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_writer_from_toml() {
        let config = WriterConfig::from_toml_str(r#"name = "accum""#).unwrap();
        assert_eq!(config, WriterConfig::new("accum"));
    }
}
