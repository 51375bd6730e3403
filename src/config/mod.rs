// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process configuration, read from the environment.
//!
//! | variable                      | required | default   |
//! |-------------------------------|----------|-----------|
//! | `INGRESS_NAME`                | yes      | –         |
//! | `INGRESS_NAMESPACE`           | no       | `default` |
//! | `KINGRESS_HTTP_PORT`          | no       | `8080`    |
//! | `KINGRESS_HTTPS_PORT`         | no       | `8443`    |
//! | `KINGRESS_POLL_INTERVAL_SECS` | no       | `10`      |
//!
//! A missing `INGRESS_NAME` is a fatal startup error; the caller is expected
//! to exit rather than serve traffic without a routing resource.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Namespace assumed when `INGRESS_NAMESPACE` is not set.
pub const DEFAULT_NAMESPACE: &str = "default";

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_HTTPS_PORT: u16 = 8443;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Errors that can occur while reading process configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),

    /// An environment variable is set but cannot be parsed.
    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: &'static str, message: String },
}

/// Startup configuration for the proxy process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    /// Name of the Ingress resource to serve.
    pub ingress_name: String,
    /// Namespace the Ingress resource lives in.
    pub ingress_namespace: String,
    /// Port for the plaintext listener.
    pub http_port: u16,
    /// Port for the TLS listener.
    pub https_port: u16,
    /// Cadence of the control-plane polling loop.
    pub poll_interval: Duration,
}

impl ProxyConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ingress_name = env::var("INGRESS_NAME")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingVar("INGRESS_NAME"))?;

        let ingress_namespace = env::var("INGRESS_NAMESPACE")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        Ok(Self {
            ingress_name,
            ingress_namespace,
            http_port: parsed_var("KINGRESS_HTTP_PORT", DEFAULT_HTTP_PORT)?,
            https_port: parsed_var("KINGRESS_HTTPS_PORT", DEFAULT_HTTPS_PORT)?,
            poll_interval: Duration::from_secs(parsed_var(
                "KINGRESS_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
        })
    }
}

/// Parse an optional environment variable, falling back to `default` when
/// unset. A set-but-unparseable value is an error rather than a silent
/// fallback.
fn parsed_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        unsafe {
            env::remove_var("INGRESS_NAME");
            env::remove_var("INGRESS_NAMESPACE");
            env::remove_var("KINGRESS_HTTP_PORT");
            env::remove_var("KINGRESS_HTTPS_PORT");
            env::remove_var("KINGRESS_POLL_INTERVAL_SECS");
        }
    }

    #[test]
    #[serial]
    fn test_missing_ingress_name_is_an_error() {
        clear_env();

        let err = ProxyConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("INGRESS_NAME")));
    }

    #[test]
    #[serial]
    fn test_defaults_applied() {
        clear_env();
        unsafe {
            env::set_var("INGRESS_NAME", "ingress1");
        }

        let config = ProxyConfig::from_env().unwrap();
        assert_eq!(config.ingress_name, "ingress1");
        assert_eq!(config.ingress_namespace, "default");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.https_port, 8443);
        assert_eq!(config.poll_interval, Duration::from_secs(10));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_overrides_applied() {
        clear_env();
        unsafe {
            env::set_var("INGRESS_NAME", "ingress1");
            env::set_var("INGRESS_NAMESPACE", "edge");
            env::set_var("KINGRESS_HTTP_PORT", "9090");
            env::set_var("KINGRESS_HTTPS_PORT", "9443");
            env::set_var("KINGRESS_POLL_INTERVAL_SECS", "30");
        }

        let config = ProxyConfig::from_env().unwrap();
        assert_eq!(config.ingress_namespace, "edge");
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.https_port, 9443);
        assert_eq!(config.poll_interval, Duration::from_secs(30));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_an_error() {
        clear_env();
        unsafe {
            env::set_var("INGRESS_NAME", "ingress1");
            env::set_var("KINGRESS_HTTP_PORT", "not-a-port");
        }

        let err = ProxyConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "KINGRESS_HTTP_PORT",
                ..
            }
        ));

        clear_env();
    }
}
