use crate::error::{FaultgateError, Result};
use crate::failure::SeverityMask;
use crate::render::RenderFormat;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

pub const STATUS_KEY: &str = "FAULTGATE_STATUS";
pub const ERROR_REPORTING_KEY: &str = "FAULTGATE_ERROR_REPORTING";
pub const HANDLED_SEVERITIES_KEY: &str = "FAULTGATE_HANDLED_SEVERITIES";
pub const RENDER_KEY: &str = "FAULTGATE_RENDER";
pub const EXPOSE_MESSAGES_KEY: &str = "FAULTGATE_EXPOSE_MESSAGES";
pub const LOG_CAUGHT_KEY: &str = "FAULTGATE_LOG_CAUGHT";

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Loads every environment variable.
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Parses the value under `key`; `Ok(None)` when unset or blank.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| FaultgateError::invalid_config(key, e.to_string())),
            _ => Ok(None),
        }
    }

    /// Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            other => Err(FaultgateError::invalid_config(
                key,
                format!("expected a boolean, got {other:?}"),
            )),
        }
    }
}

/// Settings for an [`ErrorInterceptor`](crate::ErrorInterceptor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorSettings {
    /// Status code of every rendered failure response.
    pub status: u16,
    /// Process-wide reporting mask applied while the interceptor is started.
    /// `None` leaves the current mask alone.
    pub error_reporting: Option<SeverityMask>,
    /// Severities the interceptor registers for on the runtime-error channel.
    pub handled_severities: SeverityMask,
    pub render: RenderFormat,
    /// Only consulted by the JSON renderer.
    pub expose_messages: bool,
    /// Also log failures recovered inside the request pipeline.
    pub log_caught: bool,
}

impl Default for InterceptorSettings {
    fn default() -> Self {
        Self {
            status: 404,
            error_reporting: None,
            handled_severities: SeverityMask::all(),
            render: RenderFormat::Text,
            expose_messages: true,
            log_caught: false,
        }
    }
}

impl InterceptorSettings {
    /// Reads the `FAULTGATE_*` keys, falling back to defaults for unset ones.
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            status: config.get_parsed(STATUS_KEY)?.unwrap_or(defaults.status),
            error_reporting: config.get_parsed(ERROR_REPORTING_KEY)?,
            handled_severities: config
                .get_parsed(HANDLED_SEVERITIES_KEY)?
                .unwrap_or(defaults.handled_severities),
            render: config.get_parsed(RENDER_KEY)?.unwrap_or(defaults.render),
            expose_messages: config
                .get_bool(EXPOSE_MESSAGES_KEY)?
                .unwrap_or(defaults.expose_messages),
            log_caught: config.get_bool(LOG_CAUGHT_KEY)?.unwrap_or(defaults.log_caught),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(&ConfigService::new())
    }
}
