//! Namespaced key/value settings
//!
//! Engines are configured the way simulation scenario files configure
//! routers: flat `Namespace.key = value` pairs, where the namespace is the
//! router name. Settings can also be written as TOML, with one table per
//! namespace.
//!
//! ```text
//! # scenario.txt
//! Group.router = PeopleRankRouter
//! PeopleRankRouter.dampingFactor = 0.87
//! PeopleRankRouter.minDuration = 60
//! ```
//!
//! Everything is read once when an engine is built. Missing or malformed
//! values are reported as [`ConfigError`]s and the engine is not built.

use std::collections::BTreeMap;

use oppnet_core::{ConfigError, ConfigResult};

/// Flat namespaced settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Create empty settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `Namespace.key = value` lines
    ///
    /// Blank lines and lines starting with `#` are skipped. A later
    /// assignment to the same key wins.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut settings = Self::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::Parse(format!("line {}: expected `key = value`", number + 1))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Parse(format!("line {}: empty key", number + 1)));
            }

            settings.set(key, value.trim());
        }

        Ok(settings)
    }

    /// Parse a TOML document with one table per namespace
    ///
    /// ```toml
    /// [Group]
    /// router = "SprayAndWaitRouter"
    ///
    /// [SprayAndWaitRouter]
    /// nrofCopies = 8
    /// binaryMode = true
    /// ```
    pub fn from_toml(text: &str) -> ConfigResult<Self> {
        let table: toml::Table =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut settings = Self::new();
        flatten_toml(&mut settings, None, &table);
        Ok(settings)
    }

    /// Set a fully qualified key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder form of [`Settings::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value.to_string());
        self
    }

    /// Get the raw value of a fully qualified key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// View the settings under one namespace
    pub fn namespace<'a>(&'a self, namespace: &'a str) -> SettingsView<'a> {
        SettingsView {
            settings: self,
            namespace,
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no key is stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten_toml(settings: &mut Settings, prefix: Option<&str>, table: &toml::Table) {
    for (name, value) in table {
        let key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.clone(),
        };

        match value {
            toml::Value::Table(inner) => flatten_toml(settings, Some(&key), inner),
            toml::Value::String(s) => settings.set(key, s.clone()),
            toml::Value::Integer(i) => settings.set(key, i.to_string()),
            toml::Value::Float(f) => settings.set(key, f.to_string()),
            toml::Value::Boolean(b) => settings.set(key, b.to_string()),
            other => settings.set(key, other.to_string()),
        }
    }
}

/// Settings under one namespace
#[derive(Debug, Clone, Copy)]
pub struct SettingsView<'a> {
    settings: &'a Settings,
    namespace: &'a str,
}

impl<'a> SettingsView<'a> {
    /// The namespace of this view
    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    /// Fully qualified key for `name`
    pub fn full_key(&self, name: &str) -> String {
        format!("{}.{}", self.namespace, name)
    }

    /// Check if `name` is set
    pub fn contains(&self, name: &str) -> bool {
        self.settings.get(&self.full_key(name)).is_some()
    }

    /// Get a required string
    pub fn get_str(&self, name: &str) -> ConfigResult<&'a str> {
        let key = self.full_key(name);
        self.settings
            .values
            .get(&key)
            .map(String::as_str)
            .ok_or(ConfigError::Missing { key })
    }

    /// Get a required float
    pub fn get_f64(&self, name: &str) -> ConfigResult<f64> {
        let raw = self.get_str(name)?;
        match raw.parse::<f64>() {
            Ok(v) if !v.is_nan() => Ok(v),
            _ => Err(self.malformed(name, raw, "number")),
        }
    }

    /// Get a required unsigned integer
    pub fn get_u32(&self, name: &str) -> ConfigResult<u32> {
        let raw = self.get_str(name)?;
        raw.parse::<u32>()
            .map_err(|_| self.malformed(name, raw, "unsigned integer"))
    }

    /// Get a required boolean (`true`/`false`/`1`/`0`)
    pub fn get_bool(&self, name: &str) -> ConfigResult<bool> {
        let raw = self.get_str(name)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(self.malformed(name, raw, "boolean")),
        }
    }

    /// Get an optional float, falling back to `default` when absent
    pub fn get_f64_or(&self, name: &str, default: f64) -> ConfigResult<f64> {
        if self.contains(name) {
            self.get_f64(name)
        } else {
            Ok(default)
        }
    }

    /// Get an optional boolean, falling back to `default` when absent
    pub fn get_bool_or(&self, name: &str, default: bool) -> ConfigResult<bool> {
        if self.contains(name) {
            self.get_bool(name)
        } else {
            Ok(default)
        }
    }

    fn malformed(&self, name: &str, raw: &str, expected: &'static str) -> ConfigError {
        ConfigError::Malformed {
            key: self.full_key(name),
            value: raw.to_string(),
            expected,
        }
    }
}
