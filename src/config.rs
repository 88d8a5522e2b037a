// Configuration: resolved once at startup from environment variables and
// then passed by reference to the API client. Nothing reads the
// environment after this point.

use std::time::Duration;

use reqwest::Url;

use crate::error::{Error, Result};

pub const DEFAULT_HOME_URL: &str = "https://demo.filebrowser.org/";
pub const DEFAULT_USERNAME: &str = "demo";
pub const DEFAULT_PASSWORD: &str = "demo";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const USER_AGENT: &str = concat!("filebrowser-cli/", env!("CARGO_PKG_VERSION"));

/// Server location and credentials.
#[derive(Clone, Debug)]
pub struct Config {
    pub home_url: Url,
    pub api_url: Url,
    pub username: String,
    pub password: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub timeout: Duration,
}

impl Config {
    /// Build a configuration from `FILEBROWSER_*` environment variables,
    /// falling back to the public demo server.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("FILEBROWSER_HOME").unwrap_or_else(|| DEFAULT_HOME_URL.into());
        let api = lookup("FILEBROWSER_API").unwrap_or_else(|| default_api_url(&home));

        let home_url = parse_url("FILEBROWSER_HOME", &home)?;
        let api_url = parse_url("FILEBROWSER_API", &api)?;

        let insecure = match lookup("FILEBROWSER_INSECURE") {
            Some(v) => parse_bool("FILEBROWSER_INSECURE", &v)?,
            None => false,
        };
        let timeout = match lookup("FILEBROWSER_TIMEOUT_SECS") {
            Some(v) => v.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("FILEBROWSER_TIMEOUT_SECS is not a number: {v}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            home_url,
            api_url,
            username: lookup("FILEBROWSER_USERNAME").unwrap_or_else(|| DEFAULT_USERNAME.into()),
            password: lookup("FILEBROWSER_PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.into()),
            insecure,
            timeout: Duration::from_secs(timeout),
        })
    }

    /// Replace the password, e.g. with one entered interactively.
    pub fn with_password(mut self, password: String) -> Self {
        self.password = password;
        self
    }
}

fn default_api_url(home: &str) -> String {
    if home.ends_with('/') {
        format!("{home}api")
    } else {
        format!("{home}/api")
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).map_err(|e| Error::Config(format!("{key} ({value}): {e}")))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("{key} ({value}) is not a base URL")));
    }
    Ok(url)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::Config(format!("{key} is not a boolean: {value}"))),
    }
}
