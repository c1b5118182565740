//! Service URLs of the form `<service type>://<host>:<port>[/path]`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

const SEPARATOR: &str = "://";
// Non-special scheme so that the url crate leaves the authority opaque but still splits host/port.
const AUTHORITY_SCHEME: &str = "slp";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("service url {0:?} has no '://' separator")]
    MissingSeparator(String),
    #[error("service url {0:?} has an empty service type")]
    EmptyServiceType(String),
    #[error("service url {0:?} has no host")]
    MissingHost(String),
    #[error("service url {0:?} has no port")]
    MissingPort(String),
    #[error("service url {url:?} is malformed: {reason}")]
    Malformed { url: String, reason: String },
}

/// Location of a registered service.
///
/// The service type is everything before `://`, e.g. `service:db:tcp`. Two URLs
/// compare by their canonical string form, which is what total ordering relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceUrl {
    service_type: String,
    host: String,
    port: u16,
    path: Option<String>,
}

impl ServiceUrl {
    pub fn new(service_type: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            service_type: service_type.into(),
            host: host.into(),
            port,
            path: None,
        }
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Canonical string form used for comparisons.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}:{}", self.service_type, SEPARATOR, self.host, self.port)?;
        if let Some(path) = &self.path {
            f.write_str(path)?;
        }
        Ok(())
    }
}

impl FromStr for ServiceUrl {
    type Err = UrlError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (service_type, authority) = raw
            .split_once(SEPARATOR)
            .ok_or_else(|| UrlError::MissingSeparator(raw.to_string()))?;

        if service_type.is_empty() || service_type.chars().any(char::is_whitespace) {
            return Err(UrlError::EmptyServiceType(raw.to_string()));
        }

        let parsed = url::Url::parse(&format!("{}{}{}", AUTHORITY_SCHEME, SEPARATOR, authority))
            .map_err(|e| UrlError::Malformed {
                url: raw.to_string(),
                reason: e.to_string(),
            })?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| UrlError::MissingHost(raw.to_string()))?;
        let port = parsed
            .port()
            .ok_or_else(|| UrlError::MissingPort(raw.to_string()))?;

        let path = match parsed.path() {
            "" | "/" => None,
            p => Some(p.to_string()),
        };

        Ok(Self {
            service_type: service_type.to_string(),
            host: host.to_string(),
            port,
            path,
        })
    }
}

impl TryFrom<String> for ServiceUrl {
    type Error = UrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServiceUrl> for String {
    fn from(url: ServiceUrl) -> Self {
        url.to_string()
    }
}

impl PartialOrd for ServiceUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

/// Expands a service URL template containing `{host}` and `{port}`.
pub fn format_service_url(template: &str, host: &str, port: u16) -> Result<ServiceUrl, UrlError> {
    template
        .replace("{host}", host)
        .replace("{port}", &port.to_string())
        .parse()
}

/// Host form of an address inside a service URL; IPv6 literals are bracketed.
pub fn address_host(address: IpAddr) -> String {
    match address {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    }
}
