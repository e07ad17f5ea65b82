//! # Resource Locators
//!
//! A resource locator addresses a file together with the filter chain that
//! must be applied while reading it:
//!
//! ```text
//! stream://filter/<filter>[|<filter>...]/.../resource=<path>
//! ```
//!
//! Filter segments may carry a `read=` prefix. Everything after `resource=`
//! is the path, slashes included.

use std::fmt;

use thiserror::Error;

/// Scheme prefix of every filter locator.
pub const FILTER_SCHEME: &str = "stream://filter";

const RESOURCE_KEY: &str = "resource=";
const READ_KEY: &str = "read=";
const WRITE_KEY: &str = "write=";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("locator does not start with stream://filter/: {0}")]
    MissingScheme(String),

    #[error("locator has no resource= segment: {0}")]
    MissingResource(String),

    #[error("locator contains an empty filter name: {0}")]
    EmptyFilter(String),

    #[error("write filter chains are not supported: {0}")]
    WriteChain(String),
}

/// A parsed `stream://filter/...` locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    filters: Vec<String>,
    resource: String,
}

impl ResourceLocator {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            filters: Vec::new(),
            resource: resource.into(),
        }
    }

    /// Append a filter to the read chain.
    pub fn with_filter(mut self, filter_name: impl Into<String>) -> Self {
        self.filters.push(filter_name.into());
        self
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn parse(locator: &str) -> Result<Self, LocatorError> {
        let mut rest = locator
            .strip_prefix(FILTER_SCHEME)
            .filter(|rest| rest.starts_with('/'))
            .ok_or_else(|| LocatorError::MissingScheme(locator.to_string()))?;

        let mut filters = Vec::new();
        loop {
            rest = rest
                .strip_prefix('/')
                .ok_or_else(|| LocatorError::MissingResource(locator.to_string()))?;

            if let Some(resource) = rest.strip_prefix(RESOURCE_KEY) {
                if resource.is_empty() {
                    return Err(LocatorError::MissingResource(locator.to_string()));
                }
                return Ok(Self {
                    filters,
                    resource: resource.to_string(),
                });
            }

            let (segment, tail) = match rest.find('/') {
                Some(slash) => rest.split_at(slash),
                None => return Err(LocatorError::MissingResource(locator.to_string())),
            };
            if segment.starts_with(WRITE_KEY) {
                return Err(LocatorError::WriteChain(locator.to_string()));
            }

            let segment = segment.strip_prefix(READ_KEY).unwrap_or(segment);
            for name in segment.split('|') {
                if name.is_empty() {
                    return Err(LocatorError::EmptyFilter(locator.to_string()));
                }
                filters.push(name.to_string());
            }
            rest = tail;
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{FILTER_SCHEME}/")?;
        if !self.filters.is_empty() {
            write!(f, "{}/", self.filters.join("|"))?;
        }
        write!(f, "{RESOURCE_KEY}{}", self.resource)
    }
}

impl std::str::FromStr for ResourceLocator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
