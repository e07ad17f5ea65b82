//! Filter names of the form `convert.encoding.<from>[:<to>]`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Fixed prefix every filter name of this family starts with.
pub const FILTER_NAMESPACE: &str = "convert.encoding.";

/// Source charset sentinel asking the backend to detect the encoding.
pub const AUTO_CHARSET: &str = "auto";

static PARAMETERS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<from>[-\w]+)(?::(?P<to>[-\w]+))?$").unwrap());

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameParseError {
    #[error("filter name {0:?} is not in the convert.encoding namespace")]
    Namespace(String),

    #[error("filter name {0:?} does not match <from>[:<to>]")]
    Parameters(String),
}

/// Parsed charset parameters of a filter name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterNameSpec {
    from: String,
    to: Option<String>,
}

impl FilterNameSpec {
    pub fn new(from: impl Into<String>, to: Option<&str>) -> Self {
        Self {
            from: from.into(),
            to: to.map(str::to_string),
        }
    }

    /// Wildcard pattern the family is registered under.
    pub fn pattern() -> String {
        format!("{FILTER_NAMESPACE}*")
    }

    /// Parse a full filter name.
    ///
    /// The source charset is required; pass [`AUTO_CHARSET`] explicitly to
    /// have it detected.
    pub fn parse(filter_name: &str) -> Result<Self, NameParseError> {
        let parameters = filter_name
            .strip_prefix(FILTER_NAMESPACE)
            .ok_or_else(|| NameParseError::Namespace(filter_name.to_string()))?;

        let captures = PARAMETERS_REGEX
            .captures(parameters)
            .ok_or_else(|| NameParseError::Parameters(filter_name.to_string()))?;

        let from = captures["from"].to_string();
        let to = captures.name("to").map(|m| m.as_str().to_string());
        Ok(Self { from, to })
    }

    pub fn from_charset(&self) -> &str {
        &self.from
    }

    pub fn to_charset(&self) -> Option<&str> {
        self.to.as_deref()
    }

    /// Target charset, falling back to the host internal charset.
    pub fn target_or<'a>(&'a self, internal_charset: &'a str) -> &'a str {
        self.to.as_deref().unwrap_or(internal_charset)
    }
}

impl fmt::Display for FilterNameSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{FILTER_NAMESPACE}{}", self.from)?;
        if let Some(to) = &self.to {
            write!(f, ":{to}")?;
        }
        Ok(())
    }
}
