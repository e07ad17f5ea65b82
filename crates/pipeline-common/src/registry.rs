//! # Filter Registry
//!
//! The registry is the dispatch table that maps filter names to the factories
//! able to build them. Factories are installed under a pattern, either an
//! exact filter name (`string.rot13`) or a wildcard namespace
//! (`convert.encoding.*`) that matches every name starting with the prefix
//! before the `*`.
//!
//! Registration is idempotent per factory type: installing the same factory
//! type under the same pattern again is a no-op, while a different factory
//! type claiming an occupied pattern is a [`RegistryError::Conflict`].
//!
//! The registry also carries the host's internal charset, the default target
//! encoding for filters that are not given one explicitly.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::{Pipeline, Processor, StreamerContext};

/// Internal charset used until the host configures another one.
pub const DEFAULT_INTERNAL_CHARSET: &str = "UTF-8";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid filter pattern: {0:?}")]
    InvalidPattern(String),

    #[error("filter pattern already registered by another factory: {pattern}")]
    Conflict { pattern: String },

    #[error("no filter registered for name: {name}")]
    NotFound { name: String },

    #[error("filter factory rejected name: {name}")]
    Rejected { name: String },
}

/// Outcome of a successful [`FilterRegistry::register`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The factory was installed by this call.
    Installed,
    /// The same factory type already owned the pattern; nothing changed.
    AlreadyRegistered,
}

/// Everything a factory gets to see when asked to build a filter.
#[derive(Debug, Clone, Copy)]
pub struct FilterRequest<'a> {
    /// Full filter name as requested by the stream, including the namespace.
    pub filter_name: &'a str,
    /// The pattern the name was dispatched through.
    pub pattern: &'a str,
    /// Host internal charset at creation time.
    pub internal_charset: &'a str,
    pub context: &'a Arc<StreamerContext>,
}

/// Builds filter instances for names dispatched to it.
///
/// Returning `None` means "this factory does not handle this name"; the
/// registry reports it as [`RegistryError::Rejected`].
pub trait FilterFactory<T>: Send + Sync + 'static {
    fn create(&self, request: &FilterRequest<'_>) -> Option<Box<dyn Processor<T>>>;
}

struct FactoryEntry<T> {
    family: TypeId,
    factory: Arc<dyn FilterFactory<T>>,
}

/// Dispatch table from filter name patterns to factories.
pub struct FilterRegistry<T> {
    entries: RwLock<HashMap<String, FactoryEntry<T>>>,
    internal_charset: RwLock<String>,
}

impl<T: 'static> Default for FilterRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> FilterRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            internal_charset: RwLock::new(DEFAULT_INTERNAL_CHARSET.to_string()),
        }
    }

    /// Install `factory` under `pattern`.
    ///
    /// The lookup and the insert happen under one write lock, so concurrent
    /// callers registering the same factory observe exactly one
    /// [`Registration::Installed`].
    pub fn register<F>(&self, pattern: &str, factory: F) -> Result<Registration, RegistryError>
    where
        F: FilterFactory<T>,
    {
        validate_pattern(pattern)?;

        let family = TypeId::of::<F>();
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(pattern) {
            if existing.family == family {
                debug!(pattern, "Filter factory already registered");
                return Ok(Registration::AlreadyRegistered);
            }
            return Err(RegistryError::Conflict {
                pattern: pattern.to_string(),
            });
        }

        entries.insert(
            pattern.to_string(),
            FactoryEntry {
                family,
                factory: Arc::new(factory),
            },
        );
        debug!(pattern, "Registered filter factory");
        Ok(Registration::Installed)
    }

    pub fn is_registered(&self, pattern: &str) -> bool {
        self.entries.read().contains_key(pattern)
    }

    /// Registered patterns, sorted.
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.entries.read().keys().cloned().collect();
        patterns.sort();
        patterns
    }

    pub fn internal_charset(&self) -> String {
        self.internal_charset.read().clone()
    }

    pub fn set_internal_charset(&self, charset: impl Into<String>) {
        *self.internal_charset.write() = charset.into();
    }

    /// Build a filter for `filter_name`.
    ///
    /// An exact pattern wins; otherwise the name is matched against wildcard
    /// patterns, longest prefix first (`a.b.c` tries `a.b.*`, then `a.*`).
    pub fn create(
        &self,
        filter_name: &str,
        context: &Arc<StreamerContext>,
    ) -> Result<Box<dyn Processor<T>>, RegistryError> {
        let (pattern, factory) =
            self.lookup(filter_name)
                .ok_or_else(|| RegistryError::NotFound {
                    name: filter_name.to_string(),
                })?;

        let internal_charset = self.internal_charset();
        let request = FilterRequest {
            filter_name,
            pattern: &pattern,
            internal_charset: &internal_charset,
            context,
        };

        // the factory runs outside the lock so it may consult the registry
        factory.create(&request).ok_or_else(|| {
            debug!(
                stream = %context.name,
                filter_name,
                pattern = %pattern,
                "Filter factory rejected name"
            );
            RegistryError::Rejected {
                name: filter_name.to_string(),
            }
        })
    }

    /// Build a pipeline applying `filter_names` in order.
    pub fn build_pipeline<I, S>(
        &self,
        filter_names: I,
        context: Arc<StreamerContext>,
    ) -> Result<Pipeline<T>, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pipeline = Pipeline::new(context.clone());
        for name in filter_names {
            pipeline = pipeline.add_boxed(self.create(name.as_ref(), &context)?);
        }
        Ok(pipeline)
    }

    fn lookup(&self, filter_name: &str) -> Option<(String, Arc<dyn FilterFactory<T>>)> {
        let entries = self.entries.read();
        if let Some(entry) = entries.get(filter_name) {
            return Some((filter_name.to_string(), entry.factory.clone()));
        }

        let mut prefix = filter_name;
        while let Some(dot) = prefix.rfind('.') {
            prefix = &prefix[..dot];
            let wildcard = format!("{prefix}.*");
            if let Some(entry) = entries.get(&wildcard) {
                return Some((wildcard, entry.factory.clone()));
            }
        }
        None
    }
}

fn validate_pattern(pattern: &str) -> Result<(), RegistryError> {
    let invalid = || RegistryError::InvalidPattern(pattern.to_string());
    if pattern.is_empty() || pattern.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    match pattern.find('*') {
        None => Ok(()),
        // a wildcard is only allowed as a whole trailing segment: `ns.*`
        Some(star) if star == pattern.len() - 1 && pattern[..star].ends_with('.') && star > 1 => {
            Ok(())
        }
        Some(_) => Err(invalid()),
    }
}
