//! # Pipeline Common
//!
//! This crate provides the host side of a synchronous byte-stream filtering
//! pipeline. Filters are ordinary [`Processor`]s; they are looked up by name
//! through a [`FilterRegistry`], chained into a [`Pipeline`], and can be
//! applied transparently while reading a file addressed by a
//! [`ResourceLocator`].
//!
//! ## Features
//!
//! - Generic `Processor<T>` trait for processing any type of data
//! - Generic `Pipeline<T>` implementation for chaining processors
//! - Name-pattern based filter registry with wildcard dispatch
//! - `stream://filter/...` resource locators and a filtering `Read` adapter
//!
//! ## License
//!
//! MIT License
//!
//! ## Authors
//!
//! - hua0512
//!

use thiserror::Error;

mod context;
pub mod locator;
pub mod pipeline;
pub mod processor;
pub mod reader;
pub mod registry;

#[cfg(any(test, feature = "test-utils"))]
mod test_utils;

/// Re-export key traits and types
pub use context::StreamerContext;
pub use locator::{FILTER_SCHEME, LocatorError, ResourceLocator};
pub use pipeline::Pipeline;
pub use processor::Processor;
pub use reader::{FilteredReader, ReaderConfig};
pub use registry::{
    DEFAULT_INTERNAL_CHARSET, FilterFactory, FilterRegistry, FilterRequest, Registration,
    RegistryError,
};

#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::{create_test_context, init_tracing, named_test_context};

/// Common error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("Stage process failed ({stage}): {source}")]
    StageProcess {
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Stage finish failed ({stage}): {source}")]
    StageFinish {
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PipelineError {
    /// Wrap a stage error raised while processing an item.
    pub fn stage_process(
        stage: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StageProcess {
            stage,
            source: Box::new(source),
        }
    }

    /// Wrap a stage error raised while finishing a stream.
    pub fn stage_finish(
        stage: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StageFinish {
            stage,
            source: Box::new(source),
        }
    }
}

impl From<PipelineError> for std::io::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}
