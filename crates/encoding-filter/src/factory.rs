use std::sync::Arc;

use bytes::Bytes;
use pipeline_common::{FilterFactory, FilterRequest, Processor};
use tracing::debug;

use crate::{
    ConvertEncodingFilter, EncodingBackend, EncodingRsBackend, FilterError, FilterNameSpec,
    FilterOptions,
};

/// Creates [`ConvertEncodingFilter`]s for names in the `convert.encoding.*`
/// namespace.
#[derive(Clone)]
pub struct ConvertEncodingFactory {
    backend: Arc<dyn EncodingBackend>,
    options: FilterOptions,
}

impl Default for ConvertEncodingFactory {
    fn default() -> Self {
        Self::new(Arc::new(EncodingRsBackend::default()))
    }
}

impl ConvertEncodingFactory {
    pub fn new(backend: Arc<dyn EncodingBackend>) -> Self {
        Self {
            backend,
            options: FilterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FilterOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse `filter_name` and build a filter for it.
    ///
    /// Fails when the name is outside the namespace, its parameters are
    /// malformed, or the backend does not know one of the charsets.
    pub fn build(
        &self,
        filter_name: &str,
        internal_charset: &str,
    ) -> Result<ConvertEncodingFilter, FilterError> {
        let spec = FilterNameSpec::parse(filter_name)?;
        let filter =
            ConvertEncodingFilter::from_spec(&spec, internal_charset, self.backend.clone())
                .with_options(self.options.clone());

        if !self.backend.supports_source(filter.source_charset()) {
            return Err(FilterError::UnknownCharset(
                filter.source_charset().to_string(),
            ));
        }
        if !self.backend.supports_target(filter.target_charset()) {
            return Err(FilterError::UnknownCharset(
                filter.target_charset().to_string(),
            ));
        }
        Ok(filter)
    }
}

impl FilterFactory<Bytes> for ConvertEncodingFactory {
    fn create(&self, request: &FilterRequest<'_>) -> Option<Box<dyn Processor<Bytes>>> {
        match self.build(request.filter_name, request.internal_charset) {
            Ok(filter) => {
                debug!(
                    stream = %request.context.name,
                    from = filter.source_charset(),
                    to = filter.target_charset(),
                    "Created encoding filter"
                );
                Some(Box::new(filter))
            }
            Err(e) => {
                debug!(
                    stream = %request.context.name,
                    filter_name = request.filter_name,
                    error = %e,
                    "Filter name not handled"
                );
                None
            }
        }
    }
}
