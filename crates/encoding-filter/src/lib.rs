//! # Encoding Filter
//!
//! A streaming character-encoding converter for `pipeline-common` byte
//! pipelines. Bytes arrive in arbitrary chunks in a source charset (or `auto`)
//! and leave transcoded to a target charset, without ever holding the whole
//! input in memory.
//!
//! ## Usage
//!
//! ```no_run
//! use std::io::Read;
//!
//! use bytes::Bytes;
//! use pipeline_common::{FilterRegistry, ReaderConfig, StreamerContext};
//!
//! let registry = FilterRegistry::<Bytes>::new();
//! encoding_filter::register(&registry)?;
//!
//! let url = encoding_filter::filter_url("data.csv", "Shift_JIS", Some("UTF-8"));
//! let mut reader = registry.open(&url, StreamerContext::arc_new(), ReaderConfig::default())?;
//! let mut text = String::new();
//! reader.read_to_string(&mut text)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Filter names
//!
//! `convert.encoding.<from>[:<to>]`, charset tokens matching `[-\w]+`. When
//! `<to>` is omitted the registry's internal charset at creation time is used.
//!
//! ## License
//!
//! MIT License
//!
//! ## Authors
//!
//! - hua0512
//!

mod backend;
mod error;
mod factory;
mod filter;
mod name;

pub use backend::{EncodingBackend, EncodingRsBackend};
pub use error::FilterError;
pub use factory::ConvertEncodingFactory;
pub use filter::{
    ConvertEncodingFilter, FeedOutcome, FilterOptions, FilterState, FilterStatus, Invocation,
};
pub use name::{AUTO_CHARSET, FILTER_NAMESPACE, FilterNameSpec, NameParseError};

use bytes::Bytes;
use pipeline_common::{FilterRegistry, Registration, ResourceLocator};

/// Register the `convert.encoding.*` family with the default backend.
///
/// Calling this again is a no-op returning [`Registration::AlreadyRegistered`].
pub fn register(registry: &FilterRegistry<Bytes>) -> Result<Registration, FilterError> {
    register_with(registry, ConvertEncodingFactory::default())
}

/// Register the family with a custom factory.
///
/// Only the first registration installs a factory; later calls leave the
/// installed one in place, whatever their configuration.
pub fn register_with(
    registry: &FilterRegistry<Bytes>,
    factory: ConvertEncodingFactory,
) -> Result<Registration, FilterError> {
    let pattern = FilterNameSpec::pattern();
    registry
        .register(&pattern, factory)
        .map_err(|source| FilterError::Registration { pattern, source })
}

/// Filter name converting `from` to `to`, or to the internal charset when
/// `to` is `None`.
pub fn filter_name(from: &str, to: Option<&str>) -> String {
    FilterNameSpec::new(from, to).to_string()
}

/// Locator reading `filename` through a `from` → `to` conversion.
///
/// `filename` must not be empty: a locator with an empty `resource=`
/// segment does not parse back.
///
/// ```
/// assert_eq!(
///     encoding_filter::filter_url("in.csv", "SJIS", None),
///     "stream://filter/convert.encoding.SJIS/resource=in.csv"
/// );
/// ```
pub fn filter_url(filename: &str, from: &str, to: Option<&str>) -> String {
    ResourceLocator::new(filename)
        .with_filter(filter_name(from, to))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_common::{RegistryError, create_test_context};

    #[test]
    fn test_register_twice() {
        let registry = FilterRegistry::<Bytes>::new();
        assert_eq!(register(&registry).unwrap(), Registration::Installed);
        assert_eq!(register(&registry).unwrap(), Registration::AlreadyRegistered);
        assert_eq!(registry.patterns(), vec!["convert.encoding.*".to_string()]);
    }

    #[test]
    fn test_register_collision() {
        struct Squatter;

        impl pipeline_common::FilterFactory<Bytes> for Squatter {
            fn create(
                &self,
                _request: &pipeline_common::FilterRequest<'_>,
            ) -> Option<Box<dyn pipeline_common::Processor<Bytes>>> {
                None
            }
        }

        let registry = FilterRegistry::<Bytes>::new();
        registry.register("convert.encoding.*", Squatter).unwrap();

        match register(&registry) {
            Err(FilterError::Registration { pattern, source }) => {
                assert_eq!(pattern, "convert.encoding.*");
                assert!(matches!(source, RegistryError::Conflict { .. }));
            }
            other => panic!("Expected Registration error, got {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_register_installs_once() {
        const THREADS: usize = 8;
        let registry = FilterRegistry::<Bytes>::new();

        let outcomes: Vec<Registration> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| s.spawn(|| register(&registry).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let installed = outcomes
            .iter()
            .filter(|r| **r == Registration::Installed)
            .count();
        assert_eq!(installed, 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| **r == Registration::AlreadyRegistered)
                .count(),
            THREADS - 1
        );
        assert_eq!(registry.patterns(), vec!["convert.encoding.*".to_string()]);
    }

    #[test]
    fn test_filter_url_needs_a_filename() {
        let url = filter_url("", "SJIS", Some("UTF-8"));
        assert_eq!(url, "stream://filter/convert.encoding.SJIS:UTF-8/resource=");
        assert!(matches!(
            ResourceLocator::parse(&url),
            Err(pipeline_common::LocatorError::MissingResource(_))
        ));
    }

    #[test]
    fn test_filter_url_formats() {
        assert_eq!(
            filter_url("/tmp/a.csv", "Shift_JIS", Some("UTF-8")),
            "stream://filter/convert.encoding.Shift_JIS:UTF-8/resource=/tmp/a.csv"
        );
        assert_eq!(
            filter_url("a.csv", "EUC-JP", None),
            "stream://filter/convert.encoding.EUC-JP/resource=a.csv"
        );
        assert_eq!(filter_name("SJIS", Some("UTF-8")), "convert.encoding.SJIS:UTF-8");
    }

    #[test]
    fn test_registry_rejects_bad_names() {
        let registry = FilterRegistry::<Bytes>::new();
        register(&registry).unwrap();
        let context = create_test_context();

        for name in [
            "convert.encoding.SJIS:",
            "convert.encoding.SJIS UTF-8",
            "convert.encoding.not-a-charset",
        ] {
            assert!(
                matches!(
                    registry.create(name, &context),
                    Err(RegistryError::Rejected { .. })
                ),
                "{name}"
            );
        }
        assert!(registry.create("convert.encoding.SJIS", &context).is_ok());
    }
}
