use pipeline_common::RegistryError;
use thiserror::Error;

use crate::name::NameParseError;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("failed to register stream filter: {pattern}")]
    Registration {
        pattern: String,
        #[source]
        source: RegistryError,
    },

    #[error(transparent)]
    NameParse(#[from] NameParseError),

    #[error("unknown charset: {0}")]
    UnknownCharset(String),

    #[error("carry buffer exceeded {limit} bytes ({buffered} buffered) without a valid {charset} sequence")]
    CarryOverflow {
        charset: String,
        limit: usize,
        buffered: usize,
    },

    #[error("failed to transcode {len} bytes from {from} to {to}")]
    Transcode {
        from: String,
        to: String,
        len: usize,
    },
}
