//! # Encoding Backends
//!
//! The filter never inspects encodings itself. It asks a backend two
//! questions: "are these bytes a complete, valid instance of charset X?" and
//! "convert these valid bytes from X to Y". [`EncodingRsBackend`] answers both
//! with `encoding_rs`.
//!
//! ## Charset labels
//!
//! Labels are resolved with the WHATWG label table (`Shift_JIS`, `SJIS`,
//! `EUC-JP`, `UTF-8`, `UTF-16LE`, `windows-1252`, ...), case-insensitively.
//! The `auto` sentinel is accepted as a source charset and resolved per call
//! by trying the detect order until one charset accepts the bytes.
//!
//! ## Conversion
//!
//! - Validity is decoding without BOM sniffing and without replacement, so a
//!   truncated trailing sequence counts as invalid.
//! - Characters the target cannot represent become `?`.
//! - UTF-16 targets are serialized directly; `encoding_rs` only decodes them.

use std::borrow::Cow;

use encoding_rs::{EUC_JP, Encoder, EncoderResult, Encoding, SHIFT_JIS, UTF_8, UTF_16BE, UTF_16LE};
use tracing::trace;

use crate::{AUTO_CHARSET, FilterError};

/// Substitute for characters the target charset cannot represent.
const SUBSTITUTE: &str = "?";

/// The external charset capability consumed by the filter.
pub trait EncodingBackend: Send + Sync {
    /// Whether `charset` can be used as a source charset.
    fn supports_source(&self, charset: &str) -> bool;

    /// Whether `charset` can be used as a target charset.
    fn supports_target(&self, charset: &str) -> bool;

    /// Whether `bytes` form a complete and valid encoding under `charset`.
    fn is_valid(&self, bytes: &[u8], charset: &str) -> bool;

    /// Convert bytes already accepted by [`is_valid`](Self::is_valid).
    fn transcode(&self, bytes: &[u8], from: &str, to: &str) -> Result<Vec<u8>, FilterError>;
}

#[derive(Debug, Clone, Copy)]
enum Charset {
    Auto,
    Fixed(&'static Encoding),
}

/// [`EncodingBackend`] built on `encoding_rs`.
#[derive(Debug, Clone)]
pub struct EncodingRsBackend {
    detect_order: Vec<&'static Encoding>,
}

impl Default for EncodingRsBackend {
    fn default() -> Self {
        Self {
            detect_order: vec![UTF_8, EUC_JP, SHIFT_JIS],
        }
    }
}

impl EncodingRsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the charsets tried, in order, for `auto` sources.
    pub fn with_detect_order<I, S>(labels: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let detect_order = labels
            .into_iter()
            .map(|label| {
                let label = label.as_ref();
                lookup(label).ok_or_else(|| FilterError::UnknownCharset(label.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { detect_order })
    }

    pub fn detect_order(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.detect_order.iter().map(|encoding| encoding.name())
    }

    /// First charset of the detect order under which `bytes` are valid.
    pub fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding> {
        self.detect_order
            .iter()
            .copied()
            .find(|&encoding| decode_strict(encoding, bytes).is_some())
    }

    fn resolve(&self, charset: &str) -> Option<Charset> {
        if charset.eq_ignore_ascii_case(AUTO_CHARSET) {
            return Some(Charset::Auto);
        }
        lookup(charset).map(Charset::Fixed)
    }

    fn resolve_target(&self, charset: &str) -> Result<&'static Encoding, FilterError> {
        match self.resolve(charset) {
            Some(Charset::Fixed(encoding)) => Ok(encoding),
            _ => Err(FilterError::UnknownCharset(charset.to_string())),
        }
    }
}

impl EncodingBackend for EncodingRsBackend {
    fn supports_source(&self, charset: &str) -> bool {
        self.resolve(charset).is_some()
    }

    fn supports_target(&self, charset: &str) -> bool {
        matches!(self.resolve(charset), Some(Charset::Fixed(_)))
    }

    fn is_valid(&self, bytes: &[u8], charset: &str) -> bool {
        match self.resolve(charset) {
            Some(Charset::Auto) => self.detect(bytes).is_some(),
            Some(Charset::Fixed(encoding)) => decode_strict(encoding, bytes).is_some(),
            None => false,
        }
    }

    fn transcode(&self, bytes: &[u8], from: &str, to: &str) -> Result<Vec<u8>, FilterError> {
        let failed = || FilterError::Transcode {
            from: from.to_string(),
            to: to.to_string(),
            len: bytes.len(),
        };

        let source = match self.resolve(from) {
            Some(Charset::Auto) => self.detect(bytes).ok_or_else(failed)?,
            Some(Charset::Fixed(encoding)) => encoding,
            None => return Err(FilterError::UnknownCharset(from.to_string())),
        };
        let target = self.resolve_target(to)?;

        let text = decode_strict(source, bytes).ok_or_else(failed)?;
        if source == target {
            return Ok(bytes.to_vec());
        }
        trace!(
            from = source.name(),
            to = target.name(),
            len = bytes.len(),
            "Transcoding"
        );

        if target == UTF_16LE {
            return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
        }
        if target == UTF_16BE {
            return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
        }
        encode_substituting(target.new_encoder(), &text).ok_or_else(failed)
    }
}

fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label_no_replacement(label.as_bytes())
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

/// Encode `text`, replacing unmappable characters with [`SUBSTITUTE`].
///
/// The substitute goes through the encoder as well so stateful encodings
/// (ISO-2022-JP) switch back to ASCII before it is written.
fn encode_substituting(mut encoder: Encoder, text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut remaining = text;
    loop {
        out.reserve(encoder.max_buffer_length_from_utf8_without_replacement(remaining.len())?);
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(remaining, &mut out, true);
        remaining = &remaining[read..];
        match result {
            EncoderResult::InputEmpty => return Some(out),
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => {
                out.reserve(encoder.max_buffer_length_from_utf8_without_replacement(
                    SUBSTITUTE.len(),
                )?);
                let (result, _) =
                    encoder.encode_from_utf8_to_vec_without_replacement(SUBSTITUTE, &mut out, false);
                if !matches!(result, EncoderResult::InputEmpty) {
                    return None;
                }
            }
        }
    }
}
