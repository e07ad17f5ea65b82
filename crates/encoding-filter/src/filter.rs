//! # ConvertEncodingFilter
//!
//! Transcodes a byte stream chunk by chunk. I/O chunking can split a
//! multi-byte character anywhere, so the filter never converts speculatively:
//! every chunk is appended to a carry buffer, and the buffer is only handed to
//! the backend once the backend confirms it is a complete, valid sequence in
//! the source charset. Until then nothing is emitted and the host is asked for
//! more input.
//!
//! ## States
//!
//! - `AwaitingInput`: initial state, and after a chunk was converted.
//! - `Buffering`: the last validity check failed; the carry buffer holds the
//!   bytes seen so far. Stays here across invocations until a check succeeds.
//! - `Draining`: every chunk of the last invocation was converted.
//!
//! Input that never becomes valid keeps growing the carry buffer until the
//! stream closes, at which point the buffered bytes are dropped. Set
//! [`FilterOptions::max_carry_bytes`] to turn that into an error instead.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use pipeline_common::{PipelineError, Processor, StreamerContext};
use tracing::{debug, trace, warn};

use crate::{EncodingBackend, FilterError, FilterNameSpec};

#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Upper bound for bytes held while waiting for a valid sequence.
    /// `None` keeps buffering until the stream closes.
    pub max_carry_bytes: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    AwaitingInput,
    Buffering,
    Draining,
}

/// Result of feeding one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The bytes so far are not yet a valid sequence; nothing was emitted.
    NeedMoreInput,
    /// The carry buffer plus the chunk was converted and the buffer cleared.
    Produced(Bytes),
}

/// Status reported to the host at the end of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    /// A chunk could not be converted yet; call again with more input.
    FeedMe,
    /// Every available chunk was converted and its output queued.
    PassOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub status: FilterStatus,
    /// Input bytes taken from the queue during the invocation.
    pub consumed: usize,
}

pub struct ConvertEncodingFilter {
    source: String,
    target: String,
    carry: BytesMut,
    state: FilterState,
    backend: Arc<dyn EncodingBackend>,
    options: FilterOptions,
}

impl ConvertEncodingFilter {
    const NAME: &'static str = "ConvertEncoding";

    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        backend: Arc<dyn EncodingBackend>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            carry: BytesMut::new(),
            state: FilterState::AwaitingInput,
            backend,
            options: FilterOptions::default(),
        }
    }

    /// Build a filter from a parsed name; a missing target charset becomes
    /// `internal_charset`.
    pub fn from_spec(
        spec: &FilterNameSpec,
        internal_charset: &str,
        backend: Arc<dyn EncodingBackend>,
    ) -> Self {
        Self::new(
            spec.from_charset(),
            spec.target_or(internal_charset),
            backend,
        )
    }

    pub fn with_options(mut self, options: FilterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source_charset(&self) -> &str {
        &self.source
    }

    pub fn target_charset(&self) -> &str {
        &self.target
    }

    /// Bytes received but not yet confirmed as a valid sequence.
    pub fn carry(&self) -> &[u8] {
        &self.carry
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Feed one chunk.
    ///
    /// The chunk is appended to the carry buffer. If the result is valid in
    /// the source charset it is converted and the buffer cleared; otherwise
    /// everything stays buffered and [`FeedOutcome::NeedMoreInput`] is
    /// returned.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<FeedOutcome, FilterError> {
        if self.state == FilterState::Draining {
            self.state = FilterState::AwaitingInput;
        }

        // common case: nothing carried over, convert the chunk in place
        let converted = if self.carry.is_empty() {
            if self.backend.is_valid(chunk, &self.source) {
                Some(self.backend.transcode(chunk, &self.source, &self.target)?)
            } else {
                self.carry.extend_from_slice(chunk);
                None
            }
        } else {
            self.carry.extend_from_slice(chunk);
            if self.backend.is_valid(&self.carry, &self.source) {
                let converted = self
                    .backend
                    .transcode(&self.carry, &self.source, &self.target)?;
                self.carry.clear();
                Some(converted)
            } else {
                None
            }
        };

        match converted {
            Some(bytes) => {
                trace!(
                    input = chunk.len(),
                    output = bytes.len(),
                    "Converted chunk"
                );
                self.state = FilterState::AwaitingInput;
                Ok(FeedOutcome::Produced(Bytes::from(bytes)))
            }
            None => {
                self.state = FilterState::Buffering;
                trace!(
                    buffered = self.carry.len(),
                    charset = %self.source,
                    "Incomplete sequence, buffering"
                );
                if let Some(limit) = self.options.max_carry_bytes
                    && self.carry.len() > limit
                {
                    return Err(FilterError::CarryOverflow {
                        charset: self.source.clone(),
                        limit,
                        buffered: self.carry.len(),
                    });
                }
                Ok(FeedOutcome::NeedMoreInput)
            }
        }
    }

    /// Run one host invocation over the queued chunks.
    ///
    /// Chunks are taken in arrival order. Converted output is appended to
    /// `output` (empty conversions are skipped). The first chunk that leaves
    /// the buffer incomplete ends the invocation with
    /// [`FilterStatus::FeedMe`]; later chunks stay queued.
    pub fn filter(
        &mut self,
        input: &mut VecDeque<Bytes>,
        output: &mut Vec<Bytes>,
    ) -> Result<Invocation, FilterError> {
        let mut consumed = 0;
        while let Some(chunk) = input.pop_front() {
            consumed += chunk.len();
            match self.feed(&chunk)? {
                FeedOutcome::NeedMoreInput => {
                    return Ok(Invocation {
                        status: FilterStatus::FeedMe,
                        consumed,
                    });
                }
                FeedOutcome::Produced(bytes) => {
                    if !bytes.is_empty() {
                        output.push(bytes);
                    }
                }
            }
        }

        if self.state == FilterState::AwaitingInput {
            self.state = FilterState::Draining;
        }
        Ok(Invocation {
            status: FilterStatus::PassOn,
            consumed,
        })
    }

    /// Drop whatever is still buffered. Returns the number of bytes dropped.
    pub fn close(&mut self) -> usize {
        let dropped = self.carry.len();
        self.carry.clear();
        self.state = FilterState::AwaitingInput;
        dropped
    }
}

impl fmt::Debug for ConvertEncodingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertEncodingFilter")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("carry_len", &self.carry.len())
            .field("state", &self.state)
            .field("options", &self.options)
            .finish()
    }
}

impl Processor<Bytes> for ConvertEncodingFilter {
    fn process(
        &mut self,
        context: &Arc<StreamerContext>,
        input: Bytes,
        output: &mut dyn FnMut(Bytes) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        let outcome = self
            .feed(&input)
            .map_err(|e| PipelineError::stage_process(Self::NAME, e))?;

        match outcome {
            FeedOutcome::NeedMoreInput => {
                trace!(
                    stream = %context.name,
                    buffered = self.carry.len(),
                    "Waiting for more input"
                );
                Ok(())
            }
            FeedOutcome::Produced(bytes) => {
                self.state = FilterState::Draining;
                if bytes.is_empty() {
                    return Ok(());
                }
                output(bytes)
            }
        }
    }

    fn finish(
        &mut self,
        context: &Arc<StreamerContext>,
        _output: &mut dyn FnMut(Bytes) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        let dropped = self.close();
        if dropped > 0 {
            warn!(
                stream = %context.name,
                dropped,
                charset = %self.source,
                "Stream closed with an incomplete sequence, discarding buffered bytes"
            );
        } else {
            debug!(stream = %context.name, "Encoding filter closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
