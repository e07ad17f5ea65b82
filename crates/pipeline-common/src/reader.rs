//! # Filtered Reader
//!
//! Applies a byte [`Pipeline`] to everything read from an inner reader. The
//! inner reader is pulled in fixed-size chunks; each chunk is pushed through
//! the pipeline and whatever the stages emit is served to the caller. When the
//! inner reader is exhausted the pipeline is finished, which lets stages flush
//! or drop any state they still hold.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::{FilterRegistry, Pipeline, PipelineError, ResourceLocator, StreamerContext};

const DEFAULT_CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Number of bytes pulled from the inner reader per pipeline push.
    pub chunk_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub struct FilteredReader<R> {
    inner: R,
    pipeline: Pipeline<Bytes>,
    pending: BytesMut,
    chunk: Vec<u8>,
    eof: bool,
}

impl<R: Read> FilteredReader<R> {
    pub fn new(inner: R, pipeline: Pipeline<Bytes>, config: ReaderConfig) -> Self {
        Self {
            inner,
            pipeline,
            pending: BytesMut::new(),
            chunk: vec![0; config.chunk_size.max(1)],
            eof: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Pull chunks until some output is available or the input is exhausted.
    fn fill(&mut self) -> Result<(), PipelineError> {
        let Self {
            inner,
            pipeline,
            pending,
            chunk,
            eof,
        } = self;

        while pending.is_empty() && !*eof {
            let read = match inner.read(chunk) {
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            let mut sink = |out: Bytes| {
                pending.extend_from_slice(&out);
                Ok(())
            };

            if read == 0 {
                *eof = true;
                debug!(stream = %pipeline.context().name, "Input exhausted, finishing pipeline");
                pipeline.finish(&mut sink)?;
            } else {
                trace!(stream = %pipeline.context().name, read, "Pushing chunk");
                pipeline.push(Bytes::copy_from_slice(&chunk[..read]), &mut sink)?;
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for FilteredReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.fill()?;

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

impl FilterRegistry<Bytes> {
    /// Open the file addressed by `locator`, reading it through the filters
    /// the locator names.
    pub fn open(
        &self,
        locator: &str,
        context: Arc<StreamerContext>,
        config: ReaderConfig,
    ) -> Result<FilteredReader<File>, PipelineError> {
        let locator = ResourceLocator::parse(locator)?;
        let pipeline = self.build_pipeline(locator.filters(), context)?;
        let file = File::open(Path::new(locator.resource()))?;
        debug!(
            resource = locator.resource(),
            filters = ?locator.filters(),
            "Opened filtered resource"
        );
        Ok(FilteredReader::new(file, pipeline, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FilterFactory, FilterRequest, Processor, create_test_context, init_tracing};
    use std::io::Write;

    /// Emits input in pairs of bytes; a trailing odd byte waits for more input.
    struct Pairs {
        carry: Vec<u8>,
    }

    impl Processor<Bytes> for Pairs {
        fn process(
            &mut self,
            _context: &Arc<StreamerContext>,
            input: Bytes,
            output: &mut dyn FnMut(Bytes) -> Result<(), PipelineError>,
        ) -> Result<(), PipelineError> {
            self.carry.extend_from_slice(&input);
            let even = self.carry.len() - self.carry.len() % 2;
            if even > 0 {
                let ready: Vec<u8> = self.carry.drain(..even).collect();
                output(Bytes::from(ready))?;
            }
            Ok(())
        }

        fn finish(
            &mut self,
            _context: &Arc<StreamerContext>,
            _output: &mut dyn FnMut(Bytes) -> Result<(), PipelineError>,
        ) -> Result<(), PipelineError> {
            self.carry.clear();
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Pairs"
        }
    }

    struct PairsFactory;

    impl FilterFactory<Bytes> for PairsFactory {
        fn create(&self, _request: &FilterRequest<'_>) -> Option<Box<dyn Processor<Bytes>>> {
            Some(Box::new(Pairs { carry: Vec::new() }))
        }
    }

    #[test]
    fn test_reader_applies_pipeline_across_chunk_sizes() {
        init_tracing();
        for chunk_size in [1, 2, 3, 7, 64] {
            let pipeline = Pipeline::new(create_test_context()).add_processor(Pairs {
                carry: Vec::new(),
            });
            let mut reader = FilteredReader::new(
                &b"abcdefghi"[..],
                pipeline,
                ReaderConfig { chunk_size },
            );
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            // the odd trailing byte is dropped on finish
            assert_eq!(out, b"abcdefgh", "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_registry_open_locator() {
        let registry = FilterRegistry::<Bytes>::new();
        registry.register("pairs.*", PairsFactory).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"12345").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let locator = ResourceLocator::new(path).with_filter("pairs.any").to_string();
        let mut reader = registry
            .open(&locator, create_test_context(), ReaderConfig::default())
            .unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "1234");
    }

    #[test]
    fn test_registry_open_errors() {
        let registry = FilterRegistry::<Bytes>::new();
        let context = create_test_context();

        assert!(matches!(
            registry.open("not-a-locator", context.clone(), ReaderConfig::default()),
            Err(PipelineError::Locator(_))
        ));
        assert!(matches!(
            registry.open(
                "stream://filter/pairs.any/resource=/nonexistent",
                context.clone(),
                ReaderConfig::default()
            ),
            Err(PipelineError::Registry(_))
        ));

        registry.register("pairs.*", PairsFactory).unwrap();
        assert!(matches!(
            registry.open(
                "stream://filter/pairs.any/resource=/nonexistent/file.bin",
                context,
                ReaderConfig::default()
            ),
            Err(PipelineError::Io(_))
        ));
    }
}
