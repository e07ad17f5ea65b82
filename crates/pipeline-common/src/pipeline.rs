//! # Generic Pipeline Implementation
//!
//! This module provides a generic pipeline implementation that chains together
//! processors to form a complete data processing workflow.
//!
//! ## Usage
//!
//! Create a new `Pipeline<T>` and add processors that implement the `Processor<T>`
//! trait. Then either hand a whole iterator to [`Pipeline::process`], or drive
//! the pipeline incrementally with [`Pipeline::push`] and [`Pipeline::finish`]
//! as chunks become available.
//!

use crate::{PipelineError, Processor, StreamerContext};
use std::sync::Arc;
use tracing::debug;

/// A generic pipeline for processing data through a series of processors.
///
/// The pipeline coordinates a sequence of processors, with each processor
/// receiving outputs from the previous one in the chain.
pub struct Pipeline<T> {
    processors: Vec<Box<dyn Processor<T>>>,
    context: Arc<StreamerContext>,
    finished: bool,
}

// Recursive processing function that passes data through the pipeline
fn process_inner<T>(
    context: &Arc<StreamerContext>,
    processors: &mut [Box<dyn Processor<T>>],
    data: T,
    output: &mut dyn FnMut(T) -> Result<(), PipelineError>,
) -> Result<(), PipelineError> {
    if let Some((first, rest)) = processors.split_first_mut() {
        let mut intermediate_output = |data| process_inner(context, rest, data, output);
        first.process(context, data, &mut intermediate_output)
    } else {
        output(data)
    }
}

impl<T> Pipeline<T> {
    /// Create a new empty pipeline with the given processing context.
    pub fn new(context: Arc<StreamerContext>) -> Self {
        Self {
            processors: Vec::new(),
            context,
            finished: false,
        }
    }

    /// Add a processor to the end of the pipeline.
    ///
    /// Returns self for method chaining.
    pub fn add_processor<P: Processor<T> + 'static>(mut self, processor: P) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Add an already boxed processor, as produced by a
    /// [`FilterRegistry`](crate::FilterRegistry).
    pub fn add_boxed(mut self, processor: Box<dyn Processor<T>>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn context(&self) -> &Arc<StreamerContext> {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Names of the stages, in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Push a single item through every stage.
    pub fn push(
        &mut self,
        data: T,
        output: &mut dyn FnMut(T) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        process_inner(&self.context, &mut self.processors, data, output)
    }

    /// Finalize processing for all processors in the chain.
    ///
    /// Items flushed by a stage still travel through the stages after it.
    /// Calling this more than once is a no-op.
    pub fn finish(
        &mut self,
        output: &mut dyn FnMut(T) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let context = &self.context;
        let mut processors: &mut [Box<dyn Processor<T>>] = &mut self.processors;
        while let Some((current, rest)) = std::mem::take(&mut processors).split_first_mut() {
            debug!(stream = %context.name, stage = current.name(), "Finishing stage");
            {
                let mut output_fn = |data: T| process_inner(context, rest, data, output);
                current.finish(context, &mut output_fn)?;
            }
            processors = rest;
        }
        Ok(())
    }

    /// Process all input through the pipeline.
    ///
    /// Takes an iterator of input data and a function to handle output data.
    /// Input errors are forwarded to `output` untouched. Returns an error if
    /// any processor in the pipeline fails.
    pub fn process<I, O, E>(mut self, input: I, output: &mut O) -> Result<(), PipelineError>
    where
        I: Iterator<Item = Result<T, E>>,
        O: FnMut(Result<T, E>),
    {
        for item in input {
            match item {
                Ok(data) => {
                    let mut internal_output = |data: T| {
                        output(Ok(data));
                        Ok(())
                    };
                    self.push(data, &mut internal_output)?;
                }
                Err(e) => {
                    output(Err(e));
                }
            }
        }

        let mut internal_output = |data: T| {
            output(Ok(data));
            Ok(())
        };
        self.finish(&mut internal_output)
    }
}
