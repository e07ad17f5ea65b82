//! # Processor
//!
//! A processor is one stage of a [`Pipeline`](crate::Pipeline). It receives
//! items one at a time and may emit zero or more items downstream through the
//! `output` callback. A stage that needs more input before it can emit
//! anything simply returns without calling `output`.

use std::sync::Arc;

use crate::{PipelineError, StreamerContext};

pub trait Processor<T>: Send {
    /// Process one input item, emitting any number of output items.
    fn process(
        &mut self,
        context: &Arc<StreamerContext>,
        input: T,
        output: &mut dyn FnMut(T) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError>;

    /// Called once when the stream closes. Remaining state may be flushed.
    fn finish(
        &mut self,
        context: &Arc<StreamerContext>,
        output: &mut dyn FnMut(T) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError>;

    /// Stage name used in logs and errors.
    fn name(&self) -> &'static str;
}

impl<T, P> Processor<T> for Box<P>
where
    P: Processor<T> + ?Sized,
{
    fn process(
        &mut self,
        context: &Arc<StreamerContext>,
        input: T,
        output: &mut dyn FnMut(T) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        (**self).process(context, input, output)
    }

    fn finish(
        &mut self,
        context: &Arc<StreamerContext>,
        output: &mut dyn FnMut(T) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        (**self).finish(context, output)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
