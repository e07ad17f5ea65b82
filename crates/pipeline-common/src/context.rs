//! Stream processing context
//!
//! The context is shared by every stage attached to one stream. Filters use
//! it to tag their log lines with the stream they belong to.

/// Shared context for stream processing operations
#[derive(Debug, Clone)]
pub struct StreamerContext {
    /// Name of the stream/file being processed
    pub name: String,
}

impl StreamerContext {
    pub fn arc_new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for StreamerContext {
    fn default() -> Self {
        Self {
            name: "DefaultStreamer".to_string(),
        }
    }
}
