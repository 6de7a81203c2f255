use btlink_trace_reader::TraceError;
use perfect_derive::perfect_derive;
use thiserror::Error;

use crate::ImageView;

/// Fatal failures of an annotation run.
///
/// Any of these aborts the whole run before the single commit, so a failed
/// run leaves the host annotation store untouched.
#[derive(Error)]
#[perfect_derive(Debug)]
pub enum AnnotatorError<V: ImageView> {
    /// The loaded image's instruction set is not the supported family
    #[error("Unsupported architecture {0:?}, only x86_64 images are supported")]
    UnsupportedArchitecture(String),
    /// No trace file path was supplied
    #[error("No trace file given")]
    MissingInput,
    /// The trace file could not be read
    #[error("Failed to read trace file")]
    ReadInput(#[source] std::io::Error),
    /// The trace document was rejected by the reader
    #[error("Malformed trace document")]
    Trace(#[from] TraceError),
    /// An event references a module absent from the trace module table
    #[error("Module {0} is not present in the trace module table")]
    UnknownModule(String),
    /// Image query or annotation write failed in the host
    #[error("Image host error")]
    Image(#[source] V::Error),
}

pub(crate) type AnnotatorResult<T, V> = core::result::Result<T, AnnotatorError<V>>;
