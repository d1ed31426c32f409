use std::path::PathBuf;

/// Errors that can escape the engine to a caller.
///
/// Per the error taxonomy, every other failure mode (`EncoderUnavailable`,
/// `BudgetExhausted`) is swallowed internally and never constructs one of
/// these — they only show up as a fallback result, never as an `Err`.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("failed to read source image at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source image could not be decoded by any available codec")]
    Decode {
        #[source]
        source: image::ImageError,
    },
}

/// Internal-only: a single encoder call failed or the tier's codec
/// refused the request. Always caught by the orchestrator; never surfaced.
#[derive(Debug, thiserror::Error)]
pub(crate) enum EncoderUnavailable {
    #[error("encode failed: {0}")]
    Encode(#[source] image::ImageError),
    #[error("decode failed: {0}")]
    Decode(#[source] image::ImageError),
}
