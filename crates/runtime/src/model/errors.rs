use thiserror::Error;

/// Failures talking to a model provider.
///
/// These end the run and propagate out of the turn unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The request never got a response, or the stream broke off.
    #[error("network: {0}")]
    Network(String),

    /// The provider answered with an error status or an error event.
    #[error("provider api: {0}")]
    Api(String),

    /// A streamed chunk could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
