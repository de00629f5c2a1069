use thiserror::Error;

/// Conditions surfaced through a failed activation or channel signal.
///
/// None of these are fatal; retrying is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonetizeError {
    /// The host reports that payment streaming is unavailable.
    #[error("web monetization is not supported by the host")]
    NotSupported,

    /// No destination was given and none is published on the host.
    #[error("no destination was provided or published")]
    MissingDestination,

    /// The requested channel is neither a lifecycle nor a registered custom channel.
    #[error("channel '{0}' is not supported")]
    UnsupportedChannel(String),
}
