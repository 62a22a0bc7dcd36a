/// Failure of a single explorer poll. The `Display` text is what the feed
/// shows to the player.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// No explorer API key configured; the feed never polls.
    #[error("Explorer API key missing (set POLYGONSCAN_API_KEY or pass --api-key)")]
    MissingCredential,
    /// The explorer answered but rejected the query (rate limit, bad params).
    #[error("API error: {message}")]
    Upstream { message: String },
    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The body was not the expected log-query payload.
    #[error("An unexpected error occurred.")]
    UnexpectedResponse(String),
}

/// Why a single raw log could not become a `RollEvent`.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid block number {0:?}")]
    BlockNumber(String),
    #[error("invalid hex field {field}: {source}")]
    Hex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },
    #[error("invalid topic {0:?}")]
    Topic(String),
    #[error("log does not match Roll schema: {0}")]
    Schema(#[from] alloy::sol_types::Error),
    #[error("{field} value {value} is not a coin side")]
    Side { field: &'static str, value: String },
}
