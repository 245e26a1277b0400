#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("Non-finite coordinate: ({latitude}, {longitude})")]
    NonFiniteCoordinate { latitude: f64, longitude: f64 },

    #[error("Failed to encode frame: {0}")]
    Encode(serde_json::Error),
}
