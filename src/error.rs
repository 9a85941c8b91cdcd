use thiserror::Error;

// Enum for handling various application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("API error: {0}")]
    Api(#[from] ApiError), // Errors from the generation backend.

    #[error("Storage error: {0}")]
    Store(#[from] StoreError), // Errors from the key-value store.

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError), // Errors from capture or playback.

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No partner snapshot captured")]
    MissingSnapshot, // Generation requested before both partners finished their turn.

    #[error("Not connected to a room")]
    NotInRoom,
}

// Errors from the backend HTTP exchange are separated into their own enum.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Backend(String), // Non-2xx response; carries the backend's `detail` string.

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Audio payload was not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("Audio recording error: {0}")]
    Recording(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("hound audio error: {0}")]
    Hound(#[from] hound::Error),

    #[error("Cpal default config error: {0}")]
    CpalDefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Cpal build stream error: {0}")]
    CpalBuildStream(#[from] cpal::BuildStreamError),

    #[error("Cpal play stream error: {0}")]
    CpalPlayStream(#[from] cpal::PlayStreamError),

    #[error("std io AudioError: {0}")]
    IO(#[from] std::io::Error),
}

impl From<String> for AudioError {
    fn from(error: String) -> Self {
        AudioError::Recording(error)
    }
}
