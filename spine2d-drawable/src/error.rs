use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("unknown attachment '{name}' for slot '{slot}'")]
    UnknownAttachment { slot: String, name: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("track entry was already disposed")]
    StaleTrackEntry,

    #[error("track entry on track {track_index} is still referenced by its track or a mix")]
    TrackEntryInUse { track_index: usize },

    #[cfg(feature = "json")]
    #[error("failed to parse drawable config JSON: {message}")]
    JsonParse { message: String },
}
