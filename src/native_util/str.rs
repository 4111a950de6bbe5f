use std::ffi::{CString, NulError};

/// A string that cannot be handed to native code as a NUL-terminated byte string.
#[derive(Debug, thiserror::Error)]
#[error("{text:?} cannot be passed to native code")]
pub struct EncodingError {
    text: String,
    #[source]
    source: Option<NulError>,
}

impl EncodingError {
    /// The text that failed to encode.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Encodes text as the NUL-terminated UTF-8 the engine expects.
pub fn to_native(s: &str) -> Result<CString, EncodingError> {
    CString::new(s).map_err(|err| EncodingError {
        text: s.to_string(),
        source: Some(err),
    })
}

/// Encodes a module or function name for the import table, which only holds ASCII names.
pub fn ansi_name(s: &str) -> Result<CString, EncodingError> {
    if !s.is_ascii() {
        return Err(EncodingError {
            text: s.to_string(),
            source: None,
        });
    }
    to_native(s)
}
