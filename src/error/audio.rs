// Audio decoding error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::Path;

/// Audio error code constants
///
/// Single source of truth for the codes written to logs and surfaced in
/// HTTP failure details.
///
/// Error code range: 1001-1006
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Input file could not be opened or read
    pub const FILE_OPEN_FAILED: i32 = 1001;

    /// Container or codec is not supported by any decoder
    pub const UNSUPPORTED_FORMAT: i32 = 1002;

    /// Decoder failed mid-stream
    pub const DECODE_FAILED: i32 = 1003;

    /// Decoding produced no samples
    pub const EMPTY_AUDIO: i32 = 1004;

    /// Sample rate is zero or missing
    pub const INVALID_SAMPLE_RATE: i32 = 1005;

    /// No decoding capability was injected at startup
    pub const DECODER_UNAVAILABLE: i32 = 1006;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=Decoder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio decoding errors
///
/// These errors cover opening, probing and decoding audio files into a
/// mono waveform.
///
/// Error code range: 1001-1006
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// File could not be opened
    FileOpenFailed { path: String, reason: String },

    /// No decoder recognised the stream
    UnsupportedFormat { reason: String },

    /// Decoder failed while reading packets or samples
    DecodeFailed { reason: String },

    /// Decoding produced zero samples
    EmptyAudio,

    /// Sample rate is zero or unknown
    InvalidSampleRate { sample_rate: u32 },

    /// Decoding capability absent
    DecoderUnavailable,
}

impl AudioError {
    pub(crate) fn open_failed(path: &Path, reason: impl fmt::Display) -> Self {
        AudioError::FileOpenFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::FileOpenFailed { .. } => AudioErrorCodes::FILE_OPEN_FAILED,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::DecodeFailed { .. } => AudioErrorCodes::DECODE_FAILED,
            AudioError::EmptyAudio => AudioErrorCodes::EMPTY_AUDIO,
            AudioError::InvalidSampleRate { .. } => AudioErrorCodes::INVALID_SAMPLE_RATE,
            AudioError::DecoderUnavailable => AudioErrorCodes::DECODER_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::FileOpenFailed { path, reason } => {
                format!("Error loading audio file {}: {}", path, reason)
            }
            AudioError::UnsupportedFormat { reason } => {
                format!("Unsupported audio format: {}", reason)
            }
            AudioError::DecodeFailed { reason } => format!("Decoding failed: {}", reason),
            AudioError::EmptyAudio => "Audio file contains no samples".to_string(),
            AudioError::InvalidSampleRate { sample_rate } => {
                format!("Invalid sample rate: {} Hz", sample_rate)
            }
            AudioError::DecoderUnavailable => "Audio decoder is not available".to_string(),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::DecodeFailed {
            reason: err.to_string(),
        }
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::Unsupported | hound::Error::FormatError(_) => {
                AudioError::UnsupportedFormat {
                    reason: err.to_string(),
                }
            }
            other => AudioError::DecodeFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;
        match err {
            SymphoniaError::Unsupported(what) => AudioError::UnsupportedFormat {
                reason: what.to_string(),
            },
            other => AudioError::DecodeFailed {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::FileOpenFailed {
                path: "a.wav".to_string(),
                reason: "missing".to_string()
            }
            .code(),
            AudioErrorCodes::FILE_OPEN_FAILED
        );
        assert_eq!(
            AudioError::UnsupportedFormat {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::UNSUPPORTED_FORMAT
        );
        assert_eq!(
            AudioError::DecodeFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::DECODE_FAILED
        );
        assert_eq!(AudioError::EmptyAudio.code(), AudioErrorCodes::EMPTY_AUDIO);
        assert_eq!(
            AudioError::InvalidSampleRate { sample_rate: 0 }.code(),
            AudioErrorCodes::INVALID_SAMPLE_RATE
        );
        assert_eq!(
            AudioError::DecoderUnavailable.code(),
            AudioErrorCodes::DECODER_UNAVAILABLE
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::FileOpenFailed {
            path: "beats/train/good/a.wav".to_string(),
            reason: "No such file".to_string(),
        };
        assert_eq!(
            err.message(),
            "Error loading audio file beats/train/good/a.wav: No such file"
        );

        let err = AudioError::InvalidSampleRate { sample_rate: 0 };
        assert!(err.message().contains("0 Hz"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::EmptyAudio;
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::DecodeFailed { reason } => {
                assert!(reason.contains("test io error"));
            }
            _ => panic!("Expected DecodeFailed"),
        }
    }
}
