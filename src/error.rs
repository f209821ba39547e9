use thiserror::Error;

/// Errors produced while decoding or replaying a canvas command stream.
///
/// Stream errors are fatal for the current render call: the interpreter stops
/// at the first one because the cursor can no longer be trusted.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// The stream contained a byte that is not a known opcode.
    #[error("unrecognized canvas stream token {token} at byte offset {offset}")]
    UnknownToken { token: u8, offset: usize },
    /// A known opcode ended before all of its operands were read.
    #[error("command stream truncated at byte offset {offset} while reading {expected}")]
    Truncated { offset: usize, expected: &'static str },
    /// An operand byte held a value outside its enumeration.
    #[error("invalid {kind} value {value} in command stream")]
    InvalidEnum { kind: &'static str, value: u8 },
    /// The object queue was exhausted while an opcode expected an object.
    #[error("object queue exhausted while reading {expected}")]
    MissingObject { expected: &'static str },
    /// The next queued object had a different kind than the opcode expects.
    #[error("expected {expected} on the object queue but found {found}")]
    ObjectMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// The device refused to allocate a render target.
    #[error("failed to allocate a {width}x{height} render target")]
    TargetAllocation { width: u32, height: u32 },
    /// A drawing context could not be bound to a freshly allocated target.
    #[error("graphics context unavailable for a {width}x{height} render target")]
    ContextUnavailable { width: u32, height: u32 },
    /// Texture upload failed or the pixel data did not match its dimensions.
    #[error("invalid texture data: {0}")]
    InvalidTexture(String),
    /// Effect parameters were out of range.
    #[error("invalid effect parameters: {0}")]
    InvalidEffect(String),
    /// A device-level failure reported by the GPU backend.
    #[error("gpu backend error: {0}")]
    Gpu(String),
}

impl CanvasError {
    /// True for errors that indicate a corrupt or mismatched command stream.
    pub fn is_stream_corruption(&self) -> bool {
        matches!(
            self,
            CanvasError::UnknownToken { .. }
                | CanvasError::Truncated { .. }
                | CanvasError::InvalidEnum { .. }
                | CanvasError::MissingObject { .. }
                | CanvasError::ObjectMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_token_message_names_token_and_offset() {
        let error = CanvasError::UnknownToken {
            token: 0xEE,
            offset: 12,
        };
        assert_eq!(
            error.to_string(),
            "unrecognized canvas stream token 238 at byte offset 12"
        );
        assert!(error.is_stream_corruption());
    }

    #[test]
    fn allocation_failure_is_not_stream_corruption() {
        let error = CanvasError::TargetAllocation {
            width: 0,
            height: 4,
        };
        assert!(!error.is_stream_corruption());
    }
}
