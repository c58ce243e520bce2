//! `classify` (spec §7/§9): the single point in the consumer runtime's
//! dispatch loop that maps an `IngestError` onto the handling policy —
//! retry, dead-letter, or treat-as-success.

use ingest_types::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    TransientTransport,
    TransientSink,
    IdempotentHit,
    PermanentSink,
    FatalConfig,
}

impl ErrorClass {
    /// True when the runtime should nack for redelivery rather than ack or
    /// dead-letter.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::TransientTransport | ErrorClass::TransientSink)
    }
}

pub fn classify(error: &IngestError) -> ErrorClass {
    match error {
        IngestError::Validation(_) | IngestError::UnsupportedEvent(_) | IngestError::Serialization(_) => {
            ErrorClass::Validation
        }
        IngestError::Transport(_) => ErrorClass::TransientTransport,
        IngestError::TransientSink(_) => ErrorClass::TransientSink,
        IngestError::AlreadyProcessed => ErrorClass::IdempotentHit,
        IngestError::PermanentSink(_) | IngestError::Store(_) | IngestError::NotFound(_) => {
            ErrorClass::PermanentSink
        }
        IngestError::UnknownSubscription { .. } | IngestError::Configuration(_) => ErrorClass::FatalConfig,
        IngestError::Other(_) => ErrorClass::PermanentSink,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_classify_as_retryable() {
        assert!(classify(&IngestError::Transport("timeout".into())).is_retryable());
        assert!(classify(&IngestError::TransientSink("503".into())).is_retryable());
    }

    #[test]
    fn validation_and_config_errors_are_not_retryable() {
        assert!(!classify(&IngestError::Validation("bad field".into())).is_retryable());
        assert!(!classify(&IngestError::Configuration("missing env var".into())).is_retryable());
    }

    #[test]
    fn already_processed_classifies_as_idempotent_hit() {
        assert_eq!(classify(&IngestError::AlreadyProcessed), ErrorClass::IdempotentHit);
    }
}
