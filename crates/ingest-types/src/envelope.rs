//! The event envelope (spec §3): metadata carried by every published event,
//! independent of its payload. Envelopes are immutable once published;
//! `annotate_with_*` is the only permitted mutation, and it always returns a
//! new value rather than mutating in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distributed-trace triplet propagated alongside an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
}

/// Metadata present on every event, regardless of payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_service: String,
    pub source_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub tags: std::collections::BTreeMap<String, String>,
}

impl EventMetadata {
    pub fn new(source_service: impl Into<String>, source_version: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_service: source_service.into(),
            source_version: source_version.into(),
            trace: None,
            request_id: None,
            user_id: None,
            correlation_id: None,
            tags: std::collections::BTreeMap::new(),
        }
    }

    /// Returns a copy annotated with distributed-trace context.
    pub fn annotate_with_trace(&self, trace: TraceContext) -> Self {
        let mut next = self.clone();
        next.trace = Some(trace);
        next
    }

    /// Returns a copy with a request id and/or correlation id attached.
    pub fn annotate_with_request(
        &self,
        request_id: Option<String>,
        correlation_id: Option<String>,
    ) -> Self {
        let mut next = self.clone();
        if request_id.is_some() {
            next.request_id = request_id;
        }
        if correlation_id.is_some() {
            next.correlation_id = correlation_id;
        }
        next
    }

    /// Returns a copy with extra tags merged in (existing keys overwritten).
    pub fn annotate_with_tags(&self, extra: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut next = self.clone();
        next.tags.extend(extra);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_does_not_mutate_original() {
        let original = EventMetadata::new("office_service", "1.0.0");
        let annotated = original.annotate_with_tags([("k".to_string(), "v".to_string())]);
        assert!(original.tags.is_empty());
        assert_eq!(annotated.tags.get("k"), Some(&"v".to_string()));
    }

    #[test]
    fn trace_annotation_round_trips() {
        let original = EventMetadata::new("office_service", "1.0.0");
        let trace = TraceContext {
            trace_id: "t1".into(),
            span_id: "s1".into(),
            parent_span_id: None,
        };
        let annotated = original.annotate_with_trace(trace.clone());
        assert_eq!(annotated.trace, Some(trace));
    }
}
