//! Tests for extractors and the registry

use std::collections::HashMap;

use fragsrc_protocol::{types, RecordBuilder, NULL_TIMESTAMP};

use crate::error::AssembleError;
use crate::extractor::{default_registry, ExtractorParams, PayloadWordExtractor, TimestampExtractor};

fn params(pairs: &[(&str, toml::Value)]) -> ExtractorParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_default_registry_contents() {
    let registry = default_registry();
    assert!(registry.contains("null"));
    assert!(registry.contains("payload-word"));
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.available_names(), vec!["null", "payload-word"]);
}

#[test]
fn test_unknown_extractor_lists_available() {
    let registry = default_registry();
    let err = registry.create("tstamplib", &HashMap::new()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("tstamplib"));
    assert!(msg.contains("null"));
    assert!(msg.contains("payload-word"));
}

#[test]
fn test_null_extractor() {
    let registry = default_registry();
    let extractor = registry.create("null", &HashMap::new()).expect("create");

    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(123u64.to_le_bytes())
        .build_record();
    assert_eq!(extractor.timestamp(&record), NULL_TIMESTAMP);
    assert_eq!(extractor.name(), "null");
}

#[test]
fn test_payload_word_at_offset_zero() {
    let extractor = PayloadWordExtractor::new(0);
    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(0xABCD_EF01_2345_6789u64.to_le_bytes())
        .build_record();
    assert_eq!(extractor.timestamp(&record), 0xABCD_EF01_2345_6789);
}

#[test]
fn test_payload_word_at_nonzero_offset() {
    let mut payload = vec![0xFFu8; 4];
    payload.extend_from_slice(&42u64.to_le_bytes());
    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(payload)
        .build_record();

    let extractor = PayloadWordExtractor::new(4);
    assert_eq!(extractor.timestamp(&record), 42);
}

#[test]
fn test_payload_word_short_payload_is_null() {
    let extractor = PayloadWordExtractor::new(0);
    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(b"abc")
        .build_record();
    assert_eq!(extractor.timestamp(&record), NULL_TIMESTAMP);
}

#[test]
fn test_payload_word_factory_reads_offset() {
    let registry = default_registry();
    let extractor = registry
        .create("payload-word", &params(&[("offset", toml::Value::Integer(8))]))
        .expect("create");

    let mut payload = vec![0u8; 8];
    payload.extend_from_slice(&7u64.to_le_bytes());
    let record = RecordBuilder::new(types::PHYSICS_EVENT)
        .payload(payload)
        .build_record();
    assert_eq!(extractor.timestamp(&record), 7);
}

#[test]
fn test_payload_word_factory_rejects_negative_offset() {
    let registry = default_registry();
    let err = registry
        .create("payload-word", &params(&[("offset", toml::Value::Integer(-4))]))
        .unwrap_err();
    assert!(matches!(err, AssembleError::InvalidParams { .. }));
}

#[test]
fn test_payload_word_factory_rejects_non_integer_offset() {
    let registry = default_registry();
    let err = registry
        .create(
            "payload-word",
            &params(&[("offset", toml::Value::String("first".into()))]),
        )
        .unwrap_err();
    assert!(matches!(err, AssembleError::InvalidParams { .. }));
}

#[test]
#[should_panic(expected = "already registered")]
fn test_duplicate_registration_panics() {
    struct Dup;
    impl crate::extractor::ExtractorFactory for Dup {
        fn create(
            &self,
            _params: &ExtractorParams,
        ) -> crate::error::Result<std::sync::Arc<dyn TimestampExtractor>> {
            Ok(std::sync::Arc::new(crate::extractor::NullExtractor))
        }
        fn name(&self) -> &'static str {
            "null"
        }
    }

    let mut registry = default_registry();
    registry.register(Dup);
}
