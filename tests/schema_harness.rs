use translation_helps_server::schema::validate_json;

#[test]
fn json_schema_harness_validates_instance() {
    let schema = r#"{
      "$schema": "https://json-schema.org/draft/2020-12/schema",
      "type": "object",
      "required": ["error"],
      "additionalProperties": false,
      "properties": {
        "error": {
          "type": "object",
          "required": ["code", "message"],
          "additionalProperties": false,
          "properties": {
            "code": { "type": "string" },
            "message": { "type": "string", "minLength": 1 }
          }
        }
      }
    }"#;

    let instance = r#"{
      "error": {
        "code": "fetch_error",
        "message": "catalog answered 503"
      }
    }"#;

    validate_json(schema, instance).expect("schema validation failed");
}

#[test]
fn trace_header_payload_matches_schema() {
    use std::time::Duration;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use translation_helps_server::trace::{SpanCollector, TraceSpan};

    let collector = SpanCollector::new();
    collector.add_span(TraceSpan::internal("archive/unfoldingWord/en_ult/v86", false, 2048, Duration::from_millis(12)));
    collector.add_span(TraceSpan::network(
        "https://git.door43.org/unfoldingWord/en_ult/archive/v86.zip",
        200,
        2048,
        Duration::from_millis(11),
    ));

    let json = STANDARD.decode(collector.serialize()).unwrap();
    let instance = String::from_utf8(json).unwrap();

    let schema = r#"{
      "$schema": "https://json-schema.org/draft/2020-12/schema",
      "type": "object",
      "required": ["spans", "cacheStats", "totalDurationMs"],
      "additionalProperties": false,
      "properties": {
        "spans": {
          "type": "array",
          "items": {
            "type": "object",
            "required": ["url", "durationMs", "statusCode", "sizeBytes", "cached"],
            "additionalProperties": false,
            "properties": {
              "url": { "type": "string" },
              "durationMs": { "type": "integer", "minimum": 0 },
              "statusCode": { "type": "integer" },
              "sizeBytes": { "type": "integer", "minimum": 0 },
              "cached": { "type": "boolean" }
            }
          }
        },
        "cacheStats": {
          "type": "object",
          "required": ["hits", "misses", "total"],
          "properties": {
            "hits": { "type": "integer" },
            "misses": { "type": "integer" },
            "total": { "type": "integer" }
          }
        },
        "totalDurationMs": { "type": "integer", "minimum": 0 }
      }
    }"#;

    validate_json(schema, &instance).expect("trace payload must satisfy schema");
}
