//! Integration tests for the complete definition processing pipeline
//!
//! Tests use temporary directories with real file fixtures to verify:
//! - Project config and definition loading
//! - Save-time checks across producer and consumer files
//! - Seeding a store from definitions
//! - Validating and transforming payloads against seeded records

use serde_json::{Value, json};
use tempfile::TempDir;

use hookwire_core::{
    Config, MemoryStore, Store, apply_defaults, sample_payload, transform_with_diagnostics,
    validate_payload,
};

/// Helper to create a temporary project directory with standard structure.
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("producers")).unwrap();
    std::fs::create_dir_all(dir.path().join("consumers")).unwrap();
    std::fs::write(
        dir.path().join("hookwire.yaml"),
        "name: integration-test\nlogs:\n  capacity: 10\n",
    )
    .unwrap();
    dir
}

fn write(dir: &TempDir, relative: &str, contents: &str) {
    std::fs::write(dir.path().join(relative), contents).unwrap();
}

const ORDERS: &str = r#"
id: orders
name: Order Placed
description: Emitted by the storefront on checkout
attributes:
  - key: orderId
    type: int
  - key: customer
    type: object
  - key: items
    type: array
  - key: currency
    type: string
    defaultValue: USD
"#;

const SHIPPING: &str = r#"
id: shipping
producerId: orders
name: Shipping Service
webhookUrl: https://ship.example.com/hooks/orders
attributes:
  - key: reference
    type: int
    mappingType: direct
    producerAttributeKey: orderId
  - key: zip
    type: string
    mappingType: expression
    expression: "${customer.address.zip}"
  - key: parcels
    type: int
    mappingType: expression
    expression: "${items}.length"
  - key: carrier
    type: string
    mappingType: hardcoded
    value: UPS
  - key: label
    type: string
    mappingType: expression
    expression: "'Order #' + ${orderId} + ' (' + ${currency} + ')'"
"#;

// =============================================================================
// Complete Pipeline Tests
// =============================================================================

#[tokio::test]
async fn test_complete_pipeline() {
    let dir = setup_project();
    write(&dir, "producers/orders.yaml", ORDERS);
    write(&dir, "consumers/shipping.yaml", SHIPPING);

    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config.project.name, "integration-test");
    assert_eq!(config.project.logs.capacity, 10);

    let definitions = config.load_definitions().unwrap();
    assert!(definitions.check().is_empty(), "{:?}", definitions.check());

    let store = MemoryStore::with_log_capacity(config.project.logs.capacity);
    definitions.seed(&store).await.unwrap();

    let producer = store.get_producer("orders").await.unwrap().unwrap();
    let consumer = store.get_consumer("shipping").await.unwrap().unwrap();
    assert_eq!(producer.endpoint, "/api/producers/orders");

    let payload = json!({
        "orderId": 7,
        "customer": {"address": {"zip": "94107"}},
        "items": [{"sku": "A"}, {"sku": "B"}, {"sku": "C"}]
    });
    let result = validate_payload(&payload, &producer);
    assert!(!result.valid);
    assert_eq!(result.errors, vec!["Missing required attribute: currency"]);

    let mut data = payload.as_object().cloned().unwrap();
    apply_defaults(&mut data, &producer);
    assert!(validate_payload(&Value::Object(data.clone()), &producer).valid);

    let (output, diagnostics) = transform_with_diagnostics(&data, &consumer, &producer);
    assert!(diagnostics.is_empty());
    assert_eq!(
        Value::Object(output),
        json!({
            "reference": 7,
            "zip": "94107",
            "parcels": 3,
            "carrier": "UPS",
            "label": "Order #7 (USD)"
        })
    );
}

#[tokio::test]
async fn test_sample_payload_round_trips_through_validation() {
    let dir = setup_project();
    write(&dir, "producers/orders.yaml", ORDERS);

    let config = Config::load(dir.path()).unwrap();
    let store = MemoryStore::new();
    config.load_definitions().unwrap().seed(&store).await.unwrap();
    let producer = store.get_producer("orders").await.unwrap().unwrap();

    let sample = sample_payload(&producer);
    assert_eq!(
        Value::Object(sample.clone()),
        json!({"orderId": 0, "customer": {}, "items": [], "currency": "USD"})
    );
    assert!(validate_payload(&Value::Object(sample), &producer).valid);
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_check_collects_errors_across_files() {
    let dir = setup_project();
    write(&dir, "producers/orders.yaml", ORDERS);
    write(
        &dir,
        "consumers/broken.yaml",
        r#"
producerId: orders
name: Broken
webhookUrl: https://broken.example.com
attributes:
  - key: a
    type: int
    mappingType: direct
    producerAttributeKey: missing
  - key: b
    type: int
    mappingType: hardcoded
  - key: c
    type: int
    mappingType: expression
    expression: "${orderId}; process.exit()"
"#,
    );

    let config = Config::load(dir.path()).unwrap();
    let errors = config.load_definitions().unwrap().check();
    assert_eq!(errors.len(), 1);
    let message = &errors[0];
    assert!(message.contains("a: producer has no attribute 'missing'"));
    assert!(message.contains("b: hardcoded mapping requires value"));
    assert!(message.contains("forbidden"));
}

#[tokio::test]
async fn test_misconfigured_consumer_still_transforms_other_keys() {
    let dir = setup_project();
    write(&dir, "producers/orders.yaml", ORDERS);
    write(
        &dir,
        "consumers/partial.yaml",
        r#"
id: partial
producerId: orders
name: Partial
webhookUrl: https://partial.example.com
attributes:
  - key: total
    type: int
    mappingType: expression
    expression: "${customer} * 2"
  - key: reference
    type: int
    mappingType: direct
    producerAttributeKey: orderId
"#,
    );

    let config = Config::load(dir.path()).unwrap();
    let store = MemoryStore::new();
    config.load_definitions().unwrap().seed(&store).await.unwrap();
    let producer = store.get_producer("orders").await.unwrap().unwrap();
    let consumer = store.get_consumer("partial").await.unwrap().unwrap();

    let data = json!({"orderId": 1, "customer": {}, "items": [], "currency": "EUR"});
    let (output, diagnostics) =
        transform_with_diagnostics(data.as_object().unwrap(), &consumer, &producer);
    assert_eq!(Value::Object(output), json!({"total": null, "reference": 1}));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].key, "total");
}
