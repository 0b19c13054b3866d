//! Registry behaviour through the public API

use modelmux_tools::{register_builtins, Capability, Error, ToolRegistry};
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn unknown_tool_lists_registered_names() {
    let registry = ToolRegistry::new();
    register_builtins(&registry);

    let err = assert_err!(registry.invoke("translate", json!({})).await);
    match err {
        Error::NotFound { name, available } => {
            assert_eq!(name, "translate");
            assert_eq!(available, vec!["summarize".to_string()]);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn summarize_through_registry() {
    let registry = ToolRegistry::new();
    register_builtins(&registry);

    let result = assert_ok!(
        registry
            .invoke("summarize", json!({"text": "One. Two. Three.", "max_sentences": 1}))
            .await
    );
    assert_eq!(result.output["summary"], "One.");
}

#[tokio::test]
async fn concurrent_invocations_share_registry() {
    let registry = Arc::new(ToolRegistry::new());
    register_builtins(&registry);

    let mut handles = Vec::new();
    for i in 0..16 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .invoke("summarize", json!({"text": format!("Sentence {i}. More.")}))
                .await
        }));
    }
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }
    assert_eq!(registry.list_by_capability(Capability::Text).len(), 1);
}
