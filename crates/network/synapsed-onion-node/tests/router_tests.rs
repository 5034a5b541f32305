use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use synapsed_onion::*;
use synapsed_onion_node::{registry_router, relay_router, user_router};
use tower::ServiceExt;

async fn call(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

fn relay(dispatcher: RecordingDispatcher) -> Arc<RelayForwarder> {
    let config = OnionConfig::default();
    Arc::new(RelayForwarder::new(
        0,
        RelayKeyPair::generate(),
        LayerCodec::new(&config.codec).unwrap(),
        config.address_space().unwrap(),
        Arc::new(dispatcher),
    ))
}

fn user(directory: InMemoryDirectory, dispatcher: RecordingDispatcher) -> Arc<UserNode> {
    let config = OnionConfig::default();
    Arc::new(UserNode::new(
        0,
        CircuitBuilder::new(
            LayerCodec::new(&config.codec).unwrap(),
            config.address_space().unwrap(),
        ),
        Arc::new(directory),
        Arc::new(dispatcher),
    ))
}

#[tokio::test]
async fn test_status_endpoints() {
    let routers = [
        relay_router(relay(RecordingDispatcher::new())),
        user_router(user(InMemoryDirectory::new(), RecordingDispatcher::new())),
        registry_router(InMemoryDirectory::new()),
    ];
    for router in routers {
        let (status, body) = call(router, get("/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"live");
    }
}

#[tokio::test]
async fn test_relay_forwards_and_reports_diagnostics() {
    let recorder = RecordingDispatcher::new();
    let relay = relay(recorder.clone());
    let codec = LayerCodec::new(&CodecConfig::default()).unwrap();
    let layer = codec
        .wrap_layer(Address(3001), b"hello", &relay.keys().public_key())
        .unwrap();

    let router = relay_router(relay.clone());
    let (status, _) = call(
        router.clone(),
        post_json("/message", json!({ "message": layer.as_str() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recorder.last(), Some((Address(3001), "hello".to_string())));

    let (_, body) = call(router.clone(), get("/getLastReceivedDecryptedMessage")).await;
    assert_eq!(json_body(&body), json!({ "result": "hello" }));

    let (_, body) = call(router.clone(), get("/getLastMessageDestination")).await;
    assert_eq!(json_body(&body), json!({ "result": 3001 }));

    let (_, body) = call(router.clone(), get("/getLastForwardedNode")).await;
    assert_eq!(json_body(&body), json!({ "result": 3001 }));

    let (_, body) = call(router.clone(), get("/getLastReceivedEncryptedMessage")).await;
    assert_eq!(json_body(&body), json!({ "result": layer.as_str() }));

    let (_, body) = call(router, get("/getPrivateKey")).await;
    let exported = json_body(&body)["result"].as_str().unwrap().to_string();
    let restored = RelayKeyPair::from_private_base64(&exported).unwrap();
    assert_eq!(restored.public_key(), relay.keys().public_key());
}

#[tokio::test]
async fn test_relay_diagnostics_start_empty() {
    let router = relay_router(relay(RecordingDispatcher::new()));
    let (status, body) = call(router, get("/getLastForwardedMessage")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({ "result": null }));
}

#[tokio::test]
async fn test_relay_rejects_malformed_layer() {
    let recorder = RecordingDispatcher::new();
    let router = relay_router(relay(recorder.clone()));

    let (status, body) = call(router, post_json("/message", json!({ "message": "not an onion" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("Malformed layer"));
    assert!(recorder.take().is_empty());
}

#[tokio::test]
async fn test_relay_layer_for_other_key_is_server_error() {
    let router = relay_router(relay(RecordingDispatcher::new()));
    let codec = LayerCodec::new(&CodecConfig::default()).unwrap();
    let layer = codec
        .wrap_layer(Address(3001), b"hello", &RelayKeyPair::generate().public_key())
        .unwrap();

    let (status, _) = call(router, post_json("/message", json!({ "message": layer.as_str() }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_relay_unreachable_next_hop_is_server_error() {
    let config = OnionConfig::default();
    let relay = Arc::new(RelayForwarder::new(
        0,
        RelayKeyPair::generate(),
        LayerCodec::new(&config.codec).unwrap(),
        config.address_space().unwrap(),
        Arc::new(MemoryNetwork::new()),
    ));
    let layer = LayerCodec::new(&config.codec)
        .unwrap()
        .wrap_layer(Address(4001), b"inner", &relay.keys().public_key())
        .unwrap();

    let router = relay_router(relay.clone());
    let (status, body) = call(router, post_json("/message", json!({ "message": layer.as_str() }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("Dispatch to 0000004001 failed"));
    assert_eq!(relay.diagnostics().last_state(), Some(RelayState::Failed));
}

#[tokio::test]
async fn test_registry_register_and_list() {
    let directory = InMemoryDirectory::new();
    let router = registry_router(directory.clone());
    let first = RelayKeyPair::generate().public_key();
    let second = RelayKeyPair::generate().public_key();

    for key in [&first, &second] {
        let (status, _) = call(
            router.clone(),
            post_json("/registerNode", json!({ "nodeId": 4, "pubKey": key.to_base64() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = call(router, get("/getNodeRegistry")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({ "nodes": [{ "nodeId": 4, "pubKey": second.to_base64() }] })
    );
    assert_eq!(directory.len(), 1);
}

#[tokio::test]
async fn test_registry_rejects_bad_key() {
    let directory = InMemoryDirectory::new();
    let router = registry_router(directory.clone());

    let (status, _) = call(
        router,
        post_json("/registerNode", json!({ "nodeId": 1, "pubKey": "c2hvcnQ=" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(directory.is_empty());
}

#[tokio::test]
async fn test_user_receive_and_read_back() {
    let user = user(InMemoryDirectory::new(), RecordingDispatcher::new());
    let router = user_router(user);

    let (status, _) = call(router.clone(), post_json("/message", json!({ "message": "hi" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(router, get("/getLastReceivedMessage")).await;
    assert_eq!(json_body(&body), json!({ "result": "hi" }));
}

#[tokio::test]
async fn test_user_send_with_too_few_relays() {
    let directory = InMemoryDirectory::new();
    for id in 0..2 {
        directory.insert(Node::new(id, RelayKeyPair::generate().public_key()));
    }
    let recorder = RecordingDispatcher::new();
    let router = user_router(user(directory, recorder.clone()));

    let (status, body) = call(
        router.clone(),
        post_json("/sendMessage", json!({ "message": "hello", "destinationUserId": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("Not enough nodes"));
    assert!(recorder.take().is_empty());

    let (_, body) = call(router, get("/getLastSentMessage")).await;
    assert_eq!(json_body(&body), json!({ "result": "hello" }));
}

#[tokio::test]
async fn test_user_send_to_unknown_destination() {
    let directory = InMemoryDirectory::new();
    for id in 0..3 {
        directory.insert(Node::new(id, RelayKeyPair::generate().public_key()));
    }
    let recorder = RecordingDispatcher::new();
    let router = user_router(user(directory, recorder.clone()));

    let (status, body) = call(
        router,
        post_json("/sendMessage", json!({ "message": "hi", "destinationUserId": 5000 })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(&body)["error"]
        .as_str()
        .unwrap()
        .contains("0000008000 is outside the recipient and relay ranges"));
    assert!(recorder.take().is_empty());
}

#[tokio::test]
async fn test_user_send_posts_to_entry_relay() {
    let directory = InMemoryDirectory::new();
    for id in 0..4 {
        directory.insert(Node::new(id, RelayKeyPair::generate().public_key()));
    }
    let recorder = RecordingDispatcher::new();
    let router = user_router(user(directory, recorder.clone()));

    let (status, body) = call(
        router.clone(),
        post_json("/sendMessage", json!({ "message": "hello", "destinationUserId": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let response = json_body(&body);
    let circuit: Vec<u32> = serde_json::from_value(response["circuit"].clone()).unwrap();
    assert_eq!(circuit.len(), 3);

    let (target, envelope) = recorder.last().unwrap();
    assert_eq!(target, Address(4000 + circuit[0]));
    assert_eq!(response["envelopeLength"], json!(envelope.len()));

    let (_, body) = call(router, get("/getLastCircuit")).await;
    assert_eq!(json_body(&body), json!({ "result": circuit }));
}
