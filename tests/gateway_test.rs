//! End-to-end gateway behavior against a live mock backend.

mod common;

use std::sync::atomic::Ordering;

use serde_json::json;

use procure_gateway::{
    GatewayConfig, GatewayError, OperationClass, OutboundRequest, SecureGateway, SessionMetadata,
};

#[tokio::test]
async fn hardened_headers_reach_the_wire() {
    let (addr, _) = common::start_echo_backend().await;
    let gw = SecureGateway::from_config(&GatewayConfig::default());

    let req = OutboundRequest::new(
        reqwest::Method::GET,
        format!("http://{addr}/tenders"),
        OperationClass::Api,
    )
    .with_bearer("user-token");

    let response = gw.send(req).await.unwrap();
    assert_eq!(response.status, 200);

    let wire = response.body.to_lowercase();
    assert!(wire.contains("cache-control: no-store"));
    assert!(wire.contains("x-content-type-options: nosniff"));
    assert!(wire.contains("x-frame-options: deny"));
    assert!(wire.contains("x-xss-protection:"));
    assert!(wire.contains("referrer-policy:"));
    assert!(wire.contains("permissions-policy:"));
    assert!(wire.contains("authorization: bearer user-token"));
    assert!(wire.contains("x-csrf-token:"));
}

#[tokio::test]
async fn exhausted_budget_denies_before_the_backend() {
    let (addr, hits) = common::start_echo_backend().await;

    let mut config = GatewayConfig::default();
    config.rate_limit.api.max_attempts = 2;
    let gw = SecureGateway::from_config(&config);

    let url = format!("http://{addr}/search");
    for _ in 0..2 {
        let req = OutboundRequest::new(reqwest::Method::GET, url.clone(), OperationClass::Api);
        gw.send(req).await.unwrap();
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let req = OutboundRequest::new(reqwest::Method::GET, url.clone(), OperationClass::Api);
    match gw.send(req).await {
        Err(GatewayError::RateLimited { retry_after, .. }) => assert!(retry_after.is_some()),
        other => panic!("expected RateLimited, got {other:?}"),
    }
    // the denied call never left the process
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn injection_payload_is_stopped_cold() {
    let (addr, hits) = common::start_echo_backend().await;
    let gw = SecureGateway::from_config(&GatewayConfig::default());

    let req = OutboundRequest::new(
        reqwest::Method::POST,
        format!("http://{addr}/bids"),
        OperationClass::Api,
    )
    .with_json(json!({
        "amount": 125000,
        "note": "<script>document.location='http://evil'</script>"
    }));

    match gw.send(req).await {
        Err(GatewayError::SecurityRejected { issues, .. }) => {
            assert!(issues.iter().any(|i| i.contains("$.note")));
        }
        other => panic!("expected SecurityRejected, got {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // the rejection is in the audit trail
    let audit = gw.audit();
    assert!(audit.recent().iter().any(|e| e.event == "payload_rejected"));
}

#[tokio::test]
async fn session_bound_calls_require_a_live_session() {
    let (addr, _) = common::start_echo_backend().await;
    let gw = SecureGateway::from_config(&GatewayConfig::default());

    let sessions = gw.sessions();
    let sid = sessions.create_session("buyer-7", vec!["buyer".to_string()], SessionMetadata::default());

    let url = format!("http://{addr}/requisitions");
    let req = OutboundRequest::new(reqwest::Method::GET, url.clone(), OperationClass::Api)
        .with_session(sid.clone());
    assert!(gw.send(req).await.is_ok());

    sessions.destroy_session(&sid);
    let req = OutboundRequest::new(reqwest::Method::GET, url.clone(), OperationClass::Api)
        .with_session(sid);
    match gw.send(req).await {
        Err(GatewayError::SessionInvalid { reason }) => assert!(reason.contains("not found")),
        other => panic!("expected SessionInvalid, got {other:?}"),
    }
}

#[tokio::test]
async fn raw_bodies_are_scanned_whole() {
    let (addr, hits) = common::start_echo_backend().await;
    let gw = SecureGateway::from_config(&GatewayConfig::default());

    let req = OutboundRequest::new(
        reqwest::Method::POST,
        format!("http://{addr}/import"),
        OperationClass::Api,
    )
    .with_raw_body("name,qty\r\n=cmd|javascript:alert(1),2");

    assert!(matches!(
        gw.send(req).await,
        Err(GatewayError::SecurityRejected { .. })
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
