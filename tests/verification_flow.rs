//! Verification engine against fake trust/status services over HTTP.
//!
//! Run with: cargo test --test verification_flow

mod fixtures;
mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use courier_verify::models::job::{Job, JobStatus};
use courier_verify::models::verification::{Proof, VerificationKind};
use courier_verify::services::context::VerificationContext;
use courier_verify::services::job_store::JobStore;
use courier_verify::services::trust_client::DeliveryServiceClient;
use courier_verify::services::verification::{VerificationEngine, VerificationError};

use fixtures::*;
use helpers::*;

/// Store with JOB-001 claimed and started, and a pending verification whose
/// completion records the leg in the store.
fn started_job(kind: VerificationKind) -> (Arc<JobStore>, VerificationContext) {
    started_job_with_id("JOB-001", kind)
}

fn started_job_with_id(id: &str, kind: VerificationKind) -> (Arc<JobStore>, VerificationContext) {
    let store = Arc::new(JobStore::with_orders(seed_orders()));
    store.add_order(order(id));
    store.claim(id).unwrap();
    let job = store.start(id).unwrap();
    assert_eq!(job.status, JobStatus::InProgress);

    let ctx = VerificationContext::new();
    let completion_store = Arc::clone(&store);
    ctx.set_pending(
        job,
        kind,
        Box::new(move |job: &Job, kind: VerificationKind| {
            completion_store.complete(&job.id, kind).unwrap();
        }),
    );
    (store, ctx)
}

#[tokio::test]
async fn test_pickup_proof_verified_end_to_end() {
    let services = spawn_fake_services("true").await;
    let engine = VerificationEngine::new(services.client(), services.client());
    let (store, ctx) = started_job(VerificationKind::Pickup);

    let verified = engine
        .verify(&ctx, "JOB-001", VerificationKind::Pickup, &Proof::Entered("482913".into()))
        .await
        .expect("verification should succeed");

    assert!(verified.status_updated);
    assert_eq!(
        services.trust_calls(),
        vec![TrustCall {
            job_id: "JOB-001".to_string(),
            role: "donor".to_string(),
            code: "482913".to_string(),
        }]
    );
    assert_eq!(
        services.status_calls(),
        vec![StatusCall {
            job_id: "JOB-001".to_string(),
            status: "pickup".to_string(),
        }]
    );
    assert!(!ctx.is_pending());

    let job = store.get_job("JOB-001").unwrap();
    assert!(job.pickup_verified);
    assert_eq!(job.status, JobStatus::InProgress);
}

#[tokio::test]
async fn test_short_code_rejected_before_any_call() {
    let services = spawn_fake_services("true").await;
    let engine = VerificationEngine::new(services.client(), services.client());
    let (store, ctx) = started_job(VerificationKind::Pickup);

    let err = engine
        .verify(&ctx, "JOB-001", VerificationKind::Pickup, &Proof::Entered("12".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, VerificationError::InvalidProof(_)));
    assert!(services.trust_calls().is_empty());
    assert!(services.status_calls().is_empty());
    assert!(!store.get_job("JOB-001").unwrap().pickup_verified);
}

#[tokio::test]
async fn test_rejected_proof_leaves_job_and_context() {
    let services = spawn_fake_services("false").await;
    let engine = VerificationEngine::new(services.client(), services.client());
    let (store, ctx) = started_job(VerificationKind::Pickup);
    let before = store.get_job("JOB-001").unwrap();

    let err = engine
        .verify(&ctx, "JOB-001", VerificationKind::Pickup, &Proof::Entered("482913".into()))
        .await
        .unwrap_err();

    assert_eq!(err, VerificationError::Rejected);
    assert_eq!(services.trust_calls().len(), 1);
    assert!(services.status_calls().is_empty());
    assert_eq!(store.get_job("JOB-001").unwrap(), before);
    assert_eq!(ctx.pending().unwrap().job.id, "JOB-001");

    // Courier retries with the right code.
    services.set_verdict(r#"{"success": true}"#);
    engine
        .verify(&ctx, "JOB-001", VerificationKind::Pickup, &Proof::Entered("482914".into()))
        .await
        .unwrap();
    assert!(store.get_job("JOB-001").unwrap().pickup_verified);
}

#[tokio::test]
async fn test_status_failure_does_not_undo_proof() {
    let services = spawn_fake_services(r#"{"data": true}"#).await;
    services.set_status_code(StatusCode::INTERNAL_SERVER_ERROR);
    let engine = VerificationEngine::new(services.client(), services.client());
    let (store, ctx) = started_job(VerificationKind::Delivery);

    let verified = engine
        .verify(&ctx, "JOB-001", VerificationKind::Delivery, &Proof::Entered("730114".into()))
        .await
        .unwrap();

    assert!(!verified.status_updated);
    assert_eq!(services.status_calls().len(), 1);
    assert_eq!(services.status_calls()[0].status, "delivered");
    assert_eq!(services.trust_calls()[0].role, "receiver");
    assert!(store.get_job("JOB-001").unwrap().delivery_verified);
}

#[tokio::test]
async fn test_malformed_trust_response_is_protocol_error() {
    let services = spawn_fake_services("<html>upstream timeout</html>").await;
    let engine = VerificationEngine::new(services.client(), services.client());
    let (_, ctx) = started_job(VerificationKind::Pickup);

    let err = engine
        .verify(&ctx, "JOB-001", VerificationKind::Pickup, &Proof::Entered("482913".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, VerificationError::Protocol(_)));
    assert!(services.status_calls().is_empty());
    assert!(ctx.is_pending());
}

#[tokio::test]
async fn test_unreachable_trust_service_is_transport_error() {
    // Grab a free port, then close it so connections are refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = DeliveryServiceClient::new(&url, &url, None);
    let engine = VerificationEngine::new(client.clone(), client);
    let (_, ctx) = started_job(VerificationKind::Pickup);

    let err = engine
        .verify(&ctx, "JOB-001", VerificationKind::Pickup, &Proof::Entered("482913".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, VerificationError::Transport(_)));
    assert!(err.is_recoverable());
    assert!(ctx.is_pending());
}

#[tokio::test]
async fn test_both_legs_complete_job() {
    let services = spawn_fake_services("\"true\"").await;
    let engine = VerificationEngine::new(services.client(), services.client());
    let (store, ctx) = started_job(VerificationKind::Pickup);

    engine
        .verify(&ctx, "JOB-001", VerificationKind::Pickup, &Proof::Entered("111111".into()))
        .await
        .unwrap();

    let job = store.get_job("JOB-001").unwrap();
    let completion_store = Arc::clone(&store);
    ctx.set_pending(
        job,
        VerificationKind::Delivery,
        Box::new(move |job: &Job, kind: VerificationKind| {
            completion_store.complete(&job.id, kind).unwrap();
        }),
    );
    engine
        .verify(&ctx, "JOB-001", VerificationKind::Delivery, &Proof::Entered("222222".into()))
        .await
        .unwrap();

    assert_eq!(store.get_job("JOB-001").unwrap().status, JobStatus::Completed);
    let statuses: Vec<_> = services.status_calls().into_iter().map(|c| c.status).collect();
    assert_eq!(statuses, vec!["pickup", "delivered"]);
}

#[tokio::test]
async fn test_status_update_for_job_id_with_reserved_characters() {
    let services = spawn_fake_services("true").await;
    let engine = VerificationEngine::new(services.client(), services.client());

    for id in ["A/B", "JOB-002/status#x", "JOB?9"] {
        let (store, ctx) = started_job_with_id(id, VerificationKind::Pickup);
        let verified = engine
            .verify(&ctx, id, VerificationKind::Pickup, &Proof::Entered("482913".into()))
            .await
            .unwrap();

        assert!(verified.status_updated, "status write failed for {id}");
        assert_eq!(
            services.status_calls().last(),
            Some(&StatusCall {
                job_id: id.to_string(),
                status: "pickup".to_string(),
            })
        );
        assert!(store.get_job(id).unwrap().pickup_verified);
    }
    assert_eq!(services.status_calls().len(), 3);
    assert!(services.status_calls().iter().all(|c| c.job_id != "JOB-002"));
}
