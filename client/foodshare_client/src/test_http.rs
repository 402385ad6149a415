use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Duration, Utc};
use foodshare_lifecycle::envelope::EnvelopeError;
use foodshare_lifecycle::{
    ClaimId, ClaimStatus, DonationId, DonationStatus, NewDonation, PickupCode, Role,
};
use tokio_util::sync::CancellationToken;

use crate::actions::{ClaimActions, OutcomeKind};
use crate::api::{Credentials, DonationApi, HttpApi, IdempotencyKey};
use crate::db::{self, test_support::temp_pool, AUTH_TOKEN_KEY};
use crate::errors::ApiError;
use crate::mock_backend::{spawn_backend, Backend, RecordingEffects, EXPIRED_TOKEN, GOOD_CODE};
use crate::session::{Persistence, Session};

async fn client_with_token(token: &str) -> (Arc<Backend>, HttpApi) {
    let backend = Arc::new(Backend::default());
    let base = spawn_backend(backend.clone()).await;
    let api = HttpApi::with_client(
        reqwest::Client::new(),
        &base,
        Session::with_token(token).into_handle(),
    );
    (backend, api)
}

#[tokio::test]
async fn test_my_donations_unwraps_paginated_envelope() {
    let (backend, api) = client_with_token("tok-123").await;

    let mine = api.my_donations().await.unwrap();

    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id, DonationId(7));
    assert_eq!(mine[0].claim.as_ref().map(|c| c.status.clone()), Some(ClaimStatus::Active));
    assert_eq!(
        backend.authorizations.lock().unwrap()[0].as_deref(),
        Some("Bearer tok-123")
    );
}

#[tokio::test]
async fn test_single_donation_and_not_found() {
    let (_backend, api) = client_with_token("tok-123").await;
    let donation = api.donation(DonationId(7)).await.unwrap();
    assert_eq!(donation.title, "Bread rolls");

    let missing = api.donation(DonationId(99)).await.unwrap_err();
    assert!(matches!(missing, ApiError::NotFound { .. }));
}

#[tokio::test]
async fn test_browse_reports_more_pages() {
    let (_backend, api) = client_with_token("tok-123").await;

    let page = api.browse_donations(1).await.unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].status, DonationStatus::Pending);
    assert!(page.has_more());
}

#[tokio::test]
async fn test_create_donation_sends_validated_form() {
    let (backend, api) = client_with_token("tok-123").await;
    let form = NewDonation {
        title: "Vegetable soup".to_string(),
        description: "Ten litres, chilled".to_string(),
        food_type: "prepared".to_string(),
        quantity: "10 L".to_string(),
        expiry_time: Utc::now() + Duration::hours(6),
        pickup_address: "3 Market Sq".to_string(),
        latitude: None,
        longitude: None,
    };
    assert!(form.validate(Utc::now()).is_ok());
    let key = IdempotencyKey::new();

    let created = api.create_donation(&form, key).await.unwrap();

    assert_eq!(created.id, DonationId(11));
    assert_eq!(created.title, "Vegetable soup");
    assert_eq!(*backend.idempotency_keys.lock().unwrap(), vec![key.to_string()]);
}

#[tokio::test]
async fn test_logout_clears_session_even_when_server_fails() {
    let (_backend, api) = client_with_token("tok-123").await;

    api.logout().await;

    assert!(!api.session().read().await.is_authenticated());
}

#[tokio::test]
async fn test_single_level_list_is_a_decode_error() {
    let (backend, api) = client_with_token("tok-123").await;
    backend.flat_list.store(true, Ordering::SeqCst);

    let err = api.my_donations().await.unwrap_err();

    match err {
        ApiError::Decode { endpoint, source } => {
            assert_eq!(endpoint, "GET /donations/mine");
            assert!(matches!(source, EnvelopeError::Shape(_)));
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_writes_carry_the_callers_idempotency_key() {
    let (backend, api) = client_with_token("tok-123").await;
    let key = IdempotencyKey::new();

    let receipt = api.claim_donation(DonationId(7), key).await.unwrap();

    assert_eq!(receipt.pickup_code.as_str(), GOOD_CODE);
    assert!(!receipt.synthesized);
    assert_eq!(*backend.idempotency_keys.lock().unwrap(), vec![key.to_string()]);
}

#[tokio::test]
async fn test_missing_pickup_code_is_synthesized() {
    let (backend, api) = client_with_token("tok-123").await;
    backend.omit_pickup_code.store(true, Ordering::SeqCst);

    let receipt = api.claim_donation(DonationId(7), IdempotencyKey::new()).await.unwrap();

    assert!(receipt.synthesized);
    assert_eq!(receipt.pickup_code.as_str(), "000007");
    assert_eq!(receipt.claim.map(|c| c.id), Some(ClaimId(30)));
}

#[tokio::test]
async fn test_second_claim_is_a_conflict() {
    let (_backend, api) = client_with_token("tok-123").await;

    api.claim_donation(DonationId(7), IdempotencyKey::new()).await.unwrap();
    let err = api
        .claim_donation(DonationId(7), IdempotencyKey::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Conflict { .. }));
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn test_cancel_claim_decodes_the_updated_claim() {
    let (backend, api) = client_with_token("tok-123").await;
    api.claim_donation(DonationId(7), IdempotencyKey::new()).await.unwrap();
    let key = IdempotencyKey::new();

    let cancelled = api.cancel_claim(ClaimId(30), key).await.unwrap();

    assert_eq!(cancelled.id, ClaimId(30));
    assert_eq!(cancelled.donation_id, DonationId(7));
    assert_eq!(cancelled.status, ClaimStatus::Cancelled);
    assert_eq!(
        backend.idempotency_keys.lock().unwrap().last(),
        Some(&key.to_string())
    );

    let err = api.cancel_claim(ClaimId(31), IdempotencyKey::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden { .. }));
}

#[tokio::test]
async fn test_claim_retry_after_lost_response_is_not_a_conflict() {
    let backend = Arc::new(Backend::default());
    backend.drop_claim_response.store(true, Ordering::SeqCst);
    let base = spawn_backend(backend.clone()).await;
    let api = Arc::new(HttpApi::with_client(
        reqwest::Client::new(),
        &base,
        Session::with_token("tok-123").into_handle(),
    ));
    let effects = Arc::new(RecordingEffects::default());
    let actions = ClaimActions::new(api, effects.clone());
    let cancel = CancellationToken::new();

    // The backend accepted the claim but the 504 hid it from us.
    let first = actions.claim(DonationId(7), &cancel).await;
    assert_eq!(first.kind(), OutcomeKind::Failure);

    let retry = actions.claim(DonationId(7), &cancel).await;
    assert_eq!(retry.kind(), OutcomeKind::Success);
    assert_eq!(retry.value().map(|r| r.pickup_code.as_str()), Some(GOOD_CODE));

    let keys = backend.idempotency_keys.lock().unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0], keys[1]);
    assert_eq!(effects.refresh_count(), 0);
}

#[tokio::test]
async fn test_wrong_pickup_code_is_validation() {
    let (_backend, api) = client_with_token("tok-123").await;

    let err = api
        .verify_pickup(ClaimId(30), &PickupCode::parse("999999").unwrap(), IdempotencyKey::new())
        .await
        .unwrap_err();
    match err {
        ApiError::Validation { message, errors } => {
            assert_eq!(message, "Invalid pickup code.");
            assert_eq!(errors["code"], vec!["Invalid pickup code.".to_string()]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let claim = api
        .verify_pickup(ClaimId(30), &PickupCode::parse(GOOD_CODE).unwrap(), IdempotencyKey::new())
        .await
        .unwrap();
    assert_eq!(claim.status, ClaimStatus::PickedUp);
    assert!(claim.picked_up_at.is_some());
}

#[tokio::test]
async fn test_delivery_receipt_carries_impact_score() {
    let (_backend, api) = client_with_token("tok-123").await;

    let receipt = api
        .confirm_delivery(ClaimId(30), Some("At the front desk"), IdempotencyKey::new())
        .await
        .unwrap();

    assert_eq!(receipt.impact_score, Some(42));
    assert_eq!(receipt.claim.status, ClaimStatus::Delivered);
}

#[tokio::test]
async fn test_401_clears_the_session() {
    let (_dir, pool) = temp_pool().await;
    db::set_state(&pool, AUTH_TOKEN_KEY, EXPIRED_TOKEN).await.unwrap();
    let session = Session::restore(pool.clone()).await.unwrap().into_handle();

    let backend = Arc::new(Backend::default());
    let base = spawn_backend(backend).await;
    let api = HttpApi::with_client(reqwest::Client::new(), &base, session.clone());

    let err = api.me().await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthenticated));
    assert!(!session.read().await.is_authenticated());
    assert_eq!(db::get_state(&pool, AUTH_TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_login_remembers_token_and_profile() {
    let (_dir, pool) = temp_pool().await;
    let session = Session::restore(pool.clone()).await.unwrap().into_handle();
    let backend = Arc::new(Backend::default());
    let base = spawn_backend(backend.clone()).await;
    let api = HttpApi::with_client(reqwest::Client::new(), &base, session.clone());

    let user = api
        .login(
            &Credentials {
                email: "sam@example.org".to_string(),
                password: "secret".to_string(),
            },
            Persistence::Remembered,
        )
        .await
        .unwrap();

    assert_eq!(user.role, Role::Volunteer);
    assert_eq!(session.read().await.token(), Some("tok-123"));
    assert_eq!(
        db::get_state(&pool, AUTH_TOKEN_KEY).await.unwrap().as_deref(),
        Some("tok-123")
    );

    let profile = api.me().await.unwrap();
    assert_eq!(profile.impact_score, Some(12));
    assert_eq!(
        backend.authorizations.lock().unwrap().last().cloned().flatten().as_deref(),
        Some("Bearer tok-123")
    );
}

#[tokio::test]
async fn test_race_over_http_one_claim_wins() {
    let backend = Arc::new(Backend::default());
    let base = spawn_backend(backend.clone()).await;

    let volunteer = |token: &str| {
        let api = Arc::new(HttpApi::with_client(
            reqwest::Client::new(),
            &base,
            Session::with_token(token).into_handle(),
        ));
        let effects = Arc::new(RecordingEffects::default());
        (ClaimActions::new(api, effects.clone()), effects)
    };
    let (alice, alice_fx) = volunteer("tok-alice");
    let (bob, bob_fx) = volunteer("tok-bob");
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        alice.claim(DonationId(7), &cancel),
        bob.claim(DonationId(7), &cancel)
    );

    let mut kinds = [a.kind(), b.kind()];
    kinds.sort_by_key(|k| *k != OutcomeKind::Success);
    assert_eq!(kinds, [OutcomeKind::Success, OutcomeKind::Conflict]);

    let loser = if a.kind() == OutcomeKind::Conflict { &a } else { &b };
    assert_eq!(loser.toast().unwrap().title, "Already Claimed");

    let reveals = alice_fx.revealed.lock().unwrap().len() + bob_fx.revealed.lock().unwrap().len();
    let refreshes = alice_fx.refresh_count() + bob_fx.refresh_count();
    assert_eq!(reveals, 1);
    assert_eq!(refreshes, 1);
    assert_eq!(backend.idempotency_keys.lock().unwrap().len(), 2);
}
