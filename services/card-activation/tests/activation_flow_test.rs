//! 激活流程集成测试（内存存储）

mod common;

use card_activation::domain::entities::{DeliveryStatus, OtpDestination};
use card_activation::error::ActivationError;
use cardgate_common::{CardToken, Clock, ProfileId};
use chrono::Duration;
use common::{DEFAULT_OTP, Harness, NotifierMode, PIN, email};

#[tokio::test]
async fn test_happy_path_activates_card() {
    let h = Harness::new();
    let card = h.card().await;
    assert_eq!(card.pin, PIN);

    let issued = h
        .service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap();
    assert_eq!(issued.delivery, DeliveryStatus::Sent);
    assert_eq!(issued.expires_at, h.clock.now() + Duration::minutes(5));
    assert_eq!(
        h.notifier.sent(),
        vec![("holder@example.com".to_string(), DEFAULT_OTP.to_string())]
    );

    let activated = h
        .service
        .verify_otp(&card.card_token, DEFAULT_OTP, Some(ProfileId::new("admin-1")))
        .await
        .unwrap();
    assert_eq!(activated.card_id, card.card_id);

    let status = h.service.card_status(&card.card_token).await.unwrap();
    assert!(status.is_active);
    assert_eq!(status.activated_at, Some(activated.activated_at));
}

#[tokio::test]
async fn test_generated_pin_is_returned_once_and_works() {
    let h = Harness::new();
    h.generator.push("987654");

    let card = h.service.create_card(None, None).await.unwrap();
    assert_eq!(card.pin, "987654");

    h.service
        .request_otp(&card.card_token, "987654", &email())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sms_destination() {
    let h = Harness::new();
    let card = h.card().await;
    let phone = OtpDestination::sms("+1 555-123-4567").unwrap();

    h.service
        .request_otp(&card.card_token, PIN, &phone)
        .await
        .unwrap();
    assert_eq!(h.notifier.sent()[0].0, "+1 555-123-4567");
}

#[tokio::test]
async fn test_unknown_card() {
    let h = Harness::new();
    let token = CardToken::new("no-such-card");

    let err = h.service.request_otp(&token, PIN, &email()).await.unwrap_err();
    assert!(matches!(err, ActivationError::CardNotFound));

    let err = h.service.verify_otp(&token, DEFAULT_OTP, None).await.unwrap_err();
    assert!(matches!(err, ActivationError::CardNotFound));

    let err = h.service.card_status(&token).await.unwrap_err();
    assert!(matches!(err, ActivationError::CardNotFound));
}

#[tokio::test]
async fn test_wrong_pin_issues_nothing() {
    let h = Harness::new();
    let card = h.card().await;

    let err = h
        .service
        .request_otp(&card.card_token, "0000", &email())
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::InvalidCredential));
    assert!(h.notifier.sent().is_empty());

    let err = h
        .service
        .verify_otp(&card.card_token, DEFAULT_OTP, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::NoOtpRequested));
}

#[tokio::test]
async fn test_five_wrong_pins_lock_out_for_fifteen_minutes() {
    let h = Harness::new();
    let card = h.card().await;

    for _ in 0..5 {
        let err = h
            .service
            .request_otp(&card.card_token, "0000", &email())
            .await
            .unwrap_err();
        assert!(matches!(err, ActivationError::InvalidCredential));
    }

    // 锁定期内正确 PIN 也被拒绝
    let err = h
        .service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap_err();
    match err {
        ActivationError::Throttled { retry_after_secs } => assert_eq!(retry_after_secs, 900),
        other => panic!("expected throttled, got {other:?}"),
    }

    h.clock.advance(Duration::minutes(15) - Duration::seconds(1));
    let err = h
        .service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::Throttled { retry_after_secs: 1 }));

    h.clock.advance(Duration::seconds(1));
    h.service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_correct_pin_resets_failure_count() {
    let h = Harness::new();
    let card = h.card().await;

    for _ in 0..4 {
        let _ = h.service.request_otp(&card.card_token, "0000", &email()).await;
    }
    h.service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap();

    for _ in 0..4 {
        let err = h
            .service
            .request_otp(&card.card_token, "0000", &email())
            .await
            .unwrap_err();
        assert!(matches!(err, ActivationError::InvalidCredential));
    }
}

#[tokio::test]
async fn test_lockout_is_per_card() {
    let h = Harness::new();
    let locked = h.card().await;
    let other = h.card().await;

    for _ in 0..5 {
        let _ = h.service.request_otp(&locked.card_token, "0000", &email()).await;
    }

    h.service
        .request_otp(&other.card_token, PIN, &email())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expired_otp_is_rejected() {
    let h = Harness::new();
    let token = h.card_with_otp().await;

    h.clock.advance(Duration::minutes(5));

    let err = h
        .service
        .verify_otp(&token, DEFAULT_OTP, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::OtpExpired));
    assert!(!h.service.card_status(&token).await.unwrap().is_active);
}

#[tokio::test]
async fn test_otp_valid_just_before_expiry() {
    let h = Harness::new();
    let token = h.card_with_otp().await;

    h.clock.advance(Duration::minutes(5) - Duration::seconds(1));

    h.service.verify_otp(&token, DEFAULT_OTP, None).await.unwrap();
}

#[tokio::test]
async fn test_wrong_otp_keeps_current_one_usable() {
    let h = Harness::new();
    let token = h.card_with_otp().await;

    let err = h.service.verify_otp(&token, "000000", None).await.unwrap_err();
    assert!(matches!(err, ActivationError::InvalidOtp));

    h.service.verify_otp(&token, DEFAULT_OTP, None).await.unwrap();
}

#[tokio::test]
async fn test_reissue_invalidates_previous_otp() {
    let h = Harness::new();
    h.generator.push("111111");
    h.generator.push("222222");
    let card = h.card().await;

    h.service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(30));
    h.service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap();

    let err = h
        .service
        .verify_otp(&card.card_token, "111111", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::InvalidOtp));

    h.service
        .verify_otp(&card.card_token, "222222", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_active_card_rejects_both_operations() {
    let h = Harness::new();
    let token = h.card_with_otp().await;
    h.service.verify_otp(&token, DEFAULT_OTP, None).await.unwrap();

    let err = h.service.request_otp(&token, PIN, &email()).await.unwrap_err();
    assert!(matches!(err, ActivationError::AlreadyActive));

    let err = h
        .service
        .verify_otp(&token, DEFAULT_OTP, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::AlreadyActive));
}

#[tokio::test]
async fn test_active_card_still_checks_pin_first() {
    let h = Harness::new();
    let token = h.card_with_otp().await;
    h.service.verify_otp(&token, DEFAULT_OTP, None).await.unwrap();

    let err = h
        .service
        .request_otp(&token, "0000", &email())
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::InvalidCredential));
}

#[tokio::test]
async fn test_concurrent_verification_activates_once() {
    let h = Harness::new();
    let token = h.card_with_otp().await;

    let (a, b) = tokio::join!(
        h.service.verify_otp(&token, DEFAULT_OTP, None),
        h.service.verify_otp(&token, DEFAULT_OTP, None),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                err,
                ActivationError::OtpAlreadyUsed | ActivationError::AlreadyActive
            ),
            "unexpected error: {err:?}"
        );
    }
}

#[tokio::test]
async fn test_failed_delivery_still_issues_otp() {
    let h = Harness::new();
    h.notifier.set_mode(NotifierMode::Fail);
    let card = h.card().await;

    let issued = h
        .service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap();
    assert_eq!(issued.delivery, DeliveryStatus::Unconfirmed);

    h.service
        .verify_otp(&card.card_token, DEFAULT_OTP, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_hanging_delivery_times_out() {
    let h = Harness::new();
    h.notifier.set_mode(NotifierMode::Hang);
    let card = h.card().await;

    let issued = h
        .service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap();
    assert_eq!(issued.delivery, DeliveryStatus::Unconfirmed);

    h.service
        .verify_otp(&card.card_token, DEFAULT_OTP, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_repeated_wrong_otp_locks_verification() {
    let h = Harness::new();
    let token = h.card_with_otp().await;

    for _ in 0..5 {
        let err = h.service.verify_otp(&token, "000000", None).await.unwrap_err();
        assert!(matches!(err, ActivationError::InvalidOtp));
    }

    let err = h
        .service
        .verify_otp(&token, DEFAULT_OTP, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::Throttled { .. }));
}

#[tokio::test]
async fn test_empty_otp_is_validation_error() {
    let h = Harness::new();
    let token = h.card_with_otp().await;

    let err = h.service.verify_otp(&token, "  ", None).await.unwrap_err();
    assert!(matches!(err, ActivationError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_wrong_pins_get_at_most_five_checks() {
    let h = Harness::new();
    let card = h.card().await;

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let service = h.service.clone();
            let token = card.card_token.clone();
            tokio::spawn(async move {
                let guess = format!("{:04}", 5000 + i);
                service.request_otp(&token, &guess, &email()).await
            })
        })
        .collect();

    let mut invalid = 0;
    let mut throttled = 0;
    for task in tasks {
        match task.await.unwrap() {
            Err(ActivationError::InvalidCredential) => invalid += 1,
            Err(ActivationError::Throttled { .. }) => throttled += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(invalid, 5);
    assert_eq!(throttled, 45);
    assert!(h.notifier.sent().is_empty());

    let err = h
        .service
        .request_otp(&card.card_token, PIN, &email())
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::Throttled { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_wrong_otps_get_at_most_five_checks() {
    let h = Harness::new();
    let token = h.card_with_otp().await;

    let tasks: Vec<_> = (0..30)
        .map(|i| {
            let service = h.service.clone();
            let token = token.clone();
            tokio::spawn(async move {
                let guess = format!("{:06}", 900_000 + i);
                service.verify_otp(&token, &guess, None).await
            })
        })
        .collect();

    let mut invalid = 0;
    let mut throttled = 0;
    for task in tasks {
        match task.await.unwrap() {
            Err(ActivationError::InvalidOtp) => invalid += 1,
            Err(ActivationError::Throttled { .. }) => throttled += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(invalid, 5);
    assert_eq!(throttled, 25);
    assert!(!h.service.card_status(&token).await.unwrap().is_active);
}

#[tokio::test]
async fn test_storage_failure_during_redemption_keeps_otp_usable() {
    let h = Harness::new();
    let token = h.card_with_otp().await;

    h.otps.fail_next_redeem();
    let err = h
        .service
        .verify_otp(&token, DEFAULT_OTP, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ActivationError::Storage(_)));
    assert!(!h.service.card_status(&token).await.unwrap().is_active);

    // 同一个验证码重试即可完成激活
    h.service.verify_otp(&token, DEFAULT_OTP, None).await.unwrap();
    assert!(h.service.card_status(&token).await.unwrap().is_active);
}
