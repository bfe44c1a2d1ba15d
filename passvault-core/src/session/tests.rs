use super::*;
use crate::clock::ManualClock;
use crate::gateway::{Command, InMemoryGateway, ReadinessGate};
use crate::lockout::DEFAULT_MAX_ATTEMPTS;
use crate::ErrorKind;

const MASTER: &str = "longenough1";

fn machine(gateway: &Arc<InMemoryGateway>, clock: &ManualClock) -> AuthSessionMachine {
    AuthSessionMachine::new(gateway.clone(), Arc::new(clock.clone()))
}

async fn locked_session() -> (Arc<InMemoryGateway>, ManualClock, AuthSessionMachine) {
    let gateway = Arc::new(InMemoryGateway::new().with_master_password(MASTER));
    let clock = ManualClock::default();
    let session = machine(&gateway, &clock);
    assert_eq!(session.initialize().await.unwrap(), AuthPhase::Locked);
    (gateway, clock, session)
}

async fn fail_until_locked_out(session: &AuthSessionMachine) {
    for _ in 0..DEFAULT_MAX_ATTEMPTS {
        let err = session.verify("wrong").await.unwrap_err();
        assert!(matches!(err, PassVaultError::InvalidPassword { .. }));
    }
}

#[tokio::test]
async fn test_initialize_without_master_password() {
    let gateway = Arc::new(InMemoryGateway::new());
    let session = machine(&gateway, &ManualClock::default());
    assert_eq!(session.phase(), AuthPhase::Uninitialized);

    let phase = session.initialize().await.unwrap();

    assert_eq!(phase, AuthPhase::AwaitingSetup);
    assert!(session.snapshot().needs_setup());
    assert!(!session.snapshot().loading);
}

#[tokio::test]
async fn test_initialize_failure_leaves_phase_unresolved() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.set_reachable(false);
    let session = machine(&gateway, &ManualClock::default());

    let err = session.initialize().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Environment);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Uninitialized);
    assert!(snapshot.last_error.is_some());

    // Caller retries once the backend is back
    gateway.set_reachable(true);
    assert_eq!(session.initialize().await.unwrap(), AuthPhase::AwaitingSetup);
    assert!(session.snapshot().last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_initialize_waits_for_backend_readiness() {
    let gate = ReadinessGate::new();
    let gateway = Arc::new(InMemoryGateway::new().with_readiness(gate.clone()));
    let session = Arc::new(machine(&gateway, &ManualClock::default()));

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.initialize().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    assert_eq!(gateway.call_count(Command::HasMasterPassword), 0);
    assert!(session.snapshot().loading);

    gate.mark_ready();
    assert_eq!(pending.await.unwrap().unwrap(), AuthPhase::AwaitingSetup);
}

#[tokio::test]
async fn test_setup_short_password_never_reaches_backend() {
    let gateway = Arc::new(InMemoryGateway::new());
    let session = machine(&gateway, &ManualClock::default());
    session.initialize().await.unwrap();

    let err = session.setup("short").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(session.phase(), AuthPhase::AwaitingSetup);
    assert_eq!(gateway.call_count(Command::SetupMasterPassword), 0);
}

#[tokio::test]
async fn test_setup_rejected_when_already_initialized() {
    let (gateway, _clock, session) = locked_session().await;

    let err = session.setup("another-password").await.unwrap_err();

    assert_eq!(err, PassVaultError::Gateway(GatewayError::AlreadyInitialized));
    assert_eq!(session.phase(), AuthPhase::Locked);
    assert_eq!(gateway.call_count(Command::SetupMasterPassword), 1);
}

#[tokio::test]
async fn test_verify_wrong_then_right() {
    let (_gateway, _clock, session) = locked_session().await;

    let err = session.verify("wrong").await.unwrap_err();
    assert_eq!(err, PassVaultError::InvalidPassword { remaining_attempts: 4 });
    assert_eq!(session.snapshot().failed_attempts(), 1);
    assert_eq!(
        session.snapshot().last_error.as_deref(),
        Some("Invalid master password")
    );

    session.verify(MASTER).await.unwrap();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Unlocked);
    assert_eq!(snapshot.failed_attempts(), 0);
    assert!(snapshot.lockout_until().is_none());
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn test_verify_empty_password_is_local() {
    let (gateway, _clock, session) = locked_session().await;

    let err = session.verify("").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(session.snapshot().failed_attempts(), 0);
    assert_eq!(gateway.call_count(Command::VerifyMasterPassword), 0);
}

#[tokio::test]
async fn test_verify_backend_unreachable_does_not_count() {
    let (gateway, _clock, session) = locked_session().await;
    gateway.set_reachable(false);

    let err = session.verify(MASTER).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Environment);
    assert_eq!(session.snapshot().failed_attempts(), 0);
    assert_eq!(session.phase(), AuthPhase::Locked);
}

#[tokio::test]
async fn test_lockout_after_max_attempts_blocks_correct_password() {
    let (gateway, clock, session) = locked_session().await;

    fail_until_locked_out(&session).await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Locked);
    assert_eq!(snapshot.failed_attempts(), 5);
    assert_eq!(
        snapshot.lockout_until(),
        Some(clock.now() + Duration::minutes(5))
    );
    assert!(session.is_locked_out());

    let calls = gateway.call_count(Command::VerifyMasterPassword);
    let err = session.verify(MASTER).await.unwrap_err();
    assert_eq!(err, PassVaultError::LockedOut(300));
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_ne!(err.to_string(), "Invalid master password");
    // Lockout is checked before the backend and leaves the counter alone
    assert_eq!(gateway.call_count(Command::VerifyMasterPassword), calls);
    assert_eq!(session.snapshot().failed_attempts(), 5);
    assert_eq!(session.phase(), AuthPhase::Locked);
}

#[tokio::test]
async fn test_lockout_expiry_allows_verify() {
    let (_gateway, clock, session) = locked_session().await;
    fail_until_locked_out(&session).await;

    clock.advance(Duration::seconds(299));
    assert!(matches!(
        session.verify(MASTER).await,
        Err(PassVaultError::LockedOut(1))
    ));

    clock.advance(Duration::seconds(1));
    session.verify(MASTER).await.unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Unlocked);
    assert_eq!(snapshot.failed_attempts(), 0);
    assert!(snapshot.lockout_until().is_none());
}

#[tokio::test]
async fn test_proactive_expiry_without_new_attempt() {
    let (_gateway, clock, session) = locked_session().await;
    fail_until_locked_out(&session).await;

    assert!(!session.expire_lockout());
    assert_eq!(session.lockout_remaining(), Some(Duration::minutes(5)));

    clock.advance(Duration::minutes(5));
    assert!(session.expire_lockout());

    let snapshot = session.snapshot();
    assert_eq!(snapshot.failed_attempts(), 0);
    assert!(snapshot.lockout_until().is_none());
    assert!(snapshot.last_error.is_none());
    assert_eq!(session.attempts_remaining(), 5);
}

#[tokio::test]
async fn test_logout_locks_even_when_backend_fails() {
    let (gateway, _clock, session) = locked_session().await;
    session.verify(MASTER).await.unwrap();
    gateway.set_reachable(false);

    let err = session.logout().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Environment);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Locked);
    assert!(snapshot.last_error.is_some());
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn test_logout_clears_backend_session() {
    let (gateway, _clock, session) = locked_session().await;
    session.verify(MASTER).await.unwrap();
    assert!(gateway.is_authenticated());

    session.logout().await.unwrap();

    assert_eq!(session.phase(), AuthPhase::Locked);
    assert!(!gateway.is_authenticated());
}

#[tokio::test]
async fn test_force_lock_keeps_lockout_state() {
    let (_gateway, _clock, session) = locked_session().await;
    session.verify(MASTER).await.unwrap();

    assert!(session.force_lock().await);
    assert_eq!(session.phase(), AuthPhase::Locked);
    assert_eq!(session.snapshot().failed_attempts(), 0);

    // Failures after the forced lock count from zero
    session.verify("wrong").await.unwrap_err();
    session.verify("wrong").await.unwrap_err();
    let before = session.snapshot();
    assert_eq!(before.failed_attempts(), 2);

    // Already locked: nothing to do, counters untouched
    assert!(!session.force_lock().await);
    let after = session.snapshot();
    assert_eq!(after.failed_attempts(), before.failed_attempts());
    assert_eq!(after.lockout_until(), before.lockout_until());
}

#[tokio::test]
async fn test_verify_while_unlocked_is_noop() {
    let (gateway, _clock, session) = locked_session().await;
    session.verify(MASTER).await.unwrap();
    let calls = gateway.call_count(Command::VerifyMasterPassword);

    for _ in 0..DEFAULT_MAX_ATTEMPTS {
        session.verify("wrong").await.unwrap();
    }

    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Unlocked);
    assert_eq!(snapshot.failed_attempts(), 0);
    assert!(snapshot.lockout_until().is_none());
    assert!(snapshot.last_error.is_none());
    assert_eq!(gateway.call_count(Command::VerifyMasterPassword), calls);
}

#[tokio::test]
async fn test_subscribers_observe_transitions() {
    let (_gateway, _clock, session) = locked_session().await;
    let mut rx = session.subscribe();
    rx.borrow_and_update();

    session.verify(MASTER).await.unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().phase, AuthPhase::Unlocked);
}

#[tokio::test]
async fn test_restart_scenario() {
    let gateway = Arc::new(InMemoryGateway::new());
    let clock = ManualClock::default();

    let first = machine(&gateway, &clock);
    assert_eq!(first.phase(), AuthPhase::Uninitialized);
    first.setup(MASTER).await.unwrap();
    assert_eq!(first.phase(), AuthPhase::Unlocked);
    drop(first);

    // New process, same backend
    let restarted = machine(&gateway, &clock);
    assert_eq!(restarted.initialize().await.unwrap(), AuthPhase::Locked);

    fail_until_locked_out(&restarted).await;
    assert_eq!(restarted.phase(), AuthPhase::Locked);
    let until = restarted.snapshot().lockout_until().unwrap();
    assert_eq!(until - clock.now(), Duration::minutes(5));

    let err = restarted.verify(MASTER).await.unwrap_err();
    assert!(matches!(err, PassVaultError::LockedOut(_)));
    assert_eq!(restarted.phase(), AuthPhase::Locked);
}
