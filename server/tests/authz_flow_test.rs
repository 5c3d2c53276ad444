//! Service-level Authorization Flow Tests
//!
//! Exercises the services directly: fail-closed membership resolution with
//! injected queries, serialization of concurrent mutations, retry exhaustion,
//! and the remote membership client against a live server.
//!
//! Run with: `cargo test --test authz_flow_test -- --nocapture`

mod helpers;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use helpers::{spawn_test_server, TestApp};
use uuid::Uuid;
use vc_authz::api::AppState;
use vc_authz::channels::{Channel, ChannelType, MemberRole};
use vc_authz::config::Config;
use vc_authz::files::{AccessLevel, File};
use vc_authz::membership::{HttpMembershipQuery, MembershipQuery, MembershipQueryError};
use vc_authz::services::{ChannelService, FileService};
use vc_authz::store::{AggregateStore, ChannelStore, FileStore, MemoryStore, StoreError, Versioned};
use vc_authz::{AuthzError, ServiceError};

// ============================================================================
// Fakes
// ============================================================================

/// Never answers.
struct HangingQuery;

impl MembershipQuery for HangingQuery {
    fn is_active_member(
        &self,
        _channel_id: Uuid,
        _user_id: Uuid,
    ) -> BoxFuture<'_, Result<bool, MembershipQueryError>> {
        future::pending().boxed()
    }
}

/// Always fails.
struct BrokenQuery;

impl MembershipQuery for BrokenQuery {
    fn is_active_member(
        &self,
        _channel_id: Uuid,
        _user_id: Uuid,
    ) -> BoxFuture<'_, Result<bool, MembershipQueryError>> {
        future::ready(Err(MembershipQueryError::Status(503))).boxed()
    }
}

/// Answers yes and counts calls.
#[derive(Default)]
struct CountingQuery {
    calls: AtomicU32,
}

impl MembershipQuery for CountingQuery {
    fn is_active_member(
        &self,
        _channel_id: Uuid,
        _user_id: Uuid,
    ) -> BoxFuture<'_, Result<bool, MembershipQueryError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        future::ready(Ok(true)).boxed()
    }
}

/// Loads normally but loses every compare-and-swap after the first insert.
struct AlwaysStaleStore {
    inner: MemoryStore<Channel>,
    saves: AtomicU32,
}

impl AggregateStore<Channel> for AlwaysStaleStore {
    fn load(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Versioned<Channel>>, StoreError>> {
        self.inner.load(id)
    }

    fn save<'a>(
        &'a self,
        aggregate: &'a Channel,
        expected_version: i64,
    ) -> BoxFuture<'a, Result<i64, StoreError>> {
        if expected_version == 0 {
            return self.inner.save(aggregate, expected_version);
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        future::ready(Err(StoreError::VersionConflict {
            id: aggregate.id,
            expected: expected_version,
        }))
        .boxed()
    }
}

fn file_service(membership: Arc<dyn MembershipQuery>, timeout: Duration) -> FileService {
    let store: Arc<FileStore> = Arc::new(MemoryStore::<File>::new());
    FileService::new(store, membership, timeout, 3)
}

// ============================================================================
// Fail-closed membership
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_membership_timeout_denies_access() {
    let files = file_service(Arc::new(HangingQuery), Duration::from_millis(500));
    let uploader = Uuid::new_v4();
    let requester = Uuid::new_v4();
    let file = files
        .create_file(uploader, AccessLevel::ChannelMembers, Some(Uuid::new_v4()))
        .await
        .unwrap();

    let allowed = files.check_access(file.id, requester, false).await.unwrap();
    assert!(!allowed, "A hanging membership query must fail closed");

    // The uploader never depends on membership.
    assert!(files.check_access(file.id, uploader, false).await.unwrap());
}

#[tokio::test]
async fn test_membership_failure_denies_access() {
    let files = file_service(Arc::new(BrokenQuery), Duration::from_secs(1));
    let file = files
        .create_file(
            Uuid::new_v4(),
            AccessLevel::ChannelMembers,
            Some(Uuid::new_v4()),
        )
        .await
        .unwrap();

    assert!(!files
        .check_access(file.id, Uuid::new_v4(), false)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_membership_consulted_only_when_needed() {
    let query = Arc::new(CountingQuery::default());
    let files = file_service(query.clone(), Duration::from_secs(1));
    let uploader = Uuid::new_v4();

    let public = files
        .create_file(uploader, AccessLevel::Public, None)
        .await
        .unwrap();
    let scoped = files
        .create_file(uploader, AccessLevel::ChannelMembers, Some(Uuid::new_v4()))
        .await
        .unwrap();

    assert!(files.check_access(public.id, Uuid::new_v4(), false).await.unwrap());
    assert!(files.check_access(scoped.id, uploader, false).await.unwrap());
    assert!(files.check_access(scoped.id, Uuid::new_v4(), true).await.unwrap());
    assert_eq!(query.calls.load(Ordering::SeqCst), 0);

    assert!(files.check_access(scoped.id, Uuid::new_v4(), false).await.unwrap());
    assert_eq!(query.calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_owner_removals_keep_an_owner() {
    let app = TestApp::new();
    let channels = app.state.channels.clone();

    for _ in 0..25 {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let channel = channels
            .create_channel("race".into(), None, ChannelType::Private, alice)
            .await
            .unwrap();
        channels
            .add_member(channel.id, bob, alice, MemberRole::Owner)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            tokio::spawn({
                let channels = channels.clone();
                async move { channels.remove_member(channel.id, bob, alice).await }
            }),
            tokio::spawn({
                let channels = channels.clone();
                async move { channels.remove_member(channel.id, alice, bob).await }
            }),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "Exactly one removal may win: {outcomes:?}");
        for outcome in &outcomes {
            if let Err(e) = outcome {
                assert!(!e.is_infrastructure(), "Unexpected failure: {e}");
            }
        }

        let stored = channels.get_channel(channel.id).await.unwrap();
        assert_eq!(stored.active_owner_count(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_grants_leave_one_active_row() {
    let files = file_service(Arc::new(BrokenQuery), Duration::from_secs(1));
    let uploader = Uuid::new_v4();
    let reader = Uuid::new_v4();
    let file = files
        .create_file(uploader, AccessLevel::Restricted, None)
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let files = files.clone();
            tokio::spawn(async move { files.grant_access(file.id, reader, uploader, false).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(grant) => ids.push(grant.id),
            Err(ServiceError::Contention(_)) => {}
            Err(e) => panic!("Unexpected failure: {e}"),
        }
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "All successful grants return the same row");

    let stored = files.get_file_for_manager(file.id, uploader, false).await.unwrap();
    assert_eq!(stored.active_grants().count(), 1);
}

#[tokio::test]
async fn test_retries_exhausted_is_contention() {
    let store = Arc::new(AlwaysStaleStore {
        inner: MemoryStore::new(),
        saves: AtomicU32::new(0),
    });
    let channels = ChannelService::new(store.clone() as Arc<ChannelStore>, 3);
    let owner = Uuid::new_v4();
    let channel = channels
        .create_channel("busy".into(), None, ChannelType::Public, owner)
        .await
        .unwrap();

    let result = channels
        .add_member(channel.id, Uuid::new_v4(), owner, MemberRole::Member)
        .await;
    assert!(matches!(result, Err(ServiceError::Contention(id)) if id == channel.id));
    assert_eq!(store.saves.load(Ordering::SeqCst), 4, "One attempt plus three retries");
}

#[tokio::test]
async fn test_rejections_are_not_retried() {
    let store = Arc::new(AlwaysStaleStore {
        inner: MemoryStore::new(),
        saves: AtomicU32::new(0),
    });
    let channels = ChannelService::new(store.clone() as Arc<ChannelStore>, 3);
    let owner = Uuid::new_v4();
    let channel = channels
        .create_channel("quiet".into(), None, ChannelType::Public, owner)
        .await
        .unwrap();

    let result = channels.leave_channel(channel.id, owner).await;
    assert!(matches!(
        result,
        Err(ServiceError::Authz(AuthzError::Conflict(_)))
    ));
    assert_eq!(store.saves.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Remote membership
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_membership_against_live_service() {
    let authority = TestApp::new();
    let server = spawn_test_server(authority.router.clone()).await;

    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let channel = authority
        .state
        .channels
        .create_channel("remote".into(), None, ChannelType::Private, owner)
        .await
        .unwrap();
    authority
        .state
        .channels
        .add_member(channel.id, member, owner, MemberRole::Member)
        .await
        .unwrap();

    let config = Config::default_for_test();
    let query = HttpMembershipQuery::new(server.url.clone(), Duration::from_secs(2))
        .unwrap()
        .with_service_token(config.internal_service_token.clone());
    let channel_store: Arc<ChannelStore> = Arc::new(MemoryStore::<Channel>::new());
    let file_store: Arc<FileStore> = Arc::new(MemoryStore::<File>::new());
    let consumer = AppState::new(config, channel_store, file_store, Arc::new(query));

    let file = consumer
        .files
        .create_file(owner, AccessLevel::ChannelMembers, Some(channel.id))
        .await
        .unwrap();

    assert!(consumer.files.check_access(file.id, member, false).await.unwrap());
    assert!(!consumer
        .files
        .check_access(file.id, Uuid::new_v4(), false)
        .await
        .unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_membership_without_token_denies() {
    let authority = TestApp::new();
    let server = spawn_test_server(authority.router.clone()).await;

    let owner = Uuid::new_v4();
    let channel = authority
        .state
        .channels
        .create_channel("remote".into(), None, ChannelType::Private, owner)
        .await
        .unwrap();

    let query = HttpMembershipQuery::new(server.url.clone(), Duration::from_secs(2))
        .unwrap()
        .with_service_token(Some("not-the-token".into()));
    assert!(matches!(
        query.is_active_member(channel.id, owner).await,
        Err(MembershipQueryError::Status(401))
    ));

    let files = file_service(Arc::new(query), Duration::from_secs(2));
    let file = files
        .create_file(Uuid::new_v4(), AccessLevel::ChannelMembers, Some(channel.id))
        .await
        .unwrap();
    assert!(
        !files.check_access(file.id, owner, false).await.unwrap(),
        "A rejected membership lookup must fail closed"
    );
}
