//! Integration tests for revocation, rollback and the stale-record sweep

mod common;

use std::time::Duration;

use atlas_secrets::atlas::{ApiKeyInput, DatabaseUser};
use atlas_secrets::prelude::*;
use chrono::Utc;
use common::{Harness, assigned_key_role, database_user_role, org_key_role, project_key_role};

#[tokio::test]
async fn test_revoke_org_key_then_rollback_again_succeeds() {
    // GIVEN: An issued org key
    let h = Harness::new().await;
    h.backend.write_role("keys", org_key_role()).await.unwrap();
    let secret = h.backend.issue("keys", "ci").await.unwrap();
    assert_eq!(h.atlas.key_count(), 1);

    // WHEN: It is revoked
    h.backend.revoke(&secret).await.unwrap();

    // THEN: The key is gone, and rolling back the same data again still succeeds
    assert_eq!(h.atlas.key_count(), 0);
    h.backend.rollback(&secret.internal.record).await.unwrap();
    h.backend.revoke(&secret).await.unwrap();
}

#[tokio::test]
async fn test_revoke_database_user_deleted_out_of_band() {
    let h = Harness::new().await;
    h.backend.write_role("dba", database_user_role()).await.unwrap();
    let secret = h.backend.issue("dba", "alice").await.unwrap();

    // someone removed the user directly in Atlas
    h.atlas
        .delete_database_user("proj1", secret.principal())
        .await
        .unwrap();

    h.backend.revoke(&secret).await.unwrap();
    assert_eq!(h.atlas.user_count(), 0);
}

#[tokio::test]
async fn test_revoke_project_key_unassigns() {
    let h = Harness::new().await;
    h.backend.write_role("pk", project_key_role()).await.unwrap();
    let secret = h.backend.issue("pk", "ci").await.unwrap();
    let key_id = secret.internal.record.key_id().unwrap().to_string();
    assert!(h.atlas.is_assigned("proj1", &key_id));

    h.backend.revoke(&secret).await.unwrap();

    assert!(!h.atlas.is_assigned("proj1", &key_id));
    h.backend.revoke(&secret).await.unwrap();
}

#[tokio::test]
async fn test_revoke_assigned_key_deletes_org_key() {
    let h = Harness::new().await;
    h.backend.write_role("assigned", assigned_key_role()).await.unwrap();
    let secret = h.backend.issue("assigned", "ci").await.unwrap();

    h.backend.revoke(&secret).await.unwrap();

    assert_eq!(h.atlas.key_count(), 0);
}

#[tokio::test]
async fn test_revoke_remote_failure_is_rollback_error() {
    let h = Harness::new().await;
    h.backend.write_role("dba", database_user_role()).await.unwrap();
    let secret = h.backend.issue("dba", "alice").await.unwrap();
    h.atlas.fail_next_delete();

    let err = h.backend.revoke(&secret).await.unwrap_err();

    assert!(matches!(err, BackendError::Rollback { .. }));
    assert_eq!(h.atlas.user_count(), 1);

    // retry succeeds
    h.backend.revoke(&secret).await.unwrap();
    assert_eq!(h.atlas.user_count(), 0);
}

#[tokio::test]
async fn test_sweep_skips_recent_and_rolls_back_stale_records() {
    // GIVEN: A database user that exists remotely with a leftover WAL record,
    // as if the process died right after the create call
    let h = Harness::new().await;
    let user = DatabaseUser {
        username: "vault-crashed-1-abcdefgh".into(),
        password: None,
        project_id: "proj1".into(),
        database_name: "admin".into(),
        roles: vec![DatabaseRole::new("admin", "read")],
    };
    h.atlas.create_database_user("proj1", &user).await.unwrap();

    let record = ProvisioningRecord::DatabaseUser {
        username: user.username.clone(),
        project_id: "proj1".into(),
    };
    h.wal
        .put_wal("database_user", serde_json::to_value(&record).unwrap())
        .await
        .unwrap();

    // WHEN: The sweep runs before the minimum age
    let now = Utc::now();
    let report = h.backend.rollback_stale(now).await.unwrap();

    // THEN: The record is left alone
    assert_eq!(report.examined, 1);
    assert_eq!(report.skipped_recent, 1);
    assert!(h.atlas.has_user("proj1", &user.username));

    // WHEN: The sweep runs after the minimum age
    let later = now + chrono::Duration::minutes(6);
    let report = h.backend.rollback_stale(later).await.unwrap();

    // THEN: The user and the record are both gone
    assert_eq!(report.rolled_back, 1);
    assert!(!h.atlas.has_user("proj1", &user.username));
    assert!(h.wal_keys().is_empty());
}

#[tokio::test]
async fn test_sweep_finds_api_key_by_description() {
    // GIVEN: A key created remotely whose id never made it into the record
    let h = Harness::new().await;
    let input = ApiKeyInput {
        desc: "vault-crashed-1-abcdefgh".into(),
        roles: vec!["ORG_MEMBER".into()],
    };
    h.atlas.create_api_key("org1", &input).await.unwrap();

    let record = ProvisioningRecord::OrgApiKey {
        description: input.desc.clone(),
        organization_id: "org1".into(),
        key_id: None,
    };
    h.wal
        .put_wal("org_api_key", serde_json::to_value(&record).unwrap())
        .await
        .unwrap();

    // AND: A record for a key that was never created
    let never_created = ProvisioningRecord::OrgApiKey {
        description: "vault-never-1-abcdefgh".into(),
        organization_id: "org1".into(),
        key_id: None,
    };
    h.wal
        .put_wal("org_api_key", serde_json::to_value(&never_created).unwrap())
        .await
        .unwrap();

    // WHEN: The sweep runs
    let report = h
        .backend
        .rollback_stale(Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();

    // THEN: Both records are resolved
    assert_eq!(report.rolled_back, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(h.atlas.key_count(), 0);
    assert!(h.wal_keys().is_empty());
}

#[tokio::test]
async fn test_sweep_keeps_failed_records_for_next_pass() {
    let h = Harness::new().await;
    h.backend.write_role("assigned", assigned_key_role()).await.unwrap();
    h.atlas.fail_next_assign();
    h.atlas.fail_next_delete();
    assert!(h.backend.issue("assigned", "ci").await.is_err());
    assert_eq!(h.wal_keys().len(), 1);

    let later = Utc::now() + chrono::Duration::hours(1);
    h.atlas.fail_next_delete();
    let report = h.backend.rollback_stale(later).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(h.wal_keys().len(), 1);

    let report = h.backend.rollback_stale(later).await.unwrap();
    assert_eq!(report.rolled_back, 1);
    assert_eq!(h.atlas.key_count(), 0);
    assert!(h.wal_keys().is_empty());
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let h = Harness::new().await;
    let record = ProvisioningRecord::DatabaseUser {
        username: "vault-gone-1-abcdefgh".into(),
        project_id: "proj1".into(),
    };
    h.wal
        .put_wal("database_user", serde_json::to_value(&record).unwrap())
        .await
        .unwrap();

    let later = Utc::now() + chrono::Duration::hours(1);
    let (a, b) = tokio::join!(h.backend.rollback_stale(later), h.backend.rollback_stale(later));

    let total = a.unwrap().rolled_back + b.unwrap().rolled_back;
    assert!(total >= 1);
    assert!(h.wal_keys().is_empty());
}

#[tokio::test]
async fn test_rollback_wal_entry_from_host_scanner() {
    let h = Harness::new().await;
    h.backend.write_role("dba", database_user_role()).await.unwrap();
    let secret = h.backend.issue("dba", "alice").await.unwrap();

    let id = h
        .wal
        .put_wal(
            "database_user",
            serde_json::to_value(&secret.internal.record).unwrap(),
        )
        .await
        .unwrap();
    let entry = h.wal.get_wal(&id).await.unwrap().unwrap();

    h.backend.rollback_wal_entry(&entry).await.unwrap();
    assert_eq!(h.atlas.user_count(), 0);
}

#[tokio::test]
async fn test_sweep_respects_configured_min_age() {
    let h = Harness::with_config(BackendConfig {
        wal_rollback_min_age: Duration::from_secs(3600),
        ..Default::default()
    })
    .await;
    let record = ProvisioningRecord::DatabaseUser {
        username: "u".into(),
        project_id: "p".into(),
    };
    h.wal
        .put_wal("database_user", serde_json::to_value(&record).unwrap())
        .await
        .unwrap();

    let report = h
        .backend
        .rollback_stale(Utc::now() + chrono::Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!(report.skipped_recent, 1);
    assert_eq!(h.wal_keys().len(), 1);
}
