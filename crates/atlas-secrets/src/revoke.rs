//! Revocation and rollback of remote principals.
//!
//! One routine serves explicit revocation, compensation after a failed
//! issuance and the crash-recovery sweep over stale WAL records. A resource
//! that is already gone counts as removed, so every path is idempotent.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::atlas::{ApiKey, AtlasError};
use crate::core::{BackendError, Result};
use crate::secret::ProvisioningRecord;
use crate::traits::{AtlasApi, WriteAheadLog};

/// Remove the principal described by `record`
pub async fn rollback(client: &dyn AtlasApi, record: &ProvisioningRecord) -> Result<()> {
    let principal = record.principal();
    let outcome = match record {
        ProvisioningRecord::DatabaseUser {
            username,
            project_id,
        } => delete_database_user(client, project_id, username).await,
        ProvisioningRecord::OrgApiKey {
            description,
            organization_id,
            key_id,
        }
        | ProvisioningRecord::ProjectAssignedApiKey {
            description,
            organization_id,
            key_id,
            ..
        } => delete_org_key(client, organization_id, description, key_id.as_deref()).await,
        ProvisioningRecord::ProjectApiKey {
            description,
            project_id,
            key_id,
        } => unassign_project_key(client, project_id, description, key_id.as_deref()).await,
    };

    match outcome {
        Ok(()) => {
            info!(principal, credential_type = %record.kind(), "Principal rolled back");
            Ok(())
        }
        Err(source) => {
            warn!(principal, credential_type = %record.kind(), error = %source, "Rollback failed");
            Err(BackendError::Rollback {
                principal: principal.to_string(),
                source,
            })
        }
    }
}

async fn delete_database_user(
    client: &dyn AtlasApi,
    project_id: &str,
    username: &str,
) -> std::result::Result<(), AtlasError> {
    match client.get_database_user(project_id, username).await {
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            debug!(principal = username, "Database user already gone");
            return Ok(());
        }
        Err(e) => return Err(e),
    }
    ignore_not_found(client.delete_database_user(project_id, username).await)
}

async fn delete_org_key(
    client: &dyn AtlasApi,
    org_id: &str,
    description: &str,
    key_id: Option<&str>,
) -> std::result::Result<(), AtlasError> {
    let key_id = match key_id {
        Some(id) => id.to_string(),
        None => match find_by_description(client.list_api_keys(org_id).await, description)? {
            Some(id) => id,
            None => {
                debug!(principal = description, "No API key with this description; nothing to delete");
                return Ok(());
            }
        },
    };

    match client.get_api_key(org_id, &key_id).await {
        Ok(_) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e),
    }
    ignore_not_found(client.delete_api_key(org_id, &key_id).await)
}

async fn unassign_project_key(
    client: &dyn AtlasApi,
    project_id: &str,
    description: &str,
    key_id: Option<&str>,
) -> std::result::Result<(), AtlasError> {
    let key_id = match key_id {
        Some(id) => id.to_string(),
        None => {
            let keys = client.list_project_api_keys(project_id).await;
            match find_by_description(keys, description)? {
                Some(id) => id,
                None => {
                    debug!(principal = description, "No project API key with this description");
                    return Ok(());
                }
            }
        }
    };
    ignore_not_found(client.unassign_project_api_key(project_id, &key_id).await)
}

fn find_by_description(
    keys: std::result::Result<Vec<ApiKey>, AtlasError>,
    description: &str,
) -> std::result::Result<Option<String>, AtlasError> {
    match keys {
        Ok(keys) => Ok(keys.into_iter().find(|k| k.desc == description).map(|k| k.id)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn ignore_not_found(
    result: std::result::Result<(), AtlasError>,
) -> std::result::Result<(), AtlasError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Outcome of one pass over the WAL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records looked at
    pub examined: usize,
    /// Records left alone because they are younger than the minimum age
    pub skipped_recent: usize,
    /// Records whose principal was removed and whose entry was deleted
    pub rolled_back: usize,
    /// Records kept for the next pass
    pub failed: usize,
}

/// Roll back every WAL record older than `min_age`.
///
/// Successful records are deleted from the WAL; failed ones stay for the
/// next pass. Storage failures while listing or loading abort the pass.
pub async fn sweep(
    client: &dyn AtlasApi,
    wal: &dyn WriteAheadLog,
    min_age: Duration,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let min_age = chrono::Duration::from_std(min_age).unwrap_or(chrono::Duration::MAX);
    let mut report = SweepReport::default();

    for id in wal.list_wal().await? {
        let Some(entry) = wal.get_wal(&id).await? else {
            continue;
        };
        report.examined += 1;

        if now.signed_duration_since(entry.created_at) < min_age {
            report.skipped_recent += 1;
            continue;
        }

        let record: ProvisioningRecord = match serde_json::from_value(entry.data) {
            Ok(record) => record,
            Err(e) => {
                error!(wal_id = %id, kind = %entry.kind, error = %e, "Undecodable WAL record kept");
                report.failed += 1;
                continue;
            }
        };

        if rollback(client, &record).await.is_err() {
            report.failed += 1;
            continue;
        }

        match wal.delete_wal(&id).await {
            Ok(()) => report.rolled_back += 1,
            Err(e) => {
                warn!(wal_id = %id, error = %e, "Rolled back but WAL record could not be deleted");
                report.failed += 1;
            }
        }
    }

    info!(
        examined = report.examined,
        skipped_recent = report.skipped_recent,
        rolled_back = report.rolled_back,
        failed = report.failed,
        "WAL sweep finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{ApiKeyRole, DatabaseUser};
    use crate::traits::MockAtlasApi;
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn user() -> DatabaseUser {
        DatabaseUser {
            username: "vault-u-1-abc".into(),
            password: None,
            project_id: "p1".into(),
            database_name: "admin".into(),
            roles: Vec::new(),
        }
    }

    fn key(id: &str, desc: &str) -> ApiKey {
        ApiKey {
            id: id.into(),
            desc: desc.into(),
            public_key: "pub".into(),
            private_key: None,
            roles: vec![ApiKeyRole {
                role_name: "ORG_MEMBER".into(),
                org_id: Some("org1".into()),
                project_id: None,
            }],
        }
    }

    fn db_record() -> ProvisioningRecord {
        ProvisioningRecord::DatabaseUser {
            username: "vault-u-1-abc".into(),
            project_id: "p1".into(),
        }
    }

    #[tokio::test]
    async fn test_database_user_get_then_delete() {
        let mut mock = MockAtlasApi::new();
        let mut seq = Sequence::new();
        mock.expect_get_database_user()
            .with(eq("p1"), eq("vault-u-1-abc"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(user()));
        mock.expect_delete_database_user()
            .with(eq("p1"), eq("vault-u-1-abc"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        rollback(&mock, &db_record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_database_user_already_gone() {
        let mut mock = MockAtlasApi::new();
        mock.expect_get_database_user()
            .returning(|_, _| Err(AtlasError::not_found("user")));
        mock.expect_delete_database_user().never();

        rollback(&mock, &db_record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_not_found_on_delete_is_success() {
        let mut mock = MockAtlasApi::new();
        mock.expect_get_database_user().returning(|_, _| Ok(user()));
        mock.expect_delete_database_user()
            .returning(|_, _| Err(AtlasError::api(404, "USER_NOT_FOUND")));

        rollback(&mock, &db_record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_failure_is_rollback_error() {
        let mut mock = MockAtlasApi::new();
        mock.expect_get_database_user().returning(|_, _| Ok(user()));
        mock.expect_delete_database_user()
            .returning(|_, _| Err(AtlasError::api(500, "boom")));

        let err = rollback(&mock, &db_record()).await.unwrap_err();
        assert!(matches!(err, BackendError::Rollback { ref principal, .. } if principal == "vault-u-1-abc"));
    }

    #[tokio::test]
    async fn test_org_key_found_by_description() {
        let mut mock = MockAtlasApi::new();
        let mut seq = Sequence::new();
        mock.expect_list_api_keys()
            .with(eq("org1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![key("k0", "other"), key("k1", "vault-r-1-abc")]));
        mock.expect_get_api_key()
            .with(eq("org1"), eq("k1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(key("k1", "vault-r-1-abc")));
        mock.expect_delete_api_key()
            .with(eq("org1"), eq("k1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let record = ProvisioningRecord::OrgApiKey {
            description: "vault-r-1-abc".into(),
            organization_id: "org1".into(),
            key_id: None,
        };
        rollback(&mock, &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_org_key_never_created() {
        let mut mock = MockAtlasApi::new();
        mock.expect_list_api_keys().returning(|_| Ok(vec![key("k0", "other")]));
        mock.expect_get_api_key().never();
        mock.expect_delete_api_key().never();

        let record = ProvisioningRecord::ProjectAssignedApiKey {
            description: "vault-r-1-abc".into(),
            organization_id: "org1".into(),
            project_id: "p1".into(),
            key_id: None,
        };
        rollback(&mock, &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_project_key_is_unassigned_not_deleted() {
        let mut mock = MockAtlasApi::new();
        mock.expect_unassign_project_api_key()
            .with(eq("p1"), eq("k9"))
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_delete_api_key().never();

        let record = ProvisioningRecord::ProjectApiKey {
            description: "vault-r-1-abc".into(),
            project_id: "p1".into(),
            key_id: Some("k9".into()),
        };
        rollback(&mock, &record).await.unwrap();
    }
}
