//! Issuance engine.
//!
//! Every issuance writes a [`ProvisioningRecord`] to the WAL before the first
//! remote call and removes it only once the outcome is known. A failure after
//! the record is written triggers a compensating rollback of whatever may
//! exist remotely; the record is kept whenever that rollback fails, so the
//! sweep can retry it.

mod names;
mod password;

pub use names::PrincipalNamer;
pub use password::generate_password;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::atlas::{AccessListEntry, ApiKey, ApiKeyInput, AssignApiKey, AtlasError, DatabaseUser};
use crate::core::{BackendError, CleanupError, Result, StorageError};
use crate::lease::Lease;
use crate::revoke::rollback;
use crate::role::{CredentialSpec, RoleDefinition};
use crate::secret::{InternalData, IssuedSecret, ProvisioningRecord, PublicData};
use crate::storage::WAL_PREFIX;
use crate::traits::{AtlasApi, WriteAheadLog};

/// One issuance's collaborators
pub struct IssuanceEngine<'a> {
    client: &'a dyn AtlasApi,
    wal: &'a dyn WriteAheadLog,
    namer: &'a PrincipalNamer,
    password_length: usize,
}

/// Remote failure plus everything known about what may have been created
struct Failed {
    record: ProvisioningRecord,
    source: AtlasError,
}

impl Failed {
    fn new(record: &ProvisioningRecord, source: AtlasError) -> Self {
        Self {
            record: record.clone(),
            source,
        }
    }
}

type Provisioned = std::result::Result<(PublicData, ProvisioningRecord), Failed>;

impl<'a> IssuanceEngine<'a> {
    /// Bind the engine to a client and WAL
    pub fn new(
        client: &'a dyn AtlasApi,
        wal: &'a dyn WriteAheadLog,
        namer: &'a PrincipalNamer,
        password_length: usize,
    ) -> Self {
        Self {
            client,
            wal,
            namer,
            password_length,
        }
    }

    /// Provision a principal for `role` and return it with `lease` attached
    pub async fn issue(
        &self,
        role_name: &str,
        role: &RoleDefinition,
        display_name: &str,
        lease: Lease,
        now: DateTime<Utc>,
    ) -> Result<IssuedSecret> {
        let spec = role.spec()?;
        let principal = self.namer.generate(display_name, now);
        let record = initial_record(&spec, &principal);

        let data = serde_json::to_value(&record).map_err(|source| StorageError::Serialization {
            key: WAL_PREFIX.to_string(),
            source,
        })?;
        let wal_id = self.wal.put_wal(record.kind().as_str(), data).await?;
        debug!(role = role_name, principal = %principal, wal_id = %wal_id, "WAL record written");

        let (public, record) = match self.provision(&spec, role, record).await {
            Ok(done) => done,
            Err(failed) => return Err(self.abort(&wal_id, failed).await),
        };

        if let Err(e) = self.wal.delete_wal(&wal_id).await {
            // the sweep will remove the principal once the record ages out
            warn!(principal = %principal, wal_id = %wal_id, error = %e, "WAL delete failed after successful issuance");
            return Err(e.into());
        }

        info!(
            role = role_name,
            principal = %principal,
            credential_type = %record.kind(),
            ttl = ?lease.ttl,
            "Credential issued"
        );
        Ok(IssuedSecret {
            public,
            internal: InternalData {
                role_name: role_name.to_string(),
                record,
            },
            lease,
            issued_at: now,
        })
    }

    async fn provision(
        &self,
        spec: &CredentialSpec<'_>,
        role: &RoleDefinition,
        record: ProvisioningRecord,
    ) -> Provisioned {
        let principal = record.principal().to_string();
        let access_list = role.access_list();

        match spec {
            CredentialSpec::DatabaseUser {
                project_id,
                database_name,
                roles,
            } => {
                let password = generate_password(self.password_length);
                let user = DatabaseUser {
                    username: principal.clone(),
                    password: Some(password.clone()),
                    project_id: (*project_id).to_string(),
                    database_name: (*database_name).to_string(),
                    roles: roles.to_vec(),
                };
                self.client
                    .create_database_user(project_id, &user)
                    .await
                    .map_err(|e| Failed::new(&record, e))?;

                Ok((
                    PublicData::DatabaseUser {
                        username: principal,
                        password,
                    },
                    record,
                ))
            }
            CredentialSpec::OrgApiKey {
                organization_id,
                roles,
            } => {
                let input = api_key_input(&principal, roles);
                let key = self
                    .client
                    .create_api_key(organization_id, &input)
                    .await
                    .map_err(|e| Failed::new(&record, e))?;
                let record = record.with_key_id(&key.id);

                self.attach_access_list(organization_id, &key.id, &access_list)
                    .await
                    .map_err(|e| Failed::new(&record, e))?;
                key_secret(key, principal, record)
            }
            CredentialSpec::ProjectApiKey { project_id, roles } => {
                let input = api_key_input(&principal, roles);
                let key = self
                    .client
                    .create_project_api_key(project_id, &input)
                    .await
                    .map_err(|e| Failed::new(&record, e))?;
                let record = record.with_key_id(&key.id);

                if !access_list.is_empty() {
                    let org_id = key.owning_org_id().map(str::to_string).ok_or_else(|| {
                        Failed::new(
                            &record,
                            AtlasError::UnexpectedResponse(
                                "project API key carries no owning organization".into(),
                            ),
                        )
                    })?;
                    self.attach_access_list(&org_id, &key.id, &access_list)
                        .await
                        .map_err(|e| Failed::new(&record, e))?;
                }
                key_secret(key, principal, record)
            }
            CredentialSpec::ProjectAssignedApiKey {
                organization_id,
                project_id,
                roles,
                project_roles,
            } => {
                let input = api_key_input(&principal, roles);
                let key = self
                    .client
                    .create_api_key(organization_id, &input)
                    .await
                    .map_err(|e| Failed::new(&record, e))?;
                let record = record.with_key_id(&key.id);

                let assignment = AssignApiKey {
                    roles: project_roles.clone(),
                };
                self.client
                    .assign_project_api_key(project_id, &key.id, &assignment)
                    .await
                    .map_err(|e| Failed::new(&record, e))?;

                self.attach_access_list(organization_id, &key.id, &access_list)
                    .await
                    .map_err(|e| Failed::new(&record, e))?;
                key_secret(key, principal, record)
            }
        }
    }

    async fn attach_access_list(
        &self,
        org_id: &str,
        key_id: &str,
        entries: &[AccessListEntry],
    ) -> std::result::Result<(), AtlasError> {
        for entry in entries {
            self.client.add_access_list_entry(org_id, key_id, entry).await?;
            debug!(key_id, entry = entry.value(), "Access-list entry added");
        }
        Ok(())
    }

    /// Compensate, then drop the WAL record only if compensation succeeded
    async fn abort(&self, wal_id: &str, failed: Failed) -> BackendError {
        let Failed { record, source } = failed;
        let principal = record.principal().to_string();
        warn!(principal = %principal, wal_id, error = %source, "Provisioning failed, rolling back");

        if let Err(cleanup) = rollback(self.client, &record).await {
            error!(
                principal = %principal,
                wal_id,
                error = %cleanup,
                "Compensating delete failed; WAL record kept for the sweep"
            );
            return BackendError::ProvisioningCleanup {
                principal,
                provisioning: source,
                cleanup: CleanupError::Remote(Box::new(cleanup)),
            };
        }

        match self.wal.delete_wal(wal_id).await {
            Ok(()) => BackendError::Provisioning { principal, source },
            Err(e) => {
                error!(principal = %principal, wal_id, error = %e, "WAL delete failed after rollback");
                BackendError::ProvisioningCleanup {
                    principal,
                    provisioning: source,
                    cleanup: CleanupError::Wal(e),
                }
            }
        }
    }
}

fn initial_record(spec: &CredentialSpec<'_>, principal: &str) -> ProvisioningRecord {
    let principal = principal.to_string();
    match spec {
        CredentialSpec::DatabaseUser { project_id, .. } => ProvisioningRecord::DatabaseUser {
            username: principal,
            project_id: (*project_id).to_string(),
        },
        CredentialSpec::OrgApiKey {
            organization_id, ..
        } => ProvisioningRecord::OrgApiKey {
            description: principal,
            organization_id: (*organization_id).to_string(),
            key_id: None,
        },
        CredentialSpec::ProjectApiKey { project_id, .. } => ProvisioningRecord::ProjectApiKey {
            description: principal,
            project_id: (*project_id).to_string(),
            key_id: None,
        },
        CredentialSpec::ProjectAssignedApiKey {
            organization_id,
            project_id,
            ..
        } => ProvisioningRecord::ProjectAssignedApiKey {
            description: principal,
            organization_id: (*organization_id).to_string(),
            project_id: (*project_id).to_string(),
            key_id: None,
        },
    }
}

fn api_key_input(principal: &str, roles: &[String]) -> ApiKeyInput {
    ApiKeyInput {
        desc: principal.to_string(),
        roles: roles.to_vec(),
    }
}

fn key_secret(key: ApiKey, description: String, record: ProvisioningRecord) -> Provisioned {
    let Some(private_key) = key.private_key else {
        return Err(Failed::new(
            &record,
            AtlasError::UnexpectedResponse("create response carried no private key".into()),
        ));
    };
    Ok((
        PublicData::ApiKey {
            public_key: key.public_key,
            private_key,
            description,
        },
        record,
    ))
}
