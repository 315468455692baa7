//! Integration tests for role CRUD through the backend

mod common;

use std::time::Duration;

use atlas_secrets::prelude::*;
use common::{Harness, database_user_role, org_key_role};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[tokio::test]
async fn test_role_crud() {
    let h = Harness::new().await;

    let written = h.backend.write_role("dba", database_user_role()).await.unwrap();
    assert_eq!(written.credential_type, CredentialKind::DatabaseUser);
    assert_eq!(written.db_roles, vec![DatabaseRole::new("admin", "atlasAdmin")]);

    assert_eq!(h.backend.read_role("dba").await.unwrap(), Some(written));
    assert_eq!(h.backend.list_roles().await.unwrap(), vec!["dba"]);

    h.backend.delete_role("dba").await.unwrap();
    assert_eq!(h.backend.read_role("dba").await.unwrap(), None);
    assert!(h.backend.list_roles().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ttl_above_max_ttl_is_rejected_atomically() {
    // GIVEN: A stored role with valid TTLs
    let h = Harness::new().await;
    h.backend
        .write_role(
            "keys",
            org_key_role()
                .ttl(Duration::from_secs(30))
                .max_ttl(Duration::from_secs(60)),
        )
        .await
        .unwrap();

    // WHEN: An update pushes ttl above max_ttl
    let err = h
        .backend
        .write_role("keys", RoleUpdate::new().ttl(Duration::from_secs(90)))
        .await
        .unwrap_err();

    // THEN: The write is rejected and the stored role is unchanged
    assert!(err.is_validation());
    let role = h.backend.read_role("keys").await.unwrap().unwrap();
    assert_eq!(role.ttl, Duration::from_secs(30));
    assert_eq!(role.max_ttl, Duration::from_secs(60));
}

#[rstest]
#[case::unknown_type(RoleUpdate::new().credential_type("atlas_admin"))]
#[case::missing_type(RoleUpdate::new().organization_id("org1"))]
#[case::missing_org(RoleUpdate::new().credential_type("org_api_key").api_key_roles(["ORG_MEMBER"]))]
#[case::missing_db_roles(
    RoleUpdate::new()
        .credential_type("database_user")
        .project_id("p")
        .database_name("admin")
)]
#[case::whitelist_on_database_user(database_user_role().ip_whitelist(["1.2.3.4"]))]
#[case::bad_ip(org_key_role().ip_whitelist(["1.2.3"]))]
#[case::bad_cidr(org_key_role().cidr_whitelist(["10.0.0.0/40"]))]
#[case::bad_db_roles_json(database_user_role().db_roles_json("{not json"))]
#[tokio::test]
async fn test_invalid_role_writes_rejected(#[case] update: RoleUpdate) {
    let h = Harness::new().await;

    let err = h.backend.write_role("bad", update).await.unwrap_err();

    assert!(err.is_validation(), "{err}");
    assert_eq!(h.backend.read_role("bad").await.unwrap(), None);
}

#[tokio::test]
async fn test_empty_role_name_rejected() {
    let h = Harness::new().await;
    assert!(h.backend.write_role("", org_key_role()).await.unwrap_err().is_validation());
    assert!(h.backend.read_role("").await.unwrap_err().is_validation());
}

#[tokio::test]
async fn test_roles_listed_sorted() {
    let h = Harness::new().await;
    for name in ["writers", "admins", "readers"] {
        h.backend.write_role(name, org_key_role()).await.unwrap();
    }

    assert_eq!(
        h.backend.list_roles().await.unwrap(),
        vec!["admins", "readers", "writers"]
    );
}

#[tokio::test]
async fn test_role_persists_structured_db_roles() {
    let h = Harness::new().await;
    h.backend
        .write_role(
            "dba",
            database_user_role()
                .db_roles_json(r#"[{"databaseName":"sales","roleName":"read","collectionName":"orders"}]"#),
        )
        .await
        .unwrap();

    let raw = h.storage.get("roles/dba").await.unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(stored["version"], 1);
    assert_eq!(stored["db_roles"][0]["collectionName"], "orders");
}
