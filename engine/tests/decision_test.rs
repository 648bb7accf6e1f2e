//! Access Decision Integration Tests
//!
//! Run with: `cargo test --test decision_test -- --nocapture`

mod helpers;

use helpers::TestEnv;
use rbac_engine::types::Group;
use rbac_engine::{Action, EngineConfig, RbacError, StoreError};
use uuid::Uuid;

// ============================================================================
// Defaults
// ============================================================================

#[tokio::test]
async fn test_unprotected_dataset_follows_composition_model() {
    let env = TestEnv::new();
    let user = env.user("alice").await;
    let dataset = TestEnv::dataset();

    assert!(env.allowed(Some(&user), Action::DatasetAccess, &dataset).await);
    assert!(!env.allowed(Some(&user), Action::DatasetEditMetadata, &dataset).await);
    assert!(
        !env
            .allowed(Some(&user), Action::DatasetManagePermissions, &dataset)
            .await
    );
}

#[tokio::test]
async fn test_required_roles_must_all_be_held() {
    let env = TestEnv::new();
    let both = env.user("both").await;
    let one = env.user("one").await;
    let r1 = env.role_held_by("r1", &[&both, &one]).await;
    let r2 = env.role_held_by("r2", &[&both]).await;
    let dataset = TestEnv::dataset();

    env.require(&dataset, Action::DatasetEditMetadata, &[&r1, &r2])
        .await;

    assert!(env.allowed(Some(&both), Action::DatasetEditMetadata, &dataset).await);
    assert!(!env.allowed(Some(&one), Action::DatasetEditMetadata, &dataset).await);
}

#[tokio::test]
async fn test_access_requirement_withdraws_open_default() {
    let env = TestEnv::new();
    let member = env.user("member").await;
    let outsider = env.user("outsider").await;
    let role = env.role_held_by("lab", &[&member]).await;
    let dataset = TestEnv::dataset();

    env.require(&dataset, Action::DatasetAccess, &[&role]).await;

    assert!(env.allowed(Some(&member), Action::DatasetAccess, &dataset).await);
    assert!(!env.allowed(Some(&outsider), Action::DatasetAccess, &dataset).await);
}

#[tokio::test]
async fn test_group_roles_are_not_expanded() {
    let env = TestEnv::new();
    let user = env.user("grouped").await;
    let group = Group {
        id: Uuid::new_v4(),
        name: "sequencing".to_string(),
    };
    env.store().add_group(group.clone()).await;
    let role = env.role("sequencing-data").await;

    env.engine.associate_user_group(user.id, group.id).await.unwrap();
    env.engine.associate_group_role(group.id, role.id).await.unwrap();

    let dataset = TestEnv::dataset();
    env.require(&dataset, Action::DatasetAccess, &[&role]).await;

    assert!(!env.allowed(Some(&user), Action::DatasetAccess, &dataset).await);
}

// ============================================================================
// Anonymous subjects
// ============================================================================

#[tokio::test]
async fn test_anonymous_access_only_to_public_datasets() {
    let env = TestEnv::new();
    let user = env.user("owner").await;
    let role = env.role_held_by("owners", &[&user]).await;

    let public = TestEnv::dataset();
    let private = TestEnv::dataset();
    env.require(&private, Action::DatasetAccess, &[&role]).await;

    assert!(env.allowed(None, Action::DatasetAccess, &public).await);
    assert!(!env.allowed(None, Action::DatasetAccess, &private).await);
    assert!(!env.allowed(None, Action::DatasetEditMetadata, &public).await);
    assert!(!env.allowed(None, Action::DatasetManagePermissions, &public).await);
}

#[tokio::test]
async fn test_anonymous_access_ignores_other_actions_records() {
    let env = TestEnv::new();
    let user = env.user("editor").await;
    let role = env.role_held_by("editors", &[&user]).await;
    let dataset = TestEnv::dataset();

    env.require(&dataset, Action::DatasetEditMetadata, &[&role])
        .await;

    assert!(env.allowed(None, Action::DatasetAccess, &dataset).await);
}

// ============================================================================
// Registry and store failures
// ============================================================================

#[tokio::test]
async fn test_actions_outside_registry_are_denied() {
    let env = TestEnv::with_config(EngineConfig {
        action_filter: Some("LIBRARY".to_string()),
        ..EngineConfig::default()
    });
    let user = env.user("filtered").await;

    assert!(
        !env
            .allowed(Some(&user), Action::DatasetAccess, &TestEnv::dataset())
            .await
    );
}

#[tokio::test]
async fn test_store_failure_is_an_error_not_a_decision() {
    let env = TestEnv::new();
    let user = env.user("unlucky").await;
    env.store().set_unavailable(true);

    let result = env
        .engine
        .is_allowed(Some(&user), Action::DatasetAccess, &TestEnv::dataset())
        .await;

    assert!(matches!(
        result,
        Err(RbacError::Store(StoreError::Unavailable(_)))
    ));
}

#[tokio::test]
async fn test_wrappers_resolve_to_the_same_dataset() {
    let env = TestEnv::new();
    let user = env.user("wrapped").await;
    let role = env.role_held_by("wrapped", &[&user]).await;
    let dataset = TestEnv::dataset();
    env.require(&dataset, Action::DatasetEditMetadata, &[&role])
        .await;

    let history = env.history(Some(&user)).await;
    let hda = env.add_to_history(&history, &dataset).await;

    assert!(env
        .engine
        .is_allowed(Some(&user), Action::DatasetEditMetadata, &hda)
        .await
        .unwrap());
    assert!(env
        .engine
        .is_allowed(Some(&user), Action::DatasetEditMetadata, &dataset.id)
        .await
        .unwrap());
}
