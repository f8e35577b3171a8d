use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use keyward_core::{AppError, AppResult};
use keyward_domain::{
    NamingStrategy, PermissionTargetKey, PermissionTargetSpec, RoleId, RoleRecord,
};

use crate::role_ports::{
    AuthorizationClient, PermissionTargetDefinition, RepairOutcome, RoleDeletion,
    RoleRecordRepository, SaveRoleInput,
};

use super::{RoleError, RoleService};

#[derive(Default)]
struct FakeRoleRecordRepository {
    records: Mutex<BTreeMap<String, RoleRecord>>,
    fail_saves: Mutex<bool>,
}

impl FakeRoleRecordRepository {
    async fn record(&self, role_name: &str) -> Option<RoleRecord> {
        self.records.lock().await.get(role_name).cloned()
    }
}

#[async_trait]
impl RoleRecordRepository for FakeRoleRecordRepository {
    async fn find_role(&self, role_name: &str) -> AppResult<Option<RoleRecord>> {
        Ok(self.records.lock().await.get(role_name).cloned())
    }

    async fn save_role(&self, record: &RoleRecord) -> AppResult<()> {
        if *self.fail_saves.lock().await {
            return Err(AppError::Internal("storage offline".to_owned()));
        }

        self.records
            .lock()
            .await
            .insert(record.name().to_string(), record.clone());
        Ok(())
    }

    async fn replace_role_if_revision(
        &self,
        record: &RoleRecord,
        expected_revision: u64,
    ) -> AppResult<bool> {
        if *self.fail_saves.lock().await {
            return Err(AppError::Internal("storage offline".to_owned()));
        }

        let mut records = self.records.lock().await;
        let name = record.name().to_string();
        match records.get(&name) {
            Some(current) if current.revision() == expected_revision => {
                records.insert(name, record.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_role(&self, role_name: &str) -> AppResult<()> {
        self.records.lock().await.remove(role_name);
        Ok(())
    }

    async fn list_role_names(&self) -> AppResult<Vec<String>> {
        Ok(self.records.lock().await.keys().cloned().collect())
    }
}

#[derive(Default)]
struct FakeAuthorizationClient {
    groups: Mutex<BTreeSet<String>>,
    targets: Mutex<BTreeMap<String, PermissionTargetDefinition>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<BTreeSet<String>>,
    fail_groups: Mutex<bool>,
    reject_build_scope: bool,
    group_gate: Mutex<Option<GroupGate>>,
}

/// Holds the next group upsert until the test releases it.
struct GroupGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl FakeAuthorizationClient {
    async fn fail_on(&self, name: &str) {
        self.failing.lock().await.insert(name.to_owned());
    }

    async fn recover(&self) {
        self.failing.lock().await.clear();
        *self.fail_groups.lock().await = false;
    }

    async fn target_names(&self) -> BTreeSet<String> {
        self.targets.lock().await.keys().cloned().collect()
    }

    async fn group_names(&self) -> BTreeSet<String> {
        self.groups.lock().await.clone()
    }

    async fn mutations(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| !call.starts_with("exists:"))
            .cloned()
            .collect()
    }

    async fn hold_next_group_upsert(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.group_gate.lock().await = Some(GroupGate {
            entered: entered.clone(),
            release: release.clone(),
        });
        (entered, release)
    }

    async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    async fn check_failure(&self, name: &str) -> AppResult<()> {
        if self.failing.lock().await.contains(name) {
            return Err(AppError::Unavailable(format!("remote rejected '{name}'")));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationClient for FakeAuthorizationClient {
    async fn create_or_replace_group(&self, group_name: &str, _description: &str) -> AppResult<()> {
        self.calls.lock().await.push(format!("group.put:{group_name}"));
        let gate = self.group_gate.lock().await.take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if *self.fail_groups.lock().await {
            return Err(AppError::Unavailable("group api offline".to_owned()));
        }

        self.groups.lock().await.insert(group_name.to_owned());
        Ok(())
    }

    async fn delete_group(&self, group_name: &str) -> AppResult<()> {
        self.calls
            .lock()
            .await
            .push(format!("group.delete:{group_name}"));
        self.check_failure(group_name).await?;
        self.groups.lock().await.remove(group_name);
        Ok(())
    }

    async fn permission_target_exists(&self, name: &str) -> AppResult<bool> {
        self.calls.lock().await.push(format!("exists:{name}"));
        Ok(self.targets.lock().await.contains_key(name))
    }

    async fn create_permission_target(
        &self,
        definition: &PermissionTargetDefinition,
    ) -> AppResult<()> {
        self.calls
            .lock()
            .await
            .push(format!("create:{}", definition.name));
        self.check_failure(definition.name.as_str()).await?;

        let mut targets = self.targets.lock().await;
        if targets.contains_key(&definition.name) {
            return Err(AppError::Conflict(format!(
                "permission target '{}' already exists",
                definition.name
            )));
        }
        targets.insert(definition.name.clone(), definition.clone());
        Ok(())
    }

    async fn update_permission_target(
        &self,
        definition: &PermissionTargetDefinition,
    ) -> AppResult<()> {
        self.calls
            .lock()
            .await
            .push(format!("update:{}", definition.name));
        self.check_failure(definition.name.as_str()).await?;

        let mut targets = self.targets.lock().await;
        if !targets.contains_key(&definition.name) {
            return Err(AppError::NotFound(format!(
                "permission target '{}' does not exist",
                definition.name
            )));
        }
        targets.insert(definition.name.clone(), definition.clone());
        Ok(())
    }

    async fn delete_permission_target(&self, name: &str) -> AppResult<()> {
        self.calls.lock().await.push(format!("delete:{name}"));
        self.check_failure(name).await?;
        self.targets.lock().await.remove(name);
        Ok(())
    }

    fn check_compatibility(&self, spec: &PermissionTargetSpec) -> AppResult<()> {
        if self.reject_build_scope && spec.build().is_some() {
            return Err(AppError::Validation(
                "build scope is not supported by this API".to_owned(),
            ));
        }
        Ok(())
    }
}

struct Harness {
    service: RoleService,
    repository: Arc<FakeRoleRecordRepository>,
    client: Arc<FakeAuthorizationClient>,
}

impl Harness {
    fn new() -> Self {
        Self::with_client(FakeAuthorizationClient::default())
    }

    fn with_client(client: FakeAuthorizationClient) -> Self {
        let repository = Arc::new(FakeRoleRecordRepository::default());
        let client = Arc::new(client);
        let service = RoleService::new(
            repository.clone(),
            client.clone(),
            NamingStrategy::default(),
        );

        Self {
            service,
            repository,
            client,
        }
    }

    async fn role_id(&self, role_name: &str) -> RoleId {
        match self.repository.record(role_name).await {
            Some(record) => record.role_id(),
            None => panic!("role '{role_name}' was not stored"),
        }
    }

    async fn save(&self, role_name: &str, permission_targets: Option<String>) {
        let result = self.service.save_role(input(role_name, permission_targets)).await;
        if let Err(error) = result {
            panic!("save_role failed: {error}");
        }
    }

    fn positional_names(&self, role_id: &RoleId, count: usize) -> BTreeSet<String> {
        (0..count)
            .map(|index| {
                self.service
                    .naming()
                    .permission_target_name(role_id, &PermissionTargetKey::Index(index))
            })
            .collect()
    }
}

fn input(role_name: &str, permission_targets: Option<String>) -> SaveRoleInput {
    SaveRoleInput {
        name: role_name.to_owned(),
        token_ttl_seconds: None,
        max_ttl_seconds: None,
        permission_targets,
    }
}

fn anonymous_targets(repositories: &[&str]) -> String {
    let entries = repositories
        .iter()
        .map(|repository| {
            format!(r#"{{"repo": {{"repositories": ["{repository}"], "operations": ["read"]}}}}"#)
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("[{entries}]")
}

#[tokio::test]
async fn create_role_applies_defaults_and_positional_names() {
    let harness = Harness::new();
    let raw = r#"[{"repo": {"repositories": ["repo-x"], "operations": ["read", "write"]}}]"#;

    let summary = harness
        .service
        .save_role(input("test_role1", Some(raw.to_owned())))
        .await;
    let summary = match summary {
        Ok(summary) => summary,
        other => panic!("expected role to be created: {other:?}"),
    };

    let role_id = harness.role_id("test_role1").await;
    let naming = harness.service.naming();
    assert_eq!(summary.role_id, role_id.to_string());
    assert_eq!(summary.permission_targets.as_deref(), Some(raw));
    assert_eq!(
        summary.reconciliation.created,
        vec![naming.permission_target_name(&role_id, &PermissionTargetKey::Index(0))]
    );
    assert_eq!(
        harness.client.group_names().await,
        BTreeSet::from([naming.group_name(&role_id)])
    );

    let view = harness.service.read_role("test_role1").await;
    let view = match view {
        Ok(Some(view)) => view,
        other => panic!("expected stored role: {other:?}"),
    };
    assert_eq!(view.token_ttl_seconds, 600);
    assert_eq!(view.max_ttl_seconds, 3600);
    assert!(!view.pending);

    let listed = harness.service.list_roles().await;
    assert!(matches!(listed, Ok(ref names) if names == &vec!["test_role1".to_owned()]));

    let deleted = harness.service.delete_role("test_role1").await;
    assert!(matches!(deleted, Ok(RoleDeletion::Deleted { .. })));
    let listed = harness.service.list_roles().await;
    assert!(matches!(listed, Ok(ref names) if names.is_empty()));
}

#[tokio::test]
async fn saving_an_unchanged_role_twice_is_idempotent() {
    let harness = Harness::new();
    let raw = anonymous_targets(&["a", "b"]);

    harness.save("ops", Some(raw.clone())).await;
    let role_id = harness.role_id("ops").await;
    let targets_after_first = harness.client.target_names().await;
    harness.client.clear_calls().await;

    let second = harness.service.save_role(input("ops", Some(raw))).await;
    let second = match second {
        Ok(second) => second,
        other => panic!("expected second save to succeed: {other:?}"),
    };

    assert_eq!(harness.role_id("ops").await, role_id);
    assert_eq!(harness.client.target_names().await, targets_after_first);
    assert_eq!(harness.client.group_names().await.len(), 1);
    assert!(harness.client.mutations().await.is_empty());
    assert_eq!(second.reconciliation.unchanged.len(), 2);
}

#[tokio::test]
async fn remote_targets_match_positions_of_the_desired_list() {
    let harness = Harness::new();

    harness
        .save("ops", Some(anonymous_targets(&["a", "b", "c", "d"])))
        .await;
    let role_id = harness.role_id("ops").await;
    assert_eq!(
        harness.client.target_names().await,
        harness.positional_names(&role_id, 4)
    );

    harness
        .save("ops", Some(anonymous_targets(&["a", "b", "c", "d", "e", "f"])))
        .await;
    assert_eq!(
        harness.client.target_names().await,
        harness.positional_names(&role_id, 6)
    );
}

#[tokio::test]
async fn shrinking_the_list_removes_only_trailing_targets() {
    let harness = Harness::new();

    harness
        .save("ops", Some(anonymous_targets(&["a", "b", "c"])))
        .await;
    let role_id = harness.role_id("ops").await;
    harness.client.clear_calls().await;

    let summary = harness
        .service
        .save_role(input("ops", Some(anonymous_targets(&["a"]))))
        .await;
    let summary = match summary {
        Ok(summary) => summary,
        other => panic!("expected shrink to succeed: {other:?}"),
    };

    let naming = harness.service.naming();
    let trailing = vec![
        naming.permission_target_name(&role_id, &PermissionTargetKey::Index(1)),
        naming.permission_target_name(&role_id, &PermissionTargetKey::Index(2)),
    ];
    assert_eq!(summary.reconciliation.deleted, trailing);
    assert_eq!(
        summary.reconciliation.unchanged,
        vec![naming.permission_target_name(&role_id, &PermissionTargetKey::Index(0))]
    );
    assert_eq!(
        harness.client.target_names().await,
        harness.positional_names(&role_id, 1)
    );
    assert_eq!(
        harness.client.mutations().await,
        trailing
            .iter()
            .map(|name| format!("delete:{name}"))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn changed_content_is_pushed_again() {
    let harness = Harness::new();

    harness.save("ops", Some(anonymous_targets(&["a"]))).await;
    let role_id = harness.role_id("ops").await;

    let summary = harness
        .service
        .save_role(input("ops", Some(anonymous_targets(&["b"]))))
        .await;
    let summary = match summary {
        Ok(summary) => summary,
        other => panic!("expected update to succeed: {other:?}"),
    };

    let name = harness
        .service
        .naming()
        .permission_target_name(&role_id, &PermissionTargetKey::Index(0));
    assert_eq!(summary.reconciliation.updated, vec![name.clone()]);

    let stored = harness.client.targets.lock().await.get(&name).cloned();
    let repositories = stored
        .as_ref()
        .and_then(|definition| definition.spec.repo())
        .map(|scope| scope.repositories().to_vec());
    assert_eq!(repositories, Some(vec!["b".to_owned()]));
}

#[tokio::test]
async fn named_targets_keep_identity_when_reordered() {
    let harness = Harness::new();
    let first = r#"[
        {"name": "read-libs", "repo": {"repositories": ["libs"], "operations": ["read"]}},
        {"name": "deploy", "repo": {"repositories": ["releases"], "operations": ["write"]}}
    ]"#;
    let reordered = r#"[
        {"name": "deploy", "repo": {"repositories": ["releases"], "operations": ["write"]}},
        {"name": "read-libs", "repo": {"repositories": ["libs"], "operations": ["read"]}}
    ]"#;

    harness.save("ops", Some(first.to_owned())).await;
    let targets_before = harness.client.target_names().await;
    harness.client.clear_calls().await;

    harness.save("ops", Some(reordered.to_owned())).await;

    assert_eq!(harness.client.target_names().await, targets_before);
    assert!(harness.client.mutations().await.is_empty());
}

#[tokio::test]
async fn invalid_entry_rejects_update_without_touching_state() {
    let harness = Harness::new();

    harness.save("ops", Some(anonymous_targets(&["a", "b"]))).await;
    let record_before = harness.repository.record("ops").await;
    let targets_before = harness.client.target_names().await;
    harness.client.clear_calls().await;

    let invalid = r#"[
        {"repo": {"repositories": ["a"], "operations": ["read"]}},
        {"repo": {"repositories": [], "operations": ["read"]}}
    ]"#;
    let result = harness
        .service
        .save_role(input("ops", Some(invalid.to_owned())))
        .await;

    assert!(matches!(
        result,
        Err(RoleError::InvalidPermissionTargetSpec(ref message)) if message.contains("#1")
    ));
    assert_eq!(harness.repository.record("ops").await, record_before);
    assert_eq!(harness.client.target_names().await, targets_before);
    assert!(harness.client.calls.lock().await.is_empty());
}

#[tokio::test]
async fn malformed_json_is_an_input_error() {
    let harness = Harness::new();

    let result = harness
        .service
        .save_role(input("ops", Some("not json".to_owned())))
        .await;

    assert!(matches!(result, Err(RoleError::InvalidPermissionTargetSpec(_))));
    assert!(harness.client.calls.lock().await.is_empty());
    assert!(harness.repository.record("ops").await.is_none());
}

#[tokio::test]
async fn client_incompatibility_is_reported_before_remote_calls() {
    let harness = Harness::with_client(FakeAuthorizationClient {
        reject_build_scope: true,
        ..FakeAuthorizationClient::default()
    });
    let raw = r#"[{"build": {"repositories": ["artifactory-build-info"], "operations": ["read"]}}]"#;

    let result = harness.service.save_role(input("ops", Some(raw.to_owned()))).await;

    assert!(matches!(result, Err(RoleError::InvalidPermissionTargetSpec(_))));
    assert!(harness.client.calls.lock().await.is_empty());
}

#[tokio::test]
async fn missing_role_name_is_rejected() {
    let harness = Harness::new();

    let save = harness.service.save_role(input("  ", None)).await;
    let read = harness.service.read_role("").await;
    let delete = harness.service.delete_role("").await;

    assert!(matches!(save, Err(RoleError::MissingRoleName)));
    assert!(matches!(read, Err(RoleError::MissingRoleName)));
    assert!(matches!(delete, Err(RoleError::MissingRoleName)));
}

#[tokio::test]
async fn malformed_role_name_is_rejected() {
    let harness = Harness::new();

    let result = harness.service.save_role(input("ops/team", None)).await;

    assert!(matches!(result, Err(RoleError::InvalidRoleName(_))));
}

#[tokio::test]
async fn ttl_only_update_keeps_targets_and_skips_remote_calls() {
    let harness = Harness::new();
    let raw = anonymous_targets(&["a"]);

    harness.save("ops", Some(raw.clone())).await;
    harness.client.clear_calls().await;

    let result = harness
        .service
        .save_role(SaveRoleInput {
            name: "ops".to_owned(),
            token_ttl_seconds: Some(120),
            max_ttl_seconds: Some(900),
            permission_targets: None,
        })
        .await;
    assert!(result.is_ok());
    assert!(harness.client.calls.lock().await.is_empty());

    let binding = harness.service.resolve_role_binding("ops").await;
    let binding = match binding {
        Ok(binding) => binding,
        other => panic!("expected binding: {other:?}"),
    };
    assert_eq!(binding.token_ttl, Duration::from_secs(120));
    assert_eq!(binding.max_ttl, Duration::from_secs(900));

    let view = harness.service.read_role("ops").await;
    assert!(matches!(view, Ok(Some(ref view)) if view.permission_targets.as_deref() == Some(raw.as_str())));
}

#[tokio::test]
async fn group_creation_failure_persists_nothing() {
    let harness = Harness::new();
    *harness.client.fail_groups.lock().await = true;

    let result = harness
        .service
        .save_role(input("ops", Some(anonymous_targets(&["a"]))))
        .await;

    assert!(matches!(
        result,
        Err(RoleError::RemoteGroupOperationFailed { .. })
    ));
    assert!(harness.repository.record("ops").await.is_none());
    assert!(harness.client.target_names().await.is_empty());
}

#[tokio::test]
async fn unsaved_new_role_discards_its_group() {
    let harness = Harness::new();
    *harness.repository.fail_saves.lock().await = true;

    let result = harness
        .service
        .save_role(input("ops", Some(anonymous_targets(&["a"]))))
        .await;

    assert!(matches!(result, Err(RoleError::RecordPersistFailed { .. })));
    assert!(harness.client.group_names().await.is_empty());
    assert!(harness.client.target_names().await.is_empty());
}

#[tokio::test]
async fn remote_failure_leaves_pending_record_that_repair_converges() {
    let harness = Harness::new();

    harness
        .save("ops", Some(anonymous_targets(&["a", "b", "c"])))
        .await;
    let role_id = harness.role_id("ops").await;
    let naming = harness.service.naming().clone();
    let second = naming.permission_target_name(&role_id, &PermissionTargetKey::Index(1));
    harness.client.fail_on(&second).await;

    let result = harness
        .service
        .save_role(input("ops", Some(anonymous_targets(&["x", "y"]))))
        .await;
    assert!(matches!(
        result,
        Err(RoleError::RemotePermissionTargetOperationFailed { ref name, .. }) if name == &second
    ));

    let view = harness.service.read_role("ops").await;
    assert!(matches!(view, Ok(Some(ref view)) if view.pending));

    harness.client.recover().await;
    let repaired = harness.service.repair_role("ops").await;
    let summary = match repaired {
        Ok(RepairOutcome::Repaired(summary)) => summary,
        other => panic!("expected repair to run: {other:?}"),
    };

    assert_eq!(
        summary.deleted,
        vec![naming.permission_target_name(&role_id, &PermissionTargetKey::Index(2))]
    );
    assert_eq!(
        harness.client.target_names().await,
        harness.positional_names(&role_id, 2)
    );

    let view = harness.service.read_role("ops").await;
    assert!(matches!(view, Ok(Some(ref view)) if !view.pending));

    let again = harness.service.repair_role("ops").await;
    assert!(matches!(again, Ok(RepairOutcome::AlreadyConsistent)));
}

#[tokio::test]
async fn retried_write_after_failure_cleans_up_interrupted_baseline() {
    let harness = Harness::new();

    harness
        .save("ops", Some(anonymous_targets(&["a", "b", "c"])))
        .await;
    let role_id = harness.role_id("ops").await;
    let first = harness
        .service
        .naming()
        .permission_target_name(&role_id, &PermissionTargetKey::Index(0));
    harness.client.fail_on(&first).await;

    let failed = harness
        .service
        .save_role(input("ops", Some(anonymous_targets(&["z"]))))
        .await;
    assert!(failed.is_err());

    harness.client.recover().await;
    harness.save("ops", Some(anonymous_targets(&["z"]))).await;

    assert_eq!(
        harness.client.target_names().await,
        harness.positional_names(&role_id, 1)
    );
    let record = harness.repository.record("ops").await;
    assert!(record.is_some_and(|record| !record.is_pending()));
}

#[tokio::test]
async fn repair_pending_roles_reports_each_role() {
    let harness = Harness::new();

    harness.save("alpha", Some(anonymous_targets(&["a"]))).await;
    harness.save("beta", Some(anonymous_targets(&["a"]))).await;
    let beta_id = harness.role_id("beta").await;
    let beta_target = harness
        .service
        .naming()
        .permission_target_name(&beta_id, &PermissionTargetKey::Index(0));
    harness.client.fail_on(&beta_target).await;
    let failed = harness
        .service
        .save_role(input("beta", Some(anonymous_targets(&["b"]))))
        .await;
    assert!(failed.is_err());

    let still_failing = harness.service.repair_pending_roles().await;
    let report = match still_failing {
        Ok(report) => report,
        other => panic!("expected report: {other:?}"),
    };
    assert_eq!(report.consistent, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].role_name, "beta");

    harness.client.recover().await;
    let recovered = harness.service.repair_pending_roles().await;
    let report = match recovered {
        Ok(report) => report,
        other => panic!("expected report: {other:?}"),
    };
    assert_eq!(report.repaired, vec!["beta".to_owned()]);
    assert_eq!(report.consistent, 1);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn repair_racing_a_newer_write_does_not_commit_or_orphan_targets() {
    let harness = Harness::new();

    harness.save("r", Some(anonymous_targets(&["a"]))).await;
    let role_id = harness.role_id("r").await;
    let naming = harness.service.naming().clone();
    let positional = naming.permission_target_name(&role_id, &PermissionTargetKey::Index(0));
    let named_key = PermissionTargetKey::Named("x".to_owned());
    let named = naming.permission_target_name(&role_id, &named_key);
    harness.client.fail_on(&positional).await;
    let failed = harness
        .service
        .save_role(input("r", Some(anonymous_targets(&["b"]))))
        .await;
    assert!(failed.is_err());
    harness.client.recover().await;

    let (entered, release) = harness.client.hold_next_group_upsert().await;
    let named_targets =
        r#"[{"name": "x", "repo": {"repositories": ["x"], "operations": ["read"]}}]"#;
    let (repaired, written) = tokio::join!(harness.service.repair_role("r"), async {
        entered.notified().await;
        let written = harness
            .service
            .save_role(input("r", Some(named_targets.to_owned())))
            .await;
        release.notify_one();
        written
    });

    assert!(written.is_ok());
    assert!(matches!(repaired, Err(RoleError::ConcurrentWrite(ref name)) if name == "r"));

    let record = match harness.repository.record("r").await {
        Some(record) => record,
        None => panic!("role 'r' was not stored"),
    };
    let keys = record
        .permission_targets()
        .iter()
        .map(|target| target.key().clone())
        .collect::<Vec<_>>();
    assert_eq!(keys, vec![named_key]);
    assert_eq!(record.raw_permission_targets(), Some(named_targets));
    assert!(record.is_pending());

    let repaired = harness.service.repair_role("r").await;
    let summary = match repaired {
        Ok(RepairOutcome::Repaired(summary)) => summary,
        other => panic!("expected follow-up repair to run: {other:?}"),
    };
    assert_eq!(summary.deleted, vec![positional]);
    assert_eq!(harness.client.target_names().await, BTreeSet::from([named]));
    let record = harness.repository.record("r").await;
    assert!(record.is_some_and(|record| !record.is_pending()));
}

#[tokio::test]
async fn repair_of_a_deleted_role_discards_what_it_pushed() {
    let harness = Harness::new();

    harness.save("gone", Some(anonymous_targets(&["a"]))).await;
    let role_id = harness.role_id("gone").await;
    let positional = harness
        .service
        .naming()
        .permission_target_name(&role_id, &PermissionTargetKey::Index(0));
    harness.client.fail_on(&positional).await;
    let failed = harness
        .service
        .save_role(input("gone", Some(anonymous_targets(&["b"]))))
        .await;
    assert!(failed.is_err());
    harness.client.recover().await;

    let (entered, release) = harness.client.hold_next_group_upsert().await;
    let (repaired, deleted) = tokio::join!(harness.service.repair_role("gone"), async {
        entered.notified().await;
        let deleted = harness.service.delete_role("gone").await;
        release.notify_one();
        deleted
    });

    assert!(matches!(deleted, Ok(RoleDeletion::Deleted { .. })));
    assert!(matches!(repaired, Err(RoleError::ConcurrentWrite(_))));
    assert!(harness.repository.record("gone").await.is_none());
    assert!(harness.client.target_names().await.is_empty());
    assert!(harness.client.group_names().await.is_empty());
}

#[tokio::test]
async fn repair_pending_roles_defers_recent_reconciliations() {
    let harness = Harness::new();

    harness.save("fresh", Some(anonymous_targets(&["a"]))).await;
    let role_id = harness.role_id("fresh").await;
    let positional = harness
        .service
        .naming()
        .permission_target_name(&role_id, &PermissionTargetKey::Index(0));
    harness.client.fail_on(&positional).await;
    let failed = harness
        .service
        .save_role(input("fresh", Some(anonymous_targets(&["b"]))))
        .await;
    assert!(failed.is_err());
    harness.client.recover().await;
    harness.client.clear_calls().await;

    let patient = harness
        .service
        .clone()
        .with_repair_grace(Duration::from_secs(3600));
    let report = match patient.repair_pending_roles().await {
        Ok(report) => report,
        other => panic!("expected report: {other:?}"),
    };
    assert_eq!(report.deferred, vec!["fresh".to_owned()]);
    assert!(report.repaired.is_empty());
    assert!(harness.client.mutations().await.is_empty());

    let report = match harness.service.repair_pending_roles().await {
        Ok(report) => report,
        other => panic!("expected report: {other:?}"),
    };
    assert_eq!(report.repaired, vec!["fresh".to_owned()]);
    assert!(report.deferred.is_empty());
}

#[tokio::test]
async fn delete_removes_group_targets_and_record() {
    let harness = Harness::new();

    harness
        .save("ops", Some(anonymous_targets(&["a", "b"])))
        .await;

    let deleted = harness.service.delete_role("ops").await;

    assert!(matches!(deleted, Ok(RoleDeletion::Deleted { .. })));
    assert!(harness.client.target_names().await.is_empty());
    assert!(harness.client.group_names().await.is_empty());
    assert!(harness.repository.record("ops").await.is_none());
}

#[tokio::test]
async fn deleting_a_missing_role_is_a_no_op() {
    let harness = Harness::new();

    let deleted = harness.service.delete_role("ghost").await;

    assert!(matches!(deleted, Ok(RoleDeletion::NotFound)));
    assert!(harness.client.calls.lock().await.is_empty());
}

#[tokio::test]
async fn delete_attempts_every_object_and_keeps_record_on_failure() {
    let harness = Harness::new();

    harness
        .save("ops", Some(anonymous_targets(&["a", "b", "c"])))
        .await;
    let role_id = harness.role_id("ops").await;
    let first = harness
        .service
        .naming()
        .permission_target_name(&role_id, &PermissionTargetKey::Index(0));
    harness.client.fail_on(&first).await;

    let result = harness.service.delete_role("ops").await;

    assert!(matches!(
        result,
        Err(RoleError::RemotePermissionTargetOperationFailed { ref name, .. }) if name == &first
    ));
    assert_eq!(
        harness.client.target_names().await,
        BTreeSet::from([first.clone()])
    );
    assert!(harness.client.group_names().await.is_empty());
    assert!(harness.repository.record("ops").await.is_some());

    harness.client.recover().await;
    let retried = harness.service.delete_role("ops").await;
    assert!(matches!(retried, Ok(RoleDeletion::Deleted { .. })));
    assert!(harness.client.target_names().await.is_empty());
}

#[tokio::test]
async fn missing_role_has_no_binding() {
    let harness = Harness::new();

    let binding = harness.service.resolve_role_binding("ghost").await;
    let read = harness.service.read_role("ghost").await;

    assert!(matches!(binding, Err(RoleError::RoleNotFound(_))));
    assert!(matches!(read, Ok(None)));
}
