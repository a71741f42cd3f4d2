//! Unit tests for the Database reconciliation engine

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::names::FINALIZER;
    use crate::reconciler::status::find_condition;
    use crate::reconciler::ReconcileOutcome;
    use crate::test_utils::*;
    use crds::{ConditionStatus, ConditionType};
    use k8s_openapi::api::core::v1::PersistentVolumeClaim;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use resource_client::{EventType, StoreError};
    use std::collections::BTreeMap;

    fn claim(name: &str, managed_by: &str) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(TEST_NAMESPACE.to_string()),
                labels: Some(BTreeMap::from([(
                    "ahti.database.io/managed-by".to_string(),
                    managed_by.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn env_names(harness: &TestHarness, name: &str) -> Vec<String> {
        let sts = harness.client.stateful_set(TEST_NAMESPACE, name).unwrap();
        sts.spec.unwrap().template.spec.unwrap().containers[0]
            .env
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[tokio::test]
    async fn test_missing_database_is_done() {
        let harness = TestHarness::new();
        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "ghost").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(harness.client.operations(), vec!["get_database default/ghost".to_string()]);
    }

    #[tokio::test]
    async fn test_create_full_database() {
        let harness = TestHarness::new();
        let db = harness.add(database_with_auth_and_ingress("db", "a.example.com"));
        let uid = db.metadata.uid.clone().unwrap();

        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);

        let client = &harness.client;
        let secret = client.secret(TEST_NAMESPACE, "db-auth-key").expect("auth secret");
        let sts = client.stateful_set(TEST_NAMESPACE, "db").expect("primary statefulset");
        let headless = client.service(TEST_NAMESPACE, "db-svc-headless").expect("headless service");
        let routable = client.service(TEST_NAMESPACE, "db-svc").expect("routable service");
        let ingress = client.ingress(TEST_NAMESPACE, "db-ingress").expect("ingress");
        assert!(client.stateful_set(TEST_NAMESPACE, "db-replica").is_none());

        for owners in [
            &secret.metadata.owner_references,
            &sts.metadata.owner_references,
            &headless.metadata.owner_references,
            &routable.metadata.owner_references,
            &ingress.metadata.owner_references,
        ] {
            let owners = owners.as_ref().unwrap();
            assert_eq!(owners.len(), 1);
            assert_eq!(owners[0].uid, uid);
            assert_eq!(owners[0].kind, "Database");
        }

        let sts_spec = sts.spec.unwrap();
        let container = &sts_spec.template.spec.as_ref().unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("img:v1"));
        assert_eq!(container.ports.as_ref().unwrap().len(), 2);
        assert_eq!(sts_spec.volume_claim_templates.as_ref().unwrap().len(), 1);

        assert_eq!(headless.spec.as_ref().unwrap().selector, routable.spec.as_ref().unwrap().selector);
        assert_eq!(headless.spec.as_ref().unwrap().cluster_ip.as_deref(), Some("None"));

        let ingress_spec = ingress.spec.unwrap();
        let rule = &ingress_spec.rules.as_ref().unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("a.example.com"));
        let backend = rule.http.as_ref().unwrap().paths[0].backend.service.clone().unwrap();
        assert_eq!(backend.name, "db-svc");
        assert_eq!(backend.port.unwrap().number, Some(8080));

        let current = harness.current("db");
        assert!(current.metadata.finalizers.as_ref().unwrap().contains(&FINALIZER.to_string()));
        let available = find_condition(&current, ConditionType::Available).unwrap();
        assert_eq!(available.status, ConditionStatus::True);
        assert_eq!(available.reason, "Reconciling");
        assert_eq!(available.observed_generation, Some(1));

        assert_eq!(harness.recorder.with_reason("SuccessfulCreate").len(), 5);
    }

    #[tokio::test]
    async fn test_second_reconcile_is_idempotent() {
        let harness = TestHarness::new();
        harness.add(database_with_auth_and_ingress("db", "a.example.com"));
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();

        let client = &harness.client;
        let secret_before = client.secret(TEST_NAMESPACE, "db-auth-key").unwrap();
        let sts_before = client.stateful_set(TEST_NAMESPACE, "db").unwrap();
        let status_before = harness.current("db").status;
        let events_before = harness.recorder.events().len();
        client.clear_operations();

        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);

        assert_eq!(client.count("update_database_status"), 0);
        assert_eq!(client.count("update_database_finalizers"), 0);
        assert_eq!(client.count("create_secret"), 0);
        assert_eq!(client.count("create_stateful_set"), 0);
        assert_eq!(client.count("create_service"), 0);
        assert_eq!(client.count("create_ingress"), 0);
        assert_eq!(harness.current("db").status, status_before);
        assert_eq!(harness.recorder.events().len(), events_before);

        let secret_after = client.secret(TEST_NAMESPACE, "db-auth-key").unwrap();
        assert_eq!(secret_before.string_data, secret_after.string_data);
        let sts_after = client.stateful_set(TEST_NAMESPACE, "db").unwrap();
        assert_eq!(sts_before.spec, sts_after.spec);
    }

    #[tokio::test]
    async fn test_auth_toggle_off_removes_secret_and_env() {
        let harness = TestHarness::new();
        harness.add(database_with_auth_and_ingress("db", "a.example.com"));
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert!(env_names(&harness, "db").contains(&"SQLD_AUTH_JWT_KEY".to_string()));

        harness.edit("db", |spec| spec.auth = false);
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();

        assert!(harness.client.secret(TEST_NAMESPACE, "db-auth-key").is_none());
        assert!(!env_names(&harness, "db").contains(&"SQLD_AUTH_JWT_KEY".to_string()));
        assert_eq!(harness.recorder.with_reason("SuccessfulDelete").len(), 1);

        // Nothing left to delete on the next pass
        harness.client.clear_operations();
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(harness.client.count("delete_secret"), 0);
    }

    #[tokio::test]
    async fn test_ingress_toggle_off_removes_ingress() {
        let harness = TestHarness::new();
        harness.add(database_with_auth_and_ingress("db", "a.example.com"));
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert!(harness.client.ingress(TEST_NAMESPACE, "db-ingress").is_some());

        harness.edit("db", |spec| spec.ingress = None);
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert!(harness.client.ingress(TEST_NAMESPACE, "db-ingress").is_none());
    }

    #[tokio::test]
    async fn test_ingress_host_change_is_applied() {
        let harness = TestHarness::new();
        harness.add(database_with_auth_and_ingress("db", "a.example.com"));
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();

        harness.edit("db", |spec| {
            if let Some(ingress) = spec.ingress.as_mut() {
                ingress.host = "b.example.com".to_string();
            }
        });
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();

        let ingress = harness.client.ingress(TEST_NAMESPACE, "db-ingress").unwrap();
        assert_eq!(ingress.spec.unwrap().rules.unwrap()[0].host.as_deref(), Some("b.example.com"));
    }

    #[tokio::test]
    async fn test_replica_statefulset_follows_replicas() {
        let harness = TestHarness::new();
        let mut db = database("db");
        db.spec.replicas = Some(2);
        harness.add(db);
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();

        let replica = harness.client.stateful_set(TEST_NAMESPACE, "db-replica").expect("replica statefulset");
        assert_eq!(replica.spec.as_ref().unwrap().replicas, Some(2));
        assert!(env_names(&harness, "db-replica").contains(&"SQLD_PRIMARY_URL".to_string()));
        assert!(!env_names(&harness, "db").contains(&"SQLD_PRIMARY_URL".to_string()));
        let current = harness.current("db");
        let available = find_condition(&current, ConditionType::Available).unwrap();
        assert!(available.message.contains("with 3 replicas"));

        harness.edit("db", |spec| spec.replicas = None);
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert!(harness.client.stateful_set(TEST_NAMESPACE, "db-replica").is_none());
        assert!(harness.client.stateful_set(TEST_NAMESPACE, "db").is_some());
    }

    #[tokio::test]
    async fn test_deletion_cleans_up_and_releases_finalizer() {
        let harness = TestHarness::new();
        harness.add(database_with_auth_and_ingress("db", "a.example.com"));
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        harness.client.add_persistent_volume_claim(claim("db-pvc-db-0", "db"));
        harness.client.add_persistent_volume_claim(claim("other-pvc-other-0", "other"));

        harness.client.request_database_deletion(TEST_NAMESPACE, "db").unwrap();
        assert!(harness.client.database(TEST_NAMESPACE, "db").is_some());

        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);

        assert!(!harness.client.has_persistent_volume_claim(TEST_NAMESPACE, "db-pvc-db-0"));
        assert!(harness.client.has_persistent_volume_claim(TEST_NAMESPACE, "other-pvc-other-0"));
        assert!(harness.client.secret(TEST_NAMESPACE, "db-auth-key").is_none());
        assert!(harness.client.database(TEST_NAMESPACE, "db").is_none());

        let deleting = harness.recorder.with_reason("Deleting");
        assert_eq!(deleting.len(), 1);
        assert_eq!(deleting[0].event_type, EventType::Warning);
        assert_eq!(deleting[0].note, "Custom Resource db is being deleted from the namespace default");

        // Degraded/Unknown then Degraded/True
        let ops = harness.client.operations();
        let status_writes = ops.iter().filter(|op| op.starts_with("update_database_status")).count();
        assert!(status_writes >= 2);
        let last_status = ops.iter().rposition(|op| op.starts_with("update_database_status")).unwrap();
        let finalizer_write = ops.iter().rposition(|op| op.starts_with("update_database_finalizers")).unwrap();
        let pvc_delete = ops.iter().position(|op| op.starts_with("delete_persistent_volume_claim")).unwrap();
        assert!(pvc_delete < finalizer_write);
        assert!(last_status < finalizer_write);
    }

    #[tokio::test]
    async fn test_failed_claim_deletion_does_not_block_finalization() {
        let harness = TestHarness::new();
        harness.add(database("db"));
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        harness.client.add_persistent_volume_claim(claim("a", "db"));
        harness.client.add_persistent_volume_claim(claim("b", "db"));
        harness.client.fail_next(
            "delete_persistent_volume_claim",
            StoreError::Api("storage busy".to_string()),
        );

        harness.client.request_database_deletion(TEST_NAMESPACE, "db").unwrap();
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();

        assert!(harness.client.has_persistent_volume_claim(TEST_NAMESPACE, "a"));
        assert!(!harness.client.has_persistent_volume_claim(TEST_NAMESPACE, "b"));
        assert!(harness.client.database(TEST_NAMESPACE, "db").is_none());
    }

    #[tokio::test]
    async fn test_claim_listing_failure_keeps_finalizer() {
        let harness = TestHarness::new();
        harness.add(database("db"));
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        harness.client.add_persistent_volume_claim(claim("db-pvc-db-0", "db"));
        harness.client.fail_next(
            "list_persistent_volume_claims",
            StoreError::Api("apiserver unavailable".to_string()),
        );

        harness.client.request_database_deletion(TEST_NAMESPACE, "db").unwrap();
        let result = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await;
        assert!(matches!(result, Err(ControllerError::Store(StoreError::Api(_)))));

        let current = harness.current("db");
        assert!(current.metadata.finalizers.as_ref().unwrap().contains(&FINALIZER.to_string()));
        assert!(harness.client.has_persistent_volume_claim(TEST_NAMESPACE, "db-pvc-db-0"));

        // The retry sees the claims and releases the record
        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(!harness.client.has_persistent_volume_claim(TEST_NAMESPACE, "db-pvc-db-0"));
        assert!(harness.client.database(TEST_NAMESPACE, "db").is_none());
    }

    #[tokio::test]
    async fn test_deletion_without_finalizer_is_left_alone() {
        let harness = TestHarness::new();
        let mut db = database("db");
        db.metadata.deletion_timestamp =
            Some(serde_json::from_value::<Time>(serde_json::json!("2024-01-01T00:00:00Z")).unwrap());
        db.metadata.finalizers = Some(vec!["other.io/keep".to_string()]);
        db.status = Some(crds::DatabaseStatus {
            conditions: vec![crds::DatabaseCondition {
                type_: ConditionType::Available,
                status: ConditionStatus::True,
                reason: "Reconciling".to_string(),
                message: "ok".to_string(),
                observed_generation: Some(1),
                last_transition_time: chrono::Utc::now(),
            }],
        });
        harness.add(db);

        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(harness.client.operations(), vec!["get_database default/db".to_string()]);
        assert!(harness.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_status_conflict_requeues() {
        let harness = TestHarness::new();
        harness.add(database("db"));
        harness
            .client
            .fail_next("update_database_status", StoreError::Conflict("stale".to_string()));

        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Requeue);
        assert_eq!(harness.client.count("update_database_finalizers"), 0);
    }

    #[tokio::test]
    async fn test_stale_database_copy_requeues() {
        let harness = TestHarness::new();
        harness.add(database("db"));
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();

        // The StatefulSet write loses a race with another writer
        harness.edit("db", |spec| spec.image = "img:v2".to_string());
        harness
            .client
            .fail_next("replace_stateful_set", StoreError::Conflict("stale".to_string()));

        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Requeue);
        assert!(harness.recorder.with_reason("ReconcileFailed").is_empty());

        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        let sts = harness.client.stateful_set(TEST_NAMESPACE, "db").unwrap();
        let image = sts.spec.unwrap().template.spec.unwrap().containers[0].image.clone();
        assert_eq!(image.as_deref(), Some("img:v2"));
    }

    #[tokio::test]
    async fn test_child_failure_aborts_and_records_event() {
        let harness = TestHarness::new();
        harness.add(database_with_auth_and_ingress("db", "a.example.com"));
        harness
            .client
            .fail_next("create_service", StoreError::Api("quota exceeded".to_string()));

        let err = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap_err();
        assert!(matches!(err, ControllerError::Store(StoreError::Api(_))));
        assert!(harness.client.ingress(TEST_NAMESPACE, "db-ingress").is_none());

        let failed = harness.recorder.with_reason("ReconcileFailed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].event_type, EventType::Warning);

        let current = harness.current("db");
        let available = find_condition(&current, ConditionType::Available).unwrap();
        assert_eq!(available.status, ConditionStatus::Unknown);

        // Retry converges
        let outcome = harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(harness.client.ingress(TEST_NAMESPACE, "db-ingress").is_some());
    }

    #[tokio::test]
    async fn test_finalizer_added_before_children() {
        let harness = TestHarness::new();
        harness.add(database("db"));
        harness.reconciler.reconcile(TEST_NAMESPACE, "db").await.unwrap();

        let ops = harness.client.operations();
        let finalizer = ops.iter().position(|op| op.starts_with("update_database_finalizers")).unwrap();
        let first_create = ops.iter().position(|op| op.starts_with("create_")).unwrap();
        assert!(finalizer < first_create);
    }
}
