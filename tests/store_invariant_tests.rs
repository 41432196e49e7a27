//! Store Invariant Tests
//!
//! Write API edge cases: clamping, counter initialization, idempotent
//! deletes, patch semantics, tenant scoping, and the read-only admin views.
//!
//! Run with: cargo test --test store_invariant_tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use smriti_memory::config::TemporalConfig;
use smriti_memory::memory::{
    ChatContent, ChatRole, EpisodicContent, MemoryContent, MemoryItem, MemoryKind,
    ProceduralContent, ResourceContent, SemanticContent, TenantScope, VaultContent,
};
use smriti_memory::store::admin::DistributionField;
use smriti_memory::store::write::{CreateRequest, UpdatePatch};
use smriti_memory::store::MemoryStore;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap()
}

async fn open_store(dir: &TempDir) -> Arc<MemoryStore> {
    let url = format!("sqlite:{}", dir.path().join("smriti.db").display());
    Arc::new(MemoryStore::open_at(&url, 5, 4).await.unwrap())
}

fn sample_content(kind: MemoryKind) -> MemoryContent {
    match kind {
        MemoryKind::Chat => MemoryContent::Chat(ChatContent {
            session_id: "sess-1".to_string(),
            role: ChatRole::Assistant,
            content: "the staging cluster is back up".to_string(),
            content_embedding: Some(vec![0.1, 0.2, 0.3, 0.4]),
        }),
        MemoryKind::Episodic => MemoryContent::Episodic(EpisodicContent {
            actor: "deploy-bot".to_string(),
            event_type: "release".to_string(),
            summary: "shipped v2.3".to_string(),
            details: "canary then full rollout".to_string(),
            tree_path: vec!["releases".to_string(), "2026".to_string()],
            summary_embedding: Some(vec![1.0, 0.0, 0.0, 0.0]),
            details_embedding: None,
        }),
        MemoryKind::Semantic => MemoryContent::Semantic(SemanticContent {
            name: "primary-region".to_string(),
            summary: "prod runs in eu-west-1".to_string(),
            details: "failover in eu-central-1".to_string(),
            source: Some("runbook".to_string()),
            tree_path: vec!["infra".to_string()],
            summary_embedding: None,
            details_embedding: Some(vec![0.0, 1.0, 0.0, 0.0]),
        }),
        MemoryKind::Procedural => MemoryContent::Procedural(ProceduralContent {
            skill_name: "rotate-keys".to_string(),
            description: "quarterly key rotation".to_string(),
            steps: vec!["freeze writes".to_string(), "rotate".to_string(), "unfreeze".to_string()],
            description_embedding: None,
        }),
        MemoryKind::Resource => MemoryContent::Resource(ResourceContent {
            resource_name: "grafana".to_string(),
            description: "main dashboard".to_string(),
            resource_type: "url".to_string(),
            location: "https://grafana.internal/d/main".to_string(),
            description_embedding: None,
        }),
        MemoryKind::KnowledgeVault => MemoryContent::KnowledgeVault(VaultContent {
            title: "oncall handbook".to_string(),
            content: "escalation ladder and contacts".to_string(),
            vault_type: "document".to_string(),
            content_embedding: Some(vec![0.5, 0.5, 0.5, 0.5]),
        }),
    }
}

async fn create(
    store: &MemoryStore,
    config: &TemporalConfig,
    tenant: TenantScope,
    content: MemoryContent,
    importance: Option<f64>,
    now: DateTime<Utc>,
) -> MemoryItem {
    store
        .create(
            config,
            CreateRequest {
                tenant,
                content,
                importance_score: importance,
                metadata: None,
                occurred_at: None,
            },
            now,
        )
        .await
        .unwrap()
}

// ============================================================================
// CREATE
// ============================================================================

#[tokio::test]
async fn create_then_get_roundtrips_every_kind() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::user("org-a", "alice");

    for kind in MemoryKind::ALL {
        let created = create(
            &store,
            &config,
            tenant.clone(),
            sample_content(kind),
            None,
            t0(),
        )
        .await;

        assert_eq!(created.kind(), kind);
        assert_eq!(created.access_count, 0);
        assert_eq!(created.rehearsal_count, 0);
        assert!(created.last_accessed_at.is_none());
        assert_eq!(created.importance_score, 0.5);
        assert_eq!(created.last_modified.operation, "created");

        let fetched = store.get(&tenant, &created.id).await.unwrap();
        assert_eq!(fetched.kind(), kind);
        assert_eq!(fetched.created_at, created.created_at);
        assert_eq!(
            serde_json::to_value(&fetched.content).unwrap(),
            serde_json::to_value(&created.content).unwrap(),
            "content did not roundtrip for {kind}"
        );
    }
}

#[tokio::test]
async fn create_clamps_importance_into_configured_range() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");

    let over = create(
        &store,
        &config,
        tenant.clone(),
        sample_content(MemoryKind::Semantic),
        Some(1.7),
        t0(),
    )
    .await;
    assert_eq!(over.importance_score, 1.0);

    let under = create(
        &store,
        &config,
        tenant.clone(),
        sample_content(MemoryKind::Semantic),
        Some(-0.3),
        t0(),
    )
    .await;
    assert_eq!(under.importance_score, 0.0);
}

#[tokio::test]
async fn occurred_at_pins_creation_time_for_event_kinds_only() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");
    let event_time = t0() - Duration::days(10);

    for kind in [MemoryKind::Chat, MemoryKind::Episodic] {
        let item = store
            .create(
                &config,
                CreateRequest {
                    tenant: tenant.clone(),
                    content: sample_content(kind),
                    importance_score: None,
                    metadata: None,
                    occurred_at: Some(event_time),
                },
                t0(),
            )
            .await
            .unwrap();
        assert_eq!(item.created_at, event_time, "{kind} should honor occurred_at");
    }

    let semantic = store
        .create(
            &config,
            CreateRequest {
                tenant: tenant.clone(),
                content: sample_content(MemoryKind::Semantic),
                importance_score: None,
                metadata: None,
                occurred_at: Some(event_time),
            },
            t0(),
        )
        .await
        .unwrap();
    assert_eq!(semantic.created_at, t0(), "semantic items use insertion time");
}

#[tokio::test]
async fn create_rejects_invalid_fields() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();

    // Empty content field
    let err = store
        .create(
            &config,
            CreateRequest {
                tenant: TenantScope::org("org-a"),
                content: MemoryContent::Chat(ChatContent {
                    session_id: "sess-1".to_string(),
                    role: ChatRole::User,
                    content: "   ".to_string(),
                    content_embedding: None,
                }),
                importance_score: None,
                metadata: None,
                occurred_at: None,
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVARIANT_VIOLATION");

    // Embedding over D_max
    let err = store
        .create(
            &config,
            CreateRequest {
                tenant: TenantScope::org("org-a"),
                content: MemoryContent::Chat(ChatContent {
                    session_id: "sess-1".to_string(),
                    role: ChatRole::User,
                    content: "hello".to_string(),
                    content_embedding: Some(vec![0.5; 64]),
                }),
                importance_score: None,
                metadata: None,
                occurred_at: None,
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVARIANT_VIOLATION");

    // Malformed tenant
    let err = store
        .create(
            &config,
            CreateRequest {
                tenant: TenantScope::org("org a"),
                content: sample_content(MemoryKind::Semantic),
                importance_score: None,
                metadata: None,
                occurred_at: None,
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVARIANT_VIOLATION");
}

// ============================================================================
// UPDATE
// ============================================================================

#[tokio::test]
async fn empty_patch_only_touches_last_modified() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");

    let created = create(
        &store,
        &config,
        tenant.clone(),
        sample_content(MemoryKind::Procedural),
        Some(0.7),
        t0(),
    )
    .await;

    let later = t0() + Duration::hours(1);
    let updated = store
        .update(&config, &tenant, &created.id, UpdatePatch::default(), later)
        .await
        .unwrap();

    assert_eq!(updated.importance_score, 0.7);
    assert_eq!(
        serde_json::to_value(&updated.content).unwrap(),
        serde_json::to_value(&created.content).unwrap()
    );
    assert_eq!(updated.last_modified.operation, "updated");
    assert_eq!(updated.last_modified.timestamp, later);
    assert_eq!(updated.access_count, 0);
}

#[tokio::test]
async fn patch_updates_fields_under_invariants() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");

    let created = create(
        &store,
        &config,
        tenant.clone(),
        sample_content(MemoryKind::KnowledgeVault),
        None,
        t0(),
    )
    .await;

    let updated = store
        .update(
            &config,
            &tenant,
            &created.id,
            UpdatePatch {
                content: Some(MemoryContent::KnowledgeVault(VaultContent {
                    title: "oncall handbook v2".to_string(),
                    content: "rewritten ladder".to_string(),
                    vault_type: "document".to_string(),
                    content_embedding: None,
                })),
                importance_score: Some(2.5),
                metadata: Some(json!({"revision": 2})),
            },
            t0() + Duration::hours(2),
        )
        .await
        .unwrap();

    assert_eq!(updated.importance_score, 1.0, "importance clamps on update");
    assert_eq!(updated.metadata, json!({"revision": 2}));
    match &updated.content {
        MemoryContent::KnowledgeVault(v) => {
            assert_eq!(v.title, "oncall handbook v2");
            // Embedding omitted from the patch is carried over.
            assert!(v.content_embedding.is_some());
        }
        other => panic!("unexpected kind: {:?}", other.kind()),
    }

    let fetched = store.get(&tenant, &created.id).await.unwrap();
    assert_eq!(fetched.metadata, json!({"revision": 2}));
}

#[tokio::test]
async fn patch_with_mismatched_kind_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");

    let created = create(
        &store,
        &config,
        tenant.clone(),
        sample_content(MemoryKind::Resource),
        None,
        t0(),
    )
    .await;

    let err = store
        .update(
            &config,
            &tenant,
            &created.id,
            UpdatePatch {
                content: Some(sample_content(MemoryKind::Chat)),
                importance_score: None,
                metadata: None,
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVARIANT_VIOLATION");
}

#[tokio::test]
async fn update_of_missing_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();

    let err = store
        .update(
            &config,
            &TenantScope::org("org-a"),
            "no-such-id",
            UpdatePatch::default(),
            t0(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

// ============================================================================
// DELETE
// ============================================================================

#[tokio::test]
async fn delete_is_idempotent_and_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");

    let created = create(
        &store,
        &config,
        tenant.clone(),
        sample_content(MemoryKind::Chat),
        None,
        t0(),
    )
    .await;

    assert!(store.delete(&tenant, &created.id).await.unwrap());
    assert!(!store.delete(&tenant, &created.id).await.unwrap());

    let err = store.get(&tenant, &created.id).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(store.count_items(&tenant, None).await.unwrap(), 0);
}

#[tokio::test]
async fn reads_and_deletes_respect_tenant_scope() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let owner = TenantScope::user("org-a", "alice");

    let created = create(
        &store,
        &config,
        owner.clone(),
        sample_content(MemoryKind::Semantic),
        None,
        t0(),
    )
    .await;

    // Wrong organization: invisible.
    let err = store
        .get(&TenantScope::org("org-b"), &created.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    // Wrong user in the right organization: invisible and undeletable.
    let foreign = TenantScope::user("org-a", "bob");
    assert!(store.get(&foreign, &created.id).await.is_err());
    assert!(!store.delete(&foreign, &created.id).await.unwrap());

    // Organization-wide scope still sees it.
    assert!(store.get(&TenantScope::org("org-a"), &created.id).await.is_ok());
    assert!(store.delete(&owner, &created.id).await.unwrap());
}

// ============================================================================
// ADMIN VIEWS
// ============================================================================

#[tokio::test]
async fn counts_per_kind_and_total() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");

    for _ in 0..3 {
        create(&store, &config, tenant.clone(), sample_content(MemoryKind::Chat), None, t0()).await;
    }
    create(&store, &config, tenant.clone(), sample_content(MemoryKind::Resource), None, t0()).await;

    assert_eq!(
        store.count_items(&tenant, Some(MemoryKind::Chat)).await.unwrap(),
        3
    );
    assert_eq!(
        store
            .count_items(&tenant, Some(MemoryKind::Resource))
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        store
            .count_items(&tenant, Some(MemoryKind::Procedural))
            .await
            .unwrap(),
        0
    );
    assert_eq!(store.count_items(&tenant, None).await.unwrap(), 4);
}

#[tokio::test]
async fn forgettable_counts_group_by_reason() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");

    // Past max age; low-score but within age; healthy.
    for (importance, days_ago) in [(0.9, 400), (0.2, 30), (0.9, 0)] {
        store
            .create(
                &config,
                CreateRequest {
                    tenant: tenant.clone(),
                    content: sample_content(MemoryKind::Episodic),
                    importance_score: Some(importance),
                    metadata: None,
                    occurred_at: Some(t0() - Duration::days(days_ago)),
                },
                t0(),
            )
            .await
            .unwrap();
    }

    let stats = store
        .forgettable_count(&config, &tenant, Some(MemoryKind::Episodic), t0())
        .await
        .unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.exceeded_max_age, 1);
    assert_eq!(stats.below_threshold, 1);
}

#[tokio::test]
async fn importance_distribution_buckets_items() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");

    for importance in [0.05, 0.15, 0.15, 0.95, 1.0] {
        create(
            &store,
            &config,
            tenant.clone(),
            sample_content(MemoryKind::Semantic),
            Some(importance),
            t0(),
        )
        .await;
    }

    let histogram = store
        .distribution(
            &tenant,
            MemoryKind::Semantic,
            DistributionField::ImportanceScore,
            t0(),
        )
        .await
        .unwrap();

    assert_eq!(histogram.total, 5);
    assert_eq!(histogram.buckets[0].count, 1); // 0.0-0.1
    assert_eq!(histogram.buckets[1].count, 2); // 0.1-0.2
    assert_eq!(histogram.buckets[9].count, 2); // 0.9+
}

#[tokio::test]
async fn age_distribution_uses_the_shared_clock() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();
    let tenant = TenantScope::org("org-a");

    for days_ago in [0, 3, 45, 400] {
        store
            .create(
                &config,
                CreateRequest {
                    tenant: tenant.clone(),
                    content: sample_content(MemoryKind::Episodic),
                    importance_score: None,
                    metadata: None,
                    occurred_at: Some(t0() - Duration::days(days_ago)),
                },
                t0(),
            )
            .await
            .unwrap();
    }

    let histogram = store
        .distribution(&tenant, MemoryKind::Episodic, DistributionField::AgeDays, t0())
        .await
        .unwrap();

    assert_eq!(histogram.total, 4);
    assert_eq!(histogram.buckets[0].count, 1); // 0-1d
    assert_eq!(histogram.buckets[1].count, 1); // 1-7d
    assert_eq!(histogram.buckets[3].count, 1); // 30-90d
    assert_eq!(histogram.buckets[5].count, 1); // 365d+
}

#[tokio::test]
async fn organizations_are_listed_across_kind_tables() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let config = TemporalConfig::default();

    create(&store, &config, TenantScope::org("org-a"), sample_content(MemoryKind::Chat), None, t0()).await;
    create(&store, &config, TenantScope::org("org-b"), sample_content(MemoryKind::Resource), None, t0()).await;
    create(&store, &config, TenantScope::org("org-b"), sample_content(MemoryKind::Chat), None, t0()).await;

    let organizations = store.list_organizations().await.unwrap();
    assert_eq!(organizations, vec!["org-a".to_string(), "org-b".to_string()]);
}
