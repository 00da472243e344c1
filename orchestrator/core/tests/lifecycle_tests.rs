// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

use picoclaw_core::application::lifecycle::{
    CreateStatus, DeleteStatus, LifecycleError, LifecycleSettings, TenantLifecycleService,
    STATUS_NOT_FOUND,
};
use picoclaw_core::domain::gateway_config::{ConfigComposer, PolicyDefaults, ProviderProfile, ProviderSecret};
use picoclaw_core::domain::manager_config::CreatePolicy;
use picoclaw_core::domain::runtime::ContainerStatus;
use picoclaw_core::domain::tenant::{ResourceNamer, TenantId, TenantRequest};
use picoclaw_core::domain::workspace::{WorkspaceLayout, API_REFERENCE_FILE, PERSONA_FILE, TOOLS_FILE};
use picoclaw_core::infrastructure::in_memory_runtime::{InMemoryRuntime, RuntimeCall};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const CONTAINER_42: &str = "picoclaw-client-42";

struct Harness {
    _temp: TempDir,
    data_root: PathBuf,
    skills_root: PathBuf,
    runtime: Arc<InMemoryRuntime>,
    service: TenantLifecycleService,
}

impl Harness {
    fn new(policy: CreatePolicy) -> Self {
        Self::with_runtime(policy, InMemoryRuntime::new())
    }

    fn with_runtime(policy: CreatePolicy, runtime: InMemoryRuntime) -> Self {
        let temp = TempDir::new().unwrap();
        let data_root = temp.path().join("data");
        let skills_root = temp.path().join("skills");
        let runtime = Arc::new(runtime);

        let composer = ConfigComposer::new(
            ProviderProfile::Groq,
            ProviderSecret::new("gsk-upstream").unwrap(),
            PolicyDefaults::default(),
        );
        let settings = LifecycleSettings {
            image: "sipeed/picoclaw:latest".to_string(),
            command: Some(vec!["gateway".to_string()]),
            memory_limit_bytes: 512 * 1024 * 1024,
            owner_label: "flyclawd".to_string(),
            create_policy: policy,
            workspace_layout: WorkspaceLayout::Split,
            skill_path: Some(skills_root.join("flyapp").join("SKILL.md")),
            host_skills_dir: Some(skills_root.clone()),
        };
        let namer = ResourceNamer::new("picoclaw", "picoclaw-net", &data_root, &data_root);
        let service = TenantLifecycleService::new(runtime.clone(), namer, composer, settings);

        Self { _temp: temp, data_root, skills_root, runtime, service }
    }

    fn tenant_dir(&self, id: u64) -> PathBuf {
        self.data_root.join(format!("picoclaw-client-{}", id))
    }

    fn read(&self, id: u64, relative: &str) -> String {
        std::fs::read_to_string(self.tenant_dir(id).join(relative)).unwrap()
    }

    fn write_skill(&self, content: &str) {
        let dir = self.skills_root.join("flyapp");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("SKILL.md"), content).unwrap();
    }

    async fn calls_for(&self, container: &str) -> Vec<RuntimeCall> {
        self.runtime
            .calls()
            .await
            .into_iter()
            .filter(|call| match call {
                RuntimeCall::InspectContainer(n)
                | RuntimeCall::RemoveContainer(n)
                | RuntimeCall::RunContainer(n)
                | RuntimeCall::ContainerLogs(n) => n == container,
                _ => false,
            })
            .collect()
    }
}

fn acme() -> TenantRequest {
    TenantRequest::new(TenantId(42), "Acme Flowers", "T", "99", "K", "https://api.acme/").unwrap()
}

fn request(id: u64, name: &str, key: &str) -> TenantRequest {
    TenantRequest::new(TenantId(id), name, "bot-token", "1001", key, "https://api.example/").unwrap()
}

fn workspace_file(name: &str) -> String {
    Path::new("workspace").join(name).to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_end_to_end_acme_scenario() {
    let h = Harness::new(CreatePolicy::ForceRecreate);

    let outcome = h.service.create_tenant(acme()).await.unwrap();
    assert_eq!(outcome.container_id, CONTAINER_42);
    assert_eq!(outcome.status, CreateStatus::Running);

    let config: serde_json::Value = serde_json::from_str(&h.read(42, "config/config.json")).unwrap();
    assert_eq!(config["channels"]["telegram"]["allowFrom"], serde_json::json!(["99"]));
    assert_eq!(config["providers"]["groq"]["api_key"], "gsk-upstream");

    let soul = h.read(42, &workspace_file(PERSONA_FILE));
    let tools = h.read(42, &workspace_file(TOOLS_FILE));
    assert!(soul.contains("Acme Flowers"));
    assert!(tools.contains("`K`"));
    assert!(!soul.contains("`K`"));

    assert!(h.runtime.has_network("picoclaw-net").await);
    let serialized = serde_json::to_value(&outcome).unwrap();
    assert_eq!(serialized, serde_json::json!({"container_id": CONTAINER_42, "status": "running"}));
}

#[tokio::test]
async fn test_reuse_if_running_short_circuits() {
    let h = Harness::new(CreatePolicy::ReuseIfRunning);
    h.service.create_tenant(acme()).await.unwrap();

    let sentinel = h.tenant_dir(42).join("workspace").join("notes.md");
    std::fs::write(&sentinel, "agent memory").unwrap();
    let calls_before = h.runtime.calls().await.len();

    let second = h.service.create_tenant(request(42, "Renamed", "K2")).await.unwrap();
    assert_eq!(second.status, CreateStatus::AlreadyRunning);
    assert_eq!(
        serde_json::to_value(&second).unwrap()["status"],
        serde_json::json!("already_running")
    );

    let calls = h.runtime.calls().await;
    assert_eq!(calls[calls_before..], [RuntimeCall::InspectContainer(CONTAINER_42.to_string())]);
    assert!(sentinel.exists());
    assert!(h.read(42, &workspace_file(PERSONA_FILE)).contains("Acme Flowers"));
}

#[tokio::test]
async fn test_reuse_if_running_replaces_stopped_container() {
    let h = Harness::new(CreatePolicy::ReuseIfRunning);
    h.service.create_tenant(acme()).await.unwrap();
    h.runtime.set_status(CONTAINER_42, ContainerStatus::Exited).await;

    let outcome = h.service.create_tenant(acme()).await.unwrap();
    assert_eq!(outcome.status, CreateStatus::Running);
    assert_eq!(h.service.tenant_health(TenantId(42)).await.unwrap().status, "running");
}

#[tokio::test]
async fn test_force_recreate_removes_once_and_leaves_no_residue() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    h.service.create_tenant(request(42, "Old Shop", "OLDKEY")).await.unwrap();

    let sentinel = h.tenant_dir(42).join("workspace").join("notes.md");
    std::fs::write(&sentinel, "stale").unwrap();
    let before = h.calls_for(CONTAINER_42).await.len();

    let outcome = h.service.create_tenant(request(42, "New Shop", "NEWKEY")).await.unwrap();
    assert_eq!(outcome.status, CreateStatus::Running);

    let calls = h.calls_for(CONTAINER_42).await;
    assert_eq!(
        calls[before..],
        [
            RuntimeCall::InspectContainer(CONTAINER_42.to_string()),
            RuntimeCall::RemoveContainer(CONTAINER_42.to_string()),
            RuntimeCall::RunContainer(CONTAINER_42.to_string()),
        ]
    );

    assert!(!sentinel.exists());
    let soul = h.read(42, &workspace_file(PERSONA_FILE));
    let tools = h.read(42, &workspace_file(TOOLS_FILE));
    assert!(soul.contains("New Shop") && !soul.contains("Old Shop"));
    assert!(tools.contains("NEWKEY") && !tools.contains("OLDKEY"));
}

#[tokio::test]
async fn test_force_recreate_replaces_running_container() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    h.service.create_tenant(acme()).await.unwrap();
    let first_id = h.runtime.container_id(CONTAINER_42).await.unwrap();

    h.service.create_tenant(acme()).await.unwrap();
    let second_id = h.runtime.container_id(CONTAINER_42).await.unwrap();
    assert_ne!(first_id, second_id);
    assert_eq!(h.runtime.container_names().await, vec![CONTAINER_42.to_string()]);
}

#[tokio::test]
async fn test_skill_reference_is_folded_in_without_front_matter() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    h.write_skill("---\nname: flyapp\ndescription: Orders API\n---\n\n# Orders\nwget -qO- $BASE/orders\n");

    h.service.create_tenant(acme()).await.unwrap();
    assert_eq!(
        h.read(42, &workspace_file(API_REFERENCE_FILE)),
        "# Orders\nwget -qO- $BASE/orders"
    );
}

#[tokio::test]
async fn test_missing_skill_is_not_fatal() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    h.service.create_tenant(acme()).await.unwrap();
    assert!(!h.tenant_dir(42).join("workspace").join(API_REFERENCE_FILE).exists());
}

#[tokio::test]
async fn test_delete_without_cleanup_keeps_directory() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    h.service.create_tenant(acme()).await.unwrap();

    let outcome = h.service.delete_tenant(TenantId(42), false).await.unwrap();
    assert_eq!(outcome.container_id, CONTAINER_42);
    assert_eq!(outcome.status, DeleteStatus::Removed);
    assert!(h.tenant_dir(42).join("config").join("config.json").exists());
    assert!(h.runtime.container_names().await.is_empty());
}

#[tokio::test]
async fn test_delete_with_cleanup_removes_directory() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    h.service.create_tenant(acme()).await.unwrap();

    h.service.delete_tenant(TenantId(42), true).await.unwrap();
    assert!(!h.tenant_dir(42).exists());
}

#[tokio::test]
async fn test_delete_missing_tenant_is_not_found() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    std::fs::create_dir_all(h.tenant_dir(7)).unwrap();

    for cleanup in [false, true] {
        let err = h.service.delete_tenant(TenantId(7), cleanup).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { ref container } if container == "picoclaw-client-7"));
    }
    assert!(h.tenant_dir(7).exists());
}

#[tokio::test]
async fn test_concurrent_creates_are_serialized() {
    let h = Harness::with_runtime(
        CreatePolicy::ForceRecreate,
        InMemoryRuntime::with_run_delay(Duration::from_millis(25)),
    );

    let first = h.service.clone();
    let second = h.service.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.create_tenant(request(42, "Alpha Shop", "ALPHAKEY")).await }),
        tokio::spawn(async move { second.create_tenant(request(42, "Beta Shop", "BETAKEY")).await }),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    assert_eq!(h.runtime.container_names().await, vec![CONTAINER_42.to_string()]);

    // Each create's inspect must come after the previous create's run.
    let calls = h.calls_for(CONTAINER_42).await;
    assert_eq!(
        calls,
        vec![
            RuntimeCall::InspectContainer(CONTAINER_42.to_string()),
            RuntimeCall::RunContainer(CONTAINER_42.to_string()),
            RuntimeCall::InspectContainer(CONTAINER_42.to_string()),
            RuntimeCall::RemoveContainer(CONTAINER_42.to_string()),
            RuntimeCall::RunContainer(CONTAINER_42.to_string()),
        ]
    );

    let soul = h.read(42, &workspace_file(PERSONA_FILE));
    let tools = h.read(42, &workspace_file(TOOLS_FILE));
    let alpha = soul.contains("Alpha Shop");
    let beta = soul.contains("Beta Shop");
    assert!(alpha ^ beta, "persona mixes both requests");
    if alpha {
        assert!(tools.contains("ALPHAKEY") && !tools.contains("BETAKEY"));
    } else {
        assert!(tools.contains("BETAKEY") && !tools.contains("ALPHAKEY"));
    }
}

#[tokio::test]
async fn test_dropped_caller_does_not_interrupt_create() {
    let h = Harness::with_runtime(
        CreatePolicy::ForceRecreate,
        InMemoryRuntime::with_run_delay(Duration::from_millis(100)),
    );

    let abandoned = tokio::time::timeout(Duration::from_millis(10), h.service.create_tenant(acme())).await;
    assert!(abandoned.is_err(), "create finished before the caller gave up");

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(h.runtime.container_names().await, vec![CONTAINER_42.to_string()]);
    assert!(h.read(42, "config/config.json").contains("\"99\""));
    assert!(h.read(42, &workspace_file(PERSONA_FILE)).contains("Acme Flowers"));
    assert!(h.read(42, &workspace_file(TOOLS_FILE)).contains("K"));

    // The next create waits for the lock instead of racing the orphaned one.
    let outcome = h.service.create_tenant(acme()).await.unwrap();
    assert_eq!(outcome.status, CreateStatus::Running);
    assert_eq!(h.runtime.container_names().await.len(), 1);
}

#[tokio::test]
async fn test_different_tenants_run_in_parallel() {
    let h = Harness::with_runtime(
        CreatePolicy::ForceRecreate,
        InMemoryRuntime::with_run_delay(Duration::from_millis(200)),
    );

    let started = std::time::Instant::now();
    let results = futures::future::join_all(
        (1..=4u64).map(|id| h.service.create_tenant(request(id, "Shop", "KEY"))),
    )
    .await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(h.runtime.container_names().await.len(), 4);
    assert!(started.elapsed() < Duration::from_millis(700));
}

#[tokio::test]
async fn test_network_create_race_is_benign() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    h.runtime.simulate_network_race().await;

    let outcome = h.service.create_tenant(acme()).await.unwrap();
    assert_eq!(outcome.status, CreateStatus::Running);
}

#[tokio::test]
async fn test_health_mapping() {
    let h = Harness::new(CreatePolicy::ForceRecreate);

    let absent = h.service.tenant_health(TenantId(42)).await.unwrap();
    assert_eq!(absent.status, STATUS_NOT_FOUND);
    assert!(!absent.healthy);

    h.service.create_tenant(acme()).await.unwrap();
    let running = h.service.tenant_health(TenantId(42)).await.unwrap();
    assert_eq!(running.status, "running");
    assert!(running.healthy);

    for status in ["exited", "restarting", "paused"] {
        h.runtime.set_status(CONTAINER_42, ContainerStatus::from_runtime(status)).await;
        let health = h.service.tenant_health(TenantId(42)).await.unwrap();
        assert_eq!(health.status, status);
        assert!(!health.healthy);
    }
}

#[tokio::test]
async fn test_logs_are_decoded_lossily() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    h.service.create_tenant(acme()).await.unwrap();
    h.runtime
        .set_logs(CONTAINER_42, b"boot\nbad byte \xff\nready\n".to_vec())
        .await;

    let logs = h.service.tenant_logs(TenantId(42), 2).await.unwrap();
    assert_eq!(logs.container_id, CONTAINER_42);
    assert_eq!(logs.logs, "bad byte \u{FFFD}\nready\n");
}

#[tokio::test]
async fn test_logs_for_missing_tenant_is_not_found() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    let err = h.service.tenant_logs(TenantId(3), 100).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
}

#[tokio::test]
async fn test_write_failure_starts_no_container() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    // A file where the data root should be makes every directory write fail.
    std::fs::write(&h.data_root, "not a directory").unwrap();

    let err = h.service.create_tenant(acme()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::ConfigurationWrite(_)));
    assert!(!h
        .runtime
        .calls()
        .await
        .contains(&RuntimeCall::RunContainer(CONTAINER_42.to_string())));
}

#[tokio::test]
async fn test_runtime_unavailable_surfaces_distinctly() {
    let h = Harness::new(CreatePolicy::ForceRecreate);
    h.runtime.set_unavailable(true).await;

    assert!(matches!(
        h.service.create_tenant(acme()).await.unwrap_err(),
        LifecycleError::RuntimeUnavailable(_)
    ));
    assert!(matches!(
        h.service.tenant_health(TenantId(42)).await.unwrap_err(),
        LifecycleError::RuntimeUnavailable(_)
    ));
}
