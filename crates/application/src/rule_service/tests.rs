use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use fluxgate_core::{AppError, AppResult};
use fluxgate_domain::{
    LimitScope, OnLimitExceedPolicy, RateLimitRule, RuleChangeEvent, RuleChangeScope,
};

use crate::{RateLimitBandInput, RuleChangeNotifier, RuleInput, RuleRepository};

use super::RuleService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepositoryMode {
    Healthy,
    Failing,
    Slow,
}

struct FakeRuleRepository {
    rules: Mutex<BTreeMap<String, RateLimitRule>>,
    saves: Mutex<Vec<String>>,
    mode: RepositoryMode,
}

impl FakeRuleRepository {
    fn new(mode: RepositoryMode) -> Self {
        Self {
            rules: Mutex::new(BTreeMap::new()),
            saves: Mutex::new(Vec::new()),
            mode,
        }
    }

    async fn guard(&self) -> AppResult<()> {
        match self.mode {
            RepositoryMode::Healthy => Ok(()),
            RepositoryMode::Failing => Err(AppError::Internal("connection refused".to_owned())),
            RepositoryMode::Slow => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RuleRepository for FakeRuleRepository {
    async fn find_all(&self) -> AppResult<Vec<RateLimitRule>> {
        self.guard().await?;
        Ok(self.rules.lock().await.values().cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<RateLimitRule>> {
        self.guard().await?;
        Ok(self.rules.lock().await.get(id).cloned())
    }

    async fn find_by_rule_set_id(&self, rule_set_id: &str) -> AppResult<Vec<RateLimitRule>> {
        self.guard().await?;
        Ok(self
            .rules
            .lock()
            .await
            .values()
            .filter(|rule| rule.rule_set_id() == Some(rule_set_id))
            .cloned()
            .collect())
    }

    async fn exists_by_id(&self, id: &str) -> AppResult<bool> {
        self.guard().await?;
        Ok(self.rules.lock().await.contains_key(id))
    }

    async fn save(&self, rule: RateLimitRule) -> AppResult<()> {
        self.guard().await?;
        let id = rule.id().as_str().to_owned();
        self.saves.lock().await.push(id.clone());
        self.rules.lock().await.insert(id, rule);
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> AppResult<bool> {
        self.guard().await?;
        Ok(self.rules.lock().await.remove(id).is_some())
    }

    async fn delete_by_rule_set_id(&self, rule_set_id: &str) -> AppResult<u64> {
        self.guard().await?;
        let mut rules = self.rules.lock().await;
        let before = rules.len();
        rules.retain(|_, rule| rule.rule_set_id() != Some(rule_set_id));
        Ok(u64::try_from(before - rules.len()).unwrap_or(u64::MAX))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    scopes: Mutex<Vec<RuleChangeScope>>,
    failing: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            scopes: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    async fn scopes(&self) -> Vec<RuleChangeScope> {
        self.scopes.lock().await.clone()
    }
}

#[async_trait]
impl RuleChangeNotifier for RecordingNotifier {
    async fn notify(&self, event: RuleChangeEvent) -> AppResult<()> {
        self.scopes.lock().await.push(event.scope().clone());
        if self.failing {
            return Err(AppError::Internal("broker unavailable".to_owned()));
        }
        Ok(())
    }
}

struct StalledNotifier;

#[async_trait]
impl RuleChangeNotifier for StalledNotifier {
    async fn notify(&self, _event: RuleChangeEvent) -> AppResult<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

fn build_service(
    mode: RepositoryMode,
) -> (RuleService, Arc<FakeRuleRepository>, Arc<RecordingNotifier>) {
    let repository = Arc::new(FakeRuleRepository::new(mode));
    let notifier = Arc::new(RecordingNotifier::default());
    let service = RuleService::new(repository.clone(), notifier.clone());
    (service, repository, notifier)
}

fn input(rule_set_id: Option<&str>, enabled: bool) -> RuleInput {
    RuleInput {
        name: "Public API".to_owned(),
        enabled,
        scope: LimitScope::PerApiKey,
        key_strategy_id: "api-key".to_owned(),
        on_limit_exceed_policy: OnLimitExceedPolicy::RejectRequest,
        bands: vec![RateLimitBandInput {
            window_seconds: 60,
            capacity: 100,
            label: Some("per-minute".to_owned()),
        }],
        rule_set_id: rule_set_id.map(str::to_owned),
        tags: Vec::new(),
        attributes: BTreeMap::new(),
    }
}

fn rule_set(id: &str) -> RuleChangeScope {
    RuleChangeScope::RuleSet {
        rule_set_id: id.to_owned(),
    }
}

#[tokio::test]
async fn create_then_get_returns_equal_rule() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);

    let created = service.create("r1", input(Some("a"), true)).await;
    assert!(created.is_ok());
    let created = created.unwrap_or_else(|_| unreachable!());

    let fetched = service.get_by_id("r1").await;
    assert!(fetched.is_ok());
    assert_eq!(fetched.unwrap_or_else(|_| unreachable!()), created);
    assert_eq!(notifier.scopes().await, vec![rule_set("a")]);
}

#[tokio::test]
async fn create_rejects_duplicate_id_without_notifying() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);
    assert!(service.create("r1", input(Some("a"), true)).await.is_ok());

    let duplicate = service.create("r1", input(Some("b"), true)).await;
    assert!(matches!(duplicate, Err(AppError::AlreadyExists(id)) if id == "r1"));
    assert_eq!(notifier.scopes().await.len(), 1);
}

#[tokio::test]
async fn create_with_empty_bands_fails_before_any_write() {
    let (service, repository, notifier) = build_service(RepositoryMode::Healthy);
    let mut payload = input(Some("a"), true);
    payload.bands.clear();

    let result = service.create("r1", payload).await;
    assert!(matches!(
        result,
        Err(AppError::Validation { ref field, .. }) if field == "bands"
    ));
    assert!(repository.saves.lock().await.is_empty());
    assert!(notifier.scopes().await.is_empty());
}

#[tokio::test]
async fn create_rejects_malformed_id() {
    let (service, repository, _) = build_service(RepositoryMode::Healthy);

    let result = service.create("bad id!", input(None, true)).await;
    assert!(matches!(
        result,
        Err(AppError::Validation { ref field, .. }) if field == "id"
    ));
    assert!(repository.saves.lock().await.is_empty());
}

#[tokio::test]
async fn ungrouped_create_emits_ungrouped_scope() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);

    assert!(service.create("r1", input(None, true)).await.is_ok());
    assert!(service.create("r2", input(Some("  "), true)).await.is_ok());
    assert_eq!(
        notifier.scopes().await,
        vec![RuleChangeScope::Ungrouped, RuleChangeScope::Ungrouped]
    );
}

#[tokio::test]
async fn legacy_tags_attribute_is_lifted_into_typed_tags() {
    let (service, _, _) = build_service(RepositoryMode::Healthy);
    let mut payload = input(None, true);
    payload
        .attributes
        .insert("tags".to_owned(), json!(["edge", "beta"]));
    payload
        .attributes
        .insert("owner".to_owned(), Value::String("platform".to_owned()));

    let created = service.create("r1", payload).await;
    assert!(created.is_ok());
    let created = created.unwrap_or_else(|_| unreachable!());

    assert_eq!(created.attributes().tags(), ["edge", "beta"]);
    assert!(!created.attributes().metadata().contains_key("tags"));
    assert_eq!(
        created.attributes().metadata().get("owner"),
        Some(&Value::String("platform".to_owned()))
    );
}

#[tokio::test]
async fn update_missing_rule_is_not_found() {
    let (service, repository, notifier) = build_service(RepositoryMode::Healthy);

    let result = service.update("missing", input(Some("a"), true)).await;
    assert!(matches!(result, Err(AppError::NotFound(id)) if id == "missing"));
    assert!(repository.saves.lock().await.is_empty());
    assert!(notifier.scopes().await.is_empty());
}

#[tokio::test]
async fn update_notifies_the_new_rule_set() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);
    assert!(service.create("r1", input(Some("a"), true)).await.is_ok());

    let updated = service.update("r1", input(Some("b"), true)).await;
    assert!(updated.is_ok());
    assert_eq!(
        updated.unwrap_or_else(|_| unreachable!()).rule_set_id(),
        Some("b")
    );
    assert_eq!(notifier.scopes().await, vec![rule_set("a"), rule_set("b")]);
}

#[tokio::test]
async fn toggle_twice_restores_the_original_rule() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);
    let created = service.create("r1", input(Some("a"), true)).await;
    assert!(created.is_ok());
    let created = created.unwrap_or_else(|_| unreachable!());

    let once = service.toggle_enabled("r1").await;
    assert!(once.is_ok());
    let once = once.unwrap_or_else(|_| unreachable!());
    assert!(!once.enabled());
    assert_eq!(once.name(), created.name());
    assert_eq!(once.bands(), created.bands());

    let twice = service.toggle_enabled("r1").await;
    assert!(twice.is_ok());
    assert_eq!(twice.unwrap_or_else(|_| unreachable!()), created);
    assert_eq!(notifier.scopes().await, vec![rule_set("a"); 3]);
}

#[tokio::test]
async fn toggle_missing_rule_is_not_found() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);

    let result = service.toggle_enabled("missing").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(notifier.scopes().await.is_empty());
}

#[tokio::test]
async fn delete_requests_full_reload() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);
    assert!(service.create("r1", input(Some("a"), true)).await.is_ok());

    assert!(service.delete("r1").await.is_ok());
    assert!(matches!(
        service.get_by_id("r1").await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(
        notifier.scopes().await,
        vec![rule_set("a"), RuleChangeScope::FullReload]
    );
}

#[tokio::test]
async fn delete_missing_rule_is_not_found_without_notifying() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);

    let result = service.delete("nonexistent").await;
    assert!(matches!(result, Err(AppError::NotFound(id)) if id == "nonexistent"));
    assert!(notifier.scopes().await.is_empty());
}

#[tokio::test]
async fn delete_empty_rule_set_still_notifies() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);

    let deleted = service.delete_by_rule_set("unknown").await;
    assert!(deleted.is_ok());
    assert_eq!(deleted.unwrap_or_else(|_| unreachable!()), 0);
    assert_eq!(notifier.scopes().await, vec![rule_set("unknown")]);
}

#[tokio::test]
async fn blank_rule_set_id_is_rejected() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);

    assert!(matches!(
        service.delete_by_rule_set(" ").await,
        Err(AppError::Validation { ref field, .. }) if field == "ruleSetId"
    ));
    assert!(matches!(
        service.list_by_rule_set("").await,
        Err(AppError::Validation { ref field, .. }) if field == "ruleSetId"
    ));
    assert!(notifier.scopes().await.is_empty());
}

#[tokio::test]
async fn administrative_walkthrough_keeps_rule_sets_consistent() {
    let (service, _, notifier) = build_service(RepositoryMode::Healthy);

    for (id, set, enabled) in [
        ("a1", Some("a"), true),
        ("a2", Some("a"), false),
        ("b1", Some("b"), true),
        ("u1", None, true),
    ] {
        assert!(service.create(id, input(set, enabled)).await.is_ok());
    }

    let members = service.list_by_rule_set("a").await;
    assert!(members.is_ok());
    let member_ids: Vec<String> = members
        .unwrap_or_else(|_| unreachable!())
        .iter()
        .map(|rule| rule.id().to_string())
        .collect();
    assert_eq!(member_ids, vec!["a1".to_owned(), "a2".to_owned()]);

    let deleted = service.delete_by_rule_set("a").await;
    assert!(deleted.is_ok());
    assert_eq!(deleted.unwrap_or_else(|_| unreachable!()), 2);

    let remaining = service.list_all().await;
    assert!(remaining.is_ok());
    assert_eq!(remaining.unwrap_or_else(|_| unreachable!()).len(), 2);

    assert_eq!(
        notifier.scopes().await,
        vec![
            rule_set("a"),
            rule_set("a"),
            rule_set("b"),
            RuleChangeScope::Ungrouped,
            rule_set("a"),
        ]
    );
}

#[tokio::test]
async fn storage_fault_surfaces_as_retryable_storage_failure() {
    let (service, _, notifier) = build_service(RepositoryMode::Failing);

    let result = service.create("r1", input(Some("a"), true)).await;
    assert!(matches!(
        result,
        Err(AppError::Storage { operation: "create", .. })
    ));
    assert!(result.is_err_and(|error| error.is_retryable()));

    assert!(matches!(
        service.list_all().await,
        Err(AppError::Storage { operation: "findAll", .. })
    ));
    assert!(matches!(
        service.delete("r1").await,
        Err(AppError::Storage { operation: "delete", .. })
    ));
    assert!(notifier.scopes().await.is_empty());
}

#[tokio::test]
async fn slow_repository_times_out_as_storage_failure() {
    let repository = Arc::new(FakeRuleRepository::new(RepositoryMode::Slow));
    let notifier = Arc::new(RecordingNotifier::default());
    let service = RuleService::new(repository, notifier.clone())
        .with_operation_timeout(Duration::from_millis(20));

    let result = service.get_by_id("r1").await;
    assert!(matches!(
        result,
        Err(AppError::Storage { operation: "findById", .. })
    ));
    assert!(notifier.scopes().await.is_empty());
}

#[tokio::test]
async fn notifier_failure_does_not_fail_the_mutation() {
    let repository = Arc::new(FakeRuleRepository::new(RepositoryMode::Healthy));
    let notifier = Arc::new(RecordingNotifier::failing());
    let service = RuleService::new(repository.clone(), notifier.clone());

    let created = service.create("r1", input(Some("a"), true)).await;
    assert!(created.is_ok());
    assert!(repository.rules.lock().await.contains_key("r1"));

    assert!(service.delete("r1").await.is_ok());
    assert_eq!(
        notifier.scopes().await,
        vec![rule_set("a"), RuleChangeScope::FullReload]
    );
}

#[tokio::test]
async fn stalled_notifier_is_bounded_by_the_operation_timeout() {
    let repository = Arc::new(FakeRuleRepository::new(RepositoryMode::Healthy));
    let service = RuleService::new(repository.clone(), Arc::new(StalledNotifier))
        .with_operation_timeout(Duration::from_millis(50));

    let started = tokio::time::Instant::now();
    let created = service.create("r1", input(Some("a"), true)).await;

    assert!(created.is_ok());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(repository.rules.lock().await.contains_key("r1"));
}
