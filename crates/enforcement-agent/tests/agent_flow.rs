use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use enforcement_agent::{
    AgentConfig, AgentError, EnforcementAgent, ObserverCfg, StoreRetryCfg, HIDDEN_MARKER,
    ORIGINAL_BACKGROUND, ORIGINAL_OUTLINE,
};
use page_dom::{Document, ElementSpec, MemoryDocument, NodeId};
use rule_store::{InMemoryRuleStore, RuleStore, StoreError, StoreKey, StorePatch, StoreValues};

fn page() -> Arc<MemoryDocument> {
    Arc::new(MemoryDocument::from_spec(
        ElementSpec::new("html").with_child(
            ElementSpec::new("body")
                .with_child(ElementSpec::new("div").with_class("ad").with_id("first"))
                .with_child(ElementSpec::new("div").with_class("ad"))
                .with_child(ElementSpec::new("p").with_class("promo").with_id("banner"))
                .with_child(ElementSpec::new("div").with_class("content")),
        ),
    ))
}

fn body(doc: &MemoryDocument) -> NodeId {
    doc.elements()[1]
}

fn fast_config() -> AgentConfig {
    AgentConfig {
        store: StoreRetryCfg {
            retry_attempts: 2,
            retry_base_delay_ms: 1,
        },
        ..AgentConfig::default()
    }
}

fn store_with_classes(classes: &[&str]) -> Arc<InMemoryRuleStore> {
    let list = classes.iter().map(|class| class.to_string()).collect();
    Arc::new(InMemoryRuleStore::with_values(
        StoreValues::new().with(StoreKey::HiddenClasses, list),
    ))
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Store wrapper that fails a set number of calls and can slow reads down.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryRuleStore,
    failing_gets: AtomicU32,
    failing_sets: AtomicU32,
    get_delay: Duration,
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl RuleStore for FlakyStore {
    async fn get(&self, keys: &[StoreKey]) -> Result<StoreValues, StoreError> {
        if !self.get_delay.is_zero() {
            tokio::time::sleep(self.get_delay).await;
        }
        if take_failure(&self.failing_gets) {
            return Err(StoreError::Unavailable("storage busy".into()));
        }
        self.inner.get(keys).await
    }

    async fn set(&self, patch: StorePatch) -> Result<(), StoreError> {
        if take_failure(&self.failing_sets) {
            return Err(StoreError::Unavailable("storage busy".into()));
        }
        self.inner.set(patch).await
    }
}

#[tokio::test]
async fn startup_hides_persisted_matches() {
    let doc = page();
    let store = store_with_classes(&["ad"]);
    let agent = EnforcementAgent::start(doc.clone(), store, fast_config())
        .await
        .unwrap();

    for node in doc.elements_by_class("ad") {
        assert!(!doc.is_rendered(node));
        assert_eq!(doc.data(node, HIDDEN_MARKER).as_deref(), Some("true"));
    }
    let promo = doc.elements_by_class("promo")[0];
    assert!(doc.is_rendered(promo));
    assert_eq!(agent.hidden_classes(), vec!["ad"]);
    agent.shutdown().await;
}

#[tokio::test]
async fn hide_persists_then_hides() {
    let doc = page();
    let store = store_with_classes(&["ad"]);
    let agent = EnforcementAgent::start(doc.clone(), store.clone(), fast_config())
        .await
        .unwrap();

    let list = agent.hide_class("promo").await.unwrap();
    assert_eq!(list, vec!["ad", "promo"]);
    assert_eq!(
        store.snapshot().list(StoreKey::HiddenClasses),
        vec!["ad", "promo"]
    );
    assert!(!doc.is_rendered(doc.elements_by_class("promo")[0]));

    let ids = agent.hide_id("first").await.unwrap();
    assert_eq!(ids, vec!["first"]);
    assert_eq!(store.snapshot().list(StoreKey::HiddenIds), vec!["first"]);
    agent.shutdown().await;
}

#[tokio::test]
async fn repeated_hide_is_idempotent() {
    let doc = page();
    let store = Arc::new(InMemoryRuleStore::new());
    let agent = EnforcementAgent::start(doc.clone(), store.clone(), fast_config())
        .await
        .unwrap();

    assert_eq!(agent.hide_class("ad").await.unwrap(), vec!["ad"]);
    assert_eq!(agent.hide_class("ad").await.unwrap(), vec!["ad"]);
    assert_eq!(store.write_count(), 1);
    assert_eq!(agent.hidden_classes(), vec!["ad"]);
    agent.shutdown().await;
}

#[tokio::test]
async fn show_restores_display_and_marker() {
    let doc = page();
    let store = store_with_classes(&["ad"]);
    let agent = EnforcementAgent::start(doc.clone(), store.clone(), fast_config())
        .await
        .unwrap();

    let list = agent.show_class("ad").await.unwrap();
    assert!(list.is_empty());
    for node in doc.elements_by_class("ad") {
        assert!(doc.is_rendered(node));
        assert_eq!(doc.data(node, HIDDEN_MARKER), None);
        assert_eq!(doc.style(node, "display"), "");
    }
    assert!(store.snapshot().list(StoreKey::HiddenClasses).is_empty());

    // Showing something never hidden is a no-op that still succeeds.
    assert!(agent.show_id("banner").await.unwrap().is_empty());
    agent.shutdown().await;
}

#[tokio::test]
async fn show_keeps_elements_hidden_by_another_rule() {
    let doc = page();
    let store = Arc::new(InMemoryRuleStore::new());
    let agent = EnforcementAgent::start(doc.clone(), store, fast_config())
        .await
        .unwrap();

    agent.hide_class("ad").await.unwrap();
    agent.hide_id("first").await.unwrap();
    agent.show_class("ad").await.unwrap();

    let first = doc.element_by_id("first").unwrap();
    let second = doc.elements_by_class("ad")[1];
    assert!(!doc.is_rendered(first));
    assert!(doc.is_rendered(second));
    agent.shutdown().await;
}

#[tokio::test]
async fn hide_show_hide_matches_a_single_hide() {
    let toggled_doc = page();
    let toggled_store = Arc::new(InMemoryRuleStore::new());
    let toggled = EnforcementAgent::start(toggled_doc.clone(), toggled_store.clone(), fast_config())
        .await
        .unwrap();
    toggled.hide_class("ad").await.unwrap();
    toggled.show_class("ad").await.unwrap();
    toggled.hide_class("ad").await.unwrap();

    let once_doc = page();
    let once_store = Arc::new(InMemoryRuleStore::new());
    let once = EnforcementAgent::start(once_doc.clone(), once_store.clone(), fast_config())
        .await
        .unwrap();
    once.hide_class("ad").await.unwrap();

    let nodes = once_doc.elements();
    assert_eq!(toggled_doc.elements(), nodes);
    for node in nodes {
        assert_eq!(
            toggled_doc.style(node, "display"),
            once_doc.style(node, "display")
        );
        assert_eq!(
            toggled_doc.data(node, HIDDEN_MARKER),
            once_doc.data(node, HIDDEN_MARKER)
        );
        assert_eq!(toggled_doc.is_rendered(node), once_doc.is_rendered(node));
    }
    assert_eq!(toggled_store.snapshot(), once_store.snapshot());
    assert_eq!(toggled.hidden_classes(), once.hidden_classes());
    assert_eq!(toggled.hidden_classes(), vec!["ad"]);

    toggled.shutdown().await;
    once.shutdown().await;
}

#[tokio::test]
async fn inserted_elements_are_hidden() {
    let doc = page();
    let agent = EnforcementAgent::start(doc.clone(), store_with_classes(&["ad"]), fast_config())
        .await
        .unwrap();

    let section = doc
        .append_element(
            body(&doc),
            ElementSpec::new("section")
                .with_child(ElementSpec::new("div").with_class("ad").with_style("display", "block")),
        )
        .unwrap();
    doc.flush();

    let injected = doc.elements_by_class("ad")[2];
    wait_until(|| !doc.is_rendered(injected)).await;
    assert!(doc.is_rendered(section));
    assert_eq!(doc.data(injected, HIDDEN_MARKER).as_deref(), Some("true"));
    agent.shutdown().await;
}

#[tokio::test]
async fn page_style_overrides_are_reverted() {
    let doc = page();
    let agent = EnforcementAgent::start(doc.clone(), store_with_classes(&["ad"]), fast_config())
        .await
        .unwrap();

    let ad = doc.elements_by_class("ad")[0];
    doc.set_style(ad, "display", "block");
    doc.flush();
    wait_until(|| !doc.is_rendered(ad)).await;
    agent.shutdown().await;
}

#[tokio::test]
async fn own_writes_never_feed_back_into_the_observer() {
    let doc = page();
    doc.set_record_redundant_writes(true);
    let agent = EnforcementAgent::start(doc.clone(), store_with_classes(&["ad"]), fast_config())
        .await
        .unwrap();
    assert_eq!(doc.pending_records(), 0);

    doc.append_element(body(&doc), ElementSpec::new("div").with_class("ad"));
    doc.flush();
    wait_until(|| agent.metrics().bursts_seen == 1).await;
    let passes = agent.metrics().reapply_passes;

    // The pass above queued nothing that survives its write batch.
    assert_eq!(doc.flush(), 0);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let metrics = agent.metrics();
    assert_eq!(metrics.bursts_seen, 1);
    assert_eq!(metrics.reapply_passes, passes);
    assert!(!agent.is_reapplying());
    agent.shutdown().await;
}

#[tokio::test]
async fn unrelated_bursts_do_not_reapply() {
    let doc = page();
    let agent = EnforcementAgent::start(doc.clone(), store_with_classes(&["ad"]), fast_config())
        .await
        .unwrap();
    let passes = agent.metrics().reapply_passes;

    let content = doc.elements_by_class("content")[0];
    doc.set_style(content, "color", "red");
    doc.remove_element(doc.elements_by_class("promo")[0]);
    doc.flush();
    wait_until(|| agent.metrics().bursts_seen == 1).await;
    assert_eq!(agent.metrics().reapply_passes, passes);
    agent.shutdown().await;
}

#[tokio::test]
async fn class_only_changes_follow_configuration() {
    let doc = page();
    let agent = EnforcementAgent::start(doc.clone(), store_with_classes(&["ad"]), fast_config())
        .await
        .unwrap();
    let content = doc.elements_by_class("content")[0];
    doc.add_class(content, "ad");
    doc.flush();
    wait_until(|| agent.metrics().bursts_seen == 1).await;
    assert!(doc.is_rendered(content));
    agent.shutdown().await;

    let doc = page();
    let config = AgentConfig {
        observer: ObserverCfg {
            react_to_class_mutations: true,
            ..ObserverCfg::default()
        },
        ..fast_config()
    };
    let agent = EnforcementAgent::start(doc.clone(), store_with_classes(&["ad"]), config)
        .await
        .unwrap();
    let content = doc.elements_by_class("content")[0];
    doc.add_class(content, "ad");
    doc.flush();
    wait_until(|| !doc.is_rendered(content)).await;
    agent.shutdown().await;
}

#[tokio::test]
async fn load_event_triggers_a_pass() {
    let doc = page();
    let agent = EnforcementAgent::start(doc.clone(), store_with_classes(&["ad"]), fast_config())
        .await
        .unwrap();
    let passes = agent.metrics().reapply_passes;
    doc.fire_load();
    wait_until(|| agent.metrics().load_events == 1).await;
    assert_eq!(agent.metrics().reapply_passes, passes + 1);
    agent.shutdown().await;
}

#[tokio::test]
async fn overlapping_hides_both_persist() {
    let doc = page();
    let store = Arc::new(FlakyStore {
        get_delay: Duration::from_millis(20),
        ..FlakyStore::default()
    });
    let agent = EnforcementAgent::start(doc.clone(), store.clone(), fast_config())
        .await
        .unwrap();

    let (first, second) = tokio::join!(agent.hide_class("ad"), agent.hide_class("promo"));
    first.unwrap();
    let last = second.unwrap();
    assert_eq!(last, vec!["ad", "promo"]);
    assert_eq!(
        store.inner.snapshot().list(StoreKey::HiddenClasses),
        vec!["ad", "promo"]
    );
    assert_eq!(agent.hidden_classes(), vec!["ad", "promo"]);
    assert!(!doc.is_rendered(doc.elements_by_class("promo")[0]));
    agent.shutdown().await;
}

#[tokio::test]
async fn failed_write_leaves_document_and_rules_untouched() {
    let doc = page();
    let store = Arc::new(FlakyStore {
        failing_sets: AtomicU32::new(3),
        ..FlakyStore::default()
    });
    let agent = EnforcementAgent::start(doc.clone(), store.clone(), fast_config())
        .await
        .unwrap();

    let err = agent.hide_class("ad").await.unwrap_err();
    assert!(matches!(err, AgentError::Persistence(StoreError::Unavailable(_))));
    assert!(agent.hidden_classes().is_empty());
    for node in doc.elements_by_class("ad") {
        assert!(doc.is_rendered(node));
        assert_eq!(doc.data(node, HIDDEN_MARKER), None);
    }
    assert_eq!(agent.metrics().store_retries, 2);

    // The queue keeps serving once the store recovers.
    assert_eq!(agent.hide_class("ad").await.unwrap(), vec!["ad"]);
    assert!(!doc.is_rendered(doc.elements_by_class("ad")[0]));
    agent.shutdown().await;
}

#[tokio::test]
async fn transient_write_failures_are_retried() {
    let doc = page();
    let store = Arc::new(FlakyStore {
        failing_sets: AtomicU32::new(1),
        ..FlakyStore::default()
    });
    let agent = EnforcementAgent::start(doc.clone(), store.clone(), fast_config())
        .await
        .unwrap();
    assert_eq!(agent.hide_id("banner").await.unwrap(), vec!["banner"]);
    assert_eq!(store.inner.snapshot().list(StoreKey::HiddenIds), vec!["banner"]);
    assert_eq!(agent.metrics().store_retries, 1);
    agent.shutdown().await;
}

#[tokio::test]
async fn unreadable_store_fails_startup() {
    let store = Arc::new(FlakyStore {
        failing_gets: AtomicU32::new(10),
        ..FlakyStore::default()
    });
    let result = EnforcementAgent::start(page(), store, fast_config()).await;
    assert!(matches!(result, Err(AgentError::Persistence(_))));
}

#[tokio::test]
async fn preview_round_trip_restores_original_styles() {
    let doc = page();
    let store = Arc::new(InMemoryRuleStore::new());
    let agent = EnforcementAgent::start(doc.clone(), store.clone(), fast_config())
        .await
        .unwrap();
    let first = doc.element_by_id("first").unwrap();
    let second = doc.elements_by_class("ad")[1];
    doc.set_style(first, "outline", "1px dotted blue");
    doc.take_records();

    assert_eq!(agent.preview_class("ad"), 2);
    // A second preview must not overwrite the captured originals.
    agent.preview_class("ad");
    let highlight = &agent.config().highlight;
    assert_eq!(doc.style(first, "outline"), highlight.outline);
    assert_eq!(doc.style(second, "background-color"), highlight.background_color);
    assert_eq!(doc.data(first, ORIGINAL_OUTLINE).as_deref(), Some("1px dotted blue"));

    assert_eq!(agent.remove_preview(Some("ad"), None), 2);
    assert_eq!(doc.style(first, "outline"), "1px dotted blue");
    assert_eq!(doc.style(second, "outline"), "");
    assert_eq!(doc.style(second, "background-color"), "");
    assert_eq!(doc.data(first, ORIGINAL_OUTLINE), None);
    assert_eq!(doc.data(first, ORIGINAL_BACKGROUND), None);

    assert_eq!(store.write_count(), 0);
    assert!(agent.hidden_classes().is_empty());
    agent.shutdown().await;
}

#[tokio::test]
async fn remove_preview_without_snapshot_is_a_no_op() {
    let doc = page();
    let store = Arc::new(InMemoryRuleStore::new());
    let agent = EnforcementAgent::start(doc.clone(), store, fast_config())
        .await
        .unwrap();
    let banner = doc.element_by_id("banner").unwrap();
    doc.set_style(banner, "outline", "3px solid black");
    assert_eq!(agent.remove_preview(None, Some("banner")), 0);
    assert_eq!(doc.style(banner, "outline"), "3px solid black");
    agent.shutdown().await;
}

#[tokio::test]
async fn listing_reports_distinct_names() {
    let doc = page();
    let store = Arc::new(InMemoryRuleStore::new());
    let agent = EnforcementAgent::start(doc.clone(), store, fast_config())
        .await
        .unwrap();
    assert_eq!(agent.list_classes(), vec!["ad", "promo", "content"]);
    assert_eq!(agent.list_ids(), vec!["first", "banner"]);
    agent.shutdown().await;
}

#[tokio::test]
async fn commands_after_shutdown_fail() {
    let doc = page();
    let store = Arc::new(InMemoryRuleStore::new());
    let agent = EnforcementAgent::start(doc, store, fast_config())
        .await
        .unwrap();
    agent.shutdown().await;
    assert!(matches!(
        agent.hide_class("ad").await,
        Err(AgentError::QueueClosed)
    ));
}

#[tokio::test]
async fn id_hidden_before_it_exists_is_hidden_on_insertion() {
    let doc = page();
    let store = Arc::new(InMemoryRuleStore::new());
    let agent = EnforcementAgent::start(doc.clone(), store, fast_config())
        .await
        .unwrap();

    assert_eq!(agent.hide_id("late").await.unwrap(), vec!["late"]);
    assert_eq!(doc.pending_records(), 0);

    let late = doc
        .append_element(body(&doc), ElementSpec::new("div").with_id("late"))
        .unwrap();
    doc.flush();
    wait_until(|| !doc.is_rendered(late)).await;
    agent.shutdown().await;
}
