//! Orchestrator flows: gating, concurrent and chained starts, completion
//! utilities and dynamic loading.

use std::rc::Rc;

use futures::future::FutureExt;
use serde_json::json;

use crate::core::error::WalkthroughError;
use crate::core::options::WalkthroughOptions;
use crate::core::orchestrator::{
    module_from_json, ModuleExport, RegisteredTour, TourLoader, TourModule, TourOrchestrator,
};
use crate::core::progress::{self, ProgressRecord};
use crate::core::storage::KeyValueStore;
use crate::tests::common::*;

fn loader(module: TourModule) -> TourLoader {
    Rc::new(move |_specifier: &str| {
        let module = module.clone();
        async move { Ok::<_, anyhow::Error>(module) }.boxed_local()
    })
}

// ============================================================================
// Gating
// ============================================================================

#[tokio::test]
async fn test_once_per_session_gate() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    orchestrator.register_tour(auto_tour("intro", "/home").once_per_session(true));

    let first = orchestrator.start_auto_matches("/home", false).await;
    assert_eq!(first.ids, vec!["intro".to_string()]);
    assert_eq!(
        env.session.peek("__wt_session_started:intro").as_deref(),
        Some("1")
    );

    let second = orchestrator.start_auto_matches("/home", false).await;
    assert!(second.ids.is_empty());

    env.session.clear();
    let third = orchestrator.start_auto_matches("/home", false).await;
    assert_eq!(third.ids, vec!["intro".to_string()]);
}

#[tokio::test]
async fn test_completed_tour_is_gated_only_when_persisting() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    progress::write_progress(&env.storage, "done", &ProgressRecord::new(0, true));
    progress::write_progress(&env.storage, "renamed", &ProgressRecord::new(0, true));

    orchestrator.register_tours([
        auto_tour("done", "/").with_options(zero_wait().with_persistence(true, false)),
        auto_tour("not-persisting", "/"),
        auto_tour("again", "/")
            .with_options(zero_wait().with_persistence(true, false))
            .skip_if_completed(false),
        auto_tour("aliased", "/")
            .with_options(persisted("renamed", false)),
    ]);
    progress::write_progress(&env.storage, "again", &ProgressRecord::new(0, true));
    progress::write_progress(&env.storage, "not-persisting", &ProgressRecord::new(0, true));

    let started = orchestrator.start_auto_matches("/", false).await;
    assert_eq!(started.ids, vec!["not-persisting".to_string(), "again".to_string()]);
}

#[tokio::test]
async fn test_first_only_starts_one() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    orchestrator.register_tours([
        auto_tour("skipped", "/other"),
        auto_tour("a", "/app*"),
        auto_tour("b", "/app*"),
    ]);

    let started = orchestrator.start_auto_matches("/app/settings", true).await;
    assert_eq!(started.ids, vec!["a".to_string()]);
    assert!(env.session.peek("__wt_session_started:b").is_none());

    env.surface.flush().await;
    let wt = &started.walkthroughs[0];
    assert!(wt.is_active());
    assert_eq!(wt.tour_id(), Some("a"));
}

#[tokio::test]
async fn test_concurrent_starts_in_registration_order() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    orchestrator.register_tours([auto_tour("z", "/"), auto_tour("y", "/"), auto_tour("x", "/")]);

    let started = orchestrator.start_auto_matches("/", false).await;
    assert_eq!(started.ids, vec!["z", "y", "x"]);
    env.surface.flush().await;
    assert_eq!(env.surface.overlays().len(), 3);
}

// ============================================================================
// Chained mode
// ============================================================================

#[tokio::test]
async fn test_chain_orders_by_order_and_marks_sessions() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    orchestrator.register_tours([
        auto_tour("second", "/c").order(2),
        auto_tour("first", "/c").order(1),
    ]);

    let result = orchestrator.chain_auto_matches("/c").await;
    assert_eq!(result.ids, vec!["first".to_string(), "second".to_string()]);
    assert_eq!(env.session.peek("__wt_session_started:first").as_deref(), Some("1"));
    assert_eq!(env.session.peek("__wt_session_started:second").as_deref(), Some("1"));

    let chain = result.chain.unwrap();
    env.surface.flush().await;
    let running = chain.current().unwrap();
    assert_eq!(running.tour_id(), Some("first"));

    running.next().await;
    env.surface.flush().await;
    assert_eq!(chain.current().unwrap().tour_id(), Some("second"));
}

#[tokio::test]
async fn test_chain_order_ties_keep_registration_order() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    orchestrator.register_tours([
        auto_tour("b", "/").order(1),
        auto_tour("a", "/").order(1),
        auto_tour("c", "/").order(0),
    ]);
    let result = orchestrator.chain_auto_matches("/").await;
    assert_eq!(result.ids, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn test_chain_explicit_tour_id_wins() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    orchestrator.register_tour(auto_tour("welcome", "/").with_options(persisted("welcome-v2", false)));

    let result = orchestrator.chain_auto_matches("/").await;
    env.surface.flush().await;
    let running = result.chain.unwrap().current().unwrap();
    assert_eq!(running.tour_id(), Some("welcome-v2"));
    assert!(env.storage.peek("__walkthrough:welcome-v2").is_some());
    assert!(env.storage.peek("__walkthrough:welcome").is_none());
}

// ============================================================================
// Start by id and completion utilities
// ============================================================================

#[tokio::test]
async fn test_start_by_id_bypasses_gating() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    progress::write_progress(&env.storage, "help", &ProgressRecord::new(0, true));
    orchestrator.register_tour(
        auto_tour("help", "/never")
            .with_options(persisted("help", false))
            .trigger(crate::core::orchestrator::Trigger::Manual)
            .once_per_session(true),
    );
    env.session.set("__wt_session_started:help", "1").unwrap();

    let wt = orchestrator.start_tour_by_id("help").unwrap();
    env.surface.flush().await;
    assert!(wt.is_active());

    let err = orchestrator.start_tour_by_id("nope").unwrap_err();
    assert!(matches!(err, WalkthroughError::NotRegistered(_)));
    assert_eq!(err.to_string(), "Tour not registered: nope");
}

#[tokio::test]
async fn test_completion_utilities() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    orchestrator.register_tours([
        auto_tour("plain", "/"),
        auto_tour("aliased", "/").with_options(WalkthroughOptions::default().with_tour_id("alias")),
    ]);
    progress::write_progress(&env.storage, "plain", &ProgressRecord::new(3, true));
    progress::write_progress(&env.storage, "alias", &ProgressRecord::new(1, true));
    progress::write_progress(&env.storage, "unrelated", &ProgressRecord::new(1, true));

    assert!(orchestrator.is_tour_completed("plain"));
    assert!(orchestrator.is_tour_completed("alias"));
    assert!(!orchestrator.is_tour_completed("aliased"));

    orchestrator.clear_tour_progress("plain");
    assert!(!orchestrator.is_tour_completed("plain"));

    orchestrator.reset_all_tour_progress();
    assert!(!orchestrator.is_tour_completed("alias"));
    assert!(env.storage.peek("__walkthrough:unrelated").is_some());
}

#[tokio::test]
async fn test_completion_utilities_use_tour_id_as_given() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    orchestrator.register_tour(
        auto_tour("a", "/").with_options(WalkthroughOptions::default().with_tour_id("b")),
    );
    progress::write_progress(&env.storage, "a", &ProgressRecord::new(2, true));
    progress::write_progress(&env.storage, "b", &ProgressRecord::new(0, false));

    assert!(orchestrator.is_tour_completed("a"));
    assert!(!orchestrator.is_tour_completed("b"));

    orchestrator.clear_tour_progress("a");
    assert!(env.storage.peek("__walkthrough:a").is_none());
    assert!(env.storage.peek("__walkthrough:b").is_some());
}

#[tokio::test]
async fn test_clear_tours_keeps_progress() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    orchestrator.register_tour(auto_tour("plain", "/"));
    progress::write_progress(&env.storage, "plain", &ProgressRecord::new(0, true));
    orchestrator.clear_tours();
    assert!(orchestrator.list_tours().is_empty());
    assert!(orchestrator.is_tour_completed("plain"));
}

// ============================================================================
// Dynamic loading
// ============================================================================

#[tokio::test]
async fn test_load_tours_prefers_named_export() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    let mut module = TourModule::new();
    module.insert("default".into(), ModuleExport::Tours(vec![auto_tour("from-default", "/")]));
    module.insert("tours".into(), ModuleExport::Tours(vec![auto_tour("from-tours", "/")]));

    let found = orchestrator.load_tours(&loader(module), "./tours").await.unwrap();
    assert!(matches!(found, Some(ModuleExport::Tours(ref t)) if t[0].id == "from-tours"));
    let ids: Vec<_> = orchestrator.list_tours().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["from-tours"]);
}

#[tokio::test]
async fn test_load_tours_from_json_default_export() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    let mut module = TourModule::new();
    module.insert(
        "toursDefault".into(),
        ModuleExport::Value(json!([
            { "id": "json-tour", "match": "/docs*", "steps": [{ "selector": "#a" }] }
        ])),
    );

    orchestrator.load_tours(&loader(module), "tours.json").await.unwrap();
    let matched = orchestrator.find_matching_tours("/docs/start");
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id, "json-tour");
}

#[tokio::test]
async fn test_load_tours_non_array_export_is_returned_unregistered() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    let mut module = TourModule::new();
    module.insert("default".into(), ModuleExport::Value(json!({ "version": 2 })));

    let found = orchestrator.load_tours(&loader(module), "x").await.unwrap();
    assert!(matches!(found, Some(ModuleExport::Value(_))));
    assert!(orchestrator.list_tours().is_empty());

    let empty = orchestrator.load_tours(&loader(TourModule::new()), "y").await.unwrap();
    assert!(empty.is_none());
}

#[tokio::test]
async fn test_load_tours_passes_over_null_export() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    let module = module_from_json(json!({
        "tours": null,
        "default": [{ "id": "fallback", "match": "/", "steps": [{ "selector": "#a" }] }]
    }));

    let found = orchestrator.load_tours(&loader(module), "tours.json").await.unwrap();
    assert!(matches!(found, Some(ModuleExport::Value(ref v)) if v.is_array()));
    let ids: Vec<_> = orchestrator.list_tours().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["fallback"]);

    let only_null = module_from_json(json!({ "tours": null, "toursDefault": false }));
    let found = orchestrator.load_tours(&loader(only_null), "empty.json").await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_load_tours_loader_failure() {
    let env = host_with_elements(&["#a"]);
    let orchestrator = TourOrchestrator::new(env.host.clone());
    let failing: TourLoader =
        Rc::new(|_: &str| async { Err::<TourModule, _>(anyhow::anyhow!("404")) }.boxed_local());

    let err = orchestrator.load_tours(&failing, "./missing").await.unwrap_err();
    assert!(matches!(err, WalkthroughError::Load { ref specifier, .. } if specifier == "./missing"));
}

#[test]
fn test_registered_tour_matcher_helpers() {
    let tour = RegisteredTour::new("t", "/a*", vec![]);
    assert!(tour.matcher.matches("/a/b"));
    assert!(!tour.matcher.matches("/b"));
}
