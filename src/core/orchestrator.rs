//! Tour Orchestrator
//!
//! Registry of tours keyed by id, route matching, eligibility gating and the
//! two ways of starting matched tours: all at once (concurrent) or one after
//! another through a [`TourChain`].

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::json;

use super::chain::{ChainEntry, TourChain};
use super::engine::{start_walkthrough, Walkthrough};
use super::error::{Result, WalkthroughError};
use super::host::Host;
use super::options::WalkthroughOptions;
use super::progress;
use super::step::Step;

const CATEGORY: &str = "orchestrator";

// ============================================================================
// Matchers
// ============================================================================

/// Route matcher for a registered tour.
#[derive(Clone)]
pub enum PathMatcher {
    /// Exact path, or a prefix when the string ends in `*`.
    Path(String),
    /// Regular expression with search semantics.
    Regex(regex::Regex),
    Predicate(Rc<dyn Fn(&str) -> bool>),
}

impl PathMatcher {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        regex::Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| WalkthroughError::Config(format!("invalid tour match regex: {e}")))
    }

    pub fn predicate(predicate: impl Fn(&str) -> bool + 'static) -> Self {
        Self::Predicate(Rc::new(predicate))
    }

    pub fn matches(&self, pathname: &str) -> bool {
        match self {
            Self::Path(path) => match path.strip_suffix('*') {
                Some(prefix) => pathname.starts_with(prefix),
                None => pathname == path,
            },
            Self::Regex(regex) => regex.is_match(pathname),
            Self::Predicate(predicate) => predicate(pathname),
        }
    }
}

impl From<&str> for PathMatcher {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl std::fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// Tour data uses either `"match": "/path*"` or `"match": {"regex": "..."}`.
impl<'de> Deserialize<'de> for PathMatcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Path(String),
            Regex { regex: String },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Path(path) => Ok(Self::Path(path)),
            Repr::Regex { regex } => regex::Regex::new(&regex)
                .map(Self::Regex)
                .map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// Registered tours
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Started by route matching.
    #[default]
    Auto,
    /// Only started through `start_tour_by_id`.
    Manual,
}

/// Async eligibility check. An `Err` makes the tour ineligible.
#[derive(Clone)]
pub struct TourCondition(Rc<dyn Fn() -> LocalBoxFuture<'static, anyhow::Result<bool>>>);

impl TourCondition {
    pub fn new<F, Fut>(condition: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + 'static,
    {
        Self(Rc::new(move || condition().boxed_local()))
    }

    pub fn sync(condition: impl Fn() -> bool + 'static) -> Self {
        Self::new(move || futures::future::ready(Ok(condition())))
    }

    pub fn call(&self) -> LocalBoxFuture<'static, anyhow::Result<bool>> {
        (self.0)()
    }
}

impl std::fmt::Debug for TourCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TourCondition")
    }
}

fn default_true() -> bool {
    true
}

/// A tour definition in the registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredTour {
    pub id: String,
    #[serde(rename = "match")]
    pub matcher: PathMatcher,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub options: WalkthroughOptions,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(skip)]
    pub condition: Option<TourCondition>,
    #[serde(default)]
    pub once_per_session: bool,
    #[serde(default = "default_true")]
    pub skip_if_completed: bool,
    /// Chain position; lower runs first.
    #[serde(default)]
    pub order: i32,
}

impl RegisteredTour {
    pub fn new(id: impl Into<String>, matcher: impl Into<PathMatcher>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            matcher: matcher.into(),
            steps,
            options: WalkthroughOptions::default(),
            trigger: Trigger::Auto,
            condition: None,
            once_per_session: false,
            skip_if_completed: true,
            order: 0,
        }
    }

    pub fn with_options(mut self, options: WalkthroughOptions) -> Self {
        self.options = options;
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn condition(mut self, condition: TourCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn once_per_session(mut self, once: bool) -> Self {
        self.once_per_session = once;
        self
    }

    pub fn skip_if_completed(mut self, skip: bool) -> Self {
        self.skip_if_completed = skip;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Id progress is stored under: the explicit `tour_id` option, else `id`.
    pub fn tour_id(&self) -> &str {
        self.options.tour_id.as_deref().unwrap_or(&self.id)
    }

    /// Options with `tour_id` filled in from the registry id when absent.
    pub fn effective_options(&self) -> WalkthroughOptions {
        let mut options = self.options.clone();
        if options.tour_id.is_none() {
            options.tour_id = Some(self.id.clone());
        }
        options
    }
}

// ============================================================================
// Dynamic loading
// ============================================================================

/// One named export of a tour module.
#[derive(Debug, Clone)]
pub enum ModuleExport {
    Tours(Vec<RegisteredTour>),
    /// Untyped data, registered when it deserializes as an array of tours.
    Value(serde_json::Value),
}

impl ModuleExport {
    /// `false` for `null`, `false`, `0` and `""`. Such exports are passed over
    /// when picking a module's tours.
    pub fn is_present(&self) -> bool {
        match self {
            Self::Tours(_) => true,
            Self::Value(serde_json::Value::Null) => false,
            Self::Value(serde_json::Value::Bool(flag)) => *flag,
            Self::Value(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Self::Value(serde_json::Value::String(s)) => !s.is_empty(),
            Self::Value(_) => true,
        }
    }
}

/// Exports of a loaded tour module, by name.
pub type TourModule = IndexMap<String, ModuleExport>;

/// Export names tried in order.
pub const EXPORT_NAMES: [&str; 3] = ["tours", "default", "toursDefault"];

/// Exports of a JSON tour document.
///
/// An object becomes one export per key; any other value is the `default`
/// export.
pub fn module_from_json(value: serde_json::Value) -> TourModule {
    let mut module = TourModule::new();
    match value {
        serde_json::Value::Object(exports) => {
            for (name, export) in exports {
                module.insert(name, ModuleExport::Value(export));
            }
        }
        other => {
            module.insert("default".to_string(), ModuleExport::Value(other));
        }
    }
    module
}

/// Injected module loader: specifier in, exports out.
pub type TourLoader = Rc<dyn Fn(&str) -> LocalBoxFuture<'static, anyhow::Result<TourModule>>>;

// ============================================================================
// Orchestrator
// ============================================================================

/// Tours started by [`TourOrchestrator::start_auto_matches`].
#[derive(Debug, Clone, Default)]
pub struct StartedTours {
    pub ids: Vec<String>,
    pub walkthroughs: Vec<Walkthrough>,
}

/// Result of [`TourOrchestrator::chain_auto_matches`].
#[derive(Debug, Clone, Default)]
pub struct ChainStart {
    pub ids: Vec<String>,
    pub chain: Option<TourChain>,
}

/// Tour registry bound to a host. Clones share the registry.
#[derive(Clone)]
pub struct TourOrchestrator {
    host: Host,
    registry: Rc<RefCell<IndexMap<String, RegisteredTour>>>,
}

impl TourOrchestrator {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            registry: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    /// Insert a tour; an existing id is replaced in place.
    pub fn register_tour(&self, tour: RegisteredTour) {
        log::debug!("Registering tour {}", tour.id);
        self.host.record(CATEGORY, "register", Some(&tour.id), None);
        self.registry.borrow_mut().insert(tour.id.clone(), tour);
    }

    pub fn register_tours(&self, tours: impl IntoIterator<Item = RegisteredTour>) {
        for tour in tours {
            self.register_tour(tour);
        }
    }

    /// Registered tours in insertion order.
    pub fn list_tours(&self) -> Vec<RegisteredTour> {
        self.registry.borrow().values().cloned().collect()
    }

    pub fn get_tour(&self, id: &str) -> Option<RegisteredTour> {
        self.registry.borrow().get(id).cloned()
    }

    /// Empty the registry. Stored progress is left alone.
    pub fn clear_tours(&self) {
        self.registry.borrow_mut().clear();
        self.host.record(CATEGORY, "clear", None, None);
    }

    /// Tours whose matcher accepts `pathname`, in registration order, ungated.
    pub fn find_matching_tours(&self, pathname: &str) -> Vec<RegisteredTour> {
        self.registry
            .borrow()
            .values()
            .filter(|tour| tour.matcher.matches(pathname))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Gating
    // ------------------------------------------------------------------------

    /// Auto-trigger tours matching `pathname` that pass every gate.
    pub async fn eligible_tours(&self, pathname: &str) -> Vec<RegisteredTour> {
        let candidates = self.find_matching_tours(pathname);
        let mut eligible = Vec::with_capacity(candidates.len());
        for tour in candidates {
            if self.is_eligible(&tour).await {
                eligible.push(tour);
            }
        }
        eligible
    }

    async fn is_eligible(&self, tour: &RegisteredTour) -> bool {
        if tour.trigger != Trigger::Auto {
            return false;
        }
        if tour.once_per_session && progress::has_session_marker(self.host.session.as_ref(), &tour.id)
        {
            self.host.record(CATEGORY, "gated", Some(&tour.id), Some(json!({ "gate": "session" })));
            return false;
        }
        if tour.skip_if_completed
            && tour.options.persist_progress
            && progress::is_completed(self.host.storage.as_ref(), tour.tour_id())
        {
            self.host.record(CATEGORY, "gated", Some(&tour.id), Some(json!({ "gate": "completed" })));
            return false;
        }
        if let Some(condition) = &tour.condition {
            match condition.call().await {
                Ok(true) => {}
                Ok(false) => {
                    self.host.record(CATEGORY, "gated", Some(&tour.id), Some(json!({ "gate": "condition" })));
                    return false;
                }
                Err(e) => {
                    log::warn!("Condition for tour {} failed: {e:#}", tour.id);
                    self.host.record(
                        CATEGORY,
                        "condition-error",
                        Some(&tour.id),
                        Some(json!({ "error": e.to_string() })),
                    );
                    return false;
                }
            }
        }
        true
    }

    // ------------------------------------------------------------------------
    // Starting
    // ------------------------------------------------------------------------

    /// Start every eligible tour for `pathname`, or only the first one.
    pub async fn start_auto_matches(&self, pathname: &str, first_only: bool) -> StartedTours {
        let mut started = StartedTours::default();
        for tour in self.find_matching_tours(pathname) {
            if !self.is_eligible(&tour).await {
                continue;
            }
            progress::mark_session_started(self.host.session.as_ref(), &tour.id);
            let walkthrough = start_walkthrough(
                self.host.clone(),
                tour.steps.clone(),
                tour.effective_options(),
            );
            log::info!("Auto-starting tour {} on {pathname}", tour.id);
            self.host.record(CATEGORY, "auto-start", Some(&tour.id), Some(json!({ "path": pathname })));
            started.ids.push(tour.id);
            started.walkthroughs.push(walkthrough);
            if first_only {
                break;
            }
        }
        started
    }

    /// Run every eligible tour for `pathname` one after another, by `order`.
    pub async fn chain_auto_matches(&self, pathname: &str) -> ChainStart {
        let mut eligible = self.eligible_tours(pathname).await;
        if eligible.is_empty() {
            return ChainStart::default();
        }
        eligible.sort_by_key(|tour| tour.order);

        let mut ids = Vec::with_capacity(eligible.len());
        let mut entries = Vec::with_capacity(eligible.len());
        for tour in eligible {
            progress::mark_session_started(self.host.session.as_ref(), &tour.id);
            entries.push(
                ChainEntry::new(tour.id.clone(), tour.steps.clone())
                    .with_options(tour.effective_options()),
            );
            ids.push(tour.id);
        }

        let chain = TourChain::new(self.host.clone(), entries);
        log::info!("Chaining {} tours on {pathname}", ids.len());
        self.host.record(CATEGORY, "chain-start", None, Some(json!({ "ids": ids, "path": pathname })));
        chain.start();
        ChainStart {
            ids,
            chain: Some(chain),
        }
    }

    /// Start a registered tour regardless of trigger and gating.
    pub fn start_tour_by_id(&self, id: &str) -> Result<Walkthrough> {
        let tour = self
            .get_tour(id)
            .ok_or_else(|| WalkthroughError::NotRegistered(id.to_string()))?;
        self.host.record(CATEGORY, "start-by-id", Some(id), None);
        Ok(start_walkthrough(
            self.host.clone(),
            tour.steps.clone(),
            tour.effective_options(),
        ))
    }

    // ------------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------------

    /// Completed flag of the record stored under `tour_id`.
    pub fn is_tour_completed(&self, tour_id: &str) -> bool {
        progress::is_completed(self.host.storage.as_ref(), tour_id)
    }

    pub fn clear_tour_progress(&self, tour_id: &str) {
        progress::clear_progress(self.host.storage.as_ref(), tour_id);
    }

    /// Clear stored progress for every registered tour.
    pub fn reset_all_tour_progress(&self) {
        let ids: Vec<String> = self
            .registry
            .borrow()
            .values()
            .map(|tour| tour.tour_id().to_string())
            .collect();
        for id in &ids {
            progress::clear_progress(self.host.storage.as_ref(), id);
        }
        self.host.record(CATEGORY, "reset-progress", None, Some(json!({ "count": ids.len() })));
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Load a tour module and register the tours it exports.
    ///
    /// Returns the export that was found, `None` when none of `tours`,
    /// `default` or `toursDefault` is present and non-null.
    pub async fn load_tours(
        &self,
        loader: &TourLoader,
        specifier: &str,
    ) -> Result<Option<ModuleExport>> {
        let mut module = loader(specifier)
            .await
            .map_err(|e| WalkthroughError::load(specifier, format!("{e:#}")))?;

        let export = EXPORT_NAMES
            .iter()
            .filter_map(|name| module.shift_remove(*name))
            .find(ModuleExport::is_present);
        let Some(export) = export else {
            log::warn!("Tour module {specifier} has no tours export");
            self.host.record(CATEGORY, "load-empty", Some(specifier), None);
            return Ok(None);
        };

        let tours = match &export {
            ModuleExport::Tours(tours) => Some(tours.clone()),
            ModuleExport::Value(value) if value.is_array() => Some(
                serde_json::from_value::<Vec<RegisteredTour>>(value.clone())
                    .map_err(|e| WalkthroughError::load(specifier, e))?,
            ),
            ModuleExport::Value(_) => None,
        };
        if let Some(tours) = tours {
            log::debug!("Loaded {} tours from {specifier}", tours.len());
            self.host.record(
                CATEGORY,
                "load",
                Some(specifier),
                Some(json!({ "count": tours.len() })),
            );
            self.register_tours(tours);
        }
        Ok(Some(export))
    }
}

impl std::fmt::Debug for TourOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourOrchestrator")
            .field("tours", &self.registry.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tour(id: &str, matcher: &str) -> RegisteredTour {
        RegisteredTour::new(id, matcher, vec![Step::new("#a")])
    }

    #[test]
    fn test_matcher_forms() {
        assert!(PathMatcher::path("/settings").matches("/settings"));
        assert!(!PathMatcher::path("/settings").matches("/settings/profile"));
        assert!(PathMatcher::path("/settings*").matches("/settings/profile"));
        assert!(PathMatcher::regex(r"^/docs/\d+$").unwrap().matches("/docs/42"));
        assert!(PathMatcher::regex("docs").unwrap().matches("/api/docs/x"));
        assert!(PathMatcher::predicate(|p| p.len() > 3).matches("/long"));
        assert!(PathMatcher::regex("(").is_err());
    }

    #[test]
    fn test_register_replaces_in_place() {
        let orchestrator = TourOrchestrator::new(Host::in_memory().host);
        orchestrator.register_tours([tour("a", "/"), tour("b", "/"), tour("c", "/")]);
        orchestrator.register_tour(tour("b", "/other"));

        let listed = orchestrator.list_tours();
        let ids: Vec<_> = listed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(listed[1].matcher.matches("/other"));

        orchestrator.clear_tours();
        assert!(orchestrator.list_tours().is_empty());
    }

    #[test]
    fn test_start_unknown_id_fails() {
        let orchestrator = TourOrchestrator::new(Host::in_memory().host);
        let err = orchestrator.start_tour_by_id("ghost").unwrap_err();
        assert!(matches!(err, WalkthroughError::NotRegistered(id) if id == "ghost"));
    }

    #[test]
    fn test_effective_options_fill_tour_id() {
        let plain = tour("welcome", "/");
        assert_eq!(plain.effective_options().tour_id.as_deref(), Some("welcome"));
        let explicit = plain.with_options(WalkthroughOptions::default().with_tour_id("v2"));
        assert_eq!(explicit.effective_options().tour_id.as_deref(), Some("v2"));
        assert_eq!(explicit.tour_id(), "v2");
    }

    #[test]
    fn test_registered_tour_from_json() {
        let tours: Vec<RegisteredTour> = serde_json::from_value(serde_json::json!([
            { "id": "a", "match": "/home*", "steps": [{ "selector": "#x", "title": "X" }] },
            {
                "id": "b",
                "match": { "regex": "^/docs" },
                "steps": [],
                "trigger": "manual",
                "oncePerSession": true,
                "skipIfCompleted": false,
                "order": 2,
                "options": { "persistProgress": true, "waitMs": 0 }
            }
        ]))
        .unwrap();

        assert!(tours[0].matcher.matches("/home/feed"));
        assert!(tours[0].skip_if_completed);
        assert_eq!(tours[0].trigger, Trigger::Auto);
        assert_eq!(tours[0].steps[0].title.as_deref(), Some("X"));

        assert!(tours[1].matcher.matches("/docs/intro"));
        assert_eq!(tours[1].trigger, Trigger::Manual);
        assert!(tours[1].once_per_session);
        assert!(!tours[1].skip_if_completed);
        assert_eq!(tours[1].order, 2);
        assert!(tours[1].options.persist_progress);
    }

    #[tokio::test]
    async fn test_condition_error_is_ineligible() {
        let env = Host::in_memory();
        let orchestrator = TourOrchestrator::new(env.host.clone());
        orchestrator.register_tours([
            tour("broken", "/").condition(TourCondition::new(|| async {
                Err(anyhow::anyhow!("flag service down"))
            })),
            tour("off", "/").condition(TourCondition::sync(|| false)),
            tour("on", "/").condition(TourCondition::sync(|| true)),
        ]);
        let eligible = orchestrator.eligible_tours("/").await;
        let ids: Vec<_> = eligible.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["on"]);
    }

    #[tokio::test]
    async fn test_manual_trigger_is_never_auto_started() {
        let env = Host::in_memory();
        let orchestrator = TourOrchestrator::new(env.host.clone());
        orchestrator.register_tour(tour("m", "/").trigger(Trigger::Manual));
        let started = orchestrator.start_auto_matches("/", false).await;
        assert!(started.ids.is_empty());
        assert!(orchestrator.start_tour_by_id("m").is_ok());
    }

    #[tokio::test]
    async fn test_chain_with_no_matches_builds_nothing() {
        let env = Host::in_memory();
        let orchestrator = TourOrchestrator::new(env.host.clone());
        orchestrator.register_tour(tour("a", "/elsewhere"));
        let result = orchestrator.chain_auto_matches("/").await;
        assert!(result.ids.is_empty());
        assert!(result.chain.is_none());
    }

    #[test]
    fn test_module_from_json() {
        let module = module_from_json(serde_json::json!({ "tours": [], "meta": 1 }));
        assert_eq!(module.len(), 2);
        assert!(module.contains_key("tours"));
        assert!(module.contains_key("meta"));

        let module = module_from_json(serde_json::json!([{ "id": "a" }]));
        assert!(matches!(module.get("default"), Some(ModuleExport::Value(v)) if v.is_array()));
    }
}
