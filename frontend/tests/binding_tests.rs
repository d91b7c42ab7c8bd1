use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

use walkthrough::{Host, MemoryStore, NullSurface, Step, WalkthroughOptions};
use walkthrough_web::{provide_walkthrough_with, use_walkthrough, WebSurface};

wasm_bindgen_test_configure!(run_in_browser);

fn test_host() -> Host {
    Host::new(
        Rc::new(WebSurface::new().unwrap()),
        Rc::new(MemoryStore::new()),
        Rc::new(MemoryStore::new()),
    )
}

fn add_target(id: &str) -> web_sys::HtmlElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let element: web_sys::HtmlElement = document.create_element("button").unwrap().dyn_into().unwrap();
    element.set_id(id);
    element.set_text_content(Some("target"));
    document.body().unwrap().append_child(&element).unwrap();
    element
}

async fn tick() {
    gloo_timers::future::TimeoutFuture::new(0).await;
}

#[wasm_bindgen_test]
fn test_context_is_provided() {
    let owner = Owner::new();
    owner.with(|| {
        let provided = provide_walkthrough_with(test_host());
        let used = use_walkthrough();
        assert!(used.host().is_some());
        assert_eq!(provided.active.get_untracked(), used.active.get_untracked());
        assert!(used.current().is_none());
    });
}

#[wasm_bindgen_test]
async fn test_signals_follow_tour_lifecycle() {
    let target = add_target("binding-target");
    let owner = Owner::new();
    let state = owner.with(|| provide_walkthrough_with(test_host()));

    let finished = Rc::new(std::cell::Cell::new(false));
    let flag = finished.clone();
    let options = WalkthroughOptions::default()
        .with_wait(0, 10)
        .on_finish(move || flag.set(true));
    state.start(vec![Step::new("#binding-target")], options);

    tick().await;
    assert!(state.active.get_untracked());
    assert_eq!(state.current_step.get_untracked(), Some(0));

    state.next();
    tick().await;
    assert!(finished.get());
    assert!(!state.active.get_untracked());
    assert_eq!(state.current_step.get_untracked(), None);

    target.remove();
}

#[wasm_bindgen_test]
async fn test_stop_destroys_without_callbacks() {
    let target = add_target("binding-stop");
    let owner = Owner::new();
    let state = owner.with(|| provide_walkthrough_with(test_host()));

    let skipped = Rc::new(std::cell::Cell::new(false));
    let flag = skipped.clone();
    let options = WalkthroughOptions::default()
        .with_wait(0, 10)
        .on_skip(move |_| flag.set(true));
    state.start(vec![Step::new("#binding-stop")], options);
    tick().await;
    let running = state.current().unwrap();
    assert!(running.is_active());

    state.stop();
    assert!(!running.is_active());
    assert!(!skipped.get());
    assert_eq!(state.last_skip.get_untracked(), None);
    assert!(!state.active.get_untracked());

    target.remove();
}

#[wasm_bindgen_test]
async fn test_inert_host_never_reports_active() {
    let owner = Owner::new();
    let host = Host::new(
        Rc::new(NullSurface),
        Rc::new(MemoryStore::new()),
        Rc::new(MemoryStore::new()),
    );
    let state = owner.with(|| provide_walkthrough_with(host));

    let started = state.start(vec![Step::new("#anything")], WalkthroughOptions::default());
    assert!(started.is_some());
    tick().await;
    assert!(!state.active.get_untracked());
    assert_eq!(state.current_step.get_untracked(), None);
}
