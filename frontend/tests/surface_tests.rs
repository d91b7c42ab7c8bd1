use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::{HtmlElement, KeyboardEvent, KeyboardEventInit};

use walkthrough::core::geometry::{FrameLayout, Placement, Point, Rect, TooltipPosition};
use walkthrough::core::surface::{EventDisposition, EventHandler, OverlayConfig};
use walkthrough::{Host, MemoryStore, Step, Surface, Walkthrough, WalkthroughOptions};
use walkthrough_web::surface::{WebSurface, ROOT_ATTRIBUTE};

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> web_sys::Document {
    web_sys::window().unwrap().document().unwrap()
}

/// Fixed-position box appended to `body`.
fn add_box(id: &str, rect: Rect) -> HtmlElement {
    let element: HtmlElement = document().create_element("div").unwrap().dyn_into().unwrap();
    element.set_id(id);
    let style = element.style();
    style.set_property("position", "fixed").unwrap();
    style.set_property("left", &format!("{}px", rect.x)).unwrap();
    style.set_property("top", &format!("{}px", rect.y)).unwrap();
    style.set_property("width", &format!("{}px", rect.width)).unwrap();
    style.set_property("height", &format!("{}px", rect.height)).unwrap();
    document().body().unwrap().append_child(&element).unwrap();
    element
}

fn overlay_roots() -> u32 {
    document()
        .query_selector_all(&format!("[{}]", ROOT_ATTRIBUTE))
        .unwrap()
        .length()
}

fn ignore_events() -> EventHandler {
    Rc::new(|_| EventDisposition::Ignored)
}

async fn tick() {
    gloo_timers::future::TimeoutFuture::new(0).await;
}

#[wasm_bindgen_test]
fn test_query_reports_client_rect() {
    let element = add_box("surface-rect", Rect::new(10.0, 20.0, 100.0, 30.0));
    let surface = WebSurface::new().unwrap();
    assert!(surface.is_interactive());

    let target = surface.query("#surface-rect").unwrap();
    assert_eq!(target.rect(), Some(Rect::new(10.0, 20.0, 100.0, 30.0)));

    element.remove();
    assert_eq!(target.rect(), None);
}

#[wasm_bindgen_test]
fn test_invalid_selector_is_not_found() {
    let surface = WebSurface::new().unwrap();
    assert!(surface.query("[[nope").is_none());
    assert!(surface.query("#does-not-exist").is_none());
}

#[wasm_bindgen_test]
fn test_overlay_lifecycle() {
    let surface = WebSurface::new().unwrap();
    let before = overlay_roots();
    let config = OverlayConfig::from(&WalkthroughOptions::default());
    let overlay = surface.create_overlay(&config, ignore_events()).unwrap();
    assert_eq!(overlay_roots(), before + 1);
    assert!(document()
        .get_element_by_id(walkthrough_web::style::STYLE_ELEMENT_ID)
        .is_some());

    overlay.set_tooltip_html(
        r#"<button data-walkthrough-action="prev">Back</button><button data-walkthrough-action="next">Next</button>"#,
    );
    assert_eq!(overlay.focusable_count(), 2);
    assert_eq!(overlay.focused_index(), None);
    // Hidden until first placed.
    overlay.move_tooltip(&TooltipPosition {
        placement: Placement::Below,
        at: Point { x: 40.0, y: 40.0 },
    });
    overlay.focus_at(1);
    assert_eq!(overlay.focused_index(), Some(1));

    overlay.apply_frame(&FrameLayout {
        ring: Rect::new(5.0, 5.0, 20.0, 20.0),
        ..FrameLayout::default()
    });
    overlay.announce("Step 1 of 1");

    overlay.remove();
    assert_eq!(overlay_roots(), before);
}

#[wasm_bindgen_test]
fn test_scroll_lock_is_reference_counted() {
    let surface = WebSurface::new().unwrap();
    let body = document().body().unwrap();
    let overflow = || body.style().get_property_value("overflow").unwrap();

    surface.set_scroll_locked(true);
    surface.set_scroll_locked(true);
    assert_eq!(overflow(), "hidden");
    surface.set_scroll_locked(false);
    assert_eq!(overflow(), "hidden");
    surface.set_scroll_locked(false);
    assert_eq!(overflow(), "");
}

#[wasm_bindgen_test]
async fn test_tour_runs_on_live_document() {
    let first = add_box("tour-first", Rect::new(20.0, 20.0, 80.0, 30.0));
    let second = add_box("tour-second", Rect::new(20.0, 200.0, 80.0, 30.0));
    let host = Host::new(
        Rc::new(WebSurface::new().unwrap()),
        Rc::new(MemoryStore::new()),
        Rc::new(MemoryStore::new()),
    );
    let options = WalkthroughOptions::default().with_wait(0, 10);
    let before = overlay_roots();

    let wt = Walkthrough::new(
        host,
        vec![Step::new("#tour-first").title("One"), Step::new("#tour-second").title("Two")],
        options,
    );
    wt.start(0).await;
    assert!(wt.is_active());
    assert_eq!(overlay_roots(), before + 1);

    let init = KeyboardEventInit::new();
    init.set_key("ArrowRight");
    init.set_bubbles(true);
    let event = KeyboardEvent::new_with_keyboard_event_init_dict("keydown", &init).unwrap();
    document().dispatch_event(&event).unwrap();
    tick().await;
    assert_eq!(wt.current_index(), Some(1));

    let init = KeyboardEventInit::new();
    init.set_key("Escape");
    let event = KeyboardEvent::new_with_keyboard_event_init_dict("keydown", &init).unwrap();
    document().dispatch_event(&event).unwrap();
    tick().await;
    assert!(wt.is_ended());
    assert_eq!(overlay_roots(), before);

    first.remove();
    second.remove();
}
