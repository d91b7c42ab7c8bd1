//! Browser [`Host`] assembly.

use std::rc::Rc;

use walkthrough::core::storage::UnavailableStore;
use walkthrough::{DebugRecorder, Host, NullSurface};
use wasm_bindgen::JsValue;

use crate::storage::WebStore;
use crate::surface::WebSurface;

/// Global flag that turns on the debug recorder, e.g.
/// `window.__WALKTHROUGH_DEBUG__ = true` before the app loads.
pub const DEBUG_FLAG: &str = "__WALKTHROUGH_DEBUG__";

/// Host over the current document and Web Storage.
///
/// Outside a browser main thread the host is inert: engines started on it
/// return immediately and nothing is persisted.
pub fn web_host() -> Host {
    let host = match WebSurface::new() {
        Some(surface) => Host::new(
            Rc::new(surface),
            Rc::new(WebStore::local()),
            Rc::new(WebStore::session()),
        ),
        None => {
            log::debug!("No document; walkthroughs are disabled");
            Host::new(
                Rc::new(NullSurface),
                Rc::new(UnavailableStore),
                Rc::new(UnavailableStore),
            )
        }
    };
    let recorder = DebugRecorder::new();
    recorder.set_enabled(debug_flag());
    host.with_debug(recorder)
}

/// Whether the page opted into debug recording.
pub fn debug_flag() -> bool {
    let Some(window) = web_sys::window() else {
        return false;
    };
    js_sys::Reflect::get(&window, &JsValue::from_str(DEBUG_FLAG))
        .map(|value| value.is_truthy())
        .unwrap_or(false)
}
