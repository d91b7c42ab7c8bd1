#![allow(non_snake_case)]

//! Browser host for the walkthrough engine: a `web-sys` surface, Web Storage
//! adapters, a JSON module loader and Leptos bindings.

pub mod binding;
pub mod host;
pub mod loader;
pub mod logger;
pub mod storage;
pub mod style;
pub mod surface;

#[cfg(feature = "demo")]
mod demo;

pub use binding::{
    provide_walkthrough, provide_walkthrough_with, use_loaded_route_tours, use_route_tours,
    use_walkthrough, WalkthroughState,
};
pub use host::web_host;
pub use loader::fetch_loader;
pub use storage::WebStore;
pub use surface::WebSurface;

#[cfg(feature = "demo")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "demo")]
#[wasm_bindgen(start)]
pub fn main() {
    // Initialize console error panic hook for better error messages
    console_error_panic_hook::set_once();
    logger::init(if host::debug_flag() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    log::info!("Starting walkthrough demo v{}", walkthrough::VERSION);

    leptos::mount::mount_to_body(demo::App);
}
