//! Tour modules fetched as JSON over HTTP.

use std::rc::Rc;

use anyhow::anyhow;
use futures::future::FutureExt;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use walkthrough::core::orchestrator::module_from_json;
use walkthrough::TourLoader;

/// Loader treating each specifier as the URL of a JSON tour document.
pub fn fetch_loader() -> TourLoader {
    Rc::new(|specifier: &str| {
        let url = specifier.to_string();
        async move {
            let value = fetch_json(&url).await?;
            Ok(module_from_json(value))
        }
        .boxed_local()
    })
}

async fn fetch_json(url: &str) -> anyhow::Result<serde_json::Value> {
    let window = web_sys::window().ok_or_else(|| anyhow!("no window"))?;
    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| anyhow!("fetch {url} failed: {:?}", e))?;
    let response: web_sys::Response = response
        .dyn_into()
        .map_err(|_| anyhow!("fetch {url} returned a non-response"))?;
    if !response.ok() {
        return Err(anyhow!("fetch {url} returned HTTP {}", response.status()));
    }
    let body = response
        .json()
        .map_err(|e| anyhow!("{url} has no JSON body: {:?}", e))?;
    let body = JsFuture::from(body)
        .await
        .map_err(|e| anyhow!("{url} is not valid JSON: {:?}", e))?;
    serde_wasm_bindgen::from_value(body).map_err(|e| anyhow!("{url}: {e}"))
}
