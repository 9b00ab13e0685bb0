use india_boundary_viewer::BoundaryViewer;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen_futures::JsFuture;

/// Starts the viewer selected by the page's `data-variant` attribute on `<body>`.
#[wasm_bindgen]
pub async fn run_demo() {
    let vector = web_variant().as_deref() == Some("national-overlay");
    let viewer = if vector {
        BoundaryViewer::with_vector_style()
    } else {
        BoundaryViewer::new()
    };
    tracing::info!("Launching {} demo", viewer.variant());

    if let Err(e) = JsFuture::from(viewer.launch()).await {
        tracing::error!("Demo failed: {:?}", e);
    }
}

fn web_variant() -> Option<String> {
    let body = js_sys::Reflect::get(&js_sys::global(), &"document".into())
        .ok()
        .and_then(|document| js_sys::Reflect::get(&document, &"body".into()).ok())?;
    js_sys::Reflect::get(&body, &"dataset".into())
        .ok()
        .and_then(|dataset| js_sys::Reflect::get(&dataset, &"variant".into()).ok())
        .and_then(|variant| variant.as_string())
}
