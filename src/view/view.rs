use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::convert::FromWasmAbi;
use wasm_bindgen::JsCast;
use web_sys::{Document, Event, HtmlElement, HtmlInputElement, KeyboardEvent};

use crate::engine::controller::{LOAD_ERROR_BODY, LOAD_ERROR_TITLE};
use crate::engine::{
    load_regions, DialogContent, DialogSurface, DismissTrigger, HighlightTicket, HttpFetcher,
    InfoDialog, SelectionController,
};
use crate::error::ViewerError;
use crate::model::{GeoPoint, RegionCatalog, ViewerConfig, ViewerResult, ViewerVariant};
use crate::view::canvas::CanvasSurface;
use crate::view::dom::{add_instructions, build_controls, document, element_by_id, DomDialog};
use crate::view::maplibre::MapLibreSurface;
use crate::view::{InteractiveSurface, MapClick};

type SharedController<M> = Rc<RefCell<SelectionController<M, DomDialog>>>;

/// Browser entry point: owns the configuration until [`BoundaryViewer::launch`] is called.
#[wasm_bindgen]
pub struct BoundaryViewer {
    config: ViewerConfig,
}

impl Default for BoundaryViewer {
    fn default() -> Self {
        BoundaryViewer {
            config: ViewerConfig::india_raster(),
        }
    }
}

impl BoundaryViewer {
    pub fn with_config(config: ViewerConfig) -> Self {
        BoundaryViewer { config }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }
}

#[wasm_bindgen]
impl BoundaryViewer {
    /// Canvas viewer that isolates one region at a time.
    #[wasm_bindgen(constructor)]
    pub fn new() -> BoundaryViewer {
        BoundaryViewer::default()
    }

    /// MapLibre viewer that keeps the national outline visible.
    #[wasm_bindgen(js_name = withVectorStyle)]
    pub fn with_vector_style() -> BoundaryViewer {
        BoundaryViewer::with_config(ViewerConfig::india_vector())
    }

    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(json: &str) -> Result<BoundaryViewer, JsValue> {
        Ok(BoundaryViewer::with_config(ViewerConfig::from_json_str(json)?))
    }

    #[wasm_bindgen(getter)]
    pub fn variant(&self) -> String {
        match self.config.variant {
            ViewerVariant::Isolate => "isolate".to_string(),
            ViewerVariant::NationalOverlay => "national-overlay".to_string(),
        }
    }

    /// Builds the map and controls and loads every region. The returned promise settles once the
    /// controls are in place.
    pub fn launch(&self) -> js_sys::Promise {
        let config = self.config.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            run(config).await?;
            Ok(JsValue::UNDEFINED)
        })
    }
}

/// Shows the load error dialog when no controller exists yet.
fn report_before_start(dialog: &mut DomDialog, error: &ViewerError) {
    tracing::error!("Viewer could not start: {}", error);
    let mut info = InfoDialog::default();
    info.show(LOAD_ERROR_TITLE, DialogContent::text(LOAD_ERROR_BODY));
    dialog.present(&info);
}

async fn run(config: ViewerConfig) -> ViewerResult<()> {
    let document = document()?;
    let mut dialog = DomDialog::from_document(&document, &config.dom)?;
    let catalog = match config.validate() {
        Ok(catalog) => catalog,
        Err(e) => {
            report_before_start(&mut dialog, &e);
            return Err(e);
        }
    };
    tracing::info!(
        "Starting {:?} viewer with {} regions",
        config.variant,
        catalog.len()
    );

    match config.variant {
        ViewerVariant::Isolate => match CanvasSurface::mount(&document, &config) {
            Ok(surface) => launch(document, config, catalog, surface, dialog).await,
            Err(e) => {
                report_before_start(&mut dialog, &e);
                Err(e)
            }
        },
        ViewerVariant::NationalOverlay => match MapLibreSurface::mount(&config).await {
            Ok(surface) => launch(document, config, catalog, surface, dialog).await,
            Err(e) => {
                report_before_start(&mut dialog, &e);
                Err(e)
            }
        },
    }
}

async fn launch<M: InteractiveSurface + 'static>(
    document: Document,
    config: ViewerConfig,
    catalog: RegionCatalog,
    surface: M,
    dialog: DomDialog,
) -> ViewerResult<()> {
    let modal = dialog.modal().clone();
    let controller: SharedController<M> = Rc::new(RefCell::new(SelectionController::new(
        &config,
        catalog.clone(),
        surface,
        dialog,
    )));
    bind_dismissal(&document, &config, &modal, &controller)?;

    let fetcher = match HttpFetcher::for_current_page() {
        Ok(fetcher) => fetcher,
        Err(e) => {
            controller.borrow_mut().report_fatal(&e);
            return Err(e);
        }
    };
    let outcomes = load_regions(&fetcher, &catalog).await;
    let controls = controller.borrow_mut().install(outcomes);

    for radio in build_controls(&document, &config.dom, &controls)? {
        let weak = Rc::downgrade(&controller);
        let key = radio.state.key.clone();
        listen(radio.input.as_ref(), "change", move |event: Event| {
            let checked = event
                .target()
                .and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
                .is_some_and(|input| input.checked());
            if !checked {
                return;
            }
            with_controller(&weak, |controller| {
                if let Err(e) = controller.on_select(&key) {
                    tracing::warn!("Selection rejected: {}", e);
                }
            });
        })?;
    }
    add_instructions(&document, &config.dom, &config.instructions)?;

    bind_map_input(&controller, config.highlight_duration_ms)?;
    tracing::info!("Viewer ready");
    Ok(())
}

fn with_controller<M: InteractiveSurface, R>(
    weak: &Weak<RefCell<SelectionController<M, DomDialog>>>,
    action: impl FnOnce(&mut SelectionController<M, DomDialog>) -> R,
) -> Option<R> {
    let controller = weak.upgrade()?;
    let Ok(mut controller) = controller.try_borrow_mut() else {
        tracing::debug!("Controller busy, dropping event");
        return None;
    };
    Some(action(&mut controller))
}

fn listen<E: FromWasmAbi + 'static>(
    target: &web_sys::EventTarget,
    event: &str,
    handler: impl FnMut(E) + 'static,
) -> ViewerResult<()> {
    let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(E)>);
    target
        .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
        .map_err(|_| ViewerError::Wasm(format!("Could not listen for {}", event)))?;
    callback.forget();
    Ok(())
}

fn bind_dismissal<M: InteractiveSurface + 'static>(
    document: &Document,
    config: &ViewerConfig,
    modal: &HtmlElement,
    controller: &SharedController<M>,
) -> ViewerResult<()> {
    let close: HtmlElement = element_by_id(document, &config.dom.modal_close)?;
    let weak = Rc::downgrade(controller);
    listen(close.as_ref(), "click", move |_: Event| {
        with_controller(&weak, |c| c.on_dialog_dismiss(DismissTrigger::CloseControl));
    })?;

    let weak = Rc::downgrade(controller);
    let backdrop: JsValue = modal.clone().into();
    listen(modal.as_ref(), "click", move |event: Event| {
        // Clicks inside the dialog box bubble up with a different target.
        let on_backdrop = event
            .target()
            .is_some_and(|target| JsValue::from(target) == backdrop);
        if on_backdrop {
            with_controller(&weak, |c| c.on_dialog_dismiss(DismissTrigger::Backdrop));
        }
    })?;

    let weak = Rc::downgrade(controller);
    listen(document.as_ref(), "keydown", move |event: KeyboardEvent| {
        if event.key() == "Escape" {
            with_controller(&weak, |c| c.on_dialog_dismiss(DismissTrigger::Escape));
        }
    })
}

fn bind_map_input<M: InteractiveSurface + 'static>(
    controller: &SharedController<M>,
    highlight_ms: u32,
) -> ViewerResult<()> {
    let weak = Rc::downgrade(controller);
    let on_click = Box::new(move |click: MapClick| {
        let ticket = with_controller(&weak, |controller| {
            let target = match click {
                MapClick::At(point) => controller.hit_test(point.lng, point.lat),
                MapClick::Feature(key, feature) => Some((key, feature)),
            };
            let (key, feature) = target?;
            match controller.on_feature_click(&key, feature) {
                Ok(ticket) => Some(ticket),
                Err(e) => {
                    tracing::warn!("Click ignored: {}", e);
                    None
                }
            }
        })
        .flatten();
        if let Some(ticket) = ticket {
            schedule_revert(weak.clone(), ticket, highlight_ms);
        }
    });

    let weak = Rc::downgrade(controller);
    let on_hover = Box::new(move |point: GeoPoint| {
        with_controller(&weak, |controller| {
            let (key, feature) = controller.hit_test(point.lng, point.lat)?;
            controller.tooltip(&key, feature).map(str::to_string)
        })
        .flatten()
    });

    let mut controller = controller.borrow_mut();
    let surface = controller.surface_mut();
    surface.on_click(on_click)?;
    surface.on_hover(on_hover)
}

fn schedule_revert<M: InteractiveSurface + 'static>(
    weak: Weak<RefCell<SelectionController<M, DomDialog>>>,
    ticket: HighlightTicket,
    delay_ms: u32,
) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let revert = Closure::once_into_js(move || {
        with_controller(&weak, |controller| controller.on_highlight_elapsed(&ticket));
    });
    if window
        .set_timeout_with_callback_and_timeout_and_arguments_0(
            revert.unchecked_ref(),
            delay_ms as i32,
        )
        .is_err()
    {
        tracing::warn!("Could not schedule highlight reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_pick_the_variant() {
        assert_eq!(BoundaryViewer::new().variant(), "isolate");
        assert_eq!(BoundaryViewer::with_vector_style().variant(), "national-overlay");
        assert_eq!(
            BoundaryViewer::new().config().instructions,
            "Choose a state or click one on the map"
        );
    }
}
