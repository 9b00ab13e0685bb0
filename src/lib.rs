use wasm_bindgen::prelude::*;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod view;

pub use error::ViewerError;
pub use model::{ViewerConfig, ViewerResult, ViewerVariant};
pub use view::view::BoundaryViewer;

#[wasm_bindgen(start)]
fn start() {
    console_error_panic_hook::set_once();
    logging::init_logging(tracing::Level::INFO);
}
