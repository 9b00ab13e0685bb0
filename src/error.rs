use thiserror::Error;
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("i/o error: {0}")]
    Io(String),
    #[error("Failed to load {file} ({status})")]
    Http { file: String, status: u16 },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("WebAssembly error: {0}")]
    Wasm(String),
    #[error("Unknown or unavailable region: {0}")]
    UnknownRegion(String),
}

impl From<ViewerError> for wasm_bindgen::JsValue {
    fn from(err: ViewerError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
