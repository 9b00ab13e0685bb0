//! `tracing` subscriber setup.
//!
//! In the browser, formatted events go to the developer console; natively (tests, tooling) they
//! go to stderr. Timestamps are disabled because `SystemTime` is unavailable on wasm32.

use std::io;

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Line-buffered writer that forwards complete lines to `console.log`.
#[derive(Default)]
pub struct ConsoleWriter {
    buffer: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end();
        #[cfg(target_arch = "wasm32")]
        web_sys::console::log_1(&wasm_bindgen::JsValue::from_str(line));
        #[cfg(not(target_arch = "wasm32"))]
        eprintln!("{}", line);
        self.buffer.clear();
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let _ = io::Write::flush(self);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Console;

impl<'a> MakeWriter<'a> for Console {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::default()
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(level: Level) {
    let result = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(Console)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .try_init();
    if result.is_ok() {
        tracing::debug!("logging initialised at {}", level);
    }
}
