use wasm_bindgen::prelude::*;
use web_sys::console;

use crate::{compute_ipc_bytes, compute_plot_json};

fn js_progress<'a>(progress_callback: &'a js_sys::Function) -> impl FnMut(&str) + 'a {
    move |message: &str| {
        let _ = progress_callback.call1(&JsValue::NULL, &JsValue::from_str(message));
    }
}

#[wasm_bindgen]
pub fn process_wordlist_to_plot_json(
    wordlist_content: &[u8],
    is_gzipped: bool,
    progress_callback: &js_sys::Function,
) -> Result<String, JsValue> {
    console::log_1(&JsValue::from_str("Wasm core (JSON): starting."));
    let mut progress = js_progress(progress_callback);
    let result = compute_plot_json(wordlist_content, is_gzipped, &mut progress)
        .map_err(|e| JsValue::from_str(&e));
    console::log_1(&JsValue::from_str("Wasm core (JSON): done."));
    result
}

#[wasm_bindgen]
pub fn process_wordlist_to_ipc_bytes(
    wordlist_content: &[u8],
    is_gzipped: bool,
    progress_callback: &js_sys::Function,
) -> Result<Vec<u8>, JsValue> {
    console::log_1(&JsValue::from_str("Wasm core (IPC): starting."));
    let mut progress = js_progress(progress_callback);
    let result = compute_ipc_bytes(wordlist_content, is_gzipped, &mut progress)
        .map_err(|e| JsValue::from_str(&e));
    console::log_1(&JsValue::from_str("Wasm core (IPC): done."));
    result
}
