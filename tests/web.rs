//! Smoke tests for the WASM surface. Run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Function, Object, Reflect};
use tagcore::{version, TagKey, TaggerCore};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn callbacks(page_text: &str) -> Object {
    let callbacks = Object::new();
    let text = Function::new_no_args(&format!("return {:?};", page_text));
    Reflect::set(&callbacks, &JsValue::from_str("getPageText"), &text).unwrap();
    let controls = Function::new_no_args("return [{ handle: 1, checked: false }];");
    Reflect::set(&callbacks, &JsValue::from_str("findControls"), &controls).unwrap();
    let label = Function::new_with_args("handle", "return 'Tailgating';");
    Reflect::set(&callbacks, &JsValue::from_str("getLabelText"), &label).unwrap();
    callbacks
}

#[wasm_bindgen_test]
fn version_names_the_crate() {
    assert!(version().starts_with("tagcore v"));
}

#[wasm_bindgen_test]
fn core_scans_through_js_callbacks() {
    let config = Some(r#"{"debounce_ms": 1}"#.to_string());
    let mut core = TaggerCore::new(callbacks("tailgating on the highway"), config, None).unwrap();
    core.start();

    // Wait out the debounce window
    let deadline = js_sys::Date::now() + 5.0;
    while js_sys::Date::now() < deadline {}

    let mut step = core.tick();
    while step == "yielded" {
        step = core.resume();
    }
    assert_eq!(step, "completed");

    let snapshot = core.snapshot().unwrap();
    let detected = Reflect::get(&snapshot, &JsValue::from_str("detected")).unwrap();
    assert!(Array::from(&detected).length() >= 1);
}

#[wasm_bindgen_test]
fn toggle_and_submit_without_optional_callbacks() {
    let mut core = TaggerCore::new(callbacks(""), None, None).unwrap();
    core.start();

    assert!(core.toggle_tag("F2", false));
    let selection: Vec<TagKey> = serde_wasm_bindgen::from_value(core.selection().unwrap()).unwrap();
    assert_eq!(selection, vec![TagKey::new("f2")]);

    let record = core.submit().unwrap();
    assert!(!record.is_null());
}

#[wasm_bindgen_test]
fn unknown_command_is_rejected() {
    let mut core = TaggerCore::new(callbacks(""), None, None).unwrap();
    assert!(core.handle_command("rewind").is_err());
    assert!(core.handle_command("increase-speed").is_ok());
    assert_eq!(core.speed(), 1.25);
}
