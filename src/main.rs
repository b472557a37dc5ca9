#[cfg(not(target_arch = "wasm32"))]
fn main() {
    pollster::block_on(geoglobe::run());
}

// the browser build starts through `#[wasm_bindgen(start)]`
#[cfg(target_arch = "wasm32")]
fn main() {}
