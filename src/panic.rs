use std::{fmt::Write, panic};

use wasm_bindgen::prelude::wasm_bindgen;

#[wasm_bindgen]
extern "C" {
    type Error;

    #[wasm_bindgen(constructor)]
    fn new() -> Error;

    #[wasm_bindgen(structural, method, getter)]
    fn stack(error: &Error) -> String;

    #[wasm_bindgen(static_method_of = Error, setter, js_name = stackTraceLimit)]
    fn stack_trace_limit(size: f32);
}

pub fn setup_panic_hook() {
    panic::set_hook(Box::new(panic_hook));
}

/// Logs the panic with the JS stack, since wasm has no native backtraces.
fn panic_hook(info: &panic::PanicHookInfo) {
    let mut message = String::new();
    let _ = writeln!(message, "{}", info);

    Error::stack_trace_limit(64_f32);

    let stack = Error::new().stack();

    // Frames up to and including `__rust_end_short_backtrace` belong to the
    // panic machinery.
    if stack.contains("__rust_end_short_backtrace") {
        for line in stack.lines().skip_while(|line| !line.contains("__rust_end_short_backtrace")).skip(1) {
            let _ = writeln!(message, "{}", line);
        }
    } else {
        let frames = stack.split_once('\n').map(|(_, s)| s).unwrap_or(&stack);
        let _ = writeln!(message, "{}", frames);
    }

    log::error!("{}", message);
}
