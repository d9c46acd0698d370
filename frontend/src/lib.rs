use leptos::*;
use wasm_bindgen::prelude::wasm_bindgen;

mod components;
mod logging;
pub mod scanner;

pub use components::dashboard::Dashboard;
pub use logging::init_logging;
pub use scanner::api::ApiClient;
pub use scanner::store::DashboardStore;
pub use scanner::types::{Alert, Bias, DashboardSnapshot, ScanSettings, SignalResult};
pub use scanner::websocket::{StreamStatus, connect_with_retry};

#[component]
pub fn App() -> impl IntoView {
    view! {
        <main class="app-root">
            <Dashboard />
        </main>
    }
}

/// WASM entry point called by `trunk`.
#[wasm_bindgen(start)]
pub fn main() -> Result<(), wasm_bindgen::JsValue> {
    init_logging();
    console_error_panic_hook::set_once();

    leptos::mount_to_body(|| view! { <App /> });
    Ok(())
}
