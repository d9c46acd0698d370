use leptos::*;

use crate::scanner::{
    api::ApiClient,
    store::{DashboardStore, SNAPSHOT_VERSION},
    types::DashboardSnapshot,
    websocket::StreamStatus,
};

#[cfg(target_arch = "wasm32")]
use std::rc::Rc;

#[cfg(target_arch = "wasm32")]
use crate::scanner::websocket::connect_with_retry;

use super::{
    alerts_panel::AlertsPanel, detail_chart::DetailChart, scanner_tab::ScannerTab,
    sidebar::Sidebar,
};

const GATEWAY_PORT: u16 = 9001;

#[derive(Clone, Copy)]
pub struct StoreSignal(pub RwSignal<DashboardStore>);

#[derive(Clone, Copy)]
pub struct SelectedSymbolSignal(pub RwSignal<Option<String>>);

#[derive(Clone, Copy)]
pub struct ConnectionStatusSignal(pub RwSignal<StreamStatus>);

/// Last failed action, shown under the header until dismissed.
#[derive(Clone, Copy)]
pub struct NoticeSignal(pub RwSignal<Option<String>>);

#[derive(Clone, Copy)]
pub struct ApiHandle(pub StoredValue<ApiClient>);

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Scanner,
    Alerts,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Scanner, Tab::Alerts];

    pub fn label(self) -> &'static str {
        match self {
            Tab::Scanner => "Scanner",
            Tab::Alerts => "Alerts",
        }
    }
}

/// Apply a snapshot returned by a REST call the same way a pushed one is applied.
pub fn apply_snapshot(store: StoreSignal, snapshot: DashboardSnapshot) {
    store.0.update(|store| {
        store.apply(snapshot, SNAPSHOT_VERSION);
    });
}

/// Top-level dashboard wrapper providing shared application state via context.
#[component]
pub fn Dashboard() -> impl IntoView {
    let store = create_rw_signal(DashboardStore::new());
    let selected_symbol = create_rw_signal(None::<String>);
    let connection_status = create_rw_signal(StreamStatus::Idle);
    let notice = create_rw_signal(None::<String>);
    let active_tab = create_rw_signal(Tab::Scanner);
    let api = store_value(ApiClient::new(gateway_base_url()));

    #[cfg(target_arch = "wasm32")]
    {
        let store_for_ws = store;
        let status_for_ws = connection_status;
        leptos::create_effect(move |_| init_live_updates(store_for_ws, status_for_ws));
    }

    provide_context(StoreSignal(store));
    provide_context(SelectedSymbolSignal(selected_symbol));
    provide_context(ConnectionStatusSignal(connection_status));
    provide_context(NoticeSignal(notice));
    provide_context(ApiHandle(api));

    let alert_count = create_memo(move |_| store.with(|store| store.alert_count()));
    let feed = create_memo(move |_| {
        store.with(|store| {
            store
                .snapshot()
                .map(|snapshot| snapshot.feed.clone())
                .unwrap_or_default()
        })
    });

    view! {
        <div class="dashboard">
            <header class="dashboard__header">
                <div>
                    <h1>"Scalp Scanner"</h1>
                    <p>"Intraday reversal setups ranked by score, with in-session alerts."</p>
                </div>
                <div class="dashboard__meta">
                    <span class="dashboard__feed">{move || format!("feed: {}", feed.get())}</span>
                    <StatusBadge />
                </div>
            </header>
            {move || notice.get().map(|message| view! {
                <div class="notice" on:click=move |_| notice.set(None)>{message}</div>
            })}
            <section class="dashboard__body">
                <aside class="dashboard__sidebar">
                    <Sidebar />
                </aside>
                <div class="dashboard__main">
                    <nav class="tabs">
                        {Tab::ALL
                            .into_iter()
                            .map(|tab| view! {
                                <button
                                    class="tabs__tab"
                                    class:active=move || active_tab.get() == tab
                                    on:click=move |_| active_tab.set(tab)
                                >
                                    {tab.label()}
                                    {move || (tab == Tab::Alerts).then(|| format!(" ({})", alert_count.get()))}
                                </button>
                            })
                            .collect_view()}
                    </nav>
                    {move || match active_tab.get() {
                        Tab::Scanner => view! {
                            <ScannerTab />
                            <DetailChart />
                        }
                        .into_view(),
                        Tab::Alerts => view! { <AlertsPanel /> }.into_view(),
                    }}
                </div>
            </section>
        </div>
    }
}

#[component]
fn StatusBadge() -> impl IntoView {
    let status = use_context::<ConnectionStatusSignal>().expect("connection status context missing");

    view! {
        <span class=move || format!("status status--{}", status_class(status.0.get()))>
            {move || status_label(status.0.get())}
        </span>
    }
}

fn status_class(status: StreamStatus) -> &'static str {
    match status {
        StreamStatus::Idle => "idle",
        StreamStatus::Connecting => "connecting",
        StreamStatus::Connected => "connected",
        StreamStatus::Reconnecting { .. } => "reconnecting",
        StreamStatus::Failed => "failed",
    }
}

fn status_label(status: StreamStatus) -> String {
    match status {
        StreamStatus::Idle => "idle".into(),
        StreamStatus::Connecting => "connecting".into(),
        StreamStatus::Connected => "live".into(),
        StreamStatus::Reconnecting { attempt } => format!("reconnecting ({attempt})"),
        StreamStatus::Failed => "offline".into(),
    }
}

fn gateway_host() -> String {
    #[cfg(target_arch = "wasm32")]
    {
        if let Some(host) = web_sys::window()
            .and_then(|window| window.location().hostname().ok())
            .filter(|hostname| !hostname.is_empty())
        {
            return host;
        }
    }
    "127.0.0.1".to_string()
}

fn gateway_base_url() -> String {
    format!("http://{}:{GATEWAY_PORT}", gateway_host())
}

#[cfg(target_arch = "wasm32")]
fn init_live_updates(store: RwSignal<DashboardStore>, status: RwSignal<StreamStatus>) {
    let on_snapshot = Rc::new(move |snapshot: DashboardSnapshot| {
        store.update(|store| {
            store.apply(snapshot, SNAPSHOT_VERSION);
        });
    });

    let on_status = Rc::new(move |state: StreamStatus| {
        status.set(state);
    });

    let url = format!("ws://{}:{GATEWAY_PORT}/ws", gateway_host());
    connect_with_retry(url, on_snapshot, on_status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_label_carries_attempt() {
        assert_eq!(
            status_label(StreamStatus::Reconnecting { attempt: 3 }),
            "reconnecting (3)"
        );
        assert_eq!(status_class(StreamStatus::Failed), "failed");
    }

    #[test]
    fn native_base_url_uses_loopback() {
        assert_eq!(gateway_base_url(), "http://127.0.0.1:9001");
    }
}
