use leptos::*;

use crate::scanner::{
    format::{bias_badge, bias_class, price, score_width},
    types::{ScanReport, SignalResult},
};

use super::dashboard::{ApiHandle, NoticeSignal, SelectedSymbolSignal, StoreSignal};

/// One-line banner for the best ranked setup.
pub fn top_banner(top: &SignalResult) -> String {
    format!(
        "{} {} {} (score {}, {})",
        bias_badge(top.bias),
        top.symbol,
        top.bias.as_str(),
        top.setup_score,
        top.session.as_str()
    )
}

fn report_caption(report: &ScanReport) -> String {
    format!(
        "{} symbols | {} | {} | {} ms | started {}",
        report.results.len(),
        report.mode.as_str(),
        report.interval.as_str(),
        report.duration_ms,
        report.started_at
    )
}

#[component]
pub fn ScannerTab() -> impl IntoView {
    let store = use_context::<StoreSignal>().expect("store context missing");
    let api = use_context::<ApiHandle>().expect("api context missing");
    let notice = use_context::<NoticeSignal>().expect("notice context missing");
    let selected_symbol =
        use_context::<SelectedSymbolSignal>().expect("selected symbol context missing");

    let rows = create_memo(move |_| store.0.with(|store| store.results()));
    let scanning = create_memo(move |_| store.0.with(|store| store.scanning()));
    let report = create_memo(move |_| store.0.with(|store| store.report().cloned()));

    let scan_now = move |_| {
        let client = api.0.get_value();
        spawn_local(async move {
            if let Err(err) = client.request_scan().await {
                notice.0.set(Some(format!("Scan request failed: {err}")));
            }
        });
    };

    let test_alert = move |_| {
        let client = api.0.get_value();
        spawn_local(async move {
            if let Err(err) = client.test_alert().await {
                notice.0.set(Some(format!("Test alert failed: {err}")));
            }
        });
    };

    view! {
        <section class="scanner-tab">
            <div class="scanner-tab__actions">
                <button on:click=scan_now prop:disabled=move || scanning.get()>
                    {move || if scanning.get() { "Scanning..." } else { "Scan watchlist" }}
                </button>
                <button on:click=test_alert>"Capture test alert"</button>
            </div>

            {move || report.get().map(|report| {
                let banner = report.results.first().map(top_banner);
                let caption = report_caption(&report);
                let warning = report.warning.clone();
                let errors = report.errors.clone();
                view! {
                    <div class="scanner-tab__summary">
                        {banner.map(|text| view! { <p class="scanner-tab__top">"Top setup: "{text}</p> })}
                        <p class="scanner-tab__caption">{caption}</p>
                        {warning.map(|text| view! { <p class="scanner-tab__warning">{text}</p> })}
                        {(!errors.is_empty()).then(|| view! {
                            <details class="scanner-tab__errors">
                                <summary>{format!("{} symbol(s) failed", errors.len())}</summary>
                                <ul>
                                    {errors
                                        .into_iter()
                                        .map(|err| view! { <li><strong>{err.symbol}</strong>": "{err.message}</li> })
                                        .collect_view()}
                                </ul>
                            </details>
                        })}
                    </div>
                }
            })}

            <Show
                when=move || !rows.get().is_empty()
                fallback=move || view! { <p class="scanner-tab__empty">"No scan yet. Press Scan watchlist."</p> }
            >
                <table class="scanner-table">
                    <thead>
                        <tr>
                            <th>"Symbol"</th>
                            <th>"Bias"</th>
                            <th>"Score"</th>
                            <th>"Session"</th>
                            <th>"Last"</th>
                            <th>"Entry"</th>
                            <th>"Stop"</th>
                            <th>"1R"</th>
                            <th>"2R"</th>
                            <th>"Why"</th>
                        </tr>
                    </thead>
                    <tbody>
                        <For
                            each=move || rows.get()
                            key=|row| (row.symbol.clone(), row.setup_score, row.bias)
                            children=move |row: SignalResult| {
                                let symbol_for_click = row.symbol.clone();
                                let symbol_for_selected = row.symbol.clone();
                                let score = row.setup_score;

                                view! {
                                    <tr
                                        on:click=move |_| selected_symbol.0.set(Some(symbol_for_click.clone()))
                                        class:selected=move || selected_symbol.0.get().as_deref() == Some(symbol_for_selected.as_str())
                                    >
                                        <td>{row.symbol.clone()}</td>
                                        <td><span class=bias_class(row.bias)>{row.bias.as_str()}</span></td>
                                        <td>
                                            <div class="score-bar">
                                                <div class="score-bar__fill" style:width=score_width(score)></div>
                                                <span>{score}</span>
                                            </div>
                                        </td>
                                        <td>{row.session.as_str()}</td>
                                        <td>{price(row.last_price)}</td>
                                        <td>{price(row.entry)}</td>
                                        <td>{price(row.stop)}</td>
                                        <td>{price(row.target_1r)}</td>
                                        <td>{price(row.target_2r)}</td>
                                        <td class="scanner-table__why">{row.reason.clone()}</td>
                                    </tr>
                                }
                            }
                        />
                    </tbody>
                </table>
            </Show>
        </section>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::types::{Bias, Session};

    #[test]
    fn banner_names_symbol_bias_and_session() {
        let top = SignalResult {
            symbol: "NVDA".into(),
            bias: Bias::Short,
            setup_score: 91,
            reason: "VWAP reject".into(),
            entry: Some(120.0),
            stop: Some(120.5),
            target_1r: Some(119.5),
            target_2r: Some(119.0),
            last_price: Some(120.0),
            timestamp: None,
            session: Session::Power,
        };
        assert_eq!(top_banner(&top), "🔴 NVDA SHORT (score 91, POWER)");
    }
}
