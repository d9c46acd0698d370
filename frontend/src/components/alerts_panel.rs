use leptos::{ev, event_target_checked, event_target_value, *};

use crate::scanner::{
    format::{bias_badge, bias_class, price},
    store::ALERT_CARDS_SHOWN,
    types::{Alert, Bias},
};

use super::dashboard::{ApiHandle, NoticeSignal, StoreSignal, apply_snapshot};

const DEFAULT_MIN_SCORE: u32 = 80;
const FILTER_BIASES: [Bias; 3] = [Bias::Long, Bias::Short, Bias::Neutral];

fn toggle_bias(biases: &mut Vec<Bias>, bias: Bias, on: bool) {
    if on {
        if !biases.contains(&bias) {
            biases.push(bias);
        }
    } else {
        biases.retain(|candidate| *candidate != bias);
    }
}

#[component]
pub fn AlertsPanel() -> impl IntoView {
    let store = use_context::<StoreSignal>().expect("store context missing");
    let api = use_context::<ApiHandle>().expect("api context missing");
    let notice = use_context::<NoticeSignal>().expect("notice context missing");

    let biases = create_rw_signal(vec![Bias::Long, Bias::Short]);
    let min_score = create_rw_signal(DEFAULT_MIN_SCORE);

    let total = create_memo(move |_| store.0.with(|store| store.alert_count()));
    let visible = create_memo(move |_| {
        let biases = biases.get();
        let min_score = min_score.get();
        store.0.with(|store| store.visible_alerts(&biases, min_score))
    });

    let clear = move |_| {
        let client = api.0.get_value();
        spawn_local(async move {
            match client.clear_alerts().await {
                Ok(snapshot) => apply_snapshot(store, snapshot),
                Err(err) => notice.0.set(Some(format!("Could not clear alerts: {err}"))),
            }
        });
    };

    view! {
        <section class="alerts-panel">
            <header class="alerts-panel__header">
                <h2>{move || format!("Alerts ({})", total.get())}</h2>
                <button on:click=clear prop:disabled=move || total.get() == 0>"Clear alerts"</button>
            </header>
            <div class="alerts-panel__filters">
                {FILTER_BIASES
                    .into_iter()
                    .map(|bias| view! {
                        <label>
                            <input
                                type="checkbox"
                                prop:checked=move || biases.with(|set| set.contains(&bias))
                                on:change=move |ev: ev::Event| {
                                    let on = event_target_checked(&ev);
                                    biases.update(|set| toggle_bias(set, bias, on));
                                }
                            />
                            {bias.as_str()}
                        </label>
                    })
                    .collect_view()}
                <label class="alerts-panel__score">
                    <span>{move || format!("Min score {}", min_score.get())}</span>
                    <input
                        type="range"
                        min="0"
                        max="100"
                        prop:value=move || min_score.get().to_string()
                        on:input=move |ev: ev::Event| {
                            if let Ok(score) = event_target_value(&ev).parse::<u32>() {
                                min_score.set(score);
                            }
                        }
                    />
                </label>
            </div>
            <Show
                when=move || !visible.get().is_empty()
                fallback=move || view! { <p class="alerts-panel__empty">"No alerts match the current filters."</p> }
            >
                <p class="alerts-panel__caption">
                    {move || format!("Showing up to {ALERT_CARDS_SHOWN} newest matching alerts")}
                </p>
                <div class="alerts-panel__cards">
                    <For
                        each=move || visible.get()
                        key=|alert| alert.id
                        children=move |alert: Alert| view! { <AlertCard alert=alert /> }
                    />
                </div>
            </Show>
        </section>
    }
}

#[component]
fn AlertCard(alert: Alert) -> impl IntoView {
    view! {
        <article class=format!("alert-card {}", bias_class(alert.bias))>
            <header>
                <span>{bias_badge(alert.bias)}</span>
                <strong>{alert.symbol.clone()}</strong>
                <span>{alert.bias.as_str()}</span>
                <span class="alert-card__score">{format!("score {}", alert.score)}</span>
                <span>{alert.session.as_str()}</span>
            </header>
            <p class="alert-card__levels">
                {format!(
                    "last {} | entry {} | stop {} | 1R {} | 2R {}",
                    price(alert.last),
                    price(alert.entry),
                    price(alert.stop),
                    price(alert.t1),
                    price(alert.t2)
                )}
            </p>
            <p class="alert-card__why">{alert.why.clone()}</p>
            <footer>
                <span>{alert.time.clone()}</span>
                <span>{format!("{} / {}", alert.mode.label(), alert.interval.as_str())}</span>
                {alert.as_of.clone().map(|as_of| view! { <span>"bar "{as_of}</span> })}
            </footer>
        </article>
    }
}
