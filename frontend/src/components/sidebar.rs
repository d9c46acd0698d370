use leptos::{ev, event_target_checked, event_target_value, *};

use crate::scanner::types::{Interval, ScanSettings, SettingsUpdate, SignalMode, TimeFilter};

use super::dashboard::{ApiHandle, NoticeSignal, StoreSignal};

/// Send a partial settings update; failures land in the notice banner.
fn send_update(api: ApiHandle, notice: NoticeSignal, update: SettingsUpdate) {
    let client = api.0.get_value();
    spawn_local(async move {
        match client.update_settings(&update).await {
            Ok(_) => notice.0.set(None),
            Err(err) => notice.0.set(Some(format!("Settings rejected: {err}"))),
        }
    });
}

/// Parse a numeric input, reporting garbage instead of sending it.
fn parse_field<T: std::str::FromStr>(notice: NoticeSignal, label: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            notice.0.set(Some(format!("{label}: '{raw}' is not a number")));
            None
        }
    }
}

/// Blank threshold means "follow the mode default".
pub fn threshold_update(raw: &str) -> Result<Option<u32>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>()
        .map(Some)
        .map_err(|_| format!("alert threshold: '{raw}' is not a number"))
}

#[component]
pub fn Sidebar() -> impl IntoView {
    let store = use_context::<StoreSignal>().expect("store context missing");
    let api = use_context::<ApiHandle>().expect("api context missing");
    let notice = use_context::<NoticeSignal>().expect("notice context missing");

    let settings = create_memo(move |_| {
        store
            .0
            .with(|store| store.snapshot().map(|snapshot| snapshot.settings.clone()))
    });
    let effective_threshold = create_memo(move |_| {
        store
            .0
            .with(|store| store.snapshot().map_or(0, |snapshot| snapshot.effective_threshold))
    });

    let read = move |f: fn(&ScanSettings) -> String| {
        move || settings.get().map(|settings| f(&settings)).unwrap_or_default()
    };
    let flag = move |f: fn(&ScanSettings) -> bool| {
        move || settings.get().is_some_and(|settings| f(&settings))
    };
    let time_filter = move || {
        settings.get().map_or(
            TimeFilter {
                opening: true,
                midday: false,
                power: true,
            },
            |settings| settings.time_filter,
        )
    };

    let update_filter = move |apply: fn(&mut TimeFilter, bool), checked: bool| {
        let mut filter = time_filter();
        apply(&mut filter, checked);
        send_update(
            api,
            notice,
            SettingsUpdate {
                time_filter: Some(filter),
                ..SettingsUpdate::default()
            },
        );
    };

    view! {
        <section class="sidebar">
            <h2>"Scanner controls"</h2>

            <label class="sidebar__field">
                <span>"Watchlist"</span>
                <textarea
                    rows="4"
                    prop:value=read(|settings| settings.watchlist.join(", "))
                    on:change=move |ev: ev::Event| {
                        send_update(api, notice, SettingsUpdate {
                            watchlist: Some(event_target_value(&ev)),
                            ..SettingsUpdate::default()
                        });
                    }
                />
            </label>

            <label class="sidebar__field">
                <span>"Interval"</span>
                <select
                    prop:value=read(|settings| settings.interval.as_str().to_string())
                    on:change=move |ev: ev::Event| {
                        if let Some(interval) = Interval::parse(&event_target_value(&ev)) {
                            send_update(api, notice, SettingsUpdate {
                                interval: Some(interval),
                                ..SettingsUpdate::default()
                            });
                        }
                    }
                >
                    {Interval::ALL
                        .into_iter()
                        .map(|interval| view! { <option value=interval.as_str()>{interval.as_str()}</option> })
                        .collect_view()}
                </select>
            </label>

            <label class="sidebar__field">
                <span>"Signal mode"</span>
                <select
                    prop:value=read(|settings| settings.mode.as_str().to_string())
                    on:change=move |ev: ev::Event| {
                        if let Some(mode) = SignalMode::parse(&event_target_value(&ev)) {
                            send_update(api, notice, SettingsUpdate {
                                mode: Some(mode),
                                ..SettingsUpdate::default()
                            });
                        }
                    }
                >
                    {SignalMode::ALL
                        .into_iter()
                        .map(|mode| view! { <option value=mode.as_str()>{mode.label()}</option> })
                        .collect_view()}
                </select>
            </label>

            <fieldset class="sidebar__group">
                <legend>"Sessions"</legend>
                <label>
                    <input
                        type="checkbox"
                        prop:checked=move || time_filter().opening
                        on:change=move |ev: ev::Event| {
                            update_filter(|filter, on| filter.opening = on, event_target_checked(&ev));
                        }
                    />
                    "Opening"
                </label>
                <label>
                    <input
                        type="checkbox"
                        prop:checked=move || time_filter().midday
                        on:change=move |ev: ev::Event| {
                            update_filter(|filter, on| filter.midday = on, event_target_checked(&ev));
                        }
                    />
                    "Midday"
                </label>
                <label>
                    <input
                        type="checkbox"
                        prop:checked=move || time_filter().power
                        on:change=move |ev: ev::Event| {
                            update_filter(|filter, on| filter.power = on, event_target_checked(&ev));
                        }
                    />
                    "Power hour"
                </label>
            </fieldset>

            <fieldset class="sidebar__group">
                <legend>"Alerts"</legend>
                <label>
                    <input
                        type="checkbox"
                        prop:checked=flag(|settings| settings.capture_alerts)
                        on:change=move |ev: ev::Event| {
                            send_update(api, notice, SettingsUpdate {
                                capture_alerts: Some(event_target_checked(&ev)),
                                ..SettingsUpdate::default()
                            });
                        }
                    />
                    "Capture alerts"
                </label>
                <label class="sidebar__field">
                    <span>{move || format!("Threshold (effective {})", effective_threshold.get())}</span>
                    <input
                        type="number"
                        min="60"
                        max="100"
                        placeholder="mode default"
                        prop:value=read(|settings| settings
                            .alert_threshold
                            .map(|threshold| threshold.to_string())
                            .unwrap_or_default())
                        on:change=move |ev: ev::Event| {
                            match threshold_update(&event_target_value(&ev)) {
                                Ok(threshold) => send_update(api, notice, SettingsUpdate {
                                    alert_threshold: Some(threshold),
                                    ..SettingsUpdate::default()
                                }),
                                Err(err) => notice.0.set(Some(err)),
                            }
                        }
                    />
                </label>
                <label class="sidebar__field">
                    <span>"Cooldown (minutes)"</span>
                    <input
                        type="number"
                        min="1"
                        max="30"
                        prop:value=read(|settings| settings.cooldown_minutes.to_string())
                        on:change=move |ev: ev::Event| {
                            if let Some(minutes) = parse_field::<u32>(notice, "cooldown", &event_target_value(&ev)) {
                                send_update(api, notice, SettingsUpdate {
                                    cooldown_minutes: Some(minutes),
                                    ..SettingsUpdate::default()
                                });
                            }
                        }
                    />
                </label>
                <label class="sidebar__field">
                    <span>"Alerts kept"</span>
                    <input
                        type="number"
                        min="10"
                        max="300"
                        prop:value=read(|settings| settings.max_alerts_kept.to_string())
                        on:change=move |ev: ev::Event| {
                            if let Some(kept) = parse_field::<usize>(notice, "alerts kept", &event_target_value(&ev)) {
                                send_update(api, notice, SettingsUpdate {
                                    max_alerts_kept: Some(kept),
                                    ..SettingsUpdate::default()
                                });
                            }
                        }
                    />
                </label>
            </fieldset>

            <fieldset class="sidebar__group">
                <legend>"Refresh"</legend>
                <label class="sidebar__field">
                    <span>"Seconds between API calls"</span>
                    <input
                        type="number"
                        min="0.5"
                        max="5"
                        step="0.5"
                        prop:value=read(|settings| settings.min_seconds_between_calls.to_string())
                        on:change=move |ev: ev::Event| {
                            if let Some(gap) = parse_field::<f64>(notice, "call gap", &event_target_value(&ev)) {
                                send_update(api, notice, SettingsUpdate {
                                    min_seconds_between_calls: Some(gap),
                                    ..SettingsUpdate::default()
                                });
                            }
                        }
                    />
                </label>
                <label>
                    <input
                        type="checkbox"
                        prop:checked=flag(|settings| settings.auto_refresh)
                        on:change=move |ev: ev::Event| {
                            send_update(api, notice, SettingsUpdate {
                                auto_refresh: Some(event_target_checked(&ev)),
                                ..SettingsUpdate::default()
                            });
                        }
                    />
                    "Auto refresh"
                </label>
                <label class="sidebar__field">
                    <span>"Refresh every (seconds)"</span>
                    <input
                        type="number"
                        min="10"
                        max="180"
                        prop:value=read(|settings| settings.refresh_seconds.to_string())
                        on:change=move |ev: ev::Event| {
                            if let Some(seconds) = parse_field::<u64>(notice, "refresh", &event_target_value(&ev)) {
                                send_update(api, notice, SettingsUpdate {
                                    refresh_seconds: Some(seconds),
                                    ..SettingsUpdate::default()
                                });
                            }
                        }
                    />
                </label>
            </fieldset>
        </section>
    }
}
