use leptos::*;

use crate::scanner::{
    format::{bias_class, price},
    types::{ChartBar, SignalResult, SymbolDetail},
};

use super::dashboard::{ApiHandle, SelectedSymbolSignal};

const CHART_WIDTH: f64 = 760.0;
const CHART_HEIGHT: f64 = 320.0;

#[derive(Debug, PartialEq)]
struct Candle {
    x: f64,
    width: f64,
    wick_top: f64,
    wick_bottom: f64,
    body_top: f64,
    body_height: f64,
    up: bool,
}

#[derive(Debug, PartialEq)]
struct Level {
    label: &'static str,
    price: f64,
    y: f64,
}

#[derive(Debug, PartialEq)]
struct CandleGeometry {
    candles: Vec<Candle>,
    vwap_points: String,
    levels: Vec<Level>,
    min_price: f64,
    max_price: f64,
}

fn plan_levels(signal: &SignalResult) -> Vec<(&'static str, f64)> {
    [
        ("Entry", signal.entry),
        ("Stop", signal.stop),
        ("1R", signal.target_1r),
        ("2R", signal.target_2r),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|value| (label, value)))
    .collect()
}

/// Lay out candles, VWAP and trade levels in a shared price scale.
fn compute_candle_geometry(
    bars: &[ChartBar],
    signal: &SignalResult,
    width: f64,
    height: f64,
) -> Option<CandleGeometry> {
    if bars.len() < 2 || width <= 0.0 || height <= 0.0 {
        return None;
    }

    let levels = plan_levels(signal);
    let prices = bars
        .iter()
        .flat_map(|bar| [bar.low, bar.high])
        .chain(bars.iter().filter_map(|bar| bar.vwap))
        .chain(levels.iter().map(|(_, value)| *value))
        .filter(|value| value.is_finite());
    let (min_price, max_price) = prices.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
        (lo.min(value), hi.max(value))
    });
    if !min_price.is_finite() || !max_price.is_finite() {
        return None;
    }

    let price_span = (max_price - min_price).max(1e-9);
    let y_of = |value: f64| height - ((value - min_price) / price_span) * height;
    let slot = width / bars.len() as f64;
    let body_width = (slot * 0.7).max(1.0);

    let candles = bars
        .iter()
        .enumerate()
        .map(|(index, bar)| {
            let center = slot * index as f64 + slot / 2.0;
            let open_y = y_of(bar.open);
            let close_y = y_of(bar.close);
            Candle {
                x: center - body_width / 2.0,
                width: body_width,
                wick_top: y_of(bar.high),
                wick_bottom: y_of(bar.low),
                body_top: open_y.min(close_y),
                body_height: (open_y - close_y).abs().max(1.0),
                up: bar.close >= bar.open,
            }
        })
        .collect();

    let vwap_points = bars
        .iter()
        .enumerate()
        .filter_map(|(index, bar)| {
            bar.vwap.map(|vwap| {
                let center = slot * index as f64 + slot / 2.0;
                format!("{:.2},{:.2}", center, y_of(vwap))
            })
        })
        .collect::<Vec<_>>()
        .join(" ");

    let levels = levels
        .into_iter()
        .map(|(label, value)| Level {
            label,
            price: value,
            y: y_of(value),
        })
        .collect();

    Some(CandleGeometry {
        candles,
        vwap_points,
        levels,
        min_price,
        max_price,
    })
}

#[component]
pub fn DetailChart() -> impl IntoView {
    let api = use_context::<ApiHandle>().expect("api context missing");
    let selected_symbol =
        use_context::<SelectedSymbolSignal>().expect("selected symbol context missing");

    let detail = create_local_resource(
        move || selected_symbol.0.get(),
        move |symbol: Option<String>| {
            let client = api.0.get_value();
            async move {
                match symbol {
                    Some(symbol) => Some(client.detail(&symbol).await),
                    None => None,
                }
            }
        },
    );

    view! {
        <section class="detail-chart">
            <h2>"Symbol detail"</h2>
            {move || match detail.get().flatten() {
                None if selected_symbol.0.get().is_some() => view! { <p>"Loading bars..."</p> }.into_view(),
                None => view! { <p>"Select a row to chart its recent bars and trade plan."</p> }.into_view(),
                Some(Err(err)) => view! { <p class="detail-chart__error">{format!("Could not load detail: {err}")}</p> }.into_view(),
                Some(Ok(detail)) => render_detail(detail).into_view(),
            }}
        </section>
    }
}

fn render_detail(detail: SymbolDetail) -> impl IntoView {
    let signal = detail.signal.clone();
    let geometry = compute_candle_geometry(&detail.bars, &signal, CHART_WIDTH, CHART_HEIGHT);
    let last = detail
        .quote
        .or_else(|| detail.bars.last().map(|bar| bar.close));

    view! {
        <div class="detail-chart__content">
            <header class="detail-chart__header">
                <strong>{detail.symbol.clone()}</strong>
                <span class=bias_class(signal.bias)>{signal.bias.as_str()}</span>
                <span>{format!("score {}", signal.setup_score)}</span>
                <span>{format!("last {}", price(last))}</span>
                <span>{detail.interval.as_str()}</span>
            </header>
            {match geometry {
                None => view! { <p>"Not enough bars to chart."</p> }.into_view(),
                Some(CandleGeometry { candles, vwap_points, levels, min_price, max_price }) => view! {
                    <svg
                        width=CHART_WIDTH
                        height=CHART_HEIGHT
                        viewBox=format!("0 0 {} {}", CHART_WIDTH, CHART_HEIGHT)
                        class="detail-chart__svg"
                    >
                        {candles
                            .into_iter()
                            .map(|candle| {
                                let class = if candle.up { "candle candle--up" } else { "candle candle--down" };
                                let center = candle.x + candle.width / 2.0;
                                view! {
                                    <g class=class>
                                        <line x1=center x2=center y1=candle.wick_top y2=candle.wick_bottom />
                                        <rect x=candle.x y=candle.body_top width=candle.width height=candle.body_height />
                                    </g>
                                }
                            })
                            .collect_view()}
                        <polyline class="detail-chart__vwap" points=vwap_points />
                        {levels
                            .into_iter()
                            .map(|level| view! {
                                <g class=format!("level level--{}", level.label.to_lowercase())>
                                    <line x1=0.0 x2=CHART_WIDTH y1=level.y y2=level.y />
                                    <text x=4.0 y={level.y - 3.0}>{format!("{} {:.4}", level.label, level.price)}</text>
                                </g>
                            })
                            .collect_view()}
                    </svg>
                    <footer class="detail-chart__footer">
                        <span>{format!("High: {:.4}", max_price)}</span>
                        <span>{format!("Low: {:.4}", min_price)}</span>
                    </footer>
                }
                .into_view(),
            }}
            <dl class="detail-chart__plan">
                <dt>"Entry"</dt><dd>{price(signal.entry)}</dd>
                <dt>"Stop"</dt><dd>{price(signal.stop)}</dd>
                <dt>"1R"</dt><dd>{price(signal.target_1r)}</dd>
                <dt>"2R"</dt><dd>{price(signal.target_2r)}</dd>
                <dt>"Why"</dt><dd>{signal.reason.clone()}</dd>
            </dl>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::types::{Bias, Session};

    fn bar(open: f64, high: f64, low: f64, close: f64) -> ChartBar {
        ChartBar {
            timestamp: "2024-06-03T09:31:00".into(),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
            vwap: Some((high + low + close) / 3.0),
        }
    }

    fn signal(entry: Option<f64>, stop: Option<f64>) -> SignalResult {
        SignalResult {
            symbol: "AAPL".into(),
            bias: Bias::Long,
            setup_score: 84,
            reason: "reclaim".into(),
            entry,
            stop,
            target_1r: entry.zip(stop).map(|(e, s)| e + (e - s)),
            target_2r: entry.zip(stop).map(|(e, s)| e + 2.0 * (e - s)),
            last_price: entry,
            timestamp: None,
            session: Session::Opening,
        }
    }

    #[test]
    fn levels_widen_the_price_scale() {
        let bars = vec![bar(10.0, 10.5, 9.8, 10.2), bar(10.2, 10.4, 10.0, 10.1)];
        let geometry =
            compute_candle_geometry(&bars, &signal(Some(10.1), Some(9.0)), 100.0, 50.0)
                .expect("geometry");

        assert_eq!(geometry.candles.len(), 2);
        assert_eq!(geometry.levels.len(), 4);
        assert!((geometry.min_price - 9.0).abs() < 1e-9);
        assert!((geometry.max_price - 12.3).abs() < 1e-9);
        let stop = geometry.levels.iter().find(|level| level.label == "Stop").expect("stop");
        assert!((stop.y - 50.0).abs() < 1e-9);
        assert!(geometry.candles[0].up);
        assert!(!geometry.candles[1].up);
    }

    #[test]
    fn neutral_signal_charts_bars_only() {
        let bars = vec![bar(10.0, 10.5, 9.8, 10.2), bar(10.2, 10.4, 10.0, 10.1)];
        let geometry =
            compute_candle_geometry(&bars, &signal(None, None), 100.0, 50.0).expect("geometry");
        assert!(geometry.levels.is_empty());
        assert_eq!(geometry.vwap_points.split(' ').count(), 2);
    }

    #[test]
    fn rejects_insufficient_data() {
        let bars = vec![bar(10.0, 10.5, 9.8, 10.2)];
        assert!(compute_candle_geometry(&bars, &signal(None, None), 100.0, 50.0).is_none());
    }
}
