//! `Plot`: plotly-style traces rendered to SVG.
//!
//! The heavy helper of the surface: it is registered as a lazy module and loaded the first time
//! a block asks for it.

use super::{json_f64, prop_json};
use crate::svg::{self, BandScale, LinearScale, fmt, palette};
use indexmap::IndexMap;
use lumen_core::script::{Invoke, Props, RuntimeError, Value};
use lumen_core::{AttrValue, Component, Element, LumenConfig, VNode, component_fn};
use serde_json::Value as Json;
use std::sync::Arc;

const DEFAULT_SAMPLES: usize = 200;
const MAX_SAMPLES: usize = 10_000;
const TICK_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotSize {
    pub width: f64,
    pub height: f64,
}

impl PlotSize {
    pub fn from_config(config: &LumenConfig) -> Self {
        Self {
            width: config.get_f64("plot.width").unwrap_or(640.0),
            height: config.get_f64("plot.height").unwrap_or(400.0),
        }
    }
}

impl Default for PlotSize {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 400.0,
        }
    }
}

pub fn plot(size: PlotSize) -> Arc<dyn Component> {
    component_fn("Plot", move |cx, props, _| render_plot(cx, props, size))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceKind {
    Scatter,
    Bar,
}

#[derive(Debug, Clone)]
struct Trace {
    kind: TraceKind,
    name: Option<String>,
    color: String,
    lines: bool,
    markers: bool,
    x: Vec<Json>,
    y: Vec<Option<f64>>,
}

impl Trace {
    fn from_json(index: usize, json: &Json) -> Self {
        let kind = match json.get("type").and_then(Json::as_str) {
            Some("bar") => TraceKind::Bar,
            _ => TraceKind::Scatter,
        };
        let mode = json
            .get("mode")
            .and_then(Json::as_str)
            .unwrap_or("lines+markers");
        let color = json
            .pointer("/marker/color")
            .or_else(|| json.pointer("/line/color"))
            .and_then(Json::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| PLOTLY_COLORS[index % PLOTLY_COLORS.len()].to_string());
        let y: Vec<Option<f64>> = json
            .get("y")
            .and_then(Json::as_array)
            .map(|ys| ys.iter().map(json_f64).collect())
            .unwrap_or_default();
        let x = json
            .get("x")
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_else(|| (0..y.len()).map(Json::from).collect());
        Self {
            kind,
            name: json.get("name").and_then(Json::as_str).map(str::to_string),
            color,
            lines: mode.contains("lines"),
            markers: mode.contains("markers"),
            x,
            y,
        }
    }

    fn points(&self) -> impl Iterator<Item = (&Json, Option<f64>)> {
        self.x.iter().zip(self.y.iter().copied())
    }
}

/// Plotly's default trace colours.
const PLOTLY_COLORS: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// `title` as a string or `{ text }`.
fn title_text(json: Option<&Json>) -> Option<String> {
    match json? {
        Json::String(s) => Some(s.clone()),
        Json::Object(map) => map.get("text").and_then(Json::as_str).map(str::to_string),
        _ => None,
    }
}

/// Samples the generated function `f` over `[lo, hi]`. Non-numeric results leave gaps.
fn sample_fn(
    cx: &mut dyn Invoke,
    f: &Value,
    (lo, hi): (f64, f64),
    samples: usize,
) -> Result<Trace, RuntimeError> {
    let samples = samples.clamp(2, MAX_SAMPLES);
    let step = (hi - lo) / (samples - 1) as f64;
    let mut x = Vec::with_capacity(samples);
    let mut y = Vec::with_capacity(samples);
    for i in 0..samples {
        let xv = lo + step * i as f64;
        let yv = cx.call(f, vec![Value::from(xv)])?.as_f64().filter(|v| v.is_finite());
        x.push(Json::from(xv));
        y.push(yv);
    }
    Ok(Trace {
        kind: TraceKind::Scatter,
        name: None,
        color: palette(0).to_string(),
        lines: true,
        markers: false,
        x,
        y,
    })
}

fn render_plot(cx: &mut dyn Invoke, props: &Props, size: PlotSize) -> Result<VNode, RuntimeError> {
    let layout = prop_json(props, "layout")?.unwrap_or(Json::Null);
    let width = layout.get("width").and_then(json_f64).unwrap_or(size.width);
    let height = layout.get("height").and_then(json_f64).unwrap_or(size.height);
    let title = title_text(layout.get("title"));

    let mut traces: Vec<Trace> = match prop_json(props, "data")? {
        Some(Json::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, t)| Trace::from_json(i, t))
            .collect(),
        _ => Vec::new(),
    };
    if let Some(f) = props.get("fn").filter(|f| f.is_callable()) {
        let domain = match props.array("domain").as_deref() {
            Some([lo, hi, ..]) => (lo.to_number(), hi.to_number()),
            _ => (-10.0, 10.0),
        };
        if !(domain.0.is_finite() && domain.1.is_finite()) || domain.0 == domain.1 {
            return Err(RuntimeError::range(format!(
                "Plot domain must be two different finite numbers, got [{}, {}]",
                fmt(domain.0),
                fmt(domain.1)
            )));
        }
        let samples = props
            .f64("samples")
            .map(|n| n.max(0.0) as usize)
            .unwrap_or(DEFAULT_SAMPLES);
        let mut trace = sample_fn(cx, f, domain, samples)?;
        trace.color = PLOTLY_COLORS[traces.len() % PLOTLY_COLORS.len()].to_string();
        traces.push(trace);
    }

    let left = 80.0;
    let right = (width - 80.0).max(left + 1.0);
    let top = if title.is_some() { 100.0 } else { 40.0 };
    let bottom = (height - 80.0).max(top + 1.0);

    let categorical = traces
        .iter()
        .flat_map(|t| t.x.iter())
        .any(|x| x.is_string());
    let has_bars = traces.iter().any(|t| t.kind == TraceKind::Bar);
    let categories: Vec<String> = if categorical {
        let mut seen: IndexMap<String, ()> = IndexMap::new();
        for x in traces.iter().flat_map(|t| t.x.iter()) {
            seen.insert(label(x), ());
        }
        seen.into_keys().collect()
    } else {
        Vec::new()
    };

    let x_scale = LinearScale::from_values(
        traces
            .iter()
            .flat_map(|t| t.x.iter().filter_map(json_f64))
            .collect::<Vec<_>>(),
        false,
        (left, right),
    )
    .nice(TICK_COUNT);
    let band = BandScale::new(categories.len(), (left, right));
    let y_scale = LinearScale::from_values(
        traces
            .iter()
            .flat_map(|t| t.y.iter().flatten().copied())
            .collect::<Vec<_>>(),
        has_bars,
        (bottom, top),
    )
    .nice(TICK_COUNT);

    let x_of = |x: &Json| -> Option<f64> {
        if categorical {
            let key = label(x);
            categories.iter().position(|c| *c == key).map(|i| band.center(i))
        } else {
            json_f64(x).map(|v| x_scale.map(v))
        }
    };

    let mut svg_el = svg::svg_root(width, height).attr("class", "main-svg");
    svg_el = svg_el.child(svg::rect(0.0, 0.0, width, height, "#fff").attr("class", "bg"));

    let mut grid = svg::group("gridlayer");
    for tick in y_scale.ticks(TICK_COUNT) {
        let y = y_scale.map(tick);
        grid = grid.child(svg::line(left, y, right, y, "#eee"));
    }
    svg_el = svg_el.child(grid);

    let bar_traces: Vec<usize> = traces
        .iter()
        .enumerate()
        .filter(|(_, t)| t.kind == TraceKind::Bar)
        .map(|(i, _)| i)
        .collect();
    let mut plot_layer = svg::group("plot");
    for (index, trace) in traces.iter().enumerate() {
        let mut layer = svg::group("trace").attr("data-trace", index as f64);
        match trace.kind {
            TraceKind::Bar => {
                let slot = bar_traces.iter().position(|i| *i == index).unwrap_or(0);
                let slot_width = if categorical {
                    band.bandwidth() * 0.8 / bar_traces.len().max(1) as f64
                } else {
                    ((right - left) / trace.x.len().max(1) as f64) * 0.8
                        / bar_traces.len().max(1) as f64
                };
                for (x, y) in trace.points() {
                    let (Some(cx_px), Some(y)) = (x_of(x), y) else {
                        continue;
                    };
                    let x0 = cx_px - slot_width * bar_traces.len() as f64 / 2.0
                        + slot_width * slot as f64;
                    let (y0, y1) = (y_scale.map(0.0), y_scale.map(y));
                    layer = layer.child(svg::rect(
                        x0,
                        y0.min(y1),
                        slot_width,
                        (y0 - y1).abs(),
                        &trace.color,
                    ));
                }
            }
            TraceKind::Scatter => {
                let points: Vec<Option<(f64, f64)>> = trace
                    .points()
                    .map(|(x, y)| Some((x_of(x)?, y_scale.map(y?))))
                    .collect();
                if trace.lines {
                    layer = layer.child(
                        svg::path(svg::polyline_path(&points), "none", &trace.color)
                            .attr("stroke-width", 2.0),
                    );
                }
                if trace.markers {
                    for (x, y) in points.iter().flatten() {
                        layer = layer.child(svg::circle(*x, *y, 3.0, &trace.color));
                    }
                }
            }
        }
        plot_layer = plot_layer.child(layer);
    }
    svg_el = svg_el.child(plot_layer);

    let mut x_axis = svg::group("xaxis").child(svg::line(left, bottom, right, bottom, "#444"));
    if categorical {
        for (i, c) in categories.iter().enumerate() {
            x_axis = x_axis.child(svg::text(band.center(i), bottom + 18.0, "middle", c.as_str()));
        }
    } else {
        for tick in x_scale.ticks(TICK_COUNT) {
            x_axis = x_axis.child(svg::text(x_scale.map(tick), bottom + 18.0, "middle", fmt(tick)));
        }
    }
    if let Some(t) = title_text(layout.pointer("/xaxis/title")) {
        x_axis = x_axis.child(svg::text((left + right) / 2.0, bottom + 45.0, "middle", t));
    }
    let mut y_axis = svg::group("yaxis").child(svg::line(left, top, left, bottom, "#444"));
    for tick in y_scale.ticks(TICK_COUNT) {
        y_axis = y_axis.child(svg::text(left - 8.0, y_scale.map(tick) + 4.0, "end", fmt(tick)));
    }
    if let Some(t) = title_text(layout.pointer("/yaxis/title")) {
        let (x, y) = (left - 50.0, (top + bottom) / 2.0);
        y_axis = y_axis.child(
            svg::text(x, y, "middle", t).attr("transform", format!("rotate(-90 {} {})", fmt(x), fmt(y))),
        );
    }
    svg_el = svg_el.child(x_axis).child(y_axis);

    if let Some(t) = &title {
        svg_el = svg_el.child(
            svg::text(width / 2.0, 50.0, "middle", t.as_str())
                .attr("class", "gtitle")
                .attr("font-size", 17.0),
        );
    }
    let named: Vec<&Trace> = traces.iter().filter(|t| t.name.is_some()).collect();
    let show_legend = layout
        .get("showlegend")
        .and_then(Json::as_bool)
        .unwrap_or(named.len() > 1);
    if show_legend {
        let mut legend = svg::group("legend");
        for (i, trace) in named.iter().enumerate() {
            let y = top + 14.0 + i as f64 * 20.0;
            legend = legend
                .child(svg::rect(right + 8.0, y - 5.0, 10.0, 10.0, &trace.color))
                .child(svg::text(right + 22.0, y + 4.0, "start", trace.name.clone().unwrap_or_default()));
        }
        svg_el = svg_el.child(legend);
    }

    let mut style = IndexMap::new();
    style.insert("width".to_string(), format!("{}px", fmt(width)));
    style.insert("height".to_string(), format!("{}px", fmt(height)));
    Ok(Element::new("div")
        .attr("class", "lumen-plot js-plotly-plot")
        .attr("style", AttrValue::Style(style))
        .child(svg_el)
        .into())
}

fn label(x: &Json) -> String {
    match x {
        Json::String(s) => s.clone(),
        Json::Number(n) => n.as_f64().map(fmt).unwrap_or_default(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Square;

    impl Invoke for Square {
        fn call(&mut self, _: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
            let x = args.first().map(Value::to_number).unwrap_or(f64::NAN);
            Ok(if x == 0.0 { Value::Undefined } else { Value::from(x * x) })
        }
    }

    #[test]
    fn traces_read_plotly_fields() {
        let t = Trace::from_json(
            1,
            &json!({ "x": ["a", "b"], "y": [1, "2"], "type": "bar", "name": "sales" }),
        );
        assert_eq!(t.kind, TraceKind::Bar);
        assert_eq!(t.y, vec![Some(1.0), Some(2.0)]);
        assert_eq!(t.color, "#ff7f0e");
        assert_eq!(t.name.as_deref(), Some("sales"));

        let t = Trace::from_json(0, &json!({ "y": [3, 4, 5], "mode": "markers", "line": { "color": "red" } }));
        assert_eq!(t.x, vec![json!(0), json!(1), json!(2)]);
        assert!(t.markers && !t.lines);
        assert_eq!(t.color, "red");
    }

    #[test]
    fn sampling_leaves_gaps_for_non_numbers() {
        let f = Value::Null;
        let trace = sample_fn(&mut Square, &f, (-1.0, 1.0), 3).expect("sample");
        assert_eq!(trace.y, vec![Some(1.0), None, Some(1.0)]);
        assert_eq!(trace.x, vec![json!(-1.0), json!(0.0), json!(1.0)]);
    }

    #[test]
    fn renders_title_axes_and_bars() {
        let mut props = Props::new();
        props.insert(
            "data",
            Value::from_json(&json!([{ "x": ["a", "b"], "y": [2, 4], "type": "bar" }])),
        );
        props.insert(
            "layout",
            Value::from_json(&json!({ "title": { "text": "Totals" }, "xaxis": { "title": "kind" } })),
        );
        let node = render_plot(&mut Square, &props, PlotSize::default()).expect("plot");
        let text = node.text_content();
        assert!(text.contains("Totals"));
        assert!(text.contains("kind"));
        assert!(text.contains("ab"));
        let svg = node.find_tag("svg").expect("svg");
        assert_eq!(svg.attr_str("viewBox"), Some("0 0 640 400"));
        let bars = node
            .find(&|el| el.has_class("trace"))
            .map(|g| g.children.len())
            .unwrap_or(0);
        assert_eq!(bars, 2);
    }

    #[test]
    fn rejects_an_empty_domain() {
        let mut props = Props::new();
        props.insert(
            "fn",
            Value::Native(lumen_core::script::NativeFunction::new("f", |_, _| Ok(Value::Null))),
        );
        props.insert("domain", Value::array(vec![Value::from(1.0), Value::from(1.0)]));
        let err = render_plot(&mut Square, &props, PlotSize::default()).expect_err("range");
        assert!(err.to_string().contains("Plot domain"));
    }
}
