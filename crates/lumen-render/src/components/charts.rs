//! `Recharts`: static SVG renditions of the common chart components.
//!
//! Charts are composed the Recharts way: a chart element (`LineChart`, `BarChart`, ...) holding
//! `data` and part children (`<XAxis dataKey="name" />`, `<Line dataKey="uv" />`). Layout follows
//! Recharts defaults closely enough that generated charts look familiar; interactivity
//! (tooltips, animation) is dropped.

use super::{Part, json_f64, part_component, parts, prop_json};
use crate::svg::{self, BandScale, LinearScale, PathData, fmt, palette, round3};
use indexmap::IndexMap;
use lumen_core::script::host::to_vnode;
use lumen_core::script::value::format_number;
use lumen_core::script::{Invoke, Props, RuntimeError, Value};
use lumen_core::{AttrValue, Component, Element, LumenConfig, Namespace, VNode, component_fn};
use rustc_hash::FxHashMap;
use serde_json::Value as Json;
use std::sync::Arc;

const X_AXIS_HEIGHT: f64 = 30.0;
const Y_AXIS_WIDTH: f64 = 60.0;
const LEGEND_HEIGHT: f64 = 24.0;
const TICK_COUNT: usize = 5;
const GRID_STROKE: &str = "#ccc";
const AXIS_STROKE: &str = "#666";

/// Chart size used when a chart names no `width`/`height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSize {
    pub width: f64,
    pub height: f64,
}

impl ChartSize {
    pub fn from_config(config: &LumenConfig) -> Self {
        Self {
            width: config.get_f64("chart.width").unwrap_or(600.0),
            height: config.get_f64("chart.height").unwrap_or(300.0),
        }
    }
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 300.0,
        }
    }
}

pub fn recharts(size: ChartSize) -> Namespace {
    let mut ns = Namespace::new()
        .with("ResponsiveContainer", responsive_container())
        .with("PieChart", pie_chart(size));
    for kind in [
        ChartKind::Line,
        ChartKind::Area,
        ChartKind::Bar,
        ChartKind::Scatter,
    ] {
        ns.insert(kind.component_name(), cartesian_chart(kind, size));
    }
    for part in [
        "Line",
        "Area",
        "Bar",
        "Scatter",
        "Pie",
        "Cell",
        "XAxis",
        "YAxis",
        "CartesianGrid",
        "Tooltip",
        "Legend",
        "ReferenceLine",
    ] {
        ns.insert(part, part_component(part));
    }
    ns
}

fn responsive_container() -> Arc<dyn Component> {
    component_fn("ResponsiveContainer", |_, props, children| {
        let mut style = IndexMap::new();
        style.insert("width".to_string(), css_length(props, "width", "100%"));
        style.insert("height".to_string(), css_length(props, "height", "100%"));
        Ok(Element::new("div")
            .attr("class", "recharts-responsive-container")
            .attr("style", AttrValue::Style(style))
            .children(children)
            .into())
    })
}

fn css_length(props: &Props, key: &str, default: &str) -> String {
    match props.get(key) {
        Some(Value::Number(n)) => format!("{}px", fmt(*n)),
        Some(Value::String(s)) => s.to_string(),
        _ => default.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartKind {
    Line,
    Area,
    Bar,
    Scatter,
}

impl ChartKind {
    fn component_name(self) -> &'static str {
        match self {
            ChartKind::Line => "LineChart",
            ChartKind::Area => "AreaChart",
            ChartKind::Bar => "BarChart",
            ChartKind::Scatter => "ScatterChart",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Margin {
    top: f64,
    right: f64,
    bottom: f64,
    left: f64,
}

impl Margin {
    fn from_json(json: Option<&Json>) -> Self {
        let side = |key: &str| json.and_then(|m| m.get(key)).and_then(json_f64).unwrap_or(5.0);
        Self {
            top: side("top"),
            right: side("right"),
            bottom: side("bottom"),
            left: side("left"),
        }
    }
}

/// Plot area in pixels.
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

enum XScale {
    /// Categories spread edge to edge (line, area).
    Point { count: usize, left: f64, right: f64 },
    /// Categories as bands (bar).
    Band(BandScale),
    Linear(LinearScale),
}

impl XScale {
    fn category(&self, index: usize) -> f64 {
        match self {
            XScale::Point { count, left, right } => {
                if *count <= 1 {
                    (left + right) / 2.0
                } else {
                    left + (right - left) * index as f64 / (*count - 1) as f64
                }
            }
            XScale::Band(band) => band.center(index),
            XScale::Linear(scale) => scale.map(index as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeriesKind {
    Line,
    Area,
    Bar,
    Scatter,
}

struct Series<'a> {
    part: &'a Part,
    kind: SeriesKind,
    key: String,
    name: String,
    color: String,
    /// `(base, top)` per data row; `None` where the row has no value.
    values: Vec<Option<(f64, f64)>>,
    /// Position within a category band (bars only); stacked bars share a slot.
    slot: usize,
}

fn cartesian_chart(kind: ChartKind, size: ChartSize) -> Arc<dyn Component> {
    component_fn(kind.component_name(), move |cx, props, children| {
        render_cartesian(cx, kind, props, &children, size)
    })
}

fn rows(props: &Props) -> Result<Vec<Json>, RuntimeError> {
    Ok(match prop_json(props, "data")? {
        Some(Json::Array(rows)) => rows,
        _ => Vec::new(),
    })
}

fn chart_wrapper(name: &str, width: f64, height: f64) -> Element {
    let mut style = IndexMap::new();
    style.insert("position".to_string(), "relative".to_string());
    style.insert("width".to_string(), format!("{}px", fmt(width)));
    style.insert("height".to_string(), format!("{}px", fmt(height)));
    Element::new("div")
        .attr("class", "lumen-chart recharts-wrapper")
        .attr("data-chart", name)
        .attr("style", AttrValue::Style(style))
}

fn render_cartesian(
    cx: &mut dyn Invoke,
    kind: ChartKind,
    props: &Props,
    children: &[VNode],
    size: ChartSize,
) -> Result<VNode, RuntimeError> {
    let width = props.f64("width").unwrap_or(size.width);
    let height = props.f64("height").unwrap_or(size.height);
    let data = rows(props)?;
    let margin = Margin::from_json(prop_json(props, "margin")?.as_ref());
    let parts = parts(children);
    let find = |name: &str| parts.iter().find(|p| p.kind == name && p.bool("hide") != Some(true));
    let x_axis = find("XAxis");
    let y_axis = find("YAxis");
    let legend = find("Legend");

    let frame = Frame {
        left: margin.left + if y_axis.is_some() { Y_AXIS_WIDTH } else { 0.0 },
        top: margin.top,
        right: (width - margin.right).max(margin.left + 1.0),
        bottom: (height
            - margin.bottom
            - if x_axis.is_some() { X_AXIS_HEIGHT } else { 0.0 }
            - if legend.is_some() { LEGEND_HEIGHT } else { 0.0 })
        .max(margin.top + 1.0),
    };

    let x_key = x_axis.and_then(|a| a.str("dataKey")).unwrap_or(
        if kind == ChartKind::Scatter { "x" } else { "" },
    );
    let y_key = y_axis.and_then(|a| a.str("dataKey")).unwrap_or("y");
    let numeric_x =
        kind == ChartKind::Scatter || x_axis.and_then(|a| a.str("type")) == Some("number");

    let mut series = collect_series(&parts, &data, x_key, y_key);
    let bar_slots = assign_bar_slots(&mut series);

    let x_scale = if numeric_x {
        let xs: Vec<f64> = series
            .iter()
            .filter(|s| s.kind == SeriesKind::Scatter)
            .flat_map(|s| scatter_rows(s.part, &data))
            .chain(data.iter())
            .filter_map(|row| row.get(x_key).and_then(json_f64))
            .collect();
        let scale = LinearScale::from_values(xs, false, (frame.left, frame.right)).nice(TICK_COUNT);
        XScale::Linear(axis_domain(x_axis, scale))
    } else if kind == ChartKind::Bar {
        XScale::Band(BandScale::new(data.len(), (frame.left, frame.right)))
    } else {
        XScale::Point {
            count: data.len(),
            left: frame.left,
            right: frame.right,
        }
    };

    let y_values = series
        .iter()
        .flat_map(|s| s.values.iter().flatten().flat_map(|(b, t)| [*b, *t]));
    let y_scale = LinearScale::from_values(
        y_values.collect::<Vec<_>>(),
        kind != ChartKind::Scatter,
        (frame.bottom, frame.top),
    )
    .nice(TICK_COUNT);
    let y_scale = axis_domain(y_axis, y_scale);

    let mut svg_el = svg::svg_root(width, height).attr("class", "recharts-surface");
    if let Some(grid) = find("CartesianGrid") {
        svg_el = svg_el.child(grid_node(grid, &frame, &x_scale, &y_scale, data.len()));
    }

    for s in &series {
        let node = match s.kind {
            SeriesKind::Area => area_node(s, &x_scale, &y_scale, &data, x_key, numeric_x),
            SeriesKind::Line => line_node(s, &x_scale, &y_scale, &data, x_key, numeric_x),
            SeriesKind::Bar => bar_node(s, &x_scale, &y_scale, bar_slots),
            SeriesKind::Scatter => scatter_node(s, &x_scale, &y_scale, &data, x_key, y_key),
        };
        svg_el = svg_el.child(node);
    }

    if let Some(axis) = x_axis {
        svg_el = svg_el.child(x_axis_node(cx, axis, &frame, &x_scale, &data, x_key)?);
    }
    if let Some(axis) = y_axis {
        svg_el = svg_el.child(y_axis_node(cx, axis, &frame, &y_scale)?);
    }
    for reference in parts.iter().filter(|p| p.kind == "ReferenceLine") {
        if let Some(node) = reference_line_node(reference, &frame, &x_scale, &y_scale, &data, x_key)
        {
            svg_el = svg_el.child(node);
        }
    }
    if legend.is_some() {
        let items: Vec<(String, String)> =
            series.iter().map(|s| (s.name.clone(), s.color.clone())).collect();
        svg_el = svg_el.child(legend_node(&items, width, height - margin.bottom));
    }

    let mut wrapper = chart_wrapper(kind.component_name(), width, height);
    if find("Tooltip").is_some() {
        wrapper = wrapper.attr("data-tooltip", true);
    }
    Ok(wrapper.child(svg_el).into())
}

/// Applies a numeric `domain={[min, max]}` from an axis part.
fn axis_domain(axis: Option<&Part>, scale: LinearScale) -> LinearScale {
    let Some(Json::Array(bounds)) = axis.and_then(|a| a.json("domain")) else {
        return scale;
    };
    let lo = bounds.first().and_then(json_f64).unwrap_or(scale.domain.0);
    let hi = bounds.get(1).and_then(json_f64).unwrap_or(scale.domain.1);
    LinearScale::new((lo, hi), scale.range)
}

fn scatter_rows<'a>(part: &'a Part, chart_data: &'a [Json]) -> impl Iterator<Item = &'a Json> {
    match part.json("data") {
        Some(Json::Array(rows)) => rows.iter(),
        _ => chart_data.iter(),
    }
}

fn collect_series<'a>(
    parts: &'a [Part],
    data: &[Json],
    x_key: &str,
    y_key: &str,
) -> Vec<Series<'a>> {
    let mut stacks: FxHashMap<String, Vec<f64>> = FxHashMap::default();
    let mut out = Vec::new();
    for part in parts {
        let kind = match part.kind.as_str() {
            "Line" => SeriesKind::Line,
            "Area" => SeriesKind::Area,
            "Bar" => SeriesKind::Bar,
            "Scatter" => SeriesKind::Scatter,
            _ => continue,
        };
        let index = out.len();
        let key = part
            .str("dataKey")
            .unwrap_or(if kind == SeriesKind::Scatter { y_key } else { "" })
            .to_string();
        let name = part
            .str("name")
            .map(str::to_string)
            .unwrap_or_else(|| key.clone());
        let color = part
            .str("stroke")
            .filter(|_| matches!(kind, SeriesKind::Line | SeriesKind::Area))
            .or_else(|| part.str("fill"))
            .unwrap_or(palette(index))
            .to_string();

        let values = if kind == SeriesKind::Scatter {
            scatter_rows(part, data)
                .map(|row| {
                    let has_x = x_key.is_empty() || row.get(x_key).and_then(json_f64).is_some();
                    row.get(y_key)
                        .and_then(json_f64)
                        .filter(|_| has_x)
                        .map(|y| (y, y))
                })
                .collect()
        } else {
            let mut stack = part.str("stackId").map(|id| {
                stacks
                    .entry(id.to_string())
                    .or_insert_with(|| vec![0.0; data.len()])
            });
            data.iter()
                .enumerate()
                .map(|(row_index, row)| {
                    let v = row.get(&key).and_then(json_f64)?;
                    match stack.as_deref_mut() {
                        Some(sums) => {
                            let base = sums[row_index];
                            sums[row_index] = base + v;
                            Some((base, base + v))
                        }
                        None => Some((0.0, v)),
                    }
                })
                .collect()
        };
        out.push(Series {
            part,
            kind,
            key,
            name,
            color,
            values,
            slot: 0,
        });
    }
    out
}

/// Assigns band slots to bar series and returns how many slots a band holds.
fn assign_bar_slots(series: &mut [Series<'_>]) -> usize {
    let mut slot_of: IndexMap<String, usize> = IndexMap::new();
    for (i, s) in series.iter_mut().enumerate() {
        if s.kind != SeriesKind::Bar {
            continue;
        }
        let slot_key = s
            .part
            .str("stackId")
            .map(|id| format!("stack:{id}"))
            .unwrap_or_else(|| format!("series:{i}"));
        let next = slot_of.len();
        s.slot = *slot_of.entry(slot_key).or_insert(next);
    }
    slot_of.len()
}

fn row_x(
    x_scale: &XScale,
    data: &[Json],
    row_index: usize,
    x_key: &str,
    numeric_x: bool,
) -> Option<f64> {
    if numeric_x {
        let v = data.get(row_index)?.get(x_key).and_then(json_f64)?;
        match x_scale {
            XScale::Linear(scale) => Some(scale.map(v)),
            _ => None,
        }
    } else {
        Some(x_scale.category(row_index))
    }
}

fn series_group(s: &Series<'_>, class: &str) -> Element {
    svg::group(class).attr("data-key", s.key.as_str()).attr("data-name", s.name.as_str())
}

fn line_node(
    s: &Series<'_>,
    x_scale: &XScale,
    y_scale: &LinearScale,
    data: &[Json],
    x_key: &str,
    numeric_x: bool,
) -> Element {
    let mut points: Vec<Option<(f64, f64)>> = s
        .values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let (_, top) = (*v)?;
            Some((row_x(x_scale, data, i, x_key, numeric_x)?, y_scale.map(top)))
        })
        .collect();
    if s.part.bool("connectNulls") == Some(true) {
        points.retain(Option::is_some);
    }
    let stroke_width = s.part.f64("strokeWidth").unwrap_or(1.0);
    let d = curve(&points, s.part.str("type"));
    let mut group = series_group(s, "recharts-line").child(
        svg::path(d, "none", &s.color)
            .attr("stroke-width", round3(stroke_width))
            .attr("class", "recharts-curve"),
    );
    if s.part.bool("dot") != Some(false) {
        for (x, y) in points.iter().flatten() {
            group = group.child(
                svg::circle(*x, *y, 3.0, "#fff")
                    .attr("stroke", s.color.as_str())
                    .attr("class", "recharts-dot"),
            );
        }
    }
    group
}

fn curve(points: &[Option<(f64, f64)>], kind: Option<&str>) -> String {
    let smooth = matches!(kind, Some("monotone" | "natural" | "basis"));
    if smooth && points.iter().all(Option::is_some) {
        let flat: Vec<(f64, f64)> = points.iter().flatten().copied().collect();
        svg::monotone_path(&flat)
    } else {
        svg::polyline_path(points)
    }
}

fn area_node(
    s: &Series<'_>,
    x_scale: &XScale,
    y_scale: &LinearScale,
    data: &[Json],
    x_key: &str,
    numeric_x: bool,
) -> Element {
    let pts: Vec<(f64, f64, f64)> = s
        .values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let (base, top) = (*v)?;
            Some((
                row_x(x_scale, data, i, x_key, numeric_x)?,
                y_scale.map(base),
                y_scale.map(top),
            ))
        })
        .collect();
    let fill = s.part.str("fill").unwrap_or(&s.color);
    let opacity = s.part.f64("fillOpacity").unwrap_or(0.6);
    let mut group = series_group(s, "recharts-area");
    if let Some((first, rest)) = pts.split_first() {
        let mut d = PathData::new().move_to(first.0, first.2);
        for p in rest {
            d = d.line_to(p.0, p.2);
        }
        for p in pts.iter().rev() {
            d = d.line_to(p.0, p.1);
        }
        group = group.child(
            svg::path(d.close().finish(), fill, "none")
                .attr("fill-opacity", round3(opacity))
                .attr("class", "recharts-area-area"),
        );
        let top: Vec<Option<(f64, f64)>> = pts.iter().map(|p| Some((p.0, p.2))).collect();
        group = group.child(
            svg::path(curve(&top, s.part.str("type")), "none", &s.color)
                .attr("class", "recharts-area-curve"),
        );
    }
    group
}

fn bar_node(
    s: &Series<'_>,
    x_scale: &XScale,
    y_scale: &LinearScale,
    slots: usize,
) -> Element {
    let mut group = series_group(s, "recharts-bar");
    let XScale::Band(band) = x_scale else {
        return group;
    };
    let cells = s.part.parts();
    let inner = band.bandwidth() * 0.8;
    let bar_width = inner / slots.max(1) as f64;
    for (i, value) in s.values.iter().enumerate() {
        let Some((base, top)) = *value else {
            continue;
        };
        let x = band.start(i) + band.bandwidth() * 0.1 + bar_width * s.slot as f64;
        let (y0, y1) = (y_scale.map(base), y_scale.map(top));
        let fill = cells
            .get(i)
            .and_then(|c| c.str("fill"))
            .unwrap_or(&s.color);
        group = group.child(
            svg::rect(x, y0.min(y1), bar_width, (y0 - y1).abs(), fill)
                .attr("class", "recharts-rectangle"),
        );
    }
    group
}

fn scatter_node(
    s: &Series<'_>,
    x_scale: &XScale,
    y_scale: &LinearScale,
    data: &[Json],
    x_key: &str,
    y_key: &str,
) -> Element {
    let mut group = series_group(s, "recharts-scatter");
    let XScale::Linear(xs) = x_scale else {
        return group;
    };
    for row in scatter_rows(s.part, data) {
        let (Some(x), Some(y)) = (
            row.get(x_key).and_then(json_f64),
            row.get(y_key).and_then(json_f64),
        ) else {
            continue;
        };
        group = group.child(
            svg::circle(xs.map(x), y_scale.map(y), 4.0, &s.color).attr("class", "recharts-symbols"),
        );
    }
    group
}

fn grid_node(
    grid: &Part,
    frame: &Frame,
    x_scale: &XScale,
    y_scale: &LinearScale,
    rows: usize,
) -> Element {
    let dash = grid.str("strokeDasharray");
    let stroke = grid.str("stroke").unwrap_or(GRID_STROKE);
    let styled = |el: Element| match dash {
        Some(d) => el.attr("stroke-dasharray", d),
        None => el,
    };
    let mut group = svg::group("recharts-cartesian-grid");
    if grid.bool("horizontal") != Some(false) {
        for tick in y_scale.ticks(TICK_COUNT) {
            let y = y_scale.map(tick);
            group = group.child(styled(svg::line(frame.left, y, frame.right, y, stroke)));
        }
    }
    if grid.bool("vertical") != Some(false) {
        let xs: Vec<f64> = match x_scale {
            XScale::Linear(scale) => scale.ticks(TICK_COUNT).into_iter().map(|t| scale.map(t)).collect(),
            XScale::Band(band) => (0..=rows).map(|i| band.start(i)).collect(),
            XScale::Point { .. } => (0..rows).map(|i| x_scale.category(i)).collect(),
        };
        for x in xs {
            group = group.child(styled(svg::line(x, frame.top, x, frame.bottom, stroke)));
        }
    }
    group
}

/// Label for a tick, through the axis `tickFormatter` when it has one.
fn tick_label(
    cx: &mut dyn Invoke,
    axis: &Part,
    value: Value,
    index: usize,
) -> Result<String, RuntimeError> {
    let label = match axis.call(cx, "tickFormatter", vec![value.clone(), Value::from(index as f64)])? {
        Some(formatted) => display_text(&formatted)?,
        None => value.to_js_string(),
    };
    Ok(match axis.str("unit") {
        Some(unit) => format!("{label}{unit}"),
        None => label,
    })
}

/// Text for a value returned by generated code; nodes contribute their text.
pub(crate) fn display_text(value: &Value) -> Result<String, RuntimeError> {
    Ok(match value {
        Value::Node(_) => to_vnode(value)?.text_content(),
        Value::Undefined | Value::Null => String::new(),
        other => other.to_js_string(),
    })
}

fn axis_label(axis: &Part) -> Option<String> {
    match axis.json("label")? {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Object(map) => map.get("value").map(|v| match v {
            Json::String(s) => s.clone(),
            other => other.to_string(),
        }),
        _ => None,
    }
}

fn x_axis_node(
    cx: &mut dyn Invoke,
    axis: &Part,
    frame: &Frame,
    x_scale: &XScale,
    data: &[Json],
    x_key: &str,
) -> Result<Element, RuntimeError> {
    let y = frame.bottom;
    let mut group = svg::group("recharts-xAxis")
        .child(svg::line(frame.left, y, frame.right, y, AXIS_STROKE));
    let ticks: Vec<(f64, Value)> = match x_scale {
        XScale::Linear(scale) => scale
            .ticks(TICK_COUNT)
            .into_iter()
            .map(|t| (scale.map(t), Value::from(t)))
            .collect(),
        _ => data
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let value = row.get(x_key).map(Value::from_json).unwrap_or(Value::from(i as f64));
                (x_scale.category(i), value)
            })
            .collect(),
    };
    for (index, (x, value)) in ticks.into_iter().enumerate() {
        let label = tick_label(cx, axis, value, index)?;
        group = group
            .child(svg::line(x, y, x, y + 6.0, AXIS_STROKE))
            .child(svg::text(x, y + 18.0, "middle", label).attr("class", "recharts-cartesian-axis-tick"));
    }
    if let Some(label) = axis_label(axis) {
        group = group.child(svg::text(
            (frame.left + frame.right) / 2.0,
            y + X_AXIS_HEIGHT - 2.0,
            "middle",
            label,
        ));
    }
    Ok(group)
}

fn y_axis_node(
    cx: &mut dyn Invoke,
    axis: &Part,
    frame: &Frame,
    y_scale: &LinearScale,
) -> Result<Element, RuntimeError> {
    let x = frame.left;
    let mut group = svg::group("recharts-yAxis")
        .child(svg::line(x, frame.top, x, frame.bottom, AXIS_STROKE));
    for (index, tick) in y_scale.ticks(TICK_COUNT).into_iter().enumerate() {
        let y = y_scale.map(tick);
        let label = tick_label(cx, axis, Value::from(tick), index)?;
        group = group
            .child(svg::line(x - 6.0, y, x, y, AXIS_STROKE))
            .child(svg::text(x - 8.0, y + 4.0, "end", label).attr("class", "recharts-cartesian-axis-tick"));
    }
    if let Some(label) = axis_label(axis) {
        let (lx, ly) = (x - Y_AXIS_WIDTH + 12.0, (frame.top + frame.bottom) / 2.0);
        group = group.child(
            svg::text(lx, ly, "middle", label)
                .attr("transform", format!("rotate(-90 {} {})", fmt(lx), fmt(ly))),
        );
    }
    Ok(group)
}

fn reference_line_node(
    reference: &Part,
    frame: &Frame,
    x_scale: &XScale,
    y_scale: &LinearScale,
    data: &[Json],
    x_key: &str,
) -> Option<Element> {
    let stroke = reference.str("stroke").unwrap_or("#ccc");
    let (line, label_at) = if let Some(y) = reference.f64("y") {
        let py = y_scale.map(y);
        (
            svg::line(frame.left, py, frame.right, py, stroke),
            (frame.right, py - 4.0, "end"),
        )
    } else {
        let x = reference.json("x")?;
        let px = match x_scale {
            XScale::Linear(scale) => scale.map(json_f64(x)?),
            _ => {
                let index = data.iter().position(|row| row.get(x_key) == Some(x))?;
                x_scale.category(index)
            }
        };
        (
            svg::line(px, frame.top, px, frame.bottom, stroke),
            (px + 4.0, frame.top + 12.0, "start"),
        )
    };
    let mut line = line;
    if let Some(dash) = reference.str("strokeDasharray") {
        line = line.attr("stroke-dasharray", dash);
    }
    let mut group = svg::group("recharts-reference-line").child(line);
    if let Some(label) = axis_label(reference) {
        group = group.child(svg::text(label_at.0, label_at.1, label_at.2, label).attr("fill", stroke));
    }
    Some(group)
}

fn legend_node(items: &[(String, String)], width: f64, bottom: f64) -> Element {
    let item_width = |name: &str| 14.0 + name.chars().count() as f64 * 7.0 + 16.0;
    let total: f64 = items.iter().map(|(name, _)| item_width(name)).sum();
    let mut x = ((width - total) / 2.0).max(0.0);
    let y = bottom - LEGEND_HEIGHT / 2.0;
    let mut group = svg::group("recharts-legend");
    for (name, color) in items {
        group = group
            .child(svg::rect(x, y - 5.0, 10.0, 10.0, color))
            .child(svg::text(x + 14.0, y + 4.0, "start", name.as_str()));
        x += item_width(name);
    }
    group
}

fn pie_chart(size: ChartSize) -> Arc<dyn Component> {
    component_fn("PieChart", move |cx, props, children| {
        render_pie_chart(cx, props, &children, size)
    })
}

fn render_pie_chart(
    cx: &mut dyn Invoke,
    props: &Props,
    children: &[VNode],
    size: ChartSize,
) -> Result<VNode, RuntimeError> {
    let width = props.f64("width").unwrap_or(size.width);
    let height = props.f64("height").unwrap_or(size.height);
    let parts = parts(children);
    let legend = parts.iter().any(|p| p.kind == "Legend");
    let mut svg_el = svg::svg_root(width, height).attr("class", "recharts-surface");
    let mut legend_items = Vec::new();
    for pie in parts.iter().filter(|p| p.kind == "Pie") {
        let (node, items) = pie_node(cx, pie, width, height)?;
        svg_el = svg_el.child(node);
        legend_items.extend(items);
    }
    if legend {
        svg_el = svg_el.child(legend_node(&legend_items, width, height));
    }
    Ok(chart_wrapper("PieChart", width, height).child(svg_el).into())
}

/// `"50%"` against `total`, or a plain number.
fn resolve_length(json: Option<&Json>, total: f64, default: f64) -> f64 {
    match json {
        Some(Json::String(s)) if s.trim_end().ends_with('%') => s
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map(|p| total * p / 100.0)
            .unwrap_or(default),
        Some(other) => json_f64(other).unwrap_or(default),
        None => default,
    }
}

fn polar(cx: f64, cy: f64, r: f64, degrees: f64) -> (f64, f64) {
    let rad = degrees.to_radians();
    (cx + r * rad.cos(), cy - r * rad.sin())
}

fn sector_path(cx: f64, cy: f64, inner: f64, outer: f64, start: f64, end: f64) -> String {
    let sweep = end - start;
    if sweep.abs() >= 359.999 {
        // A full ring: two half arcs, the second one reversed for the hole.
        let (x0, y0) = polar(cx, cy, outer, start);
        let (xm, ym) = polar(cx, cy, outer, start + 180.0);
        let mut d = PathData::new()
            .move_to(x0, y0)
            .arc_to(outer, false, false, xm, ym)
            .arc_to(outer, false, false, x0, y0)
            .close();
        if inner > 0.0 {
            let (i0, j0) = polar(cx, cy, inner, start);
            let (im, jm) = polar(cx, cy, inner, start + 180.0);
            d = d
                .move_to(i0, j0)
                .arc_to(inner, false, true, im, jm)
                .arc_to(inner, false, true, i0, j0)
                .close();
        }
        return d.finish();
    }
    let large = sweep.abs() > 180.0;
    let (x0, y0) = polar(cx, cy, outer, start);
    let (x1, y1) = polar(cx, cy, outer, end);
    let d = PathData::new()
        .move_to(x0, y0)
        .arc_to(outer, large, false, x1, y1);
    let d = if inner > 0.0 {
        let (i1, j1) = polar(cx, cy, inner, end);
        let (i0, j0) = polar(cx, cy, inner, start);
        d.line_to(i1, j1).arc_to(inner, large, true, i0, j0)
    } else {
        d.line_to(cx, cy)
    };
    d.close().finish()
}

fn pie_node(
    cx: &mut dyn Invoke,
    pie: &Part,
    width: f64,
    height: f64,
) -> Result<(Element, Vec<(String, String)>), RuntimeError> {
    let data: Vec<Json> = match pie.json("data") {
        Some(Json::Array(rows)) => rows.clone(),
        _ => Vec::new(),
    };
    let value_key = pie.str("dataKey").unwrap_or("value");
    let name_key = pie.str("nameKey").unwrap_or("name");
    let center_x = resolve_length(pie.json("cx"), width, width / 2.0);
    let center_y = resolve_length(pie.json("cy"), height, height / 2.0);
    let max_radius = width.min(height) / 2.0;
    let outer = resolve_length(pie.json("outerRadius"), max_radius, max_radius * 0.8);
    let inner = resolve_length(pie.json("innerRadius"), max_radius, 0.0);
    let start_angle = pie.f64("startAngle").unwrap_or(0.0);
    let end_angle = pie.f64("endAngle").unwrap_or(360.0);
    let padding = pie.f64("paddingAngle").unwrap_or(0.0);
    let cells = pie.parts();

    let values: Vec<f64> = data
        .iter()
        .map(|row| row.get(value_key).and_then(json_f64).unwrap_or(0.0).max(0.0))
        .collect();
    let total: f64 = values.iter().sum();
    let mut group = svg::group("recharts-pie");
    let mut legend = Vec::new();
    if total <= 0.0 {
        return Ok((group, legend));
    }

    let nonzero = values.iter().filter(|v| **v > 0.0).count();
    let span = end_angle - start_angle;
    let usable = span - padding * nonzero as f64 * span.signum();
    let mut angle = start_angle;
    let wants_label = pie.bool("label") == Some(true) || pie.callbacks.contains_key("label");
    for (i, (row, value)) in data.iter().zip(&values).enumerate() {
        let name = row
            .get(name_key)
            .map(|v| Value::from_json(v).to_js_string())
            .unwrap_or_else(|| i.to_string());
        let color = cells
            .get(i)
            .and_then(|c| c.str("fill"))
            .or_else(|| pie.str("fill"))
            .unwrap_or(palette(i))
            .to_string();
        legend.push((name.clone(), color.clone()));
        if *value <= 0.0 {
            continue;
        }
        let sweep = usable * value / total;
        let (a0, a1) = (angle, angle + sweep);
        angle = a1 + padding * span.signum();
        group = group.child(
            svg::path(sector_path(center_x, center_y, inner, outer, a0, a1), &color, "#fff")
                .attr("class", "recharts-sector")
                .attr("data-name", name.as_str()),
        );
        if wants_label {
            let mid = (a0 + a1) / 2.0;
            let (lx, ly) = polar(center_x, center_y, outer + 20.0, mid);
            let percent = value / total;
            let text = if pie.callbacks.contains_key("label") {
                let mut info = IndexMap::new();
                info.insert("name".to_string(), Value::from(name.as_str()));
                info.insert("value".to_string(), Value::from(*value));
                info.insert("percent".to_string(), Value::from(percent));
                info.insert("index".to_string(), Value::from(i as f64));
                info.insert("midAngle".to_string(), Value::from(mid));
                info.insert("cx".to_string(), Value::from(center_x));
                info.insert("cy".to_string(), Value::from(center_y));
                info.insert("x".to_string(), Value::from(lx));
                info.insert("y".to_string(), Value::from(ly));
                info.insert("innerRadius".to_string(), Value::from(inner));
                info.insert("outerRadius".to_string(), Value::from(outer));
                info.insert("fill".to_string(), Value::from(color.as_str()));
                info.insert("payload".to_string(), Value::from_json(row));
                let result = pie.call(cx, "label", vec![Value::object(info)])?;
                display_text(&result.unwrap_or_default())?
            } else {
                format_number(*value)
            };
            let anchor = if lx >= center_x { "start" } else { "end" };
            group = group.child(svg::text(lx, ly, anchor, text).attr("fill", color.as_str()));
        }
    }
    Ok((group, legend))
}
