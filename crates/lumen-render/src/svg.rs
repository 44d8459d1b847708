//! SVG building blocks shared by the chart, plot and flow helpers.

use lumen_core::{Element, VNode};
use std::fmt::Write as _;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Series colours used when a chart part does not name one.
pub const PALETTE: [&str; 8] = [
    "#8884d8", "#82ca9d", "#ffc658", "#ff7300", "#0088fe", "#00c49f", "#ffbb28", "#ff8042",
];

pub fn palette(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Rounds to 3 fractional digits and drops float noise, `-0` and non-finite values.
pub fn round3(v: f64) -> f64 {
    if !v.is_finite() || v.abs() < 0.0005 {
        return 0.0;
    }
    let r = (v * 1000.0).round() / 1000.0;
    if r == 0.0 { 0.0 } else { r }
}

/// Shortest decimal form of `round3(v)`, the way coordinates appear in path data.
pub fn fmt(v: f64) -> String {
    let mut out = String::new();
    fmt_into(&mut out, v);
    out
}

pub fn fmt_into(out: &mut String, v: f64) {
    let v = round3(v);
    if v.fract() == 0.0 && v.abs() < 1e15 {
        let _ = write!(out, "{}", v as i64);
    } else {
        let _ = write!(out, "{v}");
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_xml_into(&mut out, text);
    out
}

pub fn escape_xml_into(out: &mut String, text: &str) {
    let mut start = 0usize;
    for (i, b) in text.bytes().enumerate() {
        let esc = match b {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            _ => continue,
        };
        out.push_str(&text[start..i]);
        out.push_str(esc);
        start = i + 1;
    }
    out.push_str(&text[start..]);
}

/// Path `d` attribute builder.
#[derive(Debug, Default, Clone)]
pub struct PathData(String);

impl PathData {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(&mut self, cmd: char, points: &[f64]) {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        self.0.push(cmd);
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                self.0.push(if i % 2 == 1 { ',' } else { ' ' });
            }
            fmt_into(&mut self.0, *p);
        }
    }

    pub fn move_to(mut self, x: f64, y: f64) -> Self {
        self.command('M', &[x, y]);
        self
    }

    pub fn line_to(mut self, x: f64, y: f64) -> Self {
        self.command('L', &[x, y]);
        self
    }

    pub fn cubic_to(mut self, c1: (f64, f64), c2: (f64, f64), to: (f64, f64)) -> Self {
        self.command('C', &[c1.0, c1.1, c2.0, c2.1, to.0, to.1]);
        self
    }

    /// Circular arc to `(x, y)`.
    pub fn arc_to(mut self, r: f64, large: bool, sweep: bool, x: f64, y: f64) -> Self {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        let _ = write!(
            self.0,
            "A{r},{r} 0 {large} {sweep} ",
            r = fmt(r),
            large = u8::from(large),
            sweep = u8::from(sweep)
        );
        fmt_into(&mut self.0, x);
        self.0.push(',');
        fmt_into(&mut self.0, y);
        self
    }

    pub fn close(mut self) -> Self {
        self.0.push_str(" Z");
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> String {
        self.0
    }
}

/// Polyline through `points`, skipping gaps (`None`) the way a line series breaks on missing data.
pub fn polyline_path(points: &[Option<(f64, f64)>]) -> String {
    let mut path = PathData::new();
    let mut pen_down = false;
    for point in points {
        match point {
            Some((x, y)) if pen_down => path = path.line_to(*x, *y),
            Some((x, y)) => {
                path = path.move_to(*x, *y);
                pen_down = true;
            }
            None => pen_down = false,
        }
    }
    path.finish()
}

/// Smooth curve through the points (monotone in x, like `type="monotone"`).
pub fn monotone_path(points: &[(f64, f64)]) -> String {
    let n = points.len();
    if n < 3 {
        return polyline_path(&points.iter().copied().map(Some).collect::<Vec<_>>());
    }
    let slopes: Vec<f64> = points
        .windows(2)
        .map(|w| {
            let dx = w[1].0 - w[0].0;
            if dx == 0.0 { 0.0 } else { (w[1].1 - w[0].1) / dx }
        })
        .collect();
    let mut tangents = Vec::with_capacity(n);
    tangents.push(slopes[0]);
    for i in 1..n - 1 {
        let (a, b) = (slopes[i - 1], slopes[i]);
        tangents.push(if a * b <= 0.0 { 0.0 } else { (a + b) / 2.0 });
    }
    tangents.push(slopes[n - 2]);

    let mut path = PathData::new().move_to(points[0].0, points[0].1);
    for i in 0..n - 1 {
        let (x0, y0) = points[i];
        let (x1, y1) = points[i + 1];
        let dx = (x1 - x0) / 3.0;
        path = path.cubic_to(
            (x0 + dx, y0 + dx * tangents[i]),
            (x1 - dx, y1 - dx * tangents[i + 1]),
            (x1, y1),
        );
    }
    path.finish()
}

/// Maps a numeric domain onto a pixel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        let domain = if domain.0 == domain.1 {
            (domain.0 - 1.0, domain.1 + 1.0)
        } else {
            domain
        };
        Self { domain, range }
    }

    /// Domain covering `values`, optionally anchored at zero.
    pub fn from_values(
        values: impl IntoIterator<Item = f64>,
        include_zero: bool,
        range: (f64, f64),
    ) -> Self {
        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for v in values.into_iter().filter(|v| v.is_finite()) {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if lo > hi {
            (lo, hi) = (0.0, 1.0);
        }
        if include_zero {
            lo = lo.min(0.0);
            hi = hi.max(0.0);
        }
        Self::new((lo, hi), range)
    }

    /// Extends the domain outwards to round tick values.
    pub fn nice(self, count: usize) -> Self {
        let step = tick_step(self.domain.0, self.domain.1, count);
        if step == 0.0 || !step.is_finite() {
            return self;
        }
        Self::new(
            (
                (self.domain.0 / step).floor() * step,
                (self.domain.1 / step).ceil() * step,
            ),
            self.range,
        )
    }

    pub fn map(&self, v: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        r0 + (v - d0) / (d1 - d0) * (r1 - r0)
    }

    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (lo, hi) = (
            self.domain.0.min(self.domain.1),
            self.domain.0.max(self.domain.1),
        );
        let step = tick_step(lo, hi, count);
        if step == 0.0 || !step.is_finite() {
            return vec![lo];
        }
        let start = (lo / step).ceil() as i64;
        let stop = (hi / step).floor() as i64;
        (start..=stop)
            .take(1000)
            .map(|i| round_to_step(i as f64 * step, step))
            .collect()
    }
}

fn tick_step(lo: f64, hi: f64, count: usize) -> f64 {
    let span = (hi - lo).abs();
    if span == 0.0 || !span.is_finite() {
        return 0.0;
    }
    let raw = span / count.max(1) as f64;
    let power = 10f64.powi(raw.log10().floor() as i32);
    let error = raw / power;
    let factor = if error >= 7.07 {
        10.0
    } else if error >= 3.16 {
        5.0
    } else if error >= 1.41 {
        2.0
    } else {
        1.0
    };
    factor * power
}

fn round_to_step(v: f64, step: f64) -> f64 {
    let digits = (-step.log10().floor()).max(0.0) as i32;
    let k = 10f64.powi(digits);
    (v * k).round() / k
}

/// Evenly divides a pixel range into bands, one per category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandScale {
    pub count: usize,
    pub range: (f64, f64),
}

impl BandScale {
    pub fn new(count: usize, range: (f64, f64)) -> Self {
        Self {
            count: count.max(1),
            range,
        }
    }

    pub fn bandwidth(&self) -> f64 {
        (self.range.1 - self.range.0) / self.count as f64
    }

    /// Left edge of band `index`.
    pub fn start(&self, index: usize) -> f64 {
        self.range.0 + self.bandwidth() * index as f64
    }

    pub fn center(&self, index: usize) -> f64 {
        self.start(index) + self.bandwidth() / 2.0
    }
}

/// `<svg>` root with a viewBox matching its size.
pub fn svg_root(width: f64, height: f64) -> Element {
    Element::new("svg")
        .attr("xmlns", SVG_NS)
        .attr("width", round3(width))
        .attr("height", round3(height))
        .attr("viewBox", format!("0 0 {} {}", fmt(width), fmt(height)))
}

pub fn text(x: f64, y: f64, anchor: &str, content: impl Into<String>) -> Element {
    Element::new("text")
        .attr("x", round3(x))
        .attr("y", round3(y))
        .attr("text-anchor", anchor)
        .child(VNode::text(content))
}

pub fn line(x1: f64, y1: f64, x2: f64, y2: f64, stroke: &str) -> Element {
    Element::new("line")
        .attr("x1", round3(x1))
        .attr("y1", round3(y1))
        .attr("x2", round3(x2))
        .attr("y2", round3(y2))
        .attr("stroke", stroke)
}

pub fn rect(x: f64, y: f64, width: f64, height: f64, fill: &str) -> Element {
    Element::new("rect")
        .attr("x", round3(x))
        .attr("y", round3(y))
        .attr("width", round3(width.max(0.0)))
        .attr("height", round3(height.max(0.0)))
        .attr("fill", fill)
}

pub fn circle(cx: f64, cy: f64, r: f64, fill: &str) -> Element {
    Element::new("circle")
        .attr("cx", round3(cx))
        .attr("cy", round3(cy))
        .attr("r", round3(r))
        .attr("fill", fill)
}

pub fn path(d: String, fill: &str, stroke: &str) -> Element {
    Element::new("path")
        .attr("d", d)
        .attr("fill", fill)
        .attr("stroke", stroke)
}

pub fn group(class: &str) -> Element {
    Element::new("g").attr("class", class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_drops_noise_and_negative_zero() {
        assert_eq!(fmt(f64::NAN), "0");
        assert_eq!(fmt(-0.0), "0");
        assert_eq!(fmt(-0.0001), "0");
        assert_eq!(fmt(1.0000004), "1");
        assert_eq!(fmt(0.1 + 0.2), "0.3");
        assert_eq!(fmt(-12.3456), "-12.346");
        assert_eq!(fmt(250.0), "250");
    }

    #[test]
    fn path_data_formats_commands() {
        let d = PathData::new()
            .move_to(0.0, 10.5)
            .line_to(3.0, 4.0)
            .arc_to(5.0, false, true, 1.0, 2.0)
            .close()
            .finish();
        assert_eq!(d, "M0,10.5 L3,4 A5,5 0 0 1 1,2 Z");
        assert_eq!(
            polyline_path(&[Some((0.0, 0.0)), None, Some((1.0, 1.0)), Some((2.0, 0.0))]),
            "M0,0 M1,1 L2,0"
        );
    }

    #[test]
    fn linear_scale_nices_and_ticks() {
        let scale = LinearScale::from_values([3.0, 97.0], true, (0.0, 100.0)).nice(5);
        assert_eq!(scale.domain, (0.0, 100.0));
        assert_eq!(scale.ticks(5), vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0]);
        assert_eq!(scale.map(50.0), 50.0);

        let inverted = LinearScale::new((0.0, 10.0), (200.0, 0.0));
        assert_eq!(inverted.map(10.0), 0.0);
        assert_eq!(LinearScale::new((0.0, 1.0), (0.0, 1.0)).ticks(5).len(), 6);
        assert_eq!(LinearScale::new((5.0, 5.0), (0.0, 1.0)).domain, (4.0, 6.0));
    }

    #[test]
    fn band_scale_splits_the_range() {
        let bands = BandScale::new(4, (0.0, 400.0));
        assert_eq!(bands.bandwidth(), 100.0);
        assert_eq!(bands.center(2), 250.0);
    }
}
