//! Chart specifications and their SVG rendering.

use crate::error::{DashboardError, Result};
use crate::metrics::{Metric, Rgb};
use crate::normalize::NormalizedSeries;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Chart arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// One chart with a line per metric.
    #[default]
    Combined,
    /// One chart per metric.
    Split,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Combined => "combined",
            Layout::Split => "split",
        }
    }

    /// Label shown next to the layout control.
    pub fn display_name(&self) -> &'static str {
        match self {
            Layout::Combined => "All Together",
            Layout::Split => "Split by Metric",
        }
    }
}

impl FromStr for Layout {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" | "all together" | "together" => Ok(Layout::Combined),
            "split" | "split by metric" => Ok(Layout::Split),
            other => Err(DashboardError::Config(format!("unknown layout '{}'", other))),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSpec {
    pub label: String,
    pub color: Rgb,
    pub points: Vec<(i64, f64)>,
}

/// Everything needed to draw one line chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Inclusive year range of the x axis.
    pub x_range: (i64, i64),
    pub show_legend: bool,
    pub series: Vec<LineSpec>,
}

impl ChartSpec {
    /// Padded y-axis bounds covering every point.
    pub fn y_bounds(&self) -> (f64, f64) {
        let mut values = self.series.iter().flat_map(|s| s.points.iter().map(|p| p.1));
        let Some(first) = values.next() else {
            return (0.0, 1.0);
        };
        let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if (max - min).abs() < f64::EPSILON {
            let pad = (max.abs() * 0.1).max(0.1);
            (min - pad, max + pad)
        } else {
            let pad = (max - min) * 0.05;
            (min - pad, max + pad)
        }
    }
}

/// A chart spec together with its drawn SVG document.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedChart {
    pub spec: ChartSpec,
    pub svg: String,
}

/// Build the chart specs for a normalized series.
///
/// The x axis runs from the baseline year to the last year in the series.
pub fn render(series: &NormalizedSeries, layout: Layout) -> Vec<ChartSpec> {
    let x_range = (
        series.baseline_year,
        series.max_year().unwrap_or(series.baseline_year).max(series.baseline_year),
    );
    let clip = |points: Vec<(i64, f64)>| -> Vec<(i64, f64)> {
        points
            .into_iter()
            .filter(|(year, _)| *year >= x_range.0 && *year <= x_range.1)
            .collect()
    };
    let line = |metric: Metric| LineSpec {
        label: metric.label().to_string(),
        color: metric.color(),
        points: clip(series.points(metric)),
    };
    let y_label = series.scaling.axis_label().to_string();

    match layout {
        Layout::Combined => vec![ChartSpec {
            title: format!("Data for {}", series.country),
            x_label: "Year".to_string(),
            y_label,
            x_range,
            show_legend: true,
            series: Metric::ALL.iter().map(|m| line(*m)).collect(),
        }],
        Layout::Split => Metric::ALL
            .iter()
            .map(|m| ChartSpec {
                title: m.label().to_string(),
                x_label: "Year".to_string(),
                y_label: y_label.clone(),
                x_range,
                show_legend: false,
                series: vec![line(*m)],
            })
            .collect(),
    }
}

/// Draws chart specs as SVG.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    width: u32,
    height: u32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
        }
    }
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel size of one chart. Split charts share the width in a 2x2 grid.
    pub fn chart_size(&self, layout: Layout) -> (u32, u32) {
        match layout {
            Layout::Combined => (self.width, self.height),
            Layout::Split => (self.width / 2, self.width / 2),
        }
    }

    /// Specs for the series, each drawn to SVG.
    pub fn render_all(&self, series: &NormalizedSeries, layout: Layout) -> Result<Vec<RenderedChart>> {
        let size = self.chart_size(layout);
        render(series, layout)
            .into_iter()
            .map(|spec| {
                let svg = self.draw_svg(&spec, size)?;
                Ok::<_, DashboardError>(RenderedChart { spec, svg })
            })
            .collect()
    }

    pub fn draw_svg(&self, spec: &ChartSpec, size: (u32, u32)) -> Result<String> {
        let mut buffer = String::new();
        {
            let root = SVGBackend::with_string(&mut buffer, size).into_drawing_area();
            draw_chart(&root, spec)
                .map_err(|e| DashboardError::Render(format!("Failed to draw '{}': {}", spec.title, e)))?;
            root.present()
                .map_err(|e| DashboardError::Render(format!("Failed to finish '{}': {}", spec.title, e)))?;
        }
        debug!(title = %spec.title, bytes = buffer.len(), "chart drawn");
        Ok(buffer)
    }
}

fn draw_chart<DB>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
) -> std::result::Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let (mut x0, mut x1) = spec.x_range;
    if x0 >= x1 {
        x0 -= 1;
        x1 = x0 + 2;
    }
    let (y0, y1) = spec.y_bounds();

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .x_label_formatter(&|year| year.to_string())
        .y_label_formatter(&|v| format!("{:.2}", v))
        .draw()?;

    for line in &spec.series {
        let color = RGBColor(line.color.0, line.color.1, line.color.2);
        let drawn = chart.draw_series(LineSeries::new(
            line.points.iter().copied(),
            color.stroke_width(2),
        ))?;
        if spec.show_legend {
            drawn
                .label(line.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
        // a single year draws no line segment
        if line.points.len() == 1 {
            chart.draw_series(
                line.points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
            )?;
        }
    }

    if spec.show_legend {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{Normalizer, Scaling};
    use crate::table::test_util::sample_table;

    fn world_series(baseline: i64) -> NormalizedSeries {
        Normalizer::new(Scaling::Ratio)
            .normalize(&sample_table(), "World", baseline)
            .unwrap()
    }

    #[test]
    fn test_combined_has_four_lines() {
        let specs = render(&world_series(2000), Layout::Combined);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].title, "Data for World");
        assert_eq!(specs[0].series.len(), 4);
        assert_eq!(specs[0].x_range, (2000, 2002));
        assert!(specs[0].show_legend);
    }

    #[test]
    fn test_split_has_one_chart_per_metric() {
        let specs = render(&world_series(2001), Layout::Split);
        let titles: Vec<&str> = specs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Area harvested", "Production", "Yield", "Population"]);
        for spec in &specs {
            assert_eq!(spec.x_range, (2001, 2002));
            assert_eq!(spec.series.len(), 1);
        }
    }

    #[test]
    fn test_unclipped_series_is_clipped_on_axis() {
        let series = Normalizer::new(Scaling::Ratio)
            .with_clip_to_baseline(false)
            .normalize(&sample_table(), "World", 2001)
            .unwrap();
        let specs = render(&series, Layout::Combined);
        assert!(specs[0].series[0].points.iter().all(|(y, _)| *y >= 2001));
    }

    #[test]
    fn test_y_bounds_padding() {
        let spec = ChartSpec {
            title: "t".into(),
            x_label: "Year".into(),
            y_label: "v".into(),
            x_range: (2000, 2000),
            show_legend: false,
            series: vec![LineSpec {
                label: "a".into(),
                color: Rgb(0, 0, 0),
                points: vec![(2000, 1.0)],
            }],
        };
        let (lo, hi) = spec.y_bounds();
        assert!(lo < 1.0 && hi > 1.0);
    }

    #[test]
    fn test_draw_svg() {
        let renderer = Renderer::new(400, 300);
        let charts = renderer.render_all(&world_series(2000), Layout::Combined).unwrap();
        assert_eq!(charts.len(), 1);
        assert!(charts[0].svg.contains("<svg"));
        assert!(charts[0].svg.contains("Data for World"));
    }

    #[test]
    fn test_draw_single_point() {
        let renderer = Renderer::new(400, 300);
        let charts = renderer.render_all(&world_series(2002), Layout::Split).unwrap();
        assert_eq!(charts.len(), 4);
        assert!(charts.iter().all(|c| c.svg.contains("<circle")));
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("Split by Metric".parse::<Layout>().unwrap(), Layout::Split);
        assert_eq!("combined".parse::<Layout>().unwrap(), Layout::Combined);
        assert!("grid".parse::<Layout>().is_err());
    }
}
