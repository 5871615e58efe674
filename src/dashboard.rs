//! Selection state to rendered output.
//!
//! Each interaction re-runs filter, normalize and render against the loaded
//! table. [`Dashboard::interact`] is that run as a plain function so it can be
//! driven by the HTTP server, the CLI or a test without any event loop.

use crate::error::{DashboardError, Result};
use crate::metrics::Metric;
use crate::normalize::{NormalizedRow, NormalizedSeries, Normalizer, Scaling};
use crate::render::{Layout, RenderedChart, Renderer};
use crate::table::{CerealTable, CountryOrder};
use serde::Serialize;
use tracing::{debug, warn};

pub const TITLE: &str = "Cereal Production Dashboard";
pub const SUBTITLE: &str = "This dashboard visualizes cereal production data.";

/// What the user has picked. Unset fields fall back to the first country and
/// that country's first year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    pub country: Option<String>,
    pub baseline_year: Option<i64>,
    pub layout: Layout,
    pub scaling: Scaling,
}

impl Selection {
    pub fn new(layout: Layout, scaling: Scaling) -> Self {
        Self {
            layout,
            scaling,
            ..Self::default()
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_baseline_year(mut self, year: i64) -> Self {
        self.baseline_year = Some(year);
        self
    }

    /// Apply URL query parameters (`country`, `baseline`, `layout`, `scaling`)
    /// on top of `self`. Empty values are ignored.
    pub fn merge_query(mut self, query: &str) -> Result<Self> {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match &*key {
                "country" => self.country = Some(value.to_string()),
                "baseline" | "baseline_year" => {
                    let year = value.parse::<i64>().map_err(|_| {
                        DashboardError::Config(format!("baseline year '{}' is not a number", value))
                    })?;
                    self.baseline_year = Some(year);
                }
                "layout" => self.layout = value.parse()?,
                "scaling" => self.scaling = value.parse()?,
                other => debug!(param = other, "ignoring query parameter"),
            }
        }
        Ok(self)
    }
}

/// Output of one successful interaction.
#[derive(Debug, Clone, Serialize)]
pub struct Rendered {
    pub country: String,
    pub baseline_year: i64,
    pub year_bounds: (i64, i64),
    pub series: NormalizedSeries,
    pub charts: Vec<RenderedChart>,
}

/// Everything a surface needs to draw the page, including a notice when the
/// selection could not be rendered.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub title: String,
    pub subtitle: String,
    pub countries: Vec<String>,
    pub selection: Selection,
    pub year_bounds: Option<(i64, i64)>,
    pub charts: Vec<RenderedChart>,
    pub rows: Vec<NormalizedRow>,
    pub descriptions: Vec<(String, String)>,
    pub notice: Option<String>,
    #[serde(skip)]
    pub series: Option<NormalizedSeries>,
}

pub struct Dashboard<'a> {
    table: &'a CerealTable,
    renderer: Renderer,
    clip_to_baseline: bool,
}

impl<'a> Dashboard<'a> {
    pub fn new(table: &'a CerealTable, renderer: Renderer) -> Self {
        Self {
            table,
            renderer,
            clip_to_baseline: true,
        }
    }

    pub fn with_clip_to_baseline(mut self, clip: bool) -> Self {
        self.clip_to_baseline = clip;
        self
    }

    /// Country shown when none is selected.
    pub fn default_country(&self) -> Result<String> {
        self.table
            .distinct_countries(CountryOrder::FirstSeen)?
            .into_iter()
            .next()
            .ok_or_else(|| DashboardError::Malformed("table has no rows".to_string()))
    }

    pub fn interact(&self, selection: &Selection) -> Result<Rendered> {
        let country = match &selection.country {
            Some(country) => country.clone(),
            None => self.default_country()?,
        };
        let year_bounds = self.table.year_range(&country)?;
        let baseline_year = selection.baseline_year.unwrap_or(year_bounds.0);

        let series = Normalizer::new(selection.scaling)
            .with_clip_to_baseline(self.clip_to_baseline)
            .normalize(self.table, &country, baseline_year)?;
        let charts = self.renderer.render_all(&series, selection.layout)?;

        Ok(Rendered {
            country,
            baseline_year,
            year_bounds,
            series,
            charts,
        })
    }

    /// Like [`interact`](Self::interact) but selection and render failures
    /// become a notice on the view. Only table-level failures are returned.
    pub fn view(&self, selection: &Selection) -> Result<DashboardView> {
        let countries = self.table.distinct_countries(CountryOrder::FirstSeen)?;
        let mut view = DashboardView {
            title: TITLE.to_string(),
            subtitle: SUBTITLE.to_string(),
            countries,
            selection: selection.clone(),
            year_bounds: None,
            charts: Vec::new(),
            rows: Vec::new(),
            descriptions: Metric::ALL
                .iter()
                .map(|m| (m.column().to_string(), m.description().to_string()))
                .collect(),
            notice: None,
            series: None,
        };

        match self.interact(selection) {
            Ok(rendered) => {
                view.selection.country = Some(rendered.country);
                view.selection.baseline_year = Some(rendered.baseline_year);
                view.year_bounds = Some(rendered.year_bounds);
                view.rows = rendered.series.rows();
                view.series = Some(rendered.series);
                view.charts = rendered.charts;
            }
            Err(e) if e.is_selection_error() || matches!(e, DashboardError::Render(_)) => {
                warn!(error = %e, "selection could not be rendered");
                let country = match &selection.country {
                    Some(country) => country.clone(),
                    None => self.default_country()?,
                };
                view.year_bounds = self.table.year_range(&country).ok();
                view.selection.country = Some(country);
                view.notice = Some(e.to_string());
            }
            Err(e) => return Err(e),
        }
        Ok(view)
    }
}
