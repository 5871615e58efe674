//! Baseline normalization of the four metric columns.

use crate::error::{DashboardError, Result};
use crate::metrics::{Metric, ENTITY, YEAR};
use crate::table::CerealTable;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How normalized values are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scaling {
    /// 1.0 at the baseline year.
    #[default]
    Ratio,
    /// 100.0 at the baseline year.
    Percent,
}

impl Scaling {
    pub fn factor(&self) -> f64 {
        match self {
            Scaling::Ratio => 1.0,
            Scaling::Percent => 100.0,
        }
    }

    pub fn axis_label(&self) -> &'static str {
        match self {
            Scaling::Ratio => "Relative Change",
            Scaling::Percent => "Relative Change (%)",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scaling::Ratio => "ratio",
            Scaling::Percent => "percent",
        }
    }
}

impl FromStr for Scaling {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ratio" | "unit" => Ok(Scaling::Ratio),
            "percent" | "percentage" | "pct" => Ok(Scaling::Percent),
            other => Err(DashboardError::Config(format!("unknown scaling '{}'", other))),
        }
    }
}

impl fmt::Display for Scaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized values of one metric, aligned with [`NormalizedSeries::years`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub metric: Metric,
    pub values: Vec<Option<f64>>,
}

/// The four metric series of one country relative to a baseline year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    pub country: String,
    pub baseline_year: i64,
    pub scaling: Scaling,
    pub years: Vec<i64>,
    pub metrics: Vec<MetricSeries>,
}

/// One row of the normalized table, as served and exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    #[serde(rename = "Entity")]
    pub entity: String,
    #[serde(rename = "Year")]
    pub year: i64,
    #[serde(rename = "Area harvested (hectares)")]
    pub area_harvested: Option<f64>,
    #[serde(rename = "Production (tonnes)")]
    pub production: Option<f64>,
    #[serde(rename = "Yield (tonnes per hectare)")]
    pub yield_per_hectare: Option<f64>,
    #[serde(rename = "Population (historical estimates)")]
    pub population: Option<f64>,
}

impl NormalizedSeries {
    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn series(&self, metric: Metric) -> Option<&MetricSeries> {
        self.metrics.iter().find(|s| s.metric == metric)
    }

    /// (year, value) pairs for a metric, skipping missing values.
    pub fn points(&self, metric: Metric) -> Vec<(i64, f64)> {
        match self.series(metric) {
            Some(series) => self
                .years
                .iter()
                .zip(series.values.iter())
                .filter_map(|(year, value)| value.map(|v| (*year, v)))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn value_at(&self, metric: Metric, year: i64) -> Option<f64> {
        let idx = self.years.iter().position(|y| *y == year)?;
        self.series(metric)?.values.get(idx).copied().flatten()
    }

    pub fn max_year(&self) -> Option<i64> {
        self.years.iter().copied().max()
    }

    pub fn rows(&self) -> Vec<NormalizedRow> {
        let column = |metric: Metric, i: usize| {
            self.series(metric)
                .and_then(|s| s.values.get(i).copied().flatten())
        };
        self.years
            .iter()
            .enumerate()
            .map(|(i, year)| NormalizedRow {
                entity: self.country.clone(),
                year: *year,
                area_harvested: column(Metric::AreaHarvested, i),
                production: column(Metric::Production, i),
                yield_per_hectare: column(Metric::Yield, i),
                population: column(Metric::Population, i),
            })
            .collect()
    }

    /// Tabular view with the source column names.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = vec![
            Series::new(ENTITY, vec![self.country.as_str(); self.years.len()]),
            Series::new(YEAR, self.years.clone()),
        ];
        for series in &self.metrics {
            columns.push(Series::new(series.metric.column(), series.values.clone()));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Rescales a country's metrics relative to a baseline year.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    scaling: Scaling,
    clip_to_baseline: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            scaling: Scaling::Ratio,
            clip_to_baseline: true,
        }
    }
}

impl Normalizer {
    pub fn new(scaling: Scaling) -> Self {
        Self {
            scaling,
            ..Self::default()
        }
    }

    /// Drop years before the baseline (on by default).
    pub fn with_clip_to_baseline(mut self, clip: bool) -> Self {
        self.clip_to_baseline = clip;
        self
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    pub fn normalize(
        &self,
        table: &CerealTable,
        country: &str,
        baseline_year: i64,
    ) -> Result<NormalizedSeries> {
        let filtered = table.filter_country(country)?;

        let baseline_row = filtered
            .clone()
            .lazy()
            .filter(col(YEAR).eq(lit(baseline_year)))
            .collect()?;
        if baseline_row.height() == 0 {
            return Err(DashboardError::BaselineNotFound {
                country: country.to_string(),
                year: baseline_year,
            });
        }

        let mut bases = Vec::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            let base = baseline_row.column(metric.column())?.f64()?.get(0);
            bases.push(self.check_baseline(country, metric, baseline_year, base)?);
        }

        let mut lf = filtered.lazy();
        if self.clip_to_baseline {
            lf = lf.filter(col(YEAR).gt_eq(lit(baseline_year)));
        }
        let rows = lf.collect()?;

        let years: Vec<i64> = rows.column(YEAR)?.i64()?.into_iter().flatten().collect();
        // Divide in Rust rather than with a literal expression: the query
        // optimizer turns `x / lit(b)` into `x * (1 / b)`, which is not exact.
        let factor = self.scaling.factor();
        let mut metrics = Vec::with_capacity(Metric::ALL.len());
        for (metric, base) in Metric::ALL.into_iter().zip(bases) {
            let values: Vec<Option<f64>> = rows
                .column(metric.column())?
                .f64()?
                .into_iter()
                .map(|v| v.map(|v| v / base * factor))
                .collect();
            metrics.push(MetricSeries { metric, values });
        }

        debug!(
            country,
            baseline_year,
            scaling = %self.scaling,
            points = years.len(),
            "normalized series"
        );

        Ok(NormalizedSeries {
            country: country.to_string(),
            baseline_year,
            scaling: self.scaling,
            years,
            metrics,
        })
    }

    fn check_baseline(
        &self,
        country: &str,
        metric: Metric,
        year: i64,
        base: Option<f64>,
    ) -> Result<f64> {
        match base {
            None => Err(DashboardError::MissingBaselineValue {
                country: country.to_string(),
                metric,
                year,
            }),
            Some(v) if v == 0.0 => Err(DashboardError::DivisionByZero {
                country: country.to_string(),
                metric,
                year,
            }),
            Some(v) if !v.is_finite() => Err(DashboardError::InvalidBaselineValue {
                country: country.to_string(),
                metric,
                year,
                value: v,
            }),
            Some(v) => Ok(v),
        }
    }

    /// Normalize against the earliest year present for the country.
    pub fn normalize_from_first_year(
        &self,
        table: &CerealTable,
        country: &str,
    ) -> Result<NormalizedSeries> {
        let (first_year, _) = table.year_range(country)?;
        self.normalize(table, country, first_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::test_util::sample_table;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_worked_example() {
        let table = sample_table();
        let series = Normalizer::new(Scaling::Ratio)
            .normalize(&table, "World", 2000)
            .unwrap();
        assert_eq!(series.years, vec![2000, 2001, 2002]);
        assert!(close(series.value_at(Metric::AreaHarvested, 2001).unwrap(), 1.5));
        assert!(close(series.value_at(Metric::Production, 2001).unwrap(), 1.0));
        assert!(close(series.value_at(Metric::Population, 2001).unwrap(), 1.01));
    }

    #[test]
    fn test_baseline_is_exact() {
        let table = sample_table();
        for (scaling, expected) in [(Scaling::Ratio, 1.0), (Scaling::Percent, 100.0)] {
            let series = Normalizer::new(scaling)
                .normalize_from_first_year(&table, "France")
                .unwrap();
            for metric in Metric::ALL {
                assert_eq!(series.value_at(metric, 2000), Some(expected));
            }
        }
    }

    #[test]
    fn test_clip_to_baseline() {
        let table = sample_table();
        let clipped = Normalizer::new(Scaling::Ratio)
            .normalize(&table, "World", 2001)
            .unwrap();
        assert_eq!(clipped.years, vec![2001, 2002]);

        let full = Normalizer::new(Scaling::Ratio)
            .with_clip_to_baseline(false)
            .normalize(&table, "World", 2001)
            .unwrap();
        assert_eq!(full.years, vec![2000, 2001, 2002]);
        assert!(close(full.value_at(Metric::AreaHarvested, 2000).unwrap(), 100.0 / 150.0));
    }

    #[test]
    fn test_last_year_baseline_is_single_point() {
        let table = sample_table();
        let series = Normalizer::new(Scaling::Ratio)
            .normalize(&table, "World", 2002)
            .unwrap();
        assert_eq!(series.len(), 1);
        for metric in Metric::ALL {
            assert_eq!(series.points(metric), vec![(2002, 1.0)]);
        }
    }

    #[test]
    fn test_missing_baseline_year() {
        let table = sample_table();
        let err = Normalizer::default()
            .normalize(&table, "France", 2002)
            .unwrap_err();
        assert!(matches!(
            err,
            DashboardError::BaselineNotFound { ref country, year: 2002 } if country == "France"
        ));
    }

    #[test]
    fn test_zero_baseline_value() {
        let df = df! [
            "Entity" => ["Nowhere", "Nowhere"],
            "Year" => [1990i64, 1991],
            "Area harvested (hectares)" => [10.0, 11.0],
            "Production (tonnes)" => [0.0, 5.0],
            "Yield (tonnes per hectare)" => [0.0, 0.5],
            "Population (historical estimates)" => [100.0, 101.0]
        ]
        .unwrap();
        let table = CerealTable::from_dataframe(df).unwrap();
        let err = Normalizer::default()
            .normalize(&table, "Nowhere", 1990)
            .unwrap_err();
        assert!(matches!(
            err,
            DashboardError::DivisionByZero { metric: Metric::Production, .. }
        ));
    }

    #[test]
    fn test_null_baseline_value() {
        let df = df! [
            "Entity" => ["Nowhere", "Nowhere"],
            "Year" => [1990i64, 1991],
            "Area harvested (hectares)" => [Some(10.0), Some(11.0)],
            "Production (tonnes)" => [Some(4.0), Some(5.0)],
            "Yield (tonnes per hectare)" => [Some(0.4), Some(0.5)],
            "Population (historical estimates)" => [None::<f64>, Some(101.0)]
        ]
        .unwrap();
        let table = CerealTable::from_dataframe(df).unwrap();
        let err = Normalizer::default()
            .normalize(&table, "Nowhere", 1990)
            .unwrap_err();
        assert!(matches!(
            err,
            DashboardError::MissingBaselineValue { metric: Metric::Population, .. }
        ));
    }

    #[test]
    fn test_non_finite_baseline_value() {
        let df = df! [
            "Entity" => ["Nowhere", "Nowhere"],
            "Year" => [1990i64, 1991],
            "Area harvested (hectares)" => [f64::NAN, 11.0],
            "Production (tonnes)" => [4.0, 5.0],
            "Yield (tonnes per hectare)" => [0.4, 0.5],
            "Population (historical estimates)" => [f64::INFINITY, 101.0]
        ]
        .unwrap();
        let table = CerealTable::from_dataframe(df).unwrap();
        let err = Normalizer::default()
            .normalize(&table, "Nowhere", 1990)
            .unwrap_err();
        assert!(matches!(
            err,
            DashboardError::InvalidBaselineValue { metric: Metric::AreaHarvested, .. }
        ));
        assert!(err.is_selection_error());
    }

    #[test]
    fn test_every_year_as_baseline_is_exact() {
        let df = df! [
            "Entity" => ["World", "World", "World", "World"],
            "Year" => [1961i64, 1962, 1963, 1964],
            "Area harvested (hectares)" => [648047000.0, 651941400.0, 657524800.0, 665326000.0],
            "Production (tonnes)" => [876876900.0, 921234500.0, 942150100.0, 987954000.0],
            "Yield (tonnes per hectare)" => [1.3531, 1.4131, 1.4329, 2.8553],
            "Population (historical estimates)" => [3073368500.0, 3126509400.0, 3191798500.0, 3257459400.0]
        ]
        .unwrap();
        let table = CerealTable::from_dataframe(df).unwrap();
        for scaling in [Scaling::Ratio, Scaling::Percent] {
            for year in 1961..=1964 {
                let series = Normalizer::new(scaling).normalize(&table, "World", year).unwrap();
                for metric in Metric::ALL {
                    assert_eq!(series.value_at(metric, year), Some(scaling.factor()));
                }
            }
        }
    }

    #[test]
    fn test_to_dataframe_columns() {
        let table = sample_table();
        let series = Normalizer::new(Scaling::Percent)
            .normalize(&table, "World", 2000)
            .unwrap();
        let df = series.to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.get_column_names()[0], "Entity");
        assert_eq!(df.get_column_names()[2], "Area harvested (hectares)");
        let rows = series.rows();
        assert_eq!(rows[0].production, Some(100.0));
    }

    #[test]
    fn test_scaling_parse() {
        assert_eq!("Percent".parse::<Scaling>().unwrap(), Scaling::Percent);
        assert_eq!("ratio".parse::<Scaling>().unwrap(), Scaling::Ratio);
        assert!("double".parse::<Scaling>().is_err());
    }
}
