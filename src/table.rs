//! In-memory cereal production table.
//!
//! Wraps a polars `DataFrame` whose columns have been checked and cast to the
//! fixed schema: `Entity` (String), `Year` (Int64) and the four metric
//! columns (Float64). Rows keep their source order.

use crate::error::{DashboardError, Result};
use crate::metrics::{Metric, ENTITY, YEAR};
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One (country, year) observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
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

impl Record {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::AreaHarvested => self.area_harvested,
            Metric::Production => self.production,
            Metric::Yield => self.yield_per_hectare,
            Metric::Population => self.population,
        }
    }
}

/// Order in which distinct countries are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountryOrder {
    /// Order of first appearance in the file.
    #[default]
    FirstSeen,
    Sorted,
}

#[derive(Debug, Clone)]
pub struct CerealTable {
    df: DataFrame,
}

impl CerealTable {
    /// Validate a raw frame and cast it to the table schema.
    ///
    /// Extra columns are dropped. Fails with `Malformed` when a required column
    /// is missing, a value cannot be cast, an Entity or Year is null, or a
    /// (country, year) pair appears twice.
    pub fn from_dataframe(df: DataFrame) -> Result<Self> {
        let names = df.get_column_names();
        let missing: Vec<&str> = Metric::required_columns()
            .into_iter()
            .filter(|c| !names.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(DashboardError::Malformed(format!(
                "missing column(s): {}",
                missing.join(", ")
            )));
        }

        let mut columns = vec![
            cast_column(df.column(ENTITY)?, &DataType::String)?,
            whole_years(&df)?,
        ];
        for metric in Metric::ALL {
            columns.push(cast_column(df.column(metric.column())?, &DataType::Float64)?);
        }
        let df = DataFrame::new(columns)?;

        for name in [ENTITY, YEAR] {
            let nulls = df.column(name)?.null_count();
            if nulls > 0 {
                return Err(DashboardError::Malformed(format!(
                    "{} row(s) have no {} value",
                    nulls, name
                )));
            }
        }
        check_unique_observations(&df)?;

        Ok(Self { df })
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn distinct_countries(&self, order: CountryOrder) -> Result<Vec<String>> {
        let entities = self.df.column(ENTITY)?.str()?;
        let mut countries: Vec<String> = entities
            .into_iter()
            .flatten()
            .unique()
            .map(str::to_string)
            .collect();
        if order == CountryOrder::Sorted {
            countries.sort();
        }
        Ok(countries)
    }

    /// Rows for one country, in source order.
    pub fn filter_country(&self, country: &str) -> Result<DataFrame> {
        let filtered = self
            .df
            .clone()
            .lazy()
            .filter(col(ENTITY).eq(lit(country)))
            .collect()?;
        if filtered.height() == 0 {
            return Err(DashboardError::EmptySelection(country.to_string()));
        }
        Ok(filtered)
    }

    /// Smallest and largest year present for a country.
    pub fn year_range(&self, country: &str) -> Result<(i64, i64)> {
        let filtered = self.filter_country(country)?;
        let years = filtered.column(YEAR)?.i64()?;
        match (years.min(), years.max()) {
            (Some(min), Some(max)) => Ok((min, max)),
            _ => Err(DashboardError::EmptySelection(country.to_string())),
        }
    }

    pub fn records(&self) -> Result<Vec<Record>> {
        frame_to_records(&self.df)
    }

    /// Source rows of one country. Fails with `EmptySelection` when the
    /// country is absent.
    pub fn country_records(&self, country: &str) -> Result<Vec<Record>> {
        frame_to_records(&self.filter_country(country)?)
    }
}

/// Cast a column, failing when a present value cannot be converted.
fn cast_column(source: &Series, dtype: &DataType) -> Result<Series> {
    let cast = source
        .cast(dtype)
        .map_err(|e| DashboardError::Malformed(format!("column '{}': {}", source.name(), e)))?;
    let lost = cast.null_count().saturating_sub(source.null_count());
    if lost > 0 {
        return Err(DashboardError::Malformed(format!(
            "{} value(s) in column '{}' could not be parsed",
            lost,
            source.name()
        )));
    }
    Ok(cast)
}

/// `Year` as Int64. Fractional or non-finite years are rejected instead of
/// being truncated.
fn whole_years(df: &DataFrame) -> Result<Series> {
    let years = cast_column(df.column(YEAR)?, &DataType::Float64)?;
    if let Some(bad) = years
        .f64()?
        .into_iter()
        .flatten()
        .find(|y| !y.is_finite() || y.fract() != 0.0)
    {
        return Err(DashboardError::Malformed(format!(
            "column '{}' has a non-integer year {}",
            YEAR, bad
        )));
    }
    cast_column(&years, &DataType::Int64)
}

fn check_unique_observations(df: &DataFrame) -> Result<()> {
    let entities = df.column(ENTITY)?.str()?;
    let years = df.column(YEAR)?.i64()?;
    let mut seen = HashSet::with_capacity(df.height());
    for (entity, year) in entities.into_iter().zip(years.into_iter()) {
        if let (Some(entity), Some(year)) = (entity, year) {
            if !seen.insert((entity, year)) {
                return Err(DashboardError::Malformed(format!(
                    "duplicate observation for {} in {}",
                    entity, year
                )));
            }
        }
    }
    Ok(())
}

/// Read rows of a frame with the table schema into records.
fn frame_to_records(df: &DataFrame) -> Result<Vec<Record>> {
    let entities = df.column(ENTITY)?.str()?;
    let years = df.column(YEAR)?.i64()?;
    let area = df.column(Metric::AreaHarvested.column())?.f64()?;
    let production = df.column(Metric::Production.column())?.f64()?;
    let yields = df.column(Metric::Yield.column())?.f64()?;
    let population = df.column(Metric::Population.column())?.f64()?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(entity), Some(year)) = (entities.get(i), years.get(i)) else {
            return Err(DashboardError::Malformed(format!("row {} has no entity or year", i)));
        };
        out.push(Record {
            entity: entity.to_string(),
            year,
            area_harvested: area.get(i),
            production: production.get(i),
            yield_per_hectare: yields.get(i),
            population: population.get(i),
        });
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Two countries, World with the worked example values.
    pub fn sample_frame() -> DataFrame {
        df! [
            "Entity" => ["World", "World", "World", "France", "France"],
            "Code" => ["OWID_WRL", "OWID_WRL", "OWID_WRL", "FRA", "FRA"],
            "Year" => [2000i64, 2001, 2002, 2000, 2001],
            "Area harvested (hectares)" => [100.0, 150.0, 200.0, 10.0, 12.0],
            "Production (tonnes)" => [200.0, 200.0, 300.0, 50.0, 55.0],
            "Yield (tonnes per hectare)" => [2.0, 1.33, 1.5, 5.0, 4.6],
            "Population (historical estimates)" => [1000.0, 1010.0, 1020.0, 60.0, 61.0]
        ]
        .unwrap()
    }

    pub fn sample_table() -> CerealTable {
        CerealTable::from_dataframe(sample_frame()).unwrap()
    }
}
