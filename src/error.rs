use std::path::PathBuf;

use thiserror::Error;

use crate::metrics::Metric;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Data file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("No rows found for country '{0}'")]
    EmptySelection(String),

    #[error("Baseline year {year} is not present for {country}")]
    BaselineNotFound { country: String, year: i64 },

    #[error("{metric} is zero for {country} in baseline year {year}, cannot normalize")]
    DivisionByZero {
        country: String,
        metric: Metric,
        year: i64,
    },

    #[error("{metric} has no value for {country} in baseline year {year}")]
    MissingBaselineValue {
        country: String,
        metric: Metric,
        year: i64,
    },

    #[error("{metric} is {value} for {country} in baseline year {year}, cannot normalize")]
    InvalidBaselineValue {
        country: String,
        metric: Metric,
        year: i64,
        value: f64,
    },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl DashboardError {
    /// Errors caused by what the user picked. These are shown as a notice on
    /// the dashboard; everything else ends the interaction.
    pub fn is_selection_error(&self) -> bool {
        matches!(
            self,
            DashboardError::EmptySelection(_)
                | DashboardError::BaselineNotFound { .. }
                | DashboardError::DivisionByZero { .. }
                | DashboardError::MissingBaselineValue { .. }
                | DashboardError::InvalidBaselineValue { .. }
        )
    }

    /// Errors raised while reading the source file.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            DashboardError::FileNotFound(_) | DashboardError::Malformed(_)
        )
    }
}

impl From<polars::prelude::PolarsError> for DashboardError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        DashboardError::Polars(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_errors_are_classified() {
        assert!(DashboardError::EmptySelection("Atlantis".into()).is_selection_error());
        assert!(DashboardError::BaselineNotFound {
            country: "World".into(),
            year: 1900
        }
        .is_selection_error());
        assert!(!DashboardError::Malformed("bad".into()).is_selection_error());
        assert!(DashboardError::FileNotFound(PathBuf::from("x.csv")).is_load_error());
    }

    #[test]
    fn test_messages_name_the_metric() {
        let err = DashboardError::DivisionByZero {
            country: "World".into(),
            metric: Metric::Production,
            year: 1961,
        };
        assert_eq!(
            err.to_string(),
            "Production is zero for World in baseline year 1961, cannot normalize"
        );

        let err = DashboardError::InvalidBaselineValue {
            country: "World".into(),
            metric: Metric::Yield,
            year: 1961,
            value: f64::NAN,
        };
        assert_eq!(
            err.to_string(),
            "Yield is NaN for World in baseline year 1961, cannot normalize"
        );
    }
}
