//! Runtime configuration read from the environment (and `.env`).

use crate::error::{DashboardError, Result};
use crate::normalize::Scaling;
use crate::render::{Layout, Renderer};
use crate::storage::CsvTableReader;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DATA_PATH: &str = "cereal_production_data.csv";
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub scaling: Scaling,
    pub layout: Layout,
    pub bind: SocketAddr,
    pub chart_width: u32,
    pub chart_height: u32,
    /// Rows scanned for CSV type inference; `None` scans the whole file.
    pub infer_schema_rows: Option<usize>,
    pub clip_to_baseline: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            scaling: Scaling::Ratio,
            layout: Layout::Combined,
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
            chart_width: 1000,
            chart_height: 600,
            infer_schema_rows: None,
            clip_to_baseline: true,
        }
    }
}

impl DashboardConfig {
    /// Read `CEREAL_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("CEREAL_DATA_PATH") {
            config.data_path = PathBuf::from(path);
        }
        if let Some(scaling) = get("CEREAL_SCALING") {
            config.scaling = scaling.parse()?;
        }
        if let Some(layout) = get("CEREAL_LAYOUT") {
            config.layout = layout.parse()?;
        }
        if let Some(bind) = get("CEREAL_BIND") {
            config.bind = parse_bind(&bind)?;
        }
        if let Some(width) = get("CEREAL_CHART_WIDTH") {
            config.chart_width = parse_number("CEREAL_CHART_WIDTH", &width)?;
        }
        if let Some(height) = get("CEREAL_CHART_HEIGHT") {
            config.chart_height = parse_number("CEREAL_CHART_HEIGHT", &height)?;
        }
        if let Some(rows) = get("CEREAL_INFER_SCHEMA_ROWS") {
            let rows: usize = parse_number("CEREAL_INFER_SCHEMA_ROWS", &rows)?;
            config.infer_schema_rows = if rows == 0 { None } else { Some(rows) };
        }
        if let Some(clip) = get("CEREAL_CLIP_TO_BASELINE") {
            config.clip_to_baseline = parse_bool("CEREAL_CLIP_TO_BASELINE", &clip)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chart_width < 200 || self.chart_height < 150 {
            return Err(DashboardError::Config(format!(
                "chart size {}x{} is too small (minimum 200x150)",
                self.chart_width, self.chart_height
            )));
        }
        Ok(())
    }

    pub fn renderer(&self) -> Renderer {
        Renderer::new(self.chart_width, self.chart_height)
    }

    pub fn reader(&self) -> CsvTableReader {
        CsvTableReader::new(self.data_path.clone()).with_infer_schema_length(self.infer_schema_rows)
    }
}

pub fn parse_bind(value: &str) -> Result<SocketAddr> {
    value
        .trim()
        .parse()
        .map_err(|_| DashboardError::Config(format!("invalid bind address '{}'", value)))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DashboardError::Config(format!("{} must be a number, got '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DashboardError::Config(format!(
            "{} must be true or false, got '{}'",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<DashboardConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DashboardConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CEREAL_DATA_PATH", "data/cereal.csv"),
            ("CEREAL_SCALING", "percent"),
            ("CEREAL_LAYOUT", "split"),
            ("CEREAL_BIND", "0.0.0.0:9000"),
            ("CEREAL_CHART_WIDTH", "1200"),
            ("CEREAL_INFER_SCHEMA_ROWS", "500"),
            ("CEREAL_CLIP_TO_BASELINE", "off"),
        ])
        .unwrap();
        assert_eq!(config.data_path, PathBuf::from("data/cereal.csv"));
        assert_eq!(config.scaling, Scaling::Percent);
        assert_eq!(config.layout, Layout::Split);
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.chart_width, 1200);
        assert_eq!(config.infer_schema_rows, Some(500));
        assert!(!config.clip_to_baseline);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[("CEREAL_SCALING", "double")]).is_err());
        assert!(config_from(&[("CEREAL_CHART_WIDTH", "wide")]).is_err());
        assert!(config_from(&[("CEREAL_CHART_WIDTH", "10")]).is_err());
        assert!(config_from(&[("CEREAL_BIND", "localhost")]).is_err());
        assert!(config_from(&[("CEREAL_CLIP_TO_BASELINE", "maybe")]).is_err());
    }
}
