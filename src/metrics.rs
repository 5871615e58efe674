//! The four tracked metrics and the fixed column names of the source CSV.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const ENTITY: &str = "Entity";
pub const YEAR: &str = "Year";

/// A metric column of the cereal production table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AreaHarvested,
    Production,
    Yield,
    Population,
}

/// RGB triple used for chart lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl Metric {
    /// Chart and table order.
    pub const ALL: [Metric; 4] = [
        Metric::AreaHarvested,
        Metric::Production,
        Metric::Yield,
        Metric::Population,
    ];

    /// Column name in the source CSV.
    pub fn column(&self) -> &'static str {
        match self {
            Metric::AreaHarvested => "Area harvested (hectares)",
            Metric::Production => "Production (tonnes)",
            Metric::Yield => "Yield (tonnes per hectare)",
            Metric::Population => "Population (historical estimates)",
        }
    }

    /// Short label for legends and split-chart titles.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::AreaHarvested => "Area harvested",
            Metric::Production => "Production",
            Metric::Yield => "Yield",
            Metric::Population => "Population",
        }
    }

    pub fn color(&self) -> Rgb {
        match self {
            Metric::AreaHarvested => Rgb(31, 119, 180),
            Metric::Production => Rgb(255, 127, 14),
            Metric::Yield => Rgb(44, 160, 44),
            Metric::Population => Rgb(214, 39, 40),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Metric::AreaHarvested => {
                "The relative change in the total area of land used for cereal production compared to the baseline year."
            }
            Metric::Production => {
                "The relative change in the total production of cereals compared to the baseline year."
            }
            Metric::Yield => {
                "The relative change in the average yield of cereals per hectare compared to the baseline year."
            }
            Metric::Population => {
                "The relative change in the historical population estimates compared to the baseline year."
            }
        }
    }

    /// Every column the loader requires, in table order.
    pub fn required_columns() -> Vec<&'static str> {
        let mut cols = vec![ENTITY, YEAR];
        cols.extend(Metric::ALL.iter().map(|m| m.column()));
        cols
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_columns_order() {
        let cols = Metric::required_columns();
        assert_eq!(cols.len(), 6);
        assert_eq!(cols[0], "Entity");
        assert_eq!(cols[1], "Year");
        assert_eq!(cols[5], "Population (historical estimates)");
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(Metric::AreaHarvested.color().hex(), "#1f77b4");
        assert_eq!(Rgb(0, 0, 0).hex(), "#000000");
    }
}
