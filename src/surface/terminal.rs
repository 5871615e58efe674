//! Plain text output for the CLI.

use super::DisplaySurface;
use crate::error::Result;
use crate::normalize::NormalizedSeries;
use crate::render::RenderedChart;
use std::io::Write;

pub struct Terminal<W: Write> {
    out: W,
}

impl<W: Write> Terminal<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySurface for Terminal<W> {
    fn show_header(&mut self, title: &str, subtitle: &str) -> Result<()> {
        writeln!(self.out, "\n{}", "=".repeat(80))?;
        writeln!(self.out, " {}", title)?;
        writeln!(self.out, "{}", "=".repeat(80))?;
        writeln!(self.out, "{}\n", subtitle)?;
        Ok(())
    }

    fn show_notice(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "! {}", message)?;
        Ok(())
    }

    fn show_charts(&mut self, charts: &[RenderedChart]) -> Result<()> {
        for chart in charts {
            let years = chart.spec.x_range;
            writeln!(
                self.out,
                "Chart: {} ({}-{}, {} series)",
                chart.spec.title,
                years.0,
                years.1,
                chart.spec.series.len()
            )?;
        }
        Ok(())
    }

    fn show_table(&mut self, series: &NormalizedSeries) -> Result<()> {
        let df = series.to_dataframe()?;
        writeln!(
            self.out,
            "\nData Table ({} relative to {})",
            series.scaling, series.baseline_year
        )?;
        writeln!(self.out, "{}", df)?;
        Ok(())
    }

    fn show_descriptions(&mut self, descriptions: &[(String, String)]) -> Result<()> {
        writeln!(self.out, "\nColumn Descriptions")?;
        for (column, description) in descriptions {
            writeln!(self.out, "- {}: {}", column, description)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
