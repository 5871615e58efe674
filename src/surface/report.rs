//! Static report written to a directory: `index.html`, one SVG per chart and
//! the normalized table as CSV.

use super::{DisplaySurface, HtmlPage};
use crate::dashboard::DashboardView;
use crate::error::Result;
use crate::normalize::NormalizedSeries;
use crate::render::RenderedChart;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct ReportDir {
    dir: PathBuf,
    page: Option<HtmlPage>,
    written: Vec<PathBuf>,
}

impl ReportDir {
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            page: Some(HtmlPage::new(false)),
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write(&mut self, name: &str, contents: &[u8]) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, contents)?;
        self.written.push(path);
        Ok(())
    }

    fn page(&mut self) -> &mut HtmlPage {
        self.page.get_or_insert_with(|| HtmlPage::new(false))
    }
}

impl DisplaySurface for ReportDir {
    fn show_header(&mut self, title: &str, subtitle: &str) -> Result<()> {
        self.page().show_header(title, subtitle)
    }

    fn show_controls(&mut self, view: &DashboardView) -> Result<()> {
        self.page().show_controls(view)
    }

    fn show_notice(&mut self, message: &str) -> Result<()> {
        self.write("NOTICE.txt", message.as_bytes())?;
        self.page().show_notice(message)
    }

    fn show_charts(&mut self, charts: &[RenderedChart]) -> Result<()> {
        for (i, chart) in charts.iter().enumerate() {
            self.write(&format!("chart_{}.svg", i + 1), chart.svg.as_bytes())?;
        }
        self.page().show_charts(charts)
    }

    fn show_table(&mut self, series: &NormalizedSeries) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in series.rows() {
            writer.serialize(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| e.into_error())?;
        self.write("table.csv", &bytes)?;
        self.page().show_table(series)
    }

    fn show_descriptions(&mut self, descriptions: &[(String, String)]) -> Result<()> {
        self.page().show_descriptions(descriptions)
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            self.write("index.html", page.into_html().as_bytes())?;
        }
        info!(dir = %self.dir.display(), files = self.written.len(), "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{Dashboard, Selection};
    use crate::render::{Layout, Renderer};
    use crate::normalize::Scaling;
    use crate::surface::present;
    use crate::table::test_util::sample_table;

    #[test]
    fn test_report_files() {
        let tmp = tempfile::tempdir().unwrap();
        let table = sample_table();
        let view = Dashboard::new(&table, Renderer::new(300, 200))
            .view(&Selection::new(Layout::Split, Scaling::Percent))
            .unwrap();
        let mut report = ReportDir::create(tmp.path().join("out")).unwrap();
        present(&view, &mut report).unwrap();

        let dir = tmp.path().join("out");
        for name in ["chart_1.svg", "chart_4.svg", "table.csv", "index.html"] {
            assert!(dir.join(name).is_file(), "{} missing", name);
        }
        let csv = fs::read_to_string(dir.join("table.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Entity,Year,Area harvested (hectares),Production (tonnes),Yield (tonnes per hectare),Population (historical estimates)"
        );
        assert!(lines.next().unwrap().starts_with("World,2000,100.0,100.0,100.0,100.0"));
        assert_eq!(report.written().len(), 6);
    }
}
