//! Display surfaces
//!
//! A surface receives the pieces of a [`DashboardView`] in page order. The
//! HTML page, the static report directory and the terminal all implement the
//! same trait so the dashboard itself never knows where its output goes.

pub mod html;
pub mod report;
pub mod terminal;

pub use html::HtmlPage;
pub use report::ReportDir;
pub use terminal::Terminal;

use crate::dashboard::DashboardView;
use crate::error::Result;
use crate::normalize::NormalizedSeries;
use crate::render::RenderedChart;

pub trait DisplaySurface {
    fn show_header(&mut self, title: &str, subtitle: &str) -> Result<()>;

    /// Selection controls. Surfaces without input ignore them.
    fn show_controls(&mut self, _view: &DashboardView) -> Result<()> {
        Ok(())
    }

    fn show_notice(&mut self, message: &str) -> Result<()>;

    fn show_charts(&mut self, charts: &[RenderedChart]) -> Result<()>;

    fn show_table(&mut self, series: &NormalizedSeries) -> Result<()>;

    fn show_descriptions(&mut self, descriptions: &[(String, String)]) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Hand a view to a surface.
pub fn present(view: &DashboardView, surface: &mut dyn DisplaySurface) -> Result<()> {
    surface.show_header(&view.title, &view.subtitle)?;
    surface.show_controls(view)?;
    if let Some(notice) = &view.notice {
        surface.show_notice(notice)?;
    }
    if !view.charts.is_empty() {
        surface.show_charts(&view.charts)?;
    }
    if let Some(series) = &view.series {
        surface.show_table(series)?;
    }
    surface.show_descriptions(&view.descriptions)?;
    surface.finish()
}

/// Format a normalized value for display.
pub(crate) fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{Dashboard, Selection};
    use crate::render::Renderer;
    use crate::table::test_util::sample_table;

    #[derive(Default)]
    struct Recording {
        calls: Vec<String>,
    }

    impl DisplaySurface for Recording {
        fn show_header(&mut self, title: &str, _subtitle: &str) -> Result<()> {
            self.calls.push(format!("header:{}", title));
            Ok(())
        }

        fn show_notice(&mut self, message: &str) -> Result<()> {
            self.calls.push(format!("notice:{}", message));
            Ok(())
        }

        fn show_charts(&mut self, charts: &[RenderedChart]) -> Result<()> {
            self.calls.push(format!("charts:{}", charts.len()));
            Ok(())
        }

        fn show_table(&mut self, series: &NormalizedSeries) -> Result<()> {
            self.calls.push(format!("table:{}", series.len()));
            Ok(())
        }

        fn show_descriptions(&mut self, descriptions: &[(String, String)]) -> Result<()> {
            self.calls.push(format!("descriptions:{}", descriptions.len()));
            Ok(())
        }
    }

    #[test]
    fn test_present_order() {
        let table = sample_table();
        let view = Dashboard::new(&table, Renderer::new(300, 200))
            .view(&Selection::default())
            .unwrap();
        let mut surface = Recording::default();
        present(&view, &mut surface).unwrap();
        assert_eq!(
            surface.calls,
            vec![
                "header:Cereal Production Dashboard",
                "charts:1",
                "table:3",
                "descriptions:4"
            ]
        );
    }

    #[test]
    fn test_present_notice_without_charts() {
        let table = sample_table();
        let view = Dashboard::new(&table, Renderer::new(300, 200))
            .view(&Selection::default().with_country("Atlantis"))
            .unwrap();
        let mut surface = Recording::default();
        present(&view, &mut surface).unwrap();
        assert_eq!(surface.calls.len(), 3);
        assert!(surface.calls[1].starts_with("notice:"));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(Some(1.5)), "1.5000");
        assert_eq!(format_value(None), "");
    }
}
