//! HTML dashboard page.

use super::{format_value, DisplaySurface};
use crate::dashboard::DashboardView;
use crate::error::Result;
use crate::normalize::{NormalizedSeries, Scaling};
use crate::render::{Layout, RenderedChart};
use std::fmt::Write as _;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; display: flex; color: #262730; }
aside { width: 260px; min-height: 100vh; padding: 1.5rem; background: #f0f2f6; box-sizing: border-box; }
aside label { display: block; margin: 1rem 0 0.3rem; font-weight: 600; }
aside select, aside input[type=range] { width: 100%; }
main { flex: 1; padding: 1.5rem 2rem; }
.notice { padding: 0.8rem 1rem; background: #ffe9e9; border-left: 4px solid #d62728; margin: 1rem 0; }
.charts.split { display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; }
.charts svg { max-width: 100%; height: auto; }
table { border-collapse: collapse; font-size: 0.9rem; }
th, td { border: 1px solid #ddd; padding: 0.3rem 0.6rem; text-align: right; }
th { background: #f0f2f6; }
"#;

/// Builds the dashboard as a single HTML document.
///
/// When `interactive` the sidebar holds a form that re-requests the page on
/// every change; otherwise it lists the selection as text.
pub struct HtmlPage {
    interactive: bool,
    layout: Layout,
    head: String,
    sidebar: String,
    body: String,
}

impl HtmlPage {
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            layout: Layout::default(),
            head: String::new(),
            sidebar: String::new(),
            body: String::new(),
        }
    }

    /// The finished document.
    pub fn into_html(self) -> String {
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n{}<style>{}</style>\n</head>\n<body>\n<aside>\n{}</aside>\n<main>\n{}</main>\n</body>\n</html>\n",
            self.head, STYLE, self.sidebar, self.body
        )
    }

    fn controls_form(&mut self, view: &DashboardView) {
        let selected_country = view.selection.country.as_deref().unwrap_or_default();
        let sidebar = &mut self.sidebar;
        sidebar.push_str("<form method=\"get\" action=\"/\">\n");

        // a new country has its own year range, so drop the old baseline
        sidebar.push_str("<label for=\"country\">Select Country</label>\n");
        sidebar.push_str(
            "<select id=\"country\" name=\"country\" onchange=\"if(this.form.baseline){this.form.baseline.disabled=true;}this.form.submit()\">\n",
        );
        for country in &view.countries {
            let selected = if country == selected_country { " selected" } else { "" };
            let _ = writeln!(
                sidebar,
                "<option value=\"{0}\"{1}>{0}</option>",
                escape(country),
                selected
            );
        }
        sidebar.push_str("</select>\n");

        if let Some((min, max)) = view.year_bounds {
            let value = view.selection.baseline_year.unwrap_or(min).clamp(min, max);
            let _ = writeln!(
                sidebar,
                "<label for=\"baseline\">Select Start Year</label>\n<input type=\"range\" id=\"baseline\" name=\"baseline\" min=\"{min}\" max=\"{max}\" value=\"{value}\" oninput=\"this.nextElementSibling.value=this.value\" onchange=\"this.form.submit()\"><output>{value}</output>"
            );
        }

        sidebar.push_str("<label>Chart Display Option</label>\n");
        for layout in [Layout::Combined, Layout::Split] {
            let checked = if layout == view.selection.layout { " checked" } else { "" };
            let _ = writeln!(
                sidebar,
                "<div><input type=\"radio\" id=\"layout-{0}\" name=\"layout\" value=\"{0}\"{1} onchange=\"this.form.submit()\"> <label for=\"layout-{0}\" style=\"display:inline;font-weight:normal\">{2}</label></div>",
                layout.as_str(),
                checked,
                layout.display_name()
            );
        }

        sidebar.push_str("<label for=\"scaling\">Scaling</label>\n");
        sidebar.push_str("<select id=\"scaling\" name=\"scaling\" onchange=\"this.form.submit()\">\n");
        for (scaling, name) in [(Scaling::Ratio, "Ratio (1.0 = start year)"), (Scaling::Percent, "Percent (100 = start year)")] {
            let selected = if scaling == view.selection.scaling { " selected" } else { "" };
            let _ = writeln!(
                sidebar,
                "<option value=\"{}\"{}>{}</option>",
                scaling.as_str(),
                selected,
                name
            );
        }
        sidebar.push_str("</select>\n");
        sidebar.push_str("<noscript><button type=\"submit\">Update</button></noscript>\n</form>\n");
    }

    fn selection_summary(&mut self, view: &DashboardView) {
        let sidebar = &mut self.sidebar;
        let _ = writeln!(
            sidebar,
            "<p><strong>Country</strong><br>{}</p>",
            escape(view.selection.country.as_deref().unwrap_or("-"))
        );
        if let Some(year) = view.selection.baseline_year {
            let _ = writeln!(sidebar, "<p><strong>Start year</strong><br>{}</p>", year);
        }
        let _ = writeln!(
            sidebar,
            "<p><strong>Layout</strong><br>{}</p>\n<p><strong>Scaling</strong><br>{}</p>",
            view.selection.layout.display_name(),
            view.selection.scaling
        );
    }
}

impl DisplaySurface for HtmlPage {
    fn show_header(&mut self, title: &str, subtitle: &str) -> Result<()> {
        let _ = writeln!(self.head, "<title>{}</title>", escape(title));
        let _ = writeln!(
            self.body,
            "<h1>{}</h1>\n<p>{}</p>",
            escape(title),
            escape(subtitle)
        );
        Ok(())
    }

    fn show_controls(&mut self, view: &DashboardView) -> Result<()> {
        self.layout = view.selection.layout;
        if self.interactive {
            self.controls_form(view);
        } else {
            self.selection_summary(view);
        }
        Ok(())
    }

    fn show_notice(&mut self, message: &str) -> Result<()> {
        let _ = writeln!(self.body, "<div class=\"notice\">{}</div>", escape(message));
        Ok(())
    }

    fn show_charts(&mut self, charts: &[RenderedChart]) -> Result<()> {
        let _ = writeln!(self.body, "<div class=\"charts {}\">", self.layout.as_str());
        for chart in charts {
            let _ = writeln!(
                self.body,
                "<figure aria-label=\"{}\">{}</figure>",
                escape(&chart.spec.title),
                strip_xml_declaration(&chart.svg)
            );
        }
        self.body.push_str("</div>\n");
        Ok(())
    }

    fn show_table(&mut self, series: &NormalizedSeries) -> Result<()> {
        let body = &mut self.body;
        body.push_str("<h2>Data Table</h2>\n<table>\n<thead><tr><th>Entity</th><th>Year</th>");
        for metric in &series.metrics {
            let _ = write!(body, "<th>{}</th>", escape(metric.metric.column()));
        }
        body.push_str("</tr></thead>\n<tbody>\n");
        for row in series.rows() {
            let _ = write!(
                body,
                "<tr><td>{}</td><td>{}</td>",
                escape(&row.entity),
                row.year
            );
            for value in [
                row.area_harvested,
                row.production,
                row.yield_per_hectare,
                row.population,
            ] {
                let _ = write!(body, "<td>{}</td>", format_value(value));
            }
            body.push_str("</tr>\n");
        }
        body.push_str("</tbody>\n</table>\n");
        Ok(())
    }

    fn show_descriptions(&mut self, descriptions: &[(String, String)]) -> Result<()> {
        self.body.push_str("<h2>Column Descriptions</h2>\n<ul>\n");
        for (column, description) in descriptions {
            let _ = writeln!(
                self.body,
                "<li><strong>{}</strong>: {}</li>",
                escape(column),
                escape(description)
            );
        }
        self.body.push_str("</ul>\n");
        Ok(())
    }
}

fn strip_xml_declaration(svg: &str) -> &str {
    match svg.find("<svg") {
        Some(start) => &svg[start..],
        None => svg,
    }
}

/// Escape text for HTML element content and quoted attributes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
