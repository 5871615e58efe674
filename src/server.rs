//! HTTP server for the dashboard
//! Simple HTTP server using tokio and basic HTTP handling

use crate::dashboard::{Dashboard, DashboardView, Selection};
use crate::error::{DashboardError, Result};
use crate::render::Renderer;
use crate::storage::TableCache;
use crate::surface::{present, DisplaySurface, HtmlPage};
use crate::table::CountryOrder;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Shared state of the running server. Only the table cache is shared
/// between requests; every request builds its own view.
pub struct AppState {
    cache: TableCache,
    renderer: Renderer,
    defaults: Selection,
    clip_to_baseline: bool,
}

impl AppState {
    pub fn new(cache: TableCache, renderer: Renderer, defaults: Selection) -> Self {
        Self {
            cache,
            renderer,
            defaults,
            clip_to_baseline: true,
        }
    }

    pub fn with_clip_to_baseline(mut self, clip: bool) -> Self {
        self.clip_to_baseline = clip;
        self
    }

    pub fn view(&self, query: &str) -> Result<DashboardView> {
        let table = self.cache.get()?;
        let selection = self.defaults.clone().merge_query(query)?;
        Dashboard::new(&table, self.renderer)
            .with_clip_to_baseline(self.clip_to_baseline)
            .view(&selection)
    }

    pub fn page(&self, query: &str) -> Result<String> {
        let view = self.view(query)?;
        let mut page = HtmlPage::new(true);
        present(&view, &mut page)?;
        Ok(page.into_html())
    }

    pub fn countries(&self) -> Result<Vec<String>> {
        self.cache.get()?.distinct_countries(CountryOrder::FirstSeen)
    }

    pub fn refresh(&self) -> Result<usize> {
        Ok(self.cache.refresh()?.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    fn error_json(e: &DashboardError) -> Self {
        Self::json(status_for(e), json!({ "error": e.to_string() }))
    }

    pub fn to_http(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

fn status_for(e: &DashboardError) -> u16 {
    match e {
        DashboardError::Config(_) => 400,
        e if e.is_selection_error() => 404,
        _ => 500,
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    }
}

pub async fn serve(state: Arc<AppState>, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("Dashboard listening on http://{}", listener.local_addr()?);
    run(listener, state).await
}

/// Accept loop on an already bound listener.
pub async fn run(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!(%addr, "new connection");
        tokio::spawn(handle_connection(stream, Arc::clone(&state)));
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) {
    let mut buffer = vec![0u8; 8192];

    match stream.read(&mut buffer).await {
        Ok(0) => {}
        Ok(size) => {
            let request = String::from_utf8_lossy(&buffer[..size]).to_string();
            let response = handle_request(&state, &request).await;

            if let Err(e) = stream.write_all(response.to_http().as_bytes()).await {
                error!("Failed to write response: {}", e);
            }
        }
        Err(e) => {
            error!("Failed to read from stream: {}", e);
        }
    }
}

pub async fn handle_request(state: &Arc<AppState>, request: &str) -> Response {
    let request_line = request.lines().next().unwrap_or_default();
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Response::json(400, json!({ "error": "malformed request line" }));
    }

    let method = parts[0];
    let (path, query) = match parts[1].split_once('?') {
        Some((path, query)) => (path, query.to_string()),
        None => (parts[1], String::new()),
    };
    // Normalize path (remove trailing slash except for root)
    let path = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    debug!(method, path, "request");

    match (method, path) {
        ("GET", "/") => {
            let result = blocking(state, move |s| s.page(&query)).await;
            match result {
                Ok(html) => Response::html(200, html),
                Err(e) => {
                    warn!(error = %e, "page failed");
                    match error_page(&e) {
                        Ok(html) => Response::html(status_for(&e), html),
                        Err(_) => Response::error_json(&e),
                    }
                }
            }
        }
        ("GET", "/api/health") => Response::json(
            200,
            json!({
                "status": "ok",
                "service": "cereal-dashboard",
                "source": state.cache.source(),
                "loaded_at": state.cache.loaded_at(),
            }),
        ),
        ("GET", "/api/countries") => match blocking(state, |s| s.countries()).await {
            Ok(countries) => Response::json(200, json!({ "countries": countries })),
            Err(e) => Response::error_json(&e),
        },
        ("GET", "/api/view") => {
            let result = blocking(state, move |s| {
                let view = s.view(&query)?;
                Ok(serde_json::to_value(view)?)
            })
            .await;
            match result {
                Ok(value) => Response::json(200, value),
                Err(e) => Response::error_json(&e),
            }
        }
        ("POST", "/api/refresh") => match blocking(state, |s| s.refresh()).await {
            Ok(rows) => {
                info!(rows, "table reloaded on request");
                Response::json(200, json!({ "status": "reloaded", "rows": rows }))
            }
            Err(e) => Response::error_json(&e),
        },
        (_, "/" | "/api/health" | "/api/countries" | "/api/view" | "/api/refresh") => {
            Response::json(405, json!({ "error": format!("{} not allowed on {}", method, path) }))
        }
        _ => Response::json(404, json!({ "error": format!("no route for {}", path) })),
    }
}

/// Run table work on the blocking pool.
async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| DashboardError::Render(format!("worker task failed: {}", e)))?
}

fn error_page(e: &DashboardError) -> Result<String> {
    let mut page = HtmlPage::new(false);
    page.show_header(crate::dashboard::TITLE, "The dashboard could not be loaded.")?;
    page.show_notice(&e.to_string())?;
    Ok(page.into_html())
}
