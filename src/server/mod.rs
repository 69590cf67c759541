//! Preview HTTP/WebSocket server.
//!
//! Routes:
//! - `GET /`                    index listing of components
//! - `GET /component/{name}`    rendered preview (builds on demand)
//! - `GET /preview/{name}`      preview with supplied props (JSON)
//! - `GET /health`              aggregated liveness
//! - `GET /ws`                  live-reload WebSocket upgrade
//! - `GET /static/*`            bounded static assets
//! - `GET /plugins/{name}/*`    plugin ServerHook routes
//! - `GET /livereload.js`       embedded reload client

mod auth;
mod broadcast;
mod health;
mod path;
mod respond;
mod ws;

pub use broadcast::{BroadcastHub, SEND_BUFFER};
pub use health::{HealthReport, WatcherStats};
pub use path::{StaticPath, component_name_from_path, resolve_static};
pub use ws::origin_allowed;

use anyhow::Result;
use crossbeam::channel::{self, Receiver};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use tiny_http::{Method, Request, Server};

use crate::build::BuildResult;
use crate::component::ComponentInfo;
use crate::config::TemplarConfig;
use crate::core::{PRIORITY_PREVIEW, register_server};
use crate::errors::render_overlay;
use crate::plugin::PluginRequest;
use crate::utils::html::escape;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Props payload cap (1 MiB).
const MAX_PROPS_BYTES: usize = 1024 * 1024;

/// Everything request handling needs, shared across the pool.
pub struct ServerState {
    pub config: Arc<TemplarConfig>,
    pub registry: Arc<crate::component::ComponentRegistry>,
    pub pipeline: Arc<crate::build::BuildPipeline>,
    pub collector: Arc<crate::errors::ErrorCollector>,
    pub plugins: Arc<crate::plugin::PluginManager>,
    pub hub: Arc<BroadcastHub>,
    pub watcher_stats: Arc<WatcherStats>,
    bound_port: AtomicU16,
}

impl ServerState {
    pub fn new(
        config: Arc<TemplarConfig>,
        registry: Arc<crate::component::ComponentRegistry>,
        pipeline: Arc<crate::build::BuildPipeline>,
        collector: Arc<crate::errors::ErrorCollector>,
        plugins: Arc<crate::plugin::PluginManager>,
    ) -> Self {
        Self {
            config,
            registry,
            pipeline,
            collector,
            plugins,
            hub: Arc::new(BroadcastHub::new()),
            watcher_stats: Arc::new(WatcherStats::default()),
            bound_port: AtomicU16::new(0),
        }
    }

    pub fn bound_port(&self) -> u16 {
        self.bound_port.load(Ordering::Relaxed)
    }
}

/// Bound server ready to accept requests.
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_rx: Receiver<()>,
}

/// Bind the HTTP server without starting the request loop.
///
/// This lets the caller start the scan and watcher while early
/// requests get the loading page.
pub fn bind_server(state: Arc<ServerState>) -> Result<BoundServer> {
    let host: std::net::IpAddr = state
        .config
        .server
        .host
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid server.host `{}`", state.config.server.host))?;

    let (server, addr) = bind_with_retry(host, state.config.server.port)?;
    let server = Arc::new(server);
    state.bound_port.store(addr.port(), Ordering::Relaxed);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    crate::log!("serve"; "http://{}", addr);

    Ok(BoundServer {
        server,
        addr,
        state,
        shutdown_rx,
    })
}

/// Bind to the given interface and port, retrying upward on conflict.
fn bind_with_retry(interface: std::net::IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    crate::log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < MAX_PORT_RETRIES => continue,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to bind after {} attempts (ports {}-{}): {}",
                    MAX_PORT_RETRIES,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

impl BoundServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the request loop (blocking) until shutdown unblocks it.
    pub fn run(self) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .thread_name(|i| format!("templar-http-{i}"))
            .build()
            .expect("failed to create http thread pool");

        for request in self.server.incoming_requests() {
            let state = Arc::clone(&self.state);
            pool.spawn(move || {
                if let Err(e) = handle_request(request, &state) {
                    crate::log!("serve"; "request error: {e}");
                }
            });
        }

        // Request loop unblocked: broadcast shutdown, give clients a
        // moment to close, then drop the listener.
        self.state.hub.shutdown();
        let _ = self.shutdown_rx.recv_timeout(std::time::Duration::from_millis(200));
        Ok(())
    }
}

// ============================================================================
// Routing
// ============================================================================

fn handle_request(mut request: Request, state: &ServerState) -> Result<()> {
    if crate::core::is_shutdown() {
        return respond::respond_unavailable(request);
    }

    // Auth middleware runs ahead of all routing.
    let authorization = ws::header_value(&request, "Authorization");
    let remote = request.remote_addr().copied();
    if let Err(e) = auth::authorize(&state.config.auth, remote.as_ref(), authorization.as_deref())
    {
        return respond::send_error(request, 403, e.tag(), &e.to_string());
    }

    let url = request.url().to_string();
    let (route, query) = match url.split_once('?') {
        Some((route, query)) => (route.to_string(), Some(query.to_string())),
        None => (url, None),
    };

    // Health and the reload socket stay reachable during the initial
    // scan; everything else shows the loading shell.
    match route.as_str() {
        "/health" => return respond_health(request, state),
        "/ws" => return respond_ws(request, state),
        "/livereload.js" => {
            return respond::send_body(
                request,
                200,
                respond::JAVASCRIPT,
                crate::embed::LIVERELOAD_JS.as_bytes().to_vec(),
            );
        }
        _ => {}
    }

    if !crate::core::is_serving() {
        return respond::respond_loading(request);
    }

    if route == "/" {
        return respond::send_html(request, 200, render_index(state));
    }

    if let Some(segment) = route.strip_prefix("/component/") {
        return respond_component(request, state, segment);
    }

    if let Some(segment) = route.strip_prefix("/preview/") {
        let props = match read_props(&mut request, query.as_deref()) {
            Ok(props) => props,
            Err(e) => return respond::send_templar_error(request, &e),
        };
        return respond_preview(request, state, segment, props);
    }

    if let Some(rest) = route.strip_prefix("/static/") {
        return respond_static(request, state, rest);
    }

    if let Some(rest) = route.strip_prefix("/plugins/") {
        return respond_plugin(request, state, rest, query.as_deref());
    }

    respond::respond_not_found(request, "route")
}

// ------------------------------------------------------------------
// Route handlers
// ------------------------------------------------------------------

fn respond_health(request: Request, state: &ServerState) -> Result<()> {
    let report = HealthReport::gather(
        &state.config.server.environment,
        state.registry.count(),
        &state.watcher_stats,
        state.pipeline.stats(),
        state.hub.client_count(),
        state.plugins.statuses(),
    );
    let body = serde_json::to_vec(&report)?;
    respond::send_body(request, 200, respond::JSON, body)
}

fn respond_ws(request: Request, state: &ServerState) -> Result<()> {
    let origin = ws::header_value(&request, "Origin");
    if !origin_allowed(
        origin.as_deref(),
        &state.config.server.allowed_origins,
        state.bound_port(),
    ) {
        crate::debug!("ws"; "origin refused: {:?}", origin);
        return respond::send_error(request, 403, "validation", "origin not allowed");
    }

    match ws::upgrade(request) {
        Ok(socket) => {
            state.hub.add_client(socket);
            Ok(())
        }
        Err(e) => {
            crate::debug!("ws"; "handshake failed: {}", e);
            Ok(())
        }
    }
}

fn respond_component(request: Request, state: &ServerState, segment: &str) -> Result<()> {
    let name = match component_name_from_path(segment) {
        Ok(name) => name,
        Err(e) => return respond::send_templar_error(request, &e),
    };
    let Some(info) = state.registry.get(&name) else {
        return respond::respond_not_found(request, "component");
    };

    let result = state.pipeline.build_and_wait(&name, PRIORITY_PREVIEW);
    let page = render_component_page(state, &info, &result, None);
    respond::send_html(request, 200, page)
}

fn respond_preview(
    request: Request,
    state: &ServerState,
    segment: &str,
    props: Option<serde_json::Value>,
) -> Result<()> {
    let name = match component_name_from_path(segment) {
        Ok(name) => name,
        Err(e) => return respond::send_templar_error(request, &e),
    };
    let Some(info) = state.registry.get(&name) else {
        return respond::respond_not_found(request, "component");
    };

    let result = state.pipeline.build_and_wait(&name, PRIORITY_PREVIEW);
    let page = render_component_page(state, &info, &result, props.as_ref());
    respond::send_html(request, 200, page)
}

fn respond_static(request: Request, state: &ServerState, rest: &str) -> Result<()> {
    match resolve_static(rest, &state.config.static_root()) {
        StaticPath::File(file) => {
            let content_type = crate::utils::mime::content_type(&file);
            let body = std::fs::read(&file)?;
            respond::send_body(request, 200, content_type, body)
        }
        StaticPath::Forbidden => {
            respond::send_error(request, 403, "validation", "path escapes static root")
        }
        StaticPath::NotFound => respond::respond_not_found(request, "static asset"),
    }
}

fn respond_plugin(
    request: Request,
    state: &ServerState,
    rest: &str,
    query: Option<&str>,
) -> Result<()> {
    let (name, sub_path) = match rest.split_once('/') {
        Some((name, sub)) => (name.to_string(), format!("/{sub}")),
        None => (rest.to_string(), "/".to_string()),
    };
    if !crate::plugin::validate_plugin_name(&name) {
        return respond::send_error(request, 400, "validation", "invalid plugin name");
    }

    let plugin_request = PluginRequest {
        method: request.method().to_string(),
        path: sub_path,
        query: query.map(str::to_string),
    };

    match state.plugins.handle_request(&name, &plugin_request) {
        Some(response) => respond::send_body(
            request,
            response.status,
            &response.content_type,
            response.body,
        ),
        None => respond::respond_not_found(request, "plugin route"),
    }
}

// ------------------------------------------------------------------
// Props input
// ------------------------------------------------------------------

/// Props come from `?props=` or, for non-GET requests, the body.
/// Bodies are capped at 1 MiB; parse failures are validation errors.
fn read_props(
    request: &mut Request,
    query: Option<&str>,
) -> Result<Option<serde_json::Value>, crate::errors::TemplarError> {
    use crate::errors::TemplarError;

    if request.method() != &Method::Get {
        let mut body = Vec::new();
        let mut reader = request.as_reader().take(MAX_PROPS_BYTES as u64 + 1);
        reader
            .read_to_end(&mut body)
            .map_err(|e| TemplarError::io("failed to read props body", e))?;
        if body.len() > MAX_PROPS_BYTES {
            return Err(TemplarError::validation("props payload exceeds 1 MiB"));
        }
        if body.is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_slice(&body)
            .map_err(|e| TemplarError::validation(format!("invalid props JSON: {e}")))?;
        return Ok(Some(value));
    }

    let Some(query) = query else { return Ok(None) };
    let raw = query.split('&').find_map(|pair| {
        pair.strip_prefix("props=")
            .map(|v| path::decode_segment(v).into_owned())
    });
    let Some(raw) = raw else { return Ok(None) };

    if raw.len() > MAX_PROPS_BYTES {
        return Err(TemplarError::validation("props payload exceeds 1 MiB"));
    }
    let value = serde_json::from_str(&raw)
        .map_err(|e| TemplarError::validation(format!("invalid props JSON: {e}")))?;
    Ok(Some(value))
}

// ------------------------------------------------------------------
// Page rendering
// ------------------------------------------------------------------

fn render_index(state: &ServerState) -> String {
    let mut components = state.registry.all();
    components.sort_by(|a, b| (&a.package, &a.name).cmp(&(&b.package, &b.name)));

    let mut html = page_head("templar — components", state);
    html.push_str(&format!(
        "<h1>Components <small>({})</small></h1>",
        components.len()
    ));

    let mut current_package = None::<String>;
    for info in &components {
        if current_package.as_deref() != Some(info.package.as_str()) {
            if current_package.is_some() {
                html.push_str("</ul>");
            }
            html.push_str(&format!("<h2>package <code>{}</code></h2><ul>", escape(&info.package)));
            current_package = Some(info.package.clone());
        }
        html.push_str(&format!(
            "<li><a href=\"/component/{0}\">{0}</a><code>({1})</code></li>",
            escape(&info.name),
            escape(&signature(info)),
        ));
    }
    if current_package.is_some() {
        html.push_str("</ul>");
    }

    let cycles = state.registry.detect_cycles();
    if !cycles.is_empty() {
        html.push_str("<h2>Dependency cycles</h2><ul>");
        for cycle in cycles {
            html.push_str(&format!("<li><code>{}</code></li>", escape(&cycle.join(" → "))));
        }
        html.push_str("</ul>");
    }

    html.push_str("</body></html>");
    html
}

fn render_component_page(
    state: &ServerState,
    info: &ComponentInfo,
    result: &BuildResult,
    props: Option<&serde_json::Value>,
) -> String {
    let mut html = page_head(&format!("templar — {}", info.name), state);
    html.push_str(&format!(
        "<p><a href=\"/\">← components</a></p><h1>{}<small><code>({})</code></small></h1>",
        escape(&info.name),
        escape(&signature(info)),
    ));

    if let Some(props) = props {
        html.push_str(&format!(
            "<script>window.__TEMPLAR_PROPS__ = {};</script>",
            inline_json(props),
        ));
        html.push_str(&format!(
            "<details open><summary>props</summary><pre>{}</pre></details>",
            escape(&serde_json::to_string_pretty(props).unwrap_or_default()),
        ));
    }

    if result.success {
        let output = result
            .output_bytes
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        html.push_str(&format!("<div class=\"preview\">{output}</div>"));
        if result.cache_hit {
            html.push_str("<p><small>served from cache</small></p>");
        }
    } else if state.config.development.error_overlay {
        html.push_str(&render_overlay(&info.name, &result.errors));
    } else {
        html.push_str("<p>build failed; see server log</p>");
    }

    html.push_str("</body></html>");
    html
}

fn page_head(title: &str, state: &ServerState) -> String {
    let mut head = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head><body>",
        escape(title),
        crate::embed::PAGE_STYLE,
    );
    if state.config.development.hot_reload {
        head.push_str("<script src=\"/livereload.js\" defer></script>");
    }
    head
}

fn signature(info: &ComponentInfo) -> String {
    info.parameters
        .iter()
        .map(|p| match &p.default {
            Some(default) => format!("{} {} = {}", p.name, p.type_name, default),
            None => format!("{} {}", p.name, p.type_name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Serialize JSON for inline `<script>` embedding.
fn inline_json(value: &serde_json::Value) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

// ============================================================================
// Tests
// ============================================================================
