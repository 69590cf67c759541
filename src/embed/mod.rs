//! Assets served from memory.
//!
//! The livereload client and the loading shell are compiled into the
//! binary so serving them never depends on the project tree.

/// Browser client for `/ws`: applies reload events and the error
/// overlay. Served at `/livereload.js` and injected into preview pages
/// when hot reload is enabled.
pub const LIVERELOAD_JS: &str = r#"(function () {
  "use strict";

  var RETRY_MS = 1000;

  function overlayFrom(errors) {
    var pre = errors.map(function (e) {
      return e.file + ":" + e.line + ":" + e.column + ": " + e.severity + ": " + e.message;
    }).join("\n");
    var div = document.createElement("div");
    div.id = "templar-error-overlay";
    div.style.cssText = "position:fixed;inset:0;z-index:2147483647;" +
      "background:rgba(12,12,16,.92);color:#e8e8ec;" +
      "font-family:ui-monospace,monospace;font-size:13px;padding:2rem;overflow:auto";
    var h = document.createElement("h1");
    h.style.cssText = "color:#ff6b6b;font-size:16px";
    h.textContent = "Build failed";
    var body = document.createElement("pre");
    body.style.cssText = "white-space:pre-wrap";
    body.textContent = pre;
    div.appendChild(h);
    div.appendChild(body);
    return div;
  }

  function clearOverlay() {
    var existing = document.getElementById("templar-error-overlay");
    if (existing) existing.remove();
  }

  function refreshStylesheets() {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    links.forEach(function (link) {
      var href = link.getAttribute("href").split("?")[0];
      link.setAttribute("href", href + "?t=" + Date.now());
    });
  }

  function connect() {
    var ws = new WebSocket(
      (location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/ws"
    );

    ws.onmessage = function (event) {
      var msg;
      try { msg = JSON.parse(event.data); } catch (_) { return; }

      switch (msg.type) {
        case "build_success":
          clearOverlay();
          location.reload();
          break;
        case "build_error":
          clearOverlay();
          document.body.appendChild(overlayFrom((msg.data && msg.data.errors) || []));
          break;
        case "component_updated":
          if (msg.data && msg.data.kind === "removed") location.reload();
          break;
        case "full_reload":
          if (msg.data && msg.data.reason === "css-update") {
            refreshStylesheets();
          } else {
            location.reload();
          }
          break;
        case "shutdown":
          ws.close();
          break;
      }
    };

    ws.onclose = function () {
      setTimeout(connect, RETRY_MS);
    };
  }

  connect();
})();
"#;

/// Shell shown while the initial scan is still running.
pub const LOADING_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>templar — starting</title>
  <style>
    body { font-family: system-ui, sans-serif; display: grid; place-items: center;
           min-height: 100vh; margin: 0; background: #101014; color: #e8e8ec; }
  </style>
</head>
<body>
  <div>
    <h1>templar is scanning your components…</h1>
    <p>This page reloads automatically.</p>
  </div>
  <script>setTimeout(function () { location.reload(); }, 1000);</script>
</body>
</html>
"#;

/// Shared style block for the index and preview shells.
pub const PAGE_STYLE: &str = "\
body{font-family:system-ui,sans-serif;margin:2rem auto;max-width:64rem;\
padding:0 1rem;background:#101014;color:#e8e8ec}\
a{color:#8ecae6}code{background:#1b1b22;padding:.1rem .3rem;border-radius:3px}\
table{border-collapse:collapse}td,th{border:1px solid #2a2a33;padding:.3rem .6rem}\
.preview{background:#fff;color:#000;border-radius:6px;padding:1rem;margin:1rem 0}";
