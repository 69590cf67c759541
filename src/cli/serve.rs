//! `templar serve`: the full dev-server wiring.
//!
//! ```text
//! Watcher → Scanner → Registry ─┬→ BuildPipeline → results ─┐
//!                               └→ hub (component_updated)  ├→ hub (build_*)
//! config change → reload → hub (full_reload)                ┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{Receiver, select, tick};

use super::common::Runtime;
use crate::build::BuildResult;
use crate::component::{ComponentEvent, EventKind};
use crate::config::TemplarConfig;
use crate::core::{PRIORITY_SCAN, is_shutdown, set_healthy, set_serving};
use crate::reload::ReloadMessage;
use crate::server::{ServerState, bind_server};
use crate::watch::{FsEvent, WatchError};

pub fn run(config: Arc<TemplarConfig>) -> Result<()> {
    let runtime = Arc::new(Runtime::create(Arc::clone(&config)));

    let state = Arc::new(ServerState::new(
        Arc::clone(&config),
        Arc::clone(&runtime.registry),
        Arc::clone(&runtime.pipeline),
        Arc::clone(&runtime.collector),
        Arc::clone(&runtime.plugins),
    ));

    // Bind first so early requests get the loading page.
    let bound = bind_server(Arc::clone(&state))?;
    runtime.pipeline.start();

    // Watcher starts before the scan: changes made mid-scan buffer up
    // instead of vanishing.
    let mut watcher = runtime.make_watcher()?;
    watcher.start();
    state.watcher_stats.set_alive(true);

    // Event pump wires the subsystems together.
    let pump = spawn_event_pump(
        Arc::clone(&runtime),
        Arc::clone(&state),
        PumpChannels {
            fs_events: watcher.events(),
            fs_errors: watcher.errors(),
            registry_events: runtime.registry.watch(),
            build_results: runtime.pipeline.subscribe(),
            dropped: watcher.dropped_counter(),
        },
    );

    // Initial scan in the background; flip to serving when done.
    {
        let runtime = Arc::clone(&runtime);
        std::thread::Builder::new()
            .name("templar-scan".to_string())
            .spawn(move || {
                runtime.scanner.initial_scan();
                set_serving();
                set_healthy(runtime.collector.total_count() == 0);

                // Warm builds for everything discovered.
                for info in runtime.registry.all() {
                    runtime
                        .pipeline
                        .submit(crate::build::BuildTask::new(info.name, PRIORITY_SCAN));
                }
            })?;
    }

    // Blocks until Ctrl+C unblocks the listener.
    bound.run()?;

    state.watcher_stats.set_alive(false);
    watcher.stop();
    runtime.shutdown();
    let _ = pump.join();
    Ok(())
}

// ============================================================================
// Event pump
// ============================================================================

struct PumpChannels {
    fs_events: Receiver<FsEvent>,
    fs_errors: Receiver<WatchError>,
    registry_events: Receiver<ComponentEvent>,
    build_results: Receiver<BuildResult>,
    dropped: Arc<std::sync::atomic::AtomicU64>,
}

fn spawn_event_pump(
    runtime: Arc<Runtime>,
    state: Arc<ServerState>,
    channels: PumpChannels,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("templar-pump".to_string())
        .spawn(move || {
            let ticker = tick(Duration::from_millis(500));
            loop {
                select! {
                    recv(channels.fs_events) -> event => match event {
                        Ok(event) => on_fs_event(&runtime, &state, &event),
                        Err(_) => break,
                    },
                    recv(channels.fs_errors) -> error => {
                        if let Ok(error) = error {
                            crate::logger::status_warning(&format!("watch: {}", error.message));
                            if error.exhausted {
                                state.watcher_stats.set_alive(false);
                            }
                        }
                    },
                    recv(channels.registry_events) -> event => match event {
                        Ok(event) => on_registry_event(&runtime, &state, &event),
                        Err(_) => break,
                    },
                    recv(channels.build_results) -> result => match result {
                        Ok(result) => on_build_result(&state, &result),
                        Err(_) => break,
                    },
                    recv(ticker) -> _ => {
                        state.watcher_stats.set_dropped(
                            channels.dropped.load(std::sync::atomic::Ordering::Relaxed),
                        );
                        if is_shutdown() {
                            break;
                        }
                    },
                }
            }
        })
        .expect("failed to spawn event pump")
}

/// Debounced filesystem event: source change, config change, or asset
/// change.
fn on_fs_event(runtime: &Runtime, state: &ServerState, event: &FsEvent) {
    // Config edits swap the global handle and force a full reload.
    if event.path == state.config.config_path {
        match crate::config::reload_config() {
            Ok(true) => {
                crate::log!("serve"; "config changed, reloading clients");
                state.hub.broadcast(&ReloadMessage::full_reload("config-changed"));
            }
            Ok(false) => {}
            Err(e) => crate::logger::status_error("config reload failed", &e.to_string()),
        }
        return;
    }

    let is_templ = event.path.extension().and_then(|e| e.to_str()) == Some("templ");
    if is_templ {
        runtime.scanner.handle_event(event);
        return;
    }

    // Non-component dependency changed (css, assets, plugin globs).
    let is_css = event.path.extension().and_then(|e| e.to_str()) == Some("css");
    let reason = if is_css && state.config.development.css_injection {
        "css-update"
    } else {
        "dependency-changed"
    };
    state.hub.broadcast(&ReloadMessage::full_reload(reason));
}

/// Registry transition: broadcast it and queue a rebuild.
fn on_registry_event(runtime: &Runtime, state: &ServerState, event: &ComponentEvent) {
    state.hub.broadcast(&ReloadMessage::component_updated(
        event.name.clone(),
        event.kind.label(),
    ));

    match event.kind {
        EventKind::Added | EventKind::Updated => {
            runtime
                .pipeline
                .submit(crate::build::BuildTask::new(event.name.clone(), PRIORITY_SCAN));
        }
        EventKind::Removed => {
            crate::debug!("serve"; "{} removed", event.name);
        }
    }
}

/// Pipeline published a result: fan out and update the terminal.
fn on_build_result(state: &ServerState, result: &BuildResult) {
    state.hub.broadcast(&ReloadMessage::from_build_result(result));

    if result.success {
        if !result.cache_hit {
            crate::logger::status_success(&format!(
                "built {} ({} ms)",
                result.component_name,
                result.duration.as_millis()
            ));
        }
    } else {
        let detail = result
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        crate::logger::status_error(&format!("build failed: {}", result.component_name), &detail);
    }
}
