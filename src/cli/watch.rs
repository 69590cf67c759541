//! `templar watch`: rebuild on change, no HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{select, tick};

use super::common::Runtime;
use crate::component::EventKind;
use crate::config::TemplarConfig;
use crate::core::{PRIORITY_SCAN, is_shutdown};

pub fn run(config: Arc<TemplarConfig>) -> Result<()> {
    let runtime = Runtime::create(config);
    runtime.pipeline.start();

    let mut watcher = runtime.make_watcher()?;
    watcher.start();

    runtime.scanner.initial_scan();
    for info in runtime.registry.all() {
        runtime
            .pipeline
            .submit(crate::build::BuildTask::new(info.name, PRIORITY_SCAN));
    }

    let fs_events = watcher.events();
    let registry_events = runtime.registry.watch();
    let build_results = runtime.pipeline.subscribe();
    let ticker = tick(Duration::from_millis(500));

    crate::log!("watch"; "watching for changes (Ctrl+C to stop)");

    loop {
        select! {
            recv(fs_events) -> event => match event {
                Ok(event) => runtime.scanner.handle_event(&event),
                Err(_) => break,
            },
            recv(registry_events) -> event => match event {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Added | EventKind::Updated) {
                        runtime
                            .pipeline
                            .submit(crate::build::BuildTask::new(event.name, PRIORITY_SCAN));
                    }
                }
                Err(_) => break,
            },
            recv(build_results) -> result => match result {
                Ok(result) => {
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
                        crate::logger::status_error(
                            &format!("build failed: {}", result.component_name),
                            &detail,
                        );
                    }
                }
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                if is_shutdown() {
                    break;
                }
            },
        }
    }

    watcher.stop();
    runtime.shutdown();
    Ok(())
}
