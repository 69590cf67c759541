//! `templar list`: print the discovered component catalog.

use std::sync::Arc;

use anyhow::Result;
use owo_colors::OwoColorize;

use super::common::Runtime;
use crate::config::TemplarConfig;

pub fn run(config: Arc<TemplarConfig>) -> Result<()> {
    let runtime = Runtime::create(config);
    runtime.scanner.initial_scan();

    let mut components = runtime.registry.all();
    components.sort_by(|a, b| (&a.package, &a.name).cmp(&(&b.package, &b.name)));

    if components.is_empty() {
        crate::log!("list"; "no components found");
        return Ok(());
    }

    for info in &components {
        let params = info
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.name, p.type_name))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{}.{}({})  {}",
            info.package.dimmed(),
            info.name.bold(),
            params,
            info.file_path.display().to_string().dimmed(),
        );
    }

    for (component, dep) in runtime.registry.unknown_dependencies() {
        crate::log!("list"; "warning: {} references unknown component {}", component, dep);
    }

    for cycle in runtime.registry.detect_cycles() {
        crate::log!("list"; "warning: dependency cycle: {}", cycle.join(" → "));
    }

    Ok(())
}
