//! `templar build`: compile every component once.

use std::sync::Arc;

use anyhow::{Result, bail};

use super::common::Runtime;
use crate::config::TemplarConfig;
use crate::core::PRIORITY_SCAN;

pub fn run(config: Arc<TemplarConfig>) -> Result<()> {
    let runtime = Runtime::create(config);

    let discovered = runtime.scanner.initial_scan();
    if discovered == 0 {
        crate::log!("build"; "nothing to build");
        return Ok(());
    }

    runtime.pipeline.start();

    let mut names: Vec<String> = runtime.registry.all().into_iter().map(|c| c.name).collect();
    names.sort();

    let mut failed = 0usize;
    let mut cached = 0usize;
    for name in &names {
        let result = runtime.pipeline.build_and_wait(name, PRIORITY_SCAN);
        if result.cache_hit {
            cached += 1;
        }
        if !result.success {
            failed += 1;
            for error in &result.errors {
                crate::log!("error"; "{}", error);
            }
        }
    }

    runtime.shutdown();

    crate::log!(
        "build";
        "{} component(s), {} cached, {} failed",
        names.len(),
        cached,
        failed
    );

    if failed > 0 {
        bail!("{failed} component(s) failed to build");
    }
    Ok(())
}
