//! `templar preview`: render one component to stdout or a file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};

use super::common::Runtime;
use crate::component::validate_name;
use crate::config::TemplarConfig;
use crate::core::PRIORITY_PREVIEW;

pub fn run(config: Arc<TemplarConfig>, name: &str, output: Option<&Path>) -> Result<()> {
    if !validate_name(name) {
        bail!("invalid component name `{name}`");
    }

    let runtime = Runtime::create(config);
    runtime.scanner.initial_scan();

    if runtime.registry.get(name).is_none() {
        bail!("unknown component `{name}` (try `templar list`)");
    }

    runtime.pipeline.start();
    let result = runtime.pipeline.build_and_wait(name, PRIORITY_PREVIEW);
    runtime.shutdown();

    if !result.success {
        for error in &result.errors {
            crate::log!("error"; "{}", error);
        }
        bail!("build failed for `{name}`");
    }

    let bytes = result.output_bytes.unwrap_or_default();
    match output {
        Some(path) => {
            std::fs::write(path, &bytes)?;
            crate::log!("preview"; "wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&bytes)?;
        }
    }
    Ok(())
}
