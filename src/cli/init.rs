//! `templar init`: project scaffold.

use anyhow::{Result, bail};
use std::path::Path;

use crate::config::CONFIG_FILE;

const DEFAULT_CONFIG: &str = r#"# templar project configuration

[server]
host = "127.0.0.1"
port = 8080

[components]
scan_paths = ["components"]

[build]
command = "templ"
args = ["generate", "-f", "$TEMPLAR_FILE"]

[development]
hot_reload = true
error_overlay = true
"#;

const SAMPLE_COMPONENT: &str = r#"package components

templ Button(text string, variant string = "primary") {
	<button class={ "btn btn-" + variant }>{ text }</button>
}
"#;

const SAMPLE_STYLE: &str = r#".btn { padding: 0.5rem 1rem; border-radius: 4px; border: 0; }
.btn-primary { background: #3066be; color: #fff; }
"#;

/// Scaffold a project under `target` (default: current directory).
pub fn run(target: Option<&Path>) -> Result<()> {
    let root = match target {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };

    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        bail!("`{}` already exists", config_path.display());
    }

    std::fs::create_dir_all(root.join("components"))?;
    std::fs::create_dir_all(root.join("static"))?;

    std::fs::write(&config_path, DEFAULT_CONFIG)?;
    std::fs::write(root.join("components/button.templ"), SAMPLE_COMPONENT)?;
    std::fs::write(root.join("static/style.css"), SAMPLE_STYLE)?;

    crate::log!("init"; "created {}", config_path.display());
    crate::log!("init"; "run `templar serve` to start the dev server");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_scaffolds_project() {
        let dir = tempfile::TempDir::new().unwrap();
        run(Some(dir.path())).unwrap();

        assert!(dir.path().join(CONFIG_FILE).is_file());
        assert!(dir.path().join("components/button.templ").is_file());
        assert!(dir.path().join("static/style.css").is_file());

        // The scaffolded config parses and validates.
        let config =
            crate::config::TemplarConfig::from_path(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.build.command, "templ");

        // The sample component parses cleanly.
        let content = std::fs::read_to_string(dir.path().join("components/button.templ")).unwrap();
        let parsed = crate::scan::parse_source(std::path::Path::new("button.templ"), &content);
        assert!(!parsed.has_errors());
        assert_eq!(parsed.components[0].name, "Button");
    }

    #[test]
    fn test_init_refuses_existing_config() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        assert!(run(Some(dir.path())).is_err());
    }
}
