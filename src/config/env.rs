//! Environment variable overrides.
//!
//! Any `TEMPLAR_`-prefixed variable overrides the corresponding nested
//! config key; a dotted path is spelled with double underscores:
//!
//! ```text
//! TEMPLAR_SERVER__PORT=9000          → server.port
//! TEMPLAR_DEVELOPMENT__HOT_RELOAD=false → development.hot_reload
//! TEMPLAR_BUILD__ARGS='["generate"]' → build.args
//! ```
//!
//! Overrides are applied to the parsed TOML value tree before
//! deserialization, so type errors surface exactly like file errors.

const ENV_PREFIX: &str = "TEMPLAR_";

/// Apply `TEMPLAR_` overrides from the process environment.
pub fn apply_env_overrides(value: &mut toml::Value) {
    let vars: Vec<(String, String)> = std::env::vars()
        .filter(|(k, _)| k.starts_with(ENV_PREFIX) && k.len() > ENV_PREFIX.len())
        .collect();
    apply_overrides(value, &vars);
}

/// Apply explicit key/value pairs (separated out for tests).
pub fn apply_overrides(value: &mut toml::Value, vars: &[(String, String)]) {
    for (key, raw) in vars {
        let path: Vec<String> = key[ENV_PREFIX.len()..]
            .split("__")
            .map(|seg| seg.to_ascii_lowercase())
            .collect();
        if path.iter().any(String::is_empty) {
            continue;
        }
        set_path(value, &path, parse_scalar(raw));
    }
}

/// Interpret the raw string as a TOML scalar/array when possible,
/// falling back to a plain string.
fn parse_scalar(raw: &str) -> toml::Value {
    // A bare value is not a TOML document; wrap it to parse.
    if let Ok(table) = format!("v = {raw}").parse::<toml::Table>() {
        if let Some(v) = table.get("v") {
            return v.clone();
        }
    }
    toml::Value::String(raw.to_string())
}

fn set_path(value: &mut toml::Value, path: &[String], new: toml::Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    let table = match value {
        toml::Value::Table(t) => t,
        _ => return,
    };

    if rest.is_empty() {
        table.insert(first.clone(), new);
        return;
    }

    let child = table
        .entry(first.clone())
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    set_path(child, rest, new);
}
