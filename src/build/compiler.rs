//! The `Compiler` capability: validated subprocess invocation.
//!
//! Arguments reach the compiler only as a structured argv; nothing is
//! ever passed through a shell. The program name is matched against an
//! allowlist and every argument is screened for shell metacharacters
//! before the process spawns.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::component::ComponentInfo;
use crate::config::COMMAND_ALLOWLIST;
use crate::errors::TemplarError;

/// Arguments containing any of these never reach a process.
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '<', '>', '\n', '\r', '"', '\'', '\\',
];

/// Default wall-clock limit for one compile.
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(60);

/// A fully validated compiler invocation.
///
/// Borrows the argv so workers can assemble it in pooled scratch
/// space.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub cwd: &'a Path,
    pub timeout: Duration,
}

/// Raw output of a finished compile.
#[derive(Debug)]
pub struct CompileOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Abstract compile capability.
///
/// The pipeline depends on this trait only; tests substitute an
/// in-process fake, production uses [`CommandCompiler`].
pub trait Compiler: Send + Sync {
    fn compile(&self, invocation: &Invocation<'_>) -> Result<CompileOutput, TemplarError>;
}

// ============================================================================
// Argv validation
// ============================================================================

/// Reject argv that could reach a shell or an unlisted binary.
pub fn validate_argv(program: &str, args: &[String]) -> Result<(), TemplarError> {
    let basename = Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if !COMMAND_ALLOWLIST.contains(&basename) {
        return Err(TemplarError::validation(format!(
            "compiler `{program}` is not on the allowlist"
        )));
    }

    for arg in args {
        if arg.contains(SHELL_METACHARACTERS) {
            return Err(TemplarError::validation(format!(
                "argument contains shell metacharacters: `{arg}`"
            )));
        }
    }
    Ok(())
}

/// Build `$TEMPLAR_*` variables available to configured args.
pub fn build_templar_vars(component: &ComponentInfo, root: &Path) -> FxHashMap<String, String> {
    let mut vars = FxHashMap::default();
    vars.insert(
        "TEMPLAR_FILE".to_string(),
        component.file_path.display().to_string(),
    );
    vars.insert("TEMPLAR_COMPONENT".to_string(), component.name.clone());
    vars.insert("TEMPLAR_PACKAGE".to_string(), component.package.clone());
    vars.insert("TEMPLAR_ROOT".to_string(), root.display().to_string());
    vars
}

/// Resolve `$TEMPLAR_*` variables in configured arguments.
pub fn resolve_args(args: &[String], vars: &FxHashMap<String, String>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut result = arg.clone();
            for (key, value) in vars {
                let pattern = format!("${key}");
                result = result.replace(&pattern, value);
            }
            result
        })
        .collect()
}

// ============================================================================
// CommandCompiler
// ============================================================================

/// Invokes the real compiler binary.
pub struct CommandCompiler;

impl Compiler for CommandCompiler {
    fn compile(&self, invocation: &Invocation<'_>) -> Result<CompileOutput, TemplarError> {
        validate_argv(invocation.program, invocation.args)?;

        let program = which::which(invocation.program).map_err(|_| {
            TemplarError::validation(format!(
                "compiler `{}` not found on PATH",
                invocation.program
            ))
        })?;

        let mut child = Command::new(program)
            .args(invocation.args)
            .current_dir(invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TemplarError::io("failed to spawn compiler", e))?;

        // Poll with a deadline; the std library has no wait_timeout.
        let deadline = Instant::now() + invocation.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(TemplarError::validation(format!(
                            "compile exceeded {}s deadline",
                            invocation.timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(TemplarError::io("failed to wait for compiler", e));
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| TemplarError::io("failed to collect compiler output", e))?;

        Ok(CompileOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_allowlisted_programs_pass() {
        assert!(validate_argv("templ", &args(&["generate"])).is_ok());
        assert!(validate_argv("go", &args(&["run", "."])).is_ok());
        assert!(validate_argv("/usr/local/bin/templ", &args(&[])).is_ok());
    }

    #[test]
    fn test_unlisted_program_rejected() {
        assert!(validate_argv("bash", &args(&["-c", "ls"])).is_err());
        assert!(validate_argv("sh", &[]).is_err());
        assert!(validate_argv("", &[]).is_err());
    }

    #[test]
    fn test_shell_metacharacters_rejected() {
        for bad in [
            "a;b", "a&b", "a|b", "a`b", "a$b", "a(b", "a)b", "a<b", "a>b", "a\nb", "a\"b",
            "a'b", "a\\b",
        ] {
            assert!(
                validate_argv("templ", &args(&[bad])).is_err(),
                "should reject {bad:?}"
            );
        }
    }

    #[test]
    fn test_plain_paths_pass() {
        assert!(validate_argv("templ", &args(&["generate", "-f", "/proj/button.templ"])).is_ok());
    }

    #[test]
    fn test_resolve_args_substitutes_vars() {
        let mut component = ComponentInfo::new("Button", "/proj/components/button.templ");
        component.package = "ui".to_string();
        let vars = build_templar_vars(&component, Path::new("/proj"));

        let resolved = resolve_args(
            &args(&["generate", "-f", "$TEMPLAR_FILE", "--root", "$TEMPLAR_ROOT"]),
            &vars,
        );
        assert_eq!(resolved[2], "/proj/components/button.templ");
        assert_eq!(resolved[4], "/proj");
    }
}
