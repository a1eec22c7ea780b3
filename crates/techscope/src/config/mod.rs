use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};

use crate::sqlite::DEFAULT_BUSY_TIMEOUT;
use crate::sqlite::backend::DEFAULT_QUERY_DEADLINE;

pub const DEFAULT_STATE_DIR: &str = ".techscope";
pub const DEFAULT_DATABASE_FILE: &str = "techscope.sqlite";
pub const DEFAULT_MAX_TOOL_CALLS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub database_path: PathBuf,
}

/// Limits applied to tool execution and store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSettings {
    /// Interrupt a tool query that runs longer than this.
    pub query_deadline: Duration,
    /// How long a store connection waits on a locked database.
    pub busy_timeout: Duration,
    /// Tool invocations allowed per generate turn.
    pub max_tool_calls: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            query_deadline: DEFAULT_QUERY_DEADLINE,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
        }
    }
}

impl ToolSettings {
    #[must_use]
    pub fn with_query_deadline_ms(mut self, deadline_ms: Option<u64>) -> Self {
        if let Some(deadline_ms) = deadline_ms {
            self.query_deadline = Duration::from_millis(deadline_ms);
        }
        self
    }
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    database_override: Option<&Path>,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let database_path = match database_override {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => home_dir.join(DEFAULT_STATE_DIR).join(DEFAULT_DATABASE_FILE),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        database_path: normalize_lexical(&database_path),
    })
}

fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::{ToolSettings, resolve_runtime_paths};
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn defaults_database_under_techscope_state_dir() {
        let paths = resolve_runtime_paths(Path::new("/home/analyst"), Path::new("/srv/app"), None)
            .expect("paths should resolve");

        assert_eq!(paths.home_dir, Path::new("/home/analyst"));
        assert_eq!(paths.cwd, Path::new("/srv/app"));
        assert_eq!(
            paths.database_path,
            Path::new("/home/analyst/.techscope/techscope.sqlite")
        );
    }

    #[test]
    fn expands_tilde_database_override() {
        let paths = resolve_runtime_paths(
            Path::new("/home/analyst"),
            Path::new("/srv/app"),
            Some(Path::new("~/data/tech.sqlite")),
        )
        .expect("tilde override should resolve");

        assert_eq!(paths.database_path, Path::new("/home/analyst/data/tech.sqlite"));
    }

    #[test]
    fn resolves_relative_database_against_cwd() {
        let paths = resolve_runtime_paths(
            Path::new("/home/analyst"),
            Path::new("/srv/app"),
            Some(Path::new("./state/../db/tech.sqlite")),
        )
        .expect("relative override should resolve");

        assert_eq!(paths.database_path, Path::new("/srv/app/db/tech.sqlite"));
    }

    #[test]
    fn rejects_relative_cwd_and_tilde_usernames() {
        let err = resolve_runtime_paths(Path::new("/home/analyst"), Path::new("srv/app"), None)
            .expect_err("relative cwd must fail");
        assert!(err.to_string().contains("cwd must be absolute"), "unexpected error: {err}");

        let err = resolve_runtime_paths(
            Path::new("/home/analyst"),
            Path::new("/srv/app"),
            Some(Path::new("~other/tech.sqlite")),
        )
        .expect_err("~username syntax must fail");
        assert!(
            err.to_string().contains("unsupported home expansion syntax"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn tool_settings_default_and_deadline_override() {
        let settings = ToolSettings::default();
        assert_eq!(settings.query_deadline, Duration::from_secs(5));
        assert_eq!(settings.max_tool_calls, 3);

        let tightened = settings.with_query_deadline_ms(Some(250));
        assert_eq!(tightened.query_deadline, Duration::from_millis(250));
        assert_eq!(tightened.with_query_deadline_ms(None), tightened);
    }
}
