use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Platform user home: the roaming app-data dir on Windows, `$HOME` elsewhere.
fn platform_home() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = dirs::data_dir();
    #[cfg(not(target_os = "windows"))]
    let home = dirs::home_dir();

    home.ok_or_else(|| anyhow!("platform home directory is unknown; set server.home_dir"))
}

/// Expand a leading `~` into the platform home directory.
fn expand_tilde(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return platform_home();
    }
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        return Ok(platform_home()?.join(rest));
    }
    Ok(PathBuf::from(raw))
}

/// Resolve the server home directory into an absolute path.
///
/// - `None` falls back to `<platform home>/<default_subdir>`.
/// - `~` is expanded; relative paths are joined with the current directory.
/// - With `create`, the directory is created if missing.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf> {
    let mut path = match configured {
        Some(raw) => expand_tilde(raw.trim())?,
        None => platform_home()?.join(default_subdir),
    };

    if path.is_relative() {
        path = std::env::current_dir()
            .context("cannot read current directory")?
            .join(path);
    }

    if create {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("cannot create home_dir {}", path.display()))?;
    }

    Ok(path)
}

/// Resolve `file` against `base_dir` unless it is already absolute.
pub fn resolve_under(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn explicit_absolute_dir_is_created() {
        let tmp = tempdir().unwrap();
        let want = tmp.path().join("nested/home");
        let got = resolve_home_dir(Some(want.to_string_lossy().to_string()), ".x", true).unwrap();
        assert_eq!(got, want);
        assert!(got.is_dir());
    }

    #[test]
    fn relative_dir_becomes_absolute() {
        let got = resolve_home_dir(Some("some/relative".into()), ".x", false).unwrap();
        assert!(got.is_absolute());
        assert!(got.ends_with("some/relative"));
    }

    #[test]
    fn tilde_and_default_resolve_under_platform_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        if cfg!(target_os = "windows") {
            return;
        }

        let got = resolve_home_dir(Some("~/.userapi-test".into()), ".x", false).unwrap();
        assert_eq!(got, home.join(".userapi-test"));

        let got = resolve_home_dir(None, ".userapi-default", false).unwrap();
        assert_eq!(got, home.join(".userapi-default"));
    }

    #[test]
    fn resolve_under_keeps_absolute_paths() {
        let tmp = tempdir().unwrap();
        let abs = tmp.path().join("users.json");
        assert_eq!(resolve_under(&abs.to_string_lossy(), Path::new("/ignored")), abs);
        assert_eq!(
            resolve_under("data/users.json", tmp.path()),
            tmp.path().join("data/users.json")
        );
    }
}
