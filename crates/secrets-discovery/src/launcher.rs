//! Enumerate plugin executables in a directory (component C8, the
//! discovery half).

use std::path::{Path, PathBuf};

use crate::error::{DiscoveryError, DiscoveryResult};

/// One discovered plugin executable, ready to be launched.
#[derive(Debug, Clone)]
pub struct Launcher {
    /// Full path to the executable.
    pub executable: PathBuf,
    /// Display name: the file name with any trailing `.exe` stripped.
    pub display_name: String,
}

/// Enumerate the executables directly inside `path`.
///
/// An empty `path` yields no launchers. A missing directory is a
/// warning, not a failure (spec.md §4.8: "Discovery errors that are
/// 'not found' are warnings; any other I/O error is fatal").
pub fn discover(path: impl AsRef<Path>) -> DiscoveryResult<Vec<Launcher>> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Ok(Vec::new());
    }

    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "plugin directory not found, skipping discovery");
            return Ok(Vec::new());
        },
        Err(err) => return Err(DiscoveryError::Io(err)),
    };

    let mut launchers = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            continue;
        }
        let candidate = entry.path();
        if !is_executable(&candidate) {
            continue;
        }
        launchers.push(Launcher {
            display_name: display_name_for(&candidate),
            executable: candidate,
        });
    }
    Ok(launchers)
}

fn display_name_for(path: &Path) -> String {
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    file_name.strip_suffix(".exe").map(str::to_string).unwrap_or(file_name)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension().map(|ext| ext.eq_ignore_ascii_case("exe")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_yields_no_launchers() {
        assert!(discover("").unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_a_warning_not_an_error() {
        assert!(discover("/does/not/exist/anywhere").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn finds_executables_and_skips_directories_and_non_executables() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir();
        let exe_path = dir.join("vault-plugin");
        {
            let mut f = std::fs::File::create(&exe_path).unwrap();
            writeln!(f, "#!/bin/sh").unwrap();
        }
        std::fs::set_permissions(&exe_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let non_exe = dir.join("readme.txt");
        std::fs::File::create(&non_exe).unwrap();

        let sub_dir = dir.join("subdir");
        std::fs::create_dir(&sub_dir).unwrap();

        let launchers = discover(&dir).unwrap();
        assert_eq!(launchers.len(), 1);
        assert_eq!(launchers[0].display_name, "vault-plugin");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("secrets-discovery-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
