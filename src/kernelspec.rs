//! Discovery of installed Jupyter kernel specs.
//!
//! Kernels are read from `<data dir>/kernels/<name>/kernel.json` for every
//! Jupyter data directory, in priority order. The first directory defining a
//! kernel name wins. Kernels launched through the Slurm provisioner are left
//! out: they are the wrapper, not something to run inside an allocation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::models::{AvailableKernels, KernelChoice, SLURM_PROVISIONER_NAME};

/// On-disk `kernel.json`, reduced to the fields we use.
#[derive(Debug, Deserialize)]
struct KernelSpecFile {
    #[serde(default)]
    argv: Vec<String>,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    metadata: Value,
}

impl KernelSpecFile {
    fn provisioner_name(&self) -> Option<&str> {
        self.metadata
            .get("kernel_provisioner")?
            .get("provisioner_name")?
            .as_str()
    }
}

/// Jupyter data directories, highest priority first.
#[must_use]
pub fn jupyter_data_dirs() -> Vec<PathBuf> {
    data_dirs_from(
        std::env::var_os("JUPYTER_PATH"),
        std::env::var_os("JUPYTER_DATA_DIR").map(PathBuf::from),
    )
}

/// Build the search path from `$JUPYTER_PATH` and the user data directory.
#[must_use]
pub fn data_dirs_from(jupyter_path: Option<OsString>, data_dir: Option<PathBuf>) -> Vec<PathBuf> {
    let mut search: Vec<PathBuf> = jupyter_path
        .map(|paths| {
            std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default();

    search.extend(data_dir.or_else(|| dirs::data_dir().map(|d| d.join("jupyter"))));
    search.push(PathBuf::from("/usr/local/share/jupyter"));
    search.push(PathBuf::from("/usr/share/jupyter"));
    search
}

/// Kernels installed in the default Jupyter data directories.
#[must_use]
pub fn available_kernels() -> AvailableKernels {
    discover(&jupyter_data_dirs())
}

/// Collect kernels from `data_dirs`, skipping Slurm-provisioned ones.
#[must_use]
pub fn discover(data_dirs: &[PathBuf]) -> AvailableKernels {
    let mut kernels = AvailableKernels::new();
    // Names seen so far, including excluded ones, so a lower-priority copy
    // cannot resurface a kernel that a higher-priority directory defines
    let mut seen = std::collections::HashSet::new();

    for dir in data_dirs {
        for (name, spec_path) in kernel_dirs(&dir.join("kernels")) {
            if !seen.insert(name.clone()) {
                continue;
            }
            match read_spec(&spec_path) {
                Ok(spec) if spec.provisioner_name() == Some(SLURM_PROVISIONER_NAME) => {
                    tracing::debug!(kernel = %name, "skipping slurm-provisioned kernel");
                }
                Ok(spec) => {
                    let display_name = if spec.display_name.is_empty() {
                        name.clone()
                    } else {
                        spec.display_name
                    };
                    kernels.insert(
                        name,
                        KernelChoice {
                            display_name,
                            argv: spec.argv,
                            language: spec.language,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %spec_path.display(), error = %e, "ignoring kernel spec");
                }
            }
        }
    }

    kernels
}

/// `(name, kernel.json path)` for every kernel directory under `kernels_dir`.
fn kernel_dirs(kernels_dir: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(kernels_dir) else {
        return Vec::new();
    };

    let mut found: Vec<(String, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let spec = entry.path().join("kernel.json");
            let name = entry.file_name().into_string().ok()?;
            spec.is_file().then_some((name, spec))
        })
        .collect();
    found.sort();
    found
}

fn read_spec(path: &Path) -> anyhow::Result<KernelSpecFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_spec(root: &Path, name: &str, json: &str) {
        let dir = root.join("kernels").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("kernel.json"), json).unwrap();
    }

    #[test]
    fn test_discover_skips_slurm_kernel() {
        let root = tempfile::tempdir().unwrap();
        write_spec(
            root.path(),
            "python3",
            r#"{"argv": ["python", "-m", "ipykernel_launcher", "-f", "{connection_file}"],
                "display_name": "Python 3", "language": "python"}"#,
        );
        write_spec(
            root.path(),
            "slurm-provisioner-kernel",
            r#"{"argv": [], "display_name": "Slurm Wrapper", "language": "python",
                "metadata": {"kernel_provisioner": {"provisioner_name": "slurm-provisioner"}}}"#,
        );

        let kernels = discover(&[root.path().to_path_buf()]);
        assert_eq!(kernels.len(), 1);
        let python = &kernels["python3"];
        assert_eq!(python.display_name, "Python 3");
        assert_eq!(python.argv[0], "python");
        assert_eq!(python.language, "python");
    }

    #[test]
    fn test_first_directory_wins_and_bad_specs_are_skipped() {
        let high = tempfile::tempdir().unwrap();
        let low = tempfile::tempdir().unwrap();
        write_spec(high.path(), "ir", r#"{"argv": ["R"], "display_name": "R (user)"}"#);
        write_spec(low.path(), "ir", r#"{"argv": ["R"], "display_name": "R (system)"}"#);
        write_spec(low.path(), "broken", "{not json");
        write_spec(low.path(), "julia", r#"{"argv": ["julia"], "language": "julia"}"#);

        let kernels = discover(&[high.path().to_path_buf(), low.path().to_path_buf()]);
        assert_eq!(kernels.keys().collect::<Vec<_>>(), ["ir", "julia"]);
        assert_eq!(kernels["ir"].display_name, "R (user)");
        // missing display name falls back to the kernel name
        assert_eq!(kernels["julia"].display_name, "julia");
    }

    #[test]
    fn test_missing_directories_are_fine() {
        let root = tempfile::tempdir().unwrap();
        assert!(discover(&[root.path().join("nope")]).is_empty());
    }

    #[test]
    fn test_data_dirs_order() {
        let dirs = data_dirs_from(
            Some(OsString::from("/opt/a:/opt/b")),
            Some(PathBuf::from("/home/u/.local/share/jupyter")),
        );
        assert_eq!(
            dirs,
            [
                PathBuf::from("/opt/a"),
                PathBuf::from("/opt/b"),
                PathBuf::from("/home/u/.local/share/jupyter"),
                PathBuf::from("/usr/local/share/jupyter"),
                PathBuf::from("/usr/share/jupyter"),
            ]
        );
    }
}
