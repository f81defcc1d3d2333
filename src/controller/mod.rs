//! The controller (`lsl`) side: namespace construction, symlink publishing,
//! and teardown. Each submodule is one subcommand.
pub mod relink;
pub mod start;
pub mod stop;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::SubsystemConfig;
use crate::runtime::RuntimePaths;
use crate::syscall::Syscall;

/// Resolves a container-internal `bin` entry to its host-side path by naive
/// concatenation: `bin` is already absolute within the container, so the
/// host path is simply the container root with `bin` appended.
fn host_bin_path(cfg: &SubsystemConfig, bin: &Path) -> PathBuf {
    PathBuf::from(format!("{}{}", cfg.path.display(), bin.display()))
}

/// Publishes one `container:binary` symlink per command a container
/// exposes. Ensures `links_dir` exists but leaves any symlink already
/// present untouched, so repeated calls (the `relink` subcommand, or a
/// second `start`) are idempotent.
pub fn publish_symlinks(
    configs: &[SubsystemConfig],
    rt: &RuntimePaths,
    syscall: &impl Syscall,
) -> Result<()> {
    fs::create_dir_all(&rt.links_dir)
        .with_context(|| format!("creating {}", rt.links_dir.display()))?;

    for cfg in configs {
        for bin in &cfg.bins {
            let host_path = host_bin_path(cfg, bin);
            if host_path.is_dir() {
                let entries = fs::read_dir(&host_path)
                    .with_context(|| format!("reading {}", host_path.display()))?;
                for entry in entries {
                    let entry = entry?;
                    if entry.path().is_file() {
                        if let Some(name) = entry.file_name().to_str() {
                            publish_one(cfg, name, rt, syscall)?;
                        }
                    }
                }
            } else if host_path.is_file() {
                if let Some(name) = crate::runtime::basename(bin) {
                    publish_one(cfg, name, rt, syscall)?;
                }
            } else {
                log::warn!(
                    "container '{}': bin entry {} does not exist on host",
                    cfg.name,
                    host_path.display()
                );
            }
        }
    }
    Ok(())
}

fn publish_one(cfg: &SubsystemConfig, bin_name: &str, rt: &RuntimePaths, syscall: &impl Syscall) -> Result<()> {
    let link = rt.symlink_path(&cfg.name, bin_name);
    if link.is_symlink() || link.exists() {
        return Ok(());
    }
    syscall
        .symlink(&rt.executor_path, &link)
        .with_context(|| format!("symlinking {}", link.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BindMount;
    use crate::syscall::test::TestHelperSyscall;
    use std::fs;
    use tempfile::tempdir;

    fn cfg_with_bins(root: &Path, bins: Vec<PathBuf>) -> SubsystemConfig {
        SubsystemConfig {
            name: "toolbox".into(),
            path: root.to_path_buf(),
            mnt_points: vec![],
            bins,
            interpreter: None,
            env_path: None,
        }
    }

    #[test]
    fn test_publish_symlinks_for_directory_bin() {
        let root = tempdir().unwrap();
        let bin_dir = root.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        fs::write(bin_dir.join("busybox"), b"").unwrap();
        fs::write(bin_dir.join("sh"), b"").unwrap();

        let links_dir = tempdir().unwrap();
        let rt = RuntimePaths {
            mnt_dir: tempdir().unwrap().path().to_path_buf(),
            links_dir: links_dir.path().to_path_buf(),
            config_path: PathBuf::from("/dev/null"),
            executor_path: PathBuf::from("/usr/local/sbin/executor"),
        };
        let cfg = cfg_with_bins(root.path(), vec![PathBuf::from("/bin")]);
        let syscall = TestHelperSyscall::default();

        publish_symlinks(&[cfg], &rt, &syscall).unwrap();

        let mut names: Vec<_> = syscall
            .get_symlink_args()
            .into_iter()
            .map(|(_orig, link)| link.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["toolbox:busybox", "toolbox:sh"]);
    }

    #[test]
    fn test_publish_symlinks_idempotent_skips_existing() {
        let root = tempdir().unwrap();
        let bin_dir = root.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        fs::write(bin_dir.join("busybox"), b"").unwrap();

        let links_dir = tempdir().unwrap();
        fs::write(links_dir.path().join("toolbox:busybox"), b"placeholder").unwrap();
        let rt = RuntimePaths {
            mnt_dir: tempdir().unwrap().path().to_path_buf(),
            links_dir: links_dir.path().to_path_buf(),
            config_path: PathBuf::from("/dev/null"),
            executor_path: PathBuf::from("/usr/local/sbin/executor"),
        };
        let cfg = cfg_with_bins(root.path(), vec![PathBuf::from("/bin")]);
        let syscall = TestHelperSyscall::default();

        publish_symlinks(&[cfg], &rt, &syscall).unwrap();
        assert!(syscall.get_symlink_args().is_empty());
    }
}
