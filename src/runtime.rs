//! Runtime-wide paths, injected as an explicit value rather than exposed as
//! global constants so namespace construction and symlink publishing can be
//! exercised against a scratch directory in tests.
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct RuntimePaths {
    /// Directory holding one pinned namespace file per live container.
    pub mnt_dir: PathBuf,
    /// Directory holding the published `container:binary` command symlinks.
    pub links_dir: PathBuf,
    /// Path to the INI configuration file.
    pub config_path: PathBuf,
    /// Absolute path to the installed executor binary; every published
    /// symlink points here.
    pub executor_path: PathBuf,
}

impl Default for RuntimePaths {
    fn default() -> Self {
        RuntimePaths {
            mnt_dir: PathBuf::from("/tmp/subsys"),
            links_dir: PathBuf::from("/usr/local/bin/subsys"),
            config_path: PathBuf::from("/etc/subsys.conf"),
            executor_path: PathBuf::from("/usr/local/sbin/executor"),
        }
    }
}

impl RuntimePaths {
    pub fn pinned_ns_path(&self, container: &str) -> PathBuf {
        self.mnt_dir.join(container)
    }

    pub fn symlink_path(&self, container: &str, bin_name: &str) -> PathBuf {
        self.links_dir.join(format!("{}:{}", container, bin_name))
    }
}

/// Splits a `container:binary` command name, as seen in argv[0] when the
/// executor is invoked through one of its published symlinks.
pub fn split_command_name(name: &str) -> Option<(&str, &str)> {
    let idx = name.find(':')?;
    let (container, rest) = name.split_at(idx);
    let binary = &rest[1..];
    if container.is_empty() || binary.is_empty() {
        None
    } else {
        Some((container, binary))
    }
}

pub fn basename(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
