use anyhow::Result;

use crate::config;
use crate::runtime::RuntimePaths;
use crate::syscall::linux::LinuxSyscall;

use super::publish_symlinks;

/// Re-publishes command symlinks from the current configuration without
/// touching any live namespace. Safe to run repeatedly: existing symlinks
/// are left in place.
pub fn run(rt: &RuntimePaths) -> Result<()> {
    let configs = config::load(&rt.config_path)?;
    publish_symlinks(&configs, rt, &LinuxSyscall)
}
