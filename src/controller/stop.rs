use std::fs;

use anyhow::Result;

use crate::runtime::RuntimePaths;
use crate::syscall::linux::LinuxSyscall;
use crate::syscall::Syscall;

/// Tears down every pinned namespace and the published symlinks. Failures
/// unmounting an individual pin file are logged and do not stop the rest of
/// the teardown.
pub fn run(rt: &RuntimePaths) -> Result<()> {
    let syscall = LinuxSyscall;

    if rt.mnt_dir.is_dir() {
        for entry in fs::read_dir(&rt.mnt_dir)? {
            let entry = entry?;
            if let Err(e) = syscall.umount(&entry.path()) {
                log::warn!("failed to unmount {}: {:#}", entry.path().display(), e);
            }
        }
        if let Err(e) = syscall.umount(&rt.mnt_dir) {
            log::warn!("failed to unmount {}: {:#}", rt.mnt_dir.display(), e);
        }
        if let Err(e) = fs::remove_dir_all(&rt.mnt_dir) {
            log::warn!("failed to remove {}: {:#}", rt.mnt_dir.display(), e);
        }
    }

    if rt.links_dir.is_dir() {
        if let Err(e) = fs::remove_dir_all(&rt.links_dir) {
            log::warn!("failed to remove {}: {:#}", rt.links_dir.display(), e);
        }
    }

    Ok(())
}
