//! Implements the `Syscall` trait against the real Linux kernel interface.
use std::any::Any;
use std::path::Path;

use anyhow::Result;
use caps::{errors::CapsError, CapSet, Capability, CapsHashSet};
use nix::{
    mount::{mount, umount2, MntFlags, MsFlags},
    sched::{unshare, CloneFlags},
    unistd::{self, pivot_root, Gid, Uid},
};

use super::Syscall;

/// Empty structure to implement `Syscall` for.
#[derive(Clone)]
pub struct LinuxSyscall;

impl Syscall for LinuxSyscall {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<()> {
        log::debug!(
            target: crate::logger::MOUNT_TRACE_TARGET,
            "mount({:?}, {:?}, {:?}, {:?}, {:?})",
            source,
            target,
            fstype,
            flags,
            data
        );
        mount(source, target, fstype, flags, data)?;
        Ok(())
    }

    fn umount(&self, target: &Path) -> Result<()> {
        umount2(target, MntFlags::MNT_DETACH)?;
        Ok(())
    }

    /// Disassociate parts of the execution context.
    /// https://man7.org/linux/man-pages/man2/unshare.2.html
    fn unshare(&self, flags: CloneFlags) -> Result<()> {
        unshare(flags)?;
        Ok(())
    }

    fn set_ns(&self, rawfd: i32, nstype: CloneFlags) -> Result<()> {
        nix::sched::setns(rawfd, nstype)?;
        Ok(())
    }

    /// https://man7.org/linux/man-pages/man2/pivot_root.2.html
    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<()> {
        pivot_root(new_root, put_old)?;
        Ok(())
    }

    fn set_capability(&self, cset: CapSet, value: &CapsHashSet) -> Result<(), CapsError> {
        match cset {
            // caps::set cannot set capabilities in the bounding set, so it is
            // done by dropping everything that should not remain.
            CapSet::Bounding => {
                let all = caps::all();
                for c in all.difference(value) {
                    match c {
                        Capability::CAP_PERFMON
                        | Capability::CAP_CHECKPOINT_RESTORE
                        | Capability::CAP_BPF => {
                            log::warn!("{:?} is not supported.", c);
                            continue;
                        }
                        _ => caps::drop(None, CapSet::Bounding, *c)?,
                    }
                }
                Ok(())
            }
            _ => caps::set(None, cset, value),
        }
    }

    fn set_resuid(&self, uid: Uid) -> Result<()> {
        unistd::setresuid(uid, uid, uid)?;
        Ok(())
    }

    fn set_resgid(&self, gid: Gid) -> Result<()> {
        unistd::setresgid(gid, gid, gid)?;
        Ok(())
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        unistd::symlinkat(original, None, link)?;
        Ok(())
    }
}
