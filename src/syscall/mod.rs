//! An interface trait so the rest of the crate can call the handful of
//! privileged kernel operations it needs without worrying about whether
//! it's really running as root.
use std::{any::Any, path::Path};

use anyhow::Result;
use caps::{errors::CapsError, CapSet, CapsHashSet};
use nix::{
    mount::MsFlags,
    sched::CloneFlags,
    unistd::{Gid, Uid},
};

pub mod linux;
pub mod test;

pub trait Syscall {
    fn as_any(&self) -> &dyn Any;

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<()>;

    fn umount(&self, target: &Path) -> Result<()>;

    fn unshare(&self, flags: CloneFlags) -> Result<()>;

    fn set_ns(&self, rawfd: i32, nstype: CloneFlags) -> Result<()>;

    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<()>;

    fn set_capability(&self, cset: CapSet, value: &CapsHashSet) -> Result<(), CapsError>;

    fn set_resuid(&self, uid: Uid) -> Result<()>;

    fn set_resgid(&self, gid: Gid) -> Result<()>;

    fn symlink(&self, original: &Path, link: &Path) -> Result<()>;
}

pub fn create_syscall() -> Box<dyn Syscall> {
    if cfg!(test) {
        Box::new(test::TestHelperSyscall::default())
    } else {
        Box::new(linux::LinuxSyscall)
    }
}
