use caps::{errors::CapsError, CapSet, CapsHashSet};
use nix::{
    mount::MsFlags,
    sched::CloneFlags,
    unistd::{Gid, Uid},
};
use std::{
    any::Any,
    cell::RefCell,
    path::{Path, PathBuf},
};

use super::Syscall;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MountArgs {
    pub source: Option<PathBuf>,
    pub target: PathBuf,
    pub fstype: Option<String>,
    pub flags: MsFlags,
    pub data: Option<String>,
}

#[derive(Clone, Default)]
pub struct TestHelperSyscall {
    mount_args: RefCell<Vec<MountArgs>>,
    umount_args: RefCell<Vec<PathBuf>>,
    set_ns_args: RefCell<Vec<(i32, CloneFlags)>>,
    unshare_args: RefCell<Vec<CloneFlags>>,
    pivot_root_args: RefCell<Vec<(PathBuf, PathBuf)>>,
    set_capability_args: RefCell<Vec<(CapSet, CapsHashSet)>>,
    set_resuid_args: RefCell<Vec<Uid>>,
    set_resgid_args: RefCell<Vec<Gid>>,
    symlink_args: RefCell<Vec<(PathBuf, PathBuf)>>,
}

impl Syscall for TestHelperSyscall {
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
    ) -> anyhow::Result<()> {
        self.mount_args.borrow_mut().push(MountArgs {
            source: source.map(|p| p.to_owned()),
            target: target.to_owned(),
            fstype: fstype.map(|s| s.to_owned()),
            flags,
            data: data.map(|s| s.to_owned()),
        });
        Ok(())
    }

    fn umount(&self, target: &Path) -> anyhow::Result<()> {
        self.umount_args.borrow_mut().push(target.to_owned());
        Ok(())
    }

    fn unshare(&self, flags: CloneFlags) -> anyhow::Result<()> {
        self.unshare_args.borrow_mut().push(flags);
        Ok(())
    }

    fn set_ns(&self, rawfd: i32, nstype: CloneFlags) -> anyhow::Result<()> {
        self.set_ns_args.borrow_mut().push((rawfd, nstype));
        Ok(())
    }

    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> anyhow::Result<()> {
        self.pivot_root_args
            .borrow_mut()
            .push((new_root.to_owned(), put_old.to_owned()));
        Ok(())
    }

    fn set_capability(&self, cset: CapSet, value: &CapsHashSet) -> Result<(), CapsError> {
        self.set_capability_args
            .borrow_mut()
            .push((cset, value.clone()));
        Ok(())
    }

    fn set_resuid(&self, uid: Uid) -> anyhow::Result<()> {
        self.set_resuid_args.borrow_mut().push(uid);
        Ok(())
    }

    fn set_resgid(&self, gid: Gid) -> anyhow::Result<()> {
        self.set_resgid_args.borrow_mut().push(gid);
        Ok(())
    }

    fn symlink(&self, original: &Path, link: &Path) -> anyhow::Result<()> {
        self.symlink_args
            .borrow_mut()
            .push((original.to_owned(), link.to_owned()));
        Ok(())
    }
}

impl TestHelperSyscall {
    pub fn get_mount_args(&self) -> Vec<MountArgs> {
        self.mount_args.borrow().clone()
    }

    pub fn get_umount_args(&self) -> Vec<PathBuf> {
        self.umount_args.borrow().clone()
    }

    pub fn get_setns_args(&self) -> Vec<(i32, CloneFlags)> {
        self.set_ns_args.borrow().clone()
    }

    pub fn get_unshare_args(&self) -> Vec<CloneFlags> {
        self.unshare_args.borrow().clone()
    }

    pub fn get_pivot_root_args(&self) -> Vec<(PathBuf, PathBuf)> {
        self.pivot_root_args.borrow().clone()
    }

    pub fn get_set_capability_args(&self) -> Vec<(CapSet, CapsHashSet)> {
        self.set_capability_args.borrow().clone()
    }

    pub fn get_symlink_args(&self) -> Vec<(PathBuf, PathBuf)> {
        self.symlink_args.borrow().clone()
    }
}
