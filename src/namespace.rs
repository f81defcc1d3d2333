//! Mount namespace construction for a single container: shaping the mount
//! topology inside a freshly-unshared namespace, and the pinner dance that
//! keeps that namespace alive after every member process has exited.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::mount::MsFlags;
use nix::sched::CloneFlags;
use nix::sys::wait::waitpid;
use nix::unistd::getppid;

use crate::config::SubsystemConfig;
use crate::fork;
use crate::runtime::RuntimePaths;
use crate::sync::Cond;
use crate::syscall::linux::LinuxSyscall;
use crate::syscall::Syscall;

/// A single mounted virtual filesystem placed at container-relative `target`.
struct VirtualMount {
    target: &'static str,
    fstype: &'static str,
}

const VIRTUAL_MOUNTS: &[VirtualMount] = &[
    VirtualMount { target: "proc", fstype: "proc" },
    VirtualMount { target: "sys", fstype: "sysfs" },
    VirtualMount { target: "dev/pts", fstype: "devpts" },
    VirtualMount { target: "dev/shm", fstype: "tmpfs" },
    VirtualMount { target: "dev/mqueue", fstype: "mqueue" },
    VirtualMount { target: "dev/hugepages", fstype: "hugetlbfs" },
];

/// Ensures the host-side mount point for a bind mount exists: a directory if
/// the source is a directory, otherwise an empty regular file. Never removes
/// an existing target (see the design notes on the original's unconditional
/// `remove_all` before recreating).
fn ensure_mount_point(source: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        return Ok(());
    }
    if source.is_dir() {
        fs::create_dir_all(target)
            .with_context(|| format!("creating bind mount point {}", target.display()))?;
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::File::create(target)
            .with_context(|| format!("creating bind mount point {}", target.display()))?;
    }
    Ok(())
}

/// Strips a leading `/` so a container-relative path can be joined onto the
/// container root without being reinterpreted as absolute.
fn relative(path: &Path) -> PathBuf {
    path.strip_prefix("/").map(|p| p.to_path_buf()).unwrap_or_else(|_| path.to_path_buf())
}

/// Shapes the mount topology inside what must already be a freshly-unshared
/// mount namespace: root propagation, the container's self-bind, every
/// configured bind mount, the live `/run/user/<uid>` directories, and the
/// virtual filesystems. Does not call `pivot_root`; the caller does that once
/// this returns successfully.
pub fn shape_namespace(cfg: &SubsystemConfig, syscall: &impl Syscall) -> Result<()> {
    syscall
        .mount(None, Path::new("/"), None, MsFlags::MS_SLAVE | MsFlags::MS_REC, None)
        .context("making root mount propagation slave")?;

    syscall
        .mount(Some(&cfg.path), &cfg.path, None, MsFlags::MS_BIND, None)
        .context("self-binding container root")?;

    for mnt in &cfg.mnt_points {
        let mount_point = cfg.path.join(relative(&mnt.target));
        if let Err(e) = ensure_mount_point(&mnt.source, &mount_point) {
            log::warn!("skipping bind mount {}: {:#}", mnt.source.display(), e);
            continue;
        }
        if let Err(e) = syscall.mount(Some(&mnt.source), &mount_point, None, MsFlags::MS_BIND, None) {
            log::warn!(
                "bind mount {} -> {} failed: {:#}",
                mnt.source.display(),
                mount_point.display(),
                e
            );
        }
    }

    bind_run_user_dirs(cfg, syscall)?;

    for vm in VIRTUAL_MOUNTS {
        let target = cfg.path.join(vm.target);
        fs::create_dir_all(&target)
            .with_context(|| format!("creating virtual mount point {}", target.display()))?;
        syscall
            .mount(None, &target, Some(vm.fstype), MsFlags::empty(), None)
            .with_context(|| format!("mounting {} at {}", vm.fstype, target.display()))?;
    }

    Ok(())
}

fn bind_run_user_dirs(cfg: &SubsystemConfig, syscall: &impl Syscall) -> Result<()> {
    let run_user = Path::new("/run/user");
    if !run_user.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(run_user).context("reading /run/user")? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let target = cfg.path.join("run/user").join(entry.file_name());
        fs::create_dir_all(&target)
            .with_context(|| format!("creating {}", target.display()))?;
        syscall
            .mount(Some(&entry.path()), &target, None, MsFlags::MS_BIND, None)
            .with_context(|| format!("bind mounting {}", entry.path().display()))?;
    }
    Ok(())
}

/// Performs the pinning bind mount from outside the owning process's
/// namespace. Runs as the pinner sibling task: reads its own parent's
/// `ns/mnt`, which by then (after the `Cond` wakes it) refers to the
/// just-unshared namespace.
fn pin_from_sibling(pin_file: &Path) -> Result<()> {
    if !pin_file.exists() {
        fs::File::create(pin_file).with_context(|| format!("creating pin file {}", pin_file.display()))?;
    }
    let ns_path = PathBuf::from(format!("/proc/{}/ns/mnt", getppid()));
    LinuxSyscall
        .mount(Some(&ns_path), pin_file, None, MsFlags::MS_BIND, None)
        .context("pinning mount namespace")
}

/// Spawns the pinner sibling, unshares a new mount namespace in the calling
/// process, and waits for the pinner to have completed the pinning bind
/// mount before returning. Must run in a dedicated child process of the
/// controller, since it calls `unshare(CLONE_NEWNS)`.
pub fn unshare_and_pin(pin_file: &Path, syscall: &impl Syscall) -> Result<()> {
    let cond = Cond::new().context("creating pinner synchronisation pipe")?;
    let pin_file_owned = pin_file.to_path_buf();

    let pinner_cb = {
        let pinner_cond = cond.handle();
        Box::new(move || -> isize {
            if pinner_cond.wait().is_err() {
                return -1;
            }
            match pin_from_sibling(&pin_file_owned) {
                Ok(()) => 0,
                Err(e) => {
                    log::error!("pinner failed: {:#}", e);
                    -1
                }
            }
        })
    };

    let pinner_pid = fork::clone(pinner_cb, CloneFlags::CLONE_VM)?;

    syscall.unshare(CloneFlags::CLONE_NEWNS).context("unshare(CLONE_NEWNS)")?;
    cond.notify().context("notifying pinner")?;

    let status = waitpid(pinner_pid, None).context("waiting for pinner")?;
    if !matches!(status, nix::sys::wait::WaitStatus::Exited(_, 0)) {
        anyhow::bail!("pinner exited abnormally: {:?}", status);
    }
    Ok(())
}
