use std::fs;
use std::path::Path;
use std::process;

use anyhow::{bail, Context, Result};
use caps::Capability;
use nix::mount::MsFlags;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};

use crate::capabilities;
use crate::config::{self, SubsystemConfig};
use crate::namespace;
use crate::runtime::RuntimePaths;
use crate::seccomp;
use crate::syscall::linux::LinuxSyscall;
use crate::syscall::Syscall;

use super::publish_symlinks;

pub struct StartOptions {
    pub disable_seccomp: bool,
}

/// Builds every container's namespace then publishes the command symlinks.
/// Refuses to run if `mnt_dir` already exists, per the double-start
/// rejection scenario: the caller must `stop` first.
pub fn run(rt: &RuntimePaths, opts: &StartOptions) -> Result<()> {
    if rt.mnt_dir.exists() {
        bail!(
            "{} already exists; run `lsl stop` before starting again",
            rt.mnt_dir.display()
        );
    }

    let syscall = LinuxSyscall;
    capabilities::restrict_to(&[Capability::CAP_SYS_ADMIN], &syscall)
        .context("restricting controller capabilities")?;

    if !opts.disable_seccomp {
        seccomp::install_default_filter().context("installing seccomp filter")?;
    }

    let configs = config::load(&rt.config_path)?;

    fs::create_dir_all(&rt.mnt_dir).with_context(|| format!("creating {}", rt.mnt_dir.display()))?;
    syscall
        .mount(None, &rt.mnt_dir, None, MsFlags::MS_PRIVATE, None)
        .with_context(|| format!("making {} private", rt.mnt_dir.display()))?;

    for cfg in &configs {
        if let Err(e) = build_container(cfg, rt) {
            log::error!("container '{}' failed to start: {:#}", cfg.name, e);
        }
    }

    publish_symlinks(&configs, rt, &syscall)
}

fn copy_interpreter(cfg: &SubsystemConfig) -> Result<()> {
    let interpreter = match &cfg.interpreter {
        Some(i) => i,
        None => return Ok(()),
    };
    let name = crate::runtime::basename(interpreter).context("interpreter has no file name")?;
    let dest_dir = cfg.path.join(
        cfg.bins
            .get(0)
            .context("interpreter configured but bins is empty")?
            .strip_prefix("/")
            .unwrap_or(Path::new("")),
    );
    fs::create_dir_all(&dest_dir)?;
    fs::copy(interpreter, dest_dir.join(name)).with_context(|| format!("copying interpreter {}", interpreter.display()))?;
    Ok(())
}

/// Runs the per-container namespace construction (§4.3) in a forked child
/// so that one container's failure cannot abort the controller's own
/// process or leave it inside a namespace.
fn build_container(cfg: &SubsystemConfig, rt: &RuntimePaths) -> Result<()> {
    copy_interpreter(cfg)?;

    match unsafe { fork()? } {
        ForkResult::Parent { child } => match waitpid(child, None)? {
            WaitStatus::Exited(_, 0) => Ok(()),
            status => bail!("namespace construction child exited abnormally: {:?}", status),
        },
        ForkResult::Child => {
            let syscall = LinuxSyscall;
            let pin_file = rt.pinned_ns_path(&cfg.name);
            let result = (|| -> Result<()> {
                namespace::unshare_and_pin(&pin_file, &syscall)?;
                namespace::shape_namespace(cfg, &syscall)?;
                let old_root = cfg.path.join("oldRoot");
                fs::create_dir_all(&old_root)?;
                syscall.pivot_root(&cfg.path, &old_root)?;
                Ok(())
            })();
            match result {
                Ok(()) => process::exit(0),
                Err(e) => {
                    log::error!("container '{}': {:#}", cfg.name, e);
                    process::exit(1);
                }
            }
        }
    }
}
