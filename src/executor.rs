//! The executor's state machine: restrict capabilities, enter a pinned
//! namespace, drop back to the caller's identity, resolve the requested
//! binary, and exec it. Every step here is fatal on failure; there is no
//! recovery path once invoked.
use std::ffi::CString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use caps::Capability;
use nix::fcntl::{open, OFlag};
use nix::sched::CloneFlags;
use nix::sys::stat::Mode;
use nix::unistd::{self, execv, getgid, getuid};

use crate::capabilities;
use crate::config::{self, SubsystemConfig};
use crate::runtime::RuntimePaths;
use crate::syscall::Syscall;

pub struct ExecRequest {
    pub container: String,
    pub binary: String,
    pub args: Vec<String>,
}

/// Parses either `executor <container> <binary> [args...]` or a single
/// `container:binary [args...]` argv[0] (as seen through a published
/// symlink).
pub fn parse_args(argv0: &str, rest: &[String]) -> Result<ExecRequest> {
    if let Some((container, binary)) = crate::runtime::split_command_name(argv0) {
        return Ok(ExecRequest {
            container: container.to_owned(),
            binary: binary.to_owned(),
            args: rest.to_vec(),
        });
    }
    if rest.len() < 2 {
        bail!("usage: executor <container> <binary> [args...]");
    }
    Ok(ExecRequest {
        container: rest[0].clone(),
        binary: rest[1].clone(),
        args: rest[2..].to_vec(),
    })
}

/// Resolves `binary` against `cfg.bins`: a literal absolute path is used as
/// given; otherwise the first `bins` entry whose directory listing (or
/// whose own file name) matches wins. Called after `set_ns` has joined the
/// container's pinned namespace, so `bin` is resolved container-absolute —
/// `cfg.path` is the host-side prefix and is no longer part of this
/// process's filesystem view by this point.
fn resolve_binary(cfg: &SubsystemConfig, binary: &str) -> Option<PathBuf> {
    if binary.starts_with('/') {
        return Some(PathBuf::from(binary));
    }
    for bin in &cfg.bins {
        if bin.is_dir() {
            if let Ok(entries) = fs::read_dir(bin) {
                for entry in entries.flatten() {
                    if entry.file_name().to_str() == Some(binary) {
                        return Some(bin.join(binary));
                    }
                }
            }
        } else if crate::runtime::basename(bin) == Some(binary) {
            return Some(bin.clone());
        }
    }
    None
}

/// Runs the executor state machine to completion, replacing the current
/// process image via `execv` on success. Only returns on error.
pub fn run(req: ExecRequest, rt: &RuntimePaths, syscall: &impl Syscall) -> Result<()> {
    capabilities::restrict_to(&[Capability::CAP_SYS_CHROOT, Capability::CAP_SYS_ADMIN], syscall)
        .context("restricting executor capabilities")?;

    let pin_file = rt.pinned_ns_path(&req.container);
    if !pin_file.exists() {
        bail!("no such container: {}", req.container);
    }

    let cfg = config::load_one(&rt.config_path, &req.container)?;

    let cwd = std::env::current_dir().context("reading cwd")?;
    let cwd_relative = cwd.strip_prefix("/").unwrap_or(&cwd).to_path_buf();

    let ruid = getuid();
    let rgid = getgid();

    let ns_fd = open(&pin_file, OFlag::O_RDONLY, Mode::empty())
        .with_context(|| format!("opening {}", pin_file.display()))?;
    syscall
        .set_ns(ns_fd, CloneFlags::CLONE_NEWNS)
        .context("entering container namespace")?;
    unistd::close(ns_fd)?;

    syscall.set_resgid(rgid).context("dropping gid")?;
    syscall.set_resuid(ruid).context("dropping uid")?;

    let resolved = resolve_binary(&cfg, &req.binary)
        .with_context(|| format!("binary '{}' not found in container '{}'", req.binary, req.container))?;

    if let Some(env_path) = &cfg.env_path {
        std::env::set_var("PATH", env_path);
    }

    let old_root_cwd = Path::new("/oldRoot").join(&cwd_relative);
    if let Err(e) = std::env::set_current_dir(&old_root_cwd) {
        log::warn!("chdir to {} failed: {}", old_root_cwd.display(), e);
    }

    let (program, argv) = match &cfg.interpreter {
        Some(interpreter) => {
            let program = Path::new("/oldRoot").join(interpreter.strip_prefix("/").unwrap_or(interpreter));
            let interpreter_name = crate::runtime::basename(interpreter).unwrap_or("interpreter");
            let mut argv = vec![interpreter_name.to_owned(), resolved.display().to_string()];
            argv.extend(req.args.iter().cloned());
            (program, argv)
        }
        None => {
            let mut argv = vec![req.binary.clone()];
            argv.extend(req.args.iter().cloned());
            (resolved.clone(), argv)
        }
    };

    let program_c = CString::new(program.as_os_str().to_str().unwrap_or_default())?;
    let argv_c: Vec<CString> = argv.iter().map(|a| CString::new(a.as_str()).unwrap()).collect();

    execv(&program_c, &argv_c).context("execv failed")?;
    unreachable!("execv either replaces the process image or returns an error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
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
    fn test_parse_args_from_symlink_name() {
        let req = parse_args("toolbox:busybox", &["echo".into(), "hi".into()]).unwrap();
        assert_eq!(req.container, "toolbox");
        assert_eq!(req.binary, "busybox");
        assert_eq!(req.args, vec!["echo", "hi"]);
    }

    #[test]
    fn test_parse_args_explicit_form() {
        let req = parse_args(
            "executor",
            &["toolbox".into(), "busybox".into(), "ls".into()],
        )
        .unwrap();
        assert_eq!(req.container, "toolbox");
        assert_eq!(req.binary, "busybox");
        assert_eq!(req.args, vec!["ls"]);
    }

    #[test]
    fn test_resolve_binary_literal_absolute() {
        let cfg = cfg_with_bins(Path::new("/tmp"), vec![]);
        assert_eq!(resolve_binary(&cfg, "/bin/sh"), Some(PathBuf::from("/bin/sh")));
    }

    #[test]
    fn test_resolve_binary_scans_directory() {
        // `bins` entries are resolved container-absolute, as they appear once
        // `set_ns` has joined the pinned namespace — not prefixed by `cfg.path`.
        let root = tempdir().unwrap();
        let bin_dir = root.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        fs::write(bin_dir.join("busybox"), b"").unwrap();
        let cfg = cfg_with_bins(root.path(), vec![bin_dir.clone()]);

        assert_eq!(resolve_binary(&cfg, "busybox"), Some(bin_dir.join("busybox")));
        assert_eq!(resolve_binary(&cfg, "missing"), None);
    }

    #[test]
    fn test_resolve_binary_single_file_entry() {
        let cfg = cfg_with_bins(Path::new("/whatever"), vec![PathBuf::from("/usr/bin/python3")]);
        assert_eq!(resolve_binary(&cfg, "python3"), Some(PathBuf::from("/usr/bin/python3")));
    }
}
