//! A small, self-contained classic-BPF seccomp filter builder. No
//! libseccomp dependency: the allow-list is assembled directly as a
//! `sock_fprog` and installed with `prctl(PR_SET_SECCOMP, ...)`.
use anyhow::{bail, Result};
use libc::c_ushort;
use nix::errno::Errno;

const SECCOMP_RET_KILL_PROCESS: u32 = 0x8000_0000;
const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;

const BPF_LD: u16 = 0x00;
const BPF_JMP: u16 = 0x05;
const BPF_RET: u16 = 0x06;
const BPF_W: u16 = 0x00;
const BPF_ABS: u16 = 0x20;
const BPF_JEQ: u16 = 0x10;
const BPF_K: u16 = 0x00;

const EM_X86_64: u32 = 62;
const EM_AARCH64: u32 = 183;
const __AUDIT_ARCH_64BIT: u32 = 0x8000_0000;
const __AUDIT_ARCH_LE: u32 = 0x4000_0000;

#[cfg(target_arch = "x86_64")]
const AUDIT_ARCH: u32 = EM_X86_64 | __AUDIT_ARCH_64BIT | __AUDIT_ARCH_LE;
#[cfg(target_arch = "aarch64")]
const AUDIT_ARCH: u32 = EM_AARCH64 | __AUDIT_ARCH_64BIT | __AUDIT_ARCH_LE;

// Offsets into `struct seccomp_data` (nr: i32 then arch: u32), fixed by the
// kernel ABI: https://man7.org/linux/man-pages/man2/seccomp.2.html
const SECCOMP_DATA_NR_OFFSET: u32 = 0;
const SECCOMP_DATA_ARCH_OFFSET: u32 = 4;

#[repr(C)]
#[derive(Copy, Clone)]
struct SockFilter {
    code: u16,
    jt: u8,
    jf: u8,
    k: u32,
}

#[repr(C)]
struct SockFprog {
    len: c_ushort,
    filter: *const SockFilter,
}

/// The syscall allow-list a controller needs once its namespace-construction
/// and symlink-publishing work is done setting up arguments: everything
/// below is required by `mount`, `pivot_root`, directory creation, the
/// pinner's `clone`, and basic I/O.
pub const ALLOWED_SYSCALLS: &[&str] = &[
    "brk",
    "clone",
    "clone3",
    "close",
    "exit",
    "exit_group",
    "chmod",
    "fchmod",
    "fchmodat",
    "fcntl",
    "getdents",
    "getdents64",
    "getppid",
    "mkdir",
    "mkdirat",
    "mount",
    "fstat",
    "newfstatat",
    "openat",
    "open",
    "pivot_root",
    "read",
    "readv",
    "rmdir",
    "sendfile",
    "set_robust_list",
    "symlink",
    "symlinkat",
    "umount2",
    "unlink",
    "unlinkat",
    "unshare",
    "wait4",
    "write",
    "writev",
];

pub struct Filter {
    program: Vec<SockFilter>,
}

impl Filter {
    const EVAL_NEXT: u8 = 0;
    const SKIP_NEXT: u8 = 1;

    pub fn new() -> Self {
        let mut filter = Filter { program: Vec::new() };

        filter.program.push(bpf_stmt(BPF_LD | BPF_W | BPF_ABS, SECCOMP_DATA_ARCH_OFFSET));
        filter
            .program
            .push(bpf_jump(BPF_JMP | BPF_JEQ | BPF_K, AUDIT_ARCH, Filter::SKIP_NEXT, Filter::EVAL_NEXT));
        filter.program.push(bpf_ret(SECCOMP_RET_KILL_PROCESS));

        filter
            .program
            .push(bpf_stmt(BPF_LD | BPF_W | BPF_ABS, SECCOMP_DATA_NR_OFFSET));

        filter
    }

    pub fn allow_syscall_nr(mut self, nr: u32) -> Filter {
        self.program
            .push(bpf_jump(BPF_JMP | BPF_JEQ | BPF_K, nr, Filter::EVAL_NEXT, Filter::SKIP_NEXT));
        self.program.push(bpf_ret(SECCOMP_RET_ALLOW));
        self
    }

    pub fn allow_syscall_name(self, name: &str) -> Result<Filter> {
        match syscall_nr(name) {
            Some(nr) => Ok(self.allow_syscall_nr(nr)),
            None => bail!("unknown syscall name: {}", name),
        }
    }

    pub fn finish(mut self) -> Filter {
        self.program.push(bpf_ret(SECCOMP_RET_KILL_PROCESS));
        self
    }

    /// Installs `PR_SET_NO_NEW_PRIVS` and the assembled filter via
    /// `prctl(PR_SET_SECCOMP, ...)`. Must be called once, after argument
    /// parsing and before any filesystem work.
    pub fn apply(self) -> Result<()> {
        let result = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
        Errno::result(result)?;

        let sf_prog = SockFprog {
            len: self.program.len() as c_ushort,
            filter: self.program.as_ptr(),
        };
        let result = unsafe { libc::prctl(libc::PR_SET_SECCOMP, libc::SECCOMP_MODE_FILTER, &sf_prog as *const SockFprog) };
        Errno::result(result)?;
        Ok(())
    }
}

/// Builds the controller's allow-list filter from `ALLOWED_SYSCALLS`.
pub fn install_default_filter() -> Result<()> {
    let mut filter = Filter::new();
    for name in ALLOWED_SYSCALLS {
        filter = filter.allow_syscall_name(name)?;
    }
    filter.finish().apply()
}

fn syscall_nr(name: &str) -> Option<u32> {
    let nr = match name {
        "brk" => libc::SYS_brk,
        "clone" => libc::SYS_clone,
        #[cfg(target_arch = "x86_64")]
        "clone3" => 435,
        #[cfg(not(target_arch = "x86_64"))]
        "clone3" => return None,
        "close" => libc::SYS_close,
        "exit" => libc::SYS_exit,
        "exit_group" => libc::SYS_exit_group,
        "chmod" => libc::SYS_chmod,
        "fchmod" => libc::SYS_fchmod,
        "fchmodat" => libc::SYS_fchmodat,
        "fcntl" => libc::SYS_fcntl,
        "getdents" => libc::SYS_getdents,
        "getdents64" => libc::SYS_getdents64,
        "getppid" => libc::SYS_getppid,
        "mkdir" => libc::SYS_mkdir,
        "mkdirat" => libc::SYS_mkdirat,
        "mount" => libc::SYS_mount,
        "fstat" => libc::SYS_fstat,
        "newfstatat" => libc::SYS_newfstatat,
        "openat" => libc::SYS_openat,
        "open" => libc::SYS_open,
        "pivot_root" => libc::SYS_pivot_root,
        "read" => libc::SYS_read,
        "readv" => libc::SYS_readv,
        "rmdir" => libc::SYS_rmdir,
        "sendfile" => libc::SYS_sendfile,
        "set_robust_list" => libc::SYS_set_robust_list,
        "symlink" => libc::SYS_symlink,
        "symlinkat" => libc::SYS_symlinkat,
        "umount2" => libc::SYS_umount2,
        "unlink" => libc::SYS_unlink,
        "unlinkat" => libc::SYS_unlinkat,
        "unshare" => libc::SYS_unshare,
        "wait4" => libc::SYS_wait4,
        "write" => libc::SYS_write,
        "writev" => libc::SYS_writev,
        _ => return None,
    };
    Some(nr as u32)
}

fn bpf_stmt(code: u16, k: u32) -> SockFilter {
    SockFilter { code, k, jt: 0, jf: 0 }
}

fn bpf_jump(code: u16, k: u32, jt: u8, jf: u8) -> SockFilter {
    SockFilter { code, k, jt, jf }
}

fn bpf_ret(k: u32) -> SockFilter {
    bpf_stmt(BPF_RET | BPF_K, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_allowed_syscalls_resolve() {
        for name in ALLOWED_SYSCALLS {
            assert!(syscall_nr(name).is_some(), "{} did not resolve to a syscall nr", name);
        }
    }

    #[test]
    fn test_unknown_syscall_name_rejected() {
        let filter = Filter::new();
        assert!(filter.allow_syscall_name("definitely_not_a_syscall").is_err());
    }

    #[test]
    fn test_filter_program_grows_per_syscall() {
        let base = Filter::new().program.len();
        let filter = Filter::new().allow_syscall_name("read").unwrap();
        assert_eq!(filter.program.len(), base + 2);
    }
}
