//! Pipe-based synchronisation between the controller's per-container child
//! and its pinner sibling: the pinner blocks in `wait` until the owning
//! process calls `notify` after `unshare` has returned.

use std::os::unix::io::RawFd;

use anyhow::Result;
use nix::fcntl::OFlag;
use nix::unistd::{close, pipe2, read};

pub struct Cond {
    rfd: RawFd,
    wfd: RawFd,
}

impl Cond {
    pub fn new() -> Result<Cond> {
        let (rfd, wfd) = pipe2(OFlag::O_CLOEXEC)?; // close-on-exec
        Ok(Cond { rfd, wfd })
    }

    /// Blocks until `notify` closes both ends of the pipe from a task
    /// sharing this fd table (e.g. a CLONE_VM sibling).
    pub fn wait(&self) -> Result<()> {
        close(self.wfd)?;
        let data: &mut [u8] = &mut [0];
        while read(self.rfd, data)? != 0 {}
        close(self.rfd)?;
        Ok(())
    }

    pub fn notify(&self) -> Result<()> {
        close(self.rfd)?;
        close(self.wfd)?;
        Ok(())
    }

    /// A second handle onto the same pipe, for handing to a cloned sibling
    /// process. Both handles own independent copies of the same fd numbers,
    /// exactly as `fork`/`clone` already hands every inherited fd to the new
    /// process; no `dup(2)` is required.
    pub fn handle(&self) -> Cond {
        Cond { rfd: self.rfd, wfd: self.wfd }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::waitpid;
    use nix::unistd::{fork, ForkResult};

    #[test]
    fn test_wait_blocks_until_child_notifies() {
        let cond = Cond::new().unwrap();
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                cond.notify().unwrap();
                std::process::exit(0);
            }
            ForkResult::Parent { child } => {
                cond.wait().unwrap();
                waitpid(child, None).unwrap();
            }
        }
    }
}
