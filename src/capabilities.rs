//! Capability management for the controller and executor binaries.
use caps::{CapSet, CapsHashSet, Capability};

use anyhow::Result;

use crate::syscall::Syscall;

fn to_set(caps: &[Capability]) -> CapsHashSet {
    caps.iter().copied().collect()
}

/// Restrict the process's permitted/effective/bounding/inheritable sets down
/// to exactly `retain`. This is the only capability surface a setuid-root
/// binary here keeps after startup.
pub fn restrict_to(retain: &[Capability], syscall: &impl Syscall) -> Result<()> {
    let set = to_set(retain);
    log::debug!("restricting capabilities to {:?}", retain);
    syscall.set_capability(CapSet::Bounding, &set)?;
    syscall.set_capability(CapSet::Inheritable, &CapsHashSet::new())?;
    syscall.set_capability(CapSet::Permitted, &set)?;
    syscall.set_capability(CapSet::Effective, &set)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::test::TestHelperSyscall;

    #[test]
    fn test_restrict_to() {
        let test_syscall = TestHelperSyscall::default();
        assert!(restrict_to(&[Capability::CAP_SYS_ADMIN], &test_syscall).is_ok());
        let args = test_syscall.get_set_capability_args();
        assert_eq!(args.len(), 4);
        assert!(matches!(args[0].0, CapSet::Bounding));
        assert!(args[0].1.contains(&Capability::CAP_SYS_ADMIN));
        assert!(matches!(args[1].0, CapSet::Inheritable));
        assert!(args[1].1.is_empty());
    }
}
