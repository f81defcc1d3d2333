//! Setuid helper invoked through a `container:binary` symlink (or directly
//! as `executor <container> <binary> [args...]`). Enters the container's
//! pinned namespace, drops privileges, and execs the requested binary.
use std::env;

use subsys::executor::{self, ExecRequest};
use subsys::logger;
use subsys::runtime::RuntimePaths;
use subsys::syscall::linux::LinuxSyscall;

fn main() {
    if let Err(e) = logger::init(false) {
        eprintln!("log init failed: {:?}", e);
    }

    let mut argv = env::args();
    let argv0 = argv.next().unwrap_or_default();
    let argv0_name = argv0.rsplit('/').next().unwrap_or(&argv0).to_owned();
    let rest: Vec<String> = argv.collect();

    let request = match parse(&argv0_name, &rest) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };

    let rt = RuntimePaths::default();
    if let Err(e) = executor::run(request, &rt, &LinuxSyscall) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn parse(argv0: &str, rest: &[String]) -> anyhow::Result<ExecRequest> {
    executor::parse_args(argv0, rest)
}
