//! Controller entry point: builds, tears down, and republishes subsystem
//! containers.
use std::path::PathBuf;

use anyhow::Result;
use clap::Clap;

use subsys::controller::{relink, start, stop};
use subsys::logger;
use subsys::runtime::RuntimePaths;

#[derive(Clap, Debug)]
#[clap(version = "0.1", author = "subsys contributors")]
struct Opts {
    /// enable debug-level diagnostics, including mount() traces on stdout
    #[clap(short, long)]
    debug: bool,
    /// skip installing the seccomp allow-list filter
    #[clap(short = 's', long)]
    disable_seccomp: bool,
    #[clap(long, default_value = "/etc/subsys.conf")]
    config: PathBuf,
    #[clap(long, default_value = "/tmp/subsys")]
    mnt_dir: PathBuf,
    #[clap(long, default_value = "/usr/local/bin/subsys")]
    links_dir: PathBuf,
    #[clap(long, default_value = "/usr/local/sbin/executor")]
    executor_path: PathBuf,
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Clap, Debug)]
enum SubCommand {
    /// construct every configured container's namespace and publish its commands
    Start,
    /// tear down every pinned namespace and remove published commands
    Stop,
    /// re-publish command symlinks without touching any live namespace
    Relink,
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    if let Err(e) = logger::init(opts.debug) {
        eprintln!("log init failed: {:?}", e);
    }

    let rt = RuntimePaths {
        mnt_dir: opts.mnt_dir,
        links_dir: opts.links_dir,
        config_path: opts.config,
        executor_path: opts.executor_path,
    };

    let result = match opts.subcmd {
        SubCommand::Start => start::run(&rt, &start::StartOptions { disable_seccomp: opts.disable_seccomp }),
        SubCommand::Stop => stop::run(&rt),
        SubCommand::Relink => relink::run(&rt),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
