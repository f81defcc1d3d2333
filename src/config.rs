//! INI-backed configuration loading. Sections are container names; keys are
//! the ones listed in the external interface section of the design: `path`,
//! `mnt`, `bins`, `envPath`, `interpreter`.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use configparser::ini::Ini;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubsystemConfig {
    pub name: String,
    pub path: PathBuf,
    pub mnt_points: Vec<BindMount>,
    pub bins: Vec<PathBuf>,
    pub interpreter: Option<PathBuf>,
    pub env_path: Option<String>,
}

const DEFAULT_MNTS: &[(&str, &str)] = &[("/dev", "/dev"), ("/run", "/run")];

/// Parses `src[:dst]` into a `BindMount`, defaulting `dst` to `src` when
/// omitted.
fn parse_mnt_entry(entry: &str) -> BindMount {
    match entry.split_once(':') {
        Some((src, dst)) => BindMount {
            source: PathBuf::from(src),
            target: PathBuf::from(dst),
        },
        None => BindMount {
            source: PathBuf::from(entry),
            target: PathBuf::from(entry),
        },
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_owned())
        .collect()
}

/// Loads every container section from `path`. A container whose `path` does
/// not exist, or whose `bins` key is missing, is skipped with a warning
/// rather than failing the whole load; an unreadable or unparseable file is
/// fatal.
pub fn load(path: &Path) -> Result<Vec<SubsystemConfig>> {
    let mut ini = Ini::new();
    let map = ini
        .load(path)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {}", path.display(), e))
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    let mut configs = Vec::new();
    for section in map.keys() {
        if section == "default" {
            continue;
        }
        match load_section(&ini, section) {
            Ok(cfg) => configs.push(cfg),
            Err(e) => log::warn!("skipping container '{}': {:#}", section, e),
        }
    }
    Ok(configs)
}

fn load_section(ini: &Ini, section: &str) -> Result<SubsystemConfig> {
    let path = ini
        .get(section, "path")
        .context("missing required 'path' key")?;
    let path = PathBuf::from(path);
    if !path.is_dir() {
        bail!("path {} does not exist or is not a directory", path.display());
    }

    let bins_raw = ini
        .get(section, "bins")
        .context("missing required 'bins' key")?;
    let bins: Vec<PathBuf> = parse_list(&bins_raw).into_iter().map(PathBuf::from).collect();
    if bins.is_empty() {
        bail!("'bins' must list at least one path");
    }

    let mut mnt_points: Vec<BindMount> = DEFAULT_MNTS
        .iter()
        .map(|(s, d)| BindMount {
            source: PathBuf::from(s),
            target: PathBuf::from(d),
        })
        .collect();
    if let Some(raw) = ini.get(section, "mnt") {
        for entry in parse_list(&raw) {
            let mnt = parse_mnt_entry(&entry);
            if !mnt.source.exists() {
                log::warn!(
                    "container '{}': mnt source {} does not exist, skipping",
                    section,
                    mnt.source.display()
                );
                continue;
            }
            mnt_points.push(mnt);
        }
    }

    let interpreter = ini.get(section, "interpreter").map(PathBuf::from);
    let env_path = ini.get(section, "envpath");

    Ok(SubsystemConfig {
        name: section.to_owned(),
        path,
        mnt_points,
        bins,
        interpreter,
        env_path,
    })
}

/// Looks up a single container's section directly, used by the executor
/// which only needs one container's `bins`/`env_path`/`interpreter`.
pub fn load_one(path: &Path, container: &str) -> Result<SubsystemConfig> {
    let mut ini = Ini::new();
    ini.load(path)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {}", path.display(), e))?;
    load_section(&ini, container).with_context(|| format!("container '{}'", container))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_parse_mnt_entry_with_and_without_dst() {
        let a = parse_mnt_entry("/host/path:/container/path");
        assert_eq!(a.source, PathBuf::from("/host/path"));
        assert_eq!(a.target, PathBuf::from("/container/path"));

        let b = parse_mnt_entry("/shared");
        assert_eq!(b.source, PathBuf::from("/shared"));
        assert_eq!(b.target, PathBuf::from("/shared"));
    }

    #[test]
    fn test_load_skips_missing_path_container() {
        let root = tempdir().unwrap();
        let good = root.path().join("good");
        std::fs::create_dir(&good).unwrap();

        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            "[good]\npath={}\nbins=/bin\n\n[bad]\npath=/does/not/exist\nbins=/bin\n",
            good.display()
        )
        .unwrap();

        let configs = load(f.path()).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "good");
        assert!(configs[0]
            .mnt_points
            .iter()
            .any(|m| m.target == PathBuf::from("/dev")));
    }

    #[test]
    fn test_load_one() {
        let root = tempdir().unwrap();
        let good = root.path().join("good");
        std::fs::create_dir(&good).unwrap();
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            "[good]\npath={}\nbins=/bin\nenvPath=/sbin:/bin\n",
            good.display()
        )
        .unwrap();

        let cfg = load_one(f.path(), "good").unwrap();
        assert_eq!(cfg.env_path.as_deref(), Some("/sbin:/bin"));
    }
}
