use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

/// A copy of the configuration document taken before a mutation.
///
/// The copy is never removed, validated or restored automatically. It
/// outlives every later step, including failed ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    /// Copy `config` to `<dir>/<file name>.<YYYYmmdd-HHMMSS>.bak`.
    ///
    /// `dir` defaults to the directory holding `config` and is created if
    /// missing.
    pub fn take(config: &Path, dir: Option<&Path>) -> io::Result<Self> {
        Self::take_at(config, dir, Local::now())
    }

    pub(crate) fn take_at(
        config: &Path,
        dir: Option<&Path>,
        when: DateTime<Local>,
    ) -> io::Result<Self> {
        let file_name = config.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", config.display()),
            )
        })?;
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => config
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        fs::create_dir_all(&dir)?;

        let stem = format!(
            "{}.{}",
            file_name.to_string_lossy(),
            when.format("%Y%m%d-%H%M%S")
        );
        let path = unused_path(&dir, &stem);
        fs::copy(config, &path)?;
        info!(snapshot = %path.display(), "configuration snapshot written");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn unused_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.bak"));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| dir.join(format!("{stem}-{n}.bak")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
