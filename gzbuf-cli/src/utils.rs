//! Shared file handling for the CLI commands.

use dialoguer::Confirm;
use filetime::FileTime;
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

/// Suffix of compressed files.
pub const GZ_SUFFIX: &str = ".gz";

/// Whether `path` names stdin/stdout.
pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read all of `path`, or stdin for `-`.
pub fn read_input(path: &Path) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    if is_stdio(path) {
        io::stdin().lock().read_to_end(&mut data)?;
    } else {
        data = fs::read(path)?;
    }
    Ok(data)
}

/// `FILE` -> `FILE.gz`.
pub fn compressed_name(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(GZ_SUFFIX);
    PathBuf::from(name)
}

/// `FILE.gz` -> `FILE`, or `None` without the suffix.
pub fn decompressed_name(input: &Path) -> Option<PathBuf> {
    let name = input.to_str()?;
    let stem = name.strip_suffix(GZ_SUFFIX)?;
    (!stem.is_empty()).then(|| PathBuf::from(stem))
}

/// Check that `path` may be written, asking on a terminal when it exists.
pub fn confirm_overwrite(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    check_overwrite(path, force, io::stdin().is_terminal())
}

fn check_overwrite(
    path: &Path,
    force: bool,
    interactive: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if force || !path.exists() {
        return Ok(());
    }
    if !interactive {
        return Err(format!("{} already exists (use --force)", path.display()).into());
    }
    let overwrite = Confirm::new()
        .with_prompt(format!("{} already exists. Overwrite?", path.display()))
        .default(false)
        .interact()?;
    if overwrite {
        Ok(())
    } else {
        Err("not overwritten".into())
    }
}

/// Write `data` to `path` (stdout for `None`), then copy the modification
/// time of `source` when there is one.
pub fn write_output(
    path: Option<&Path>,
    data: &[u8],
    source: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = path else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(data)?;
        stdout.flush()?;
        return Ok(());
    };

    fs::write(path, data)?;
    if let Some(source) = source {
        let metadata = fs::metadata(source)?;
        let mtime = FileTime::from_last_modification_time(&metadata);
        filetime::set_file_mtime(path, mtime)?;
    }
    Ok(())
}

/// Percentage saved by compression.
pub fn space_savings(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        0.0
    } else {
        (1.0 - compressed as f64 / original as f64) * 100.0
    }
}
