//! Decompress command implementation.

use crate::utils::{confirm_overwrite, decompressed_name, is_stdio, read_input, write_output};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn cmd_decompress(
    input: &Path,
    output: Option<&Path>,
    keep: bool,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let from_stdin = is_stdio(input);
    let target = match output {
        Some(path) if is_stdio(path) => None,
        Some(path) => Some(path.to_path_buf()),
        None if from_stdin => None,
        None => Some(decompressed_name(input).ok_or_else(|| {
            format!("{}: unknown suffix (use --output)", input.display())
        })?),
    };
    if let Some(target) = &target {
        confirm_overwrite(target, force)?;
    }

    let data = read_input(input)?;
    let plain = gzbuf::decompress(&data)?;
    let source = (!from_stdin).then_some(input);
    write_output(target.as_deref(), &plain, source)?;

    info!(
        input = %input.display(),
        compressed = data.len(),
        original = plain.len(),
        "decompressed"
    );

    if !keep && !from_stdin && target.is_some() {
        fs::remove_file(input)?;
    }
    Ok(())
}
