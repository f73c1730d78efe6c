//! Compress command implementation.

use crate::utils::{
    compressed_name, confirm_overwrite, is_stdio, read_input, space_savings, write_output,
};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn cmd_compress(
    input: &Path,
    output: Option<&Path>,
    level: Option<i32>,
    keep: bool,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let from_stdin = is_stdio(input);
    let target = match output {
        Some(path) if is_stdio(path) => None,
        Some(path) => Some(path.to_path_buf()),
        None if from_stdin => None,
        None => Some(compressed_name(input)),
    };
    if let Some(target) = &target {
        confirm_overwrite(target, force)?;
    }

    let data = read_input(input)?;
    let packed = gzbuf::compress(&data, level)?;
    let source = (!from_stdin).then_some(input);
    write_output(target.as_deref(), &packed, source)?;

    info!(
        input = %input.display(),
        original = data.len(),
        compressed = packed.len(),
        savings = space_savings(data.len() as u64, packed.len() as u64),
        "compressed"
    );

    if !keep && !from_stdin && target.is_some() {
        fs::remove_file(input)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::io::IsTerminal;

    const TEXT: &[u8] = b"the quick brown fox jumps over the lazy dog, again and again";

    #[test]
    fn test_compress_replaces_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        fs::write(&input, TEXT).unwrap();
        let mtime = FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&input, mtime).unwrap();

        cmd_compress(&input, None, Some(9), false, false).unwrap();

        let packed_path = dir.path().join("notes.txt.gz");
        assert!(!input.exists());
        let packed = fs::read(&packed_path).unwrap();
        assert_eq!(gzbuf::decompress(&packed).unwrap(), TEXT);
        let copied = FileTime::from_last_modification_time(&fs::metadata(&packed_path).unwrap());
        assert_eq!(copied, mtime);
    }

    #[test]
    fn test_compress_keep_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data.bin");
        let output = dir.path().join("elsewhere.gz");
        fs::write(&input, TEXT).unwrap();

        cmd_compress(&input, Some(&output), None, true, false).unwrap();

        assert_eq!(fs::read(&input).unwrap(), TEXT);
        assert!(!dir.path().join("data.bin.gz").exists());
        assert_eq!(gzbuf::decompress(&fs::read(&output).unwrap()).unwrap(), TEXT);
    }

    #[test]
    fn test_compress_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("log.txt");
        let target = dir.path().join("log.txt.gz");
        fs::write(&input, TEXT).unwrap();
        fs::write(&target, b"stale").unwrap();

        if !std::io::stdin().is_terminal() {
            let err = cmd_compress(&input, None, None, false, false).unwrap_err();
            assert!(err.to_string().contains("--force"));
            assert!(input.exists());
            assert_eq!(fs::read(&target).unwrap(), b"stale");
        }

        cmd_compress(&input, None, None, false, true).unwrap();
        assert!(!input.exists());
        assert_eq!(gzbuf::decompress(&fs::read(&target).unwrap()).unwrap(), TEXT);
    }

    #[test]
    fn test_invalid_level_leaves_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("keep.txt");
        fs::write(&input, TEXT).unwrap();

        assert!(cmd_compress(&input, None, Some(12), false, false).is_err());
        assert!(input.exists());
        assert!(!dir.path().join("keep.txt.gz").exists());
    }
}
