//! Info command implementation.

use crate::utils::{read_input, space_savings};
use gzbuf_core::Crc32;
use gzbuf_deflate::{Flush, GzHeader, InflateStream};
use serde::Serialize;
use std::path::Path;

/// Summary of one gzip file.
#[derive(Debug, Serialize)]
struct GzipInfo {
    file: String,
    compressed_size: u64,
    uncompressed_size: u64,
    savings_percent: f64,
    crc32: String,
    text: bool,
    mtime: u32,
    xfl: u8,
    os: u8,
    os_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_len: Option<usize>,
    header_crc: bool,
}

/// Operating system names from RFC 1952.
fn os_name(os: u8) -> &'static str {
    match os {
        0 => "FAT",
        1 => "Amiga",
        2 => "VMS",
        3 => "Unix",
        4 => "VM/CMS",
        5 => "Atari TOS",
        6 => "HPFS",
        7 => "Macintosh",
        8 => "Z-System",
        9 => "CP/M",
        10 => "TOPS-20",
        11 => "NTFS",
        12 => "QDOS",
        13 => "Acorn RISCOS",
        _ => "unknown",
    }
}

/// Read just enough of `data` to parse the gzip header.
fn read_header(data: &[u8]) -> Result<GzHeader, Box<dyn std::error::Error>> {
    let mut stream = InflateStream::new(gzbuf::GZIP_WBITS)?;
    stream.inflate(data, &mut [], Flush::None)?;
    let header = stream.header().cloned().ok_or("truncated gzip header")?;
    Ok(header)
}

fn collect(path: &Path, data: &[u8]) -> Result<GzipInfo, Box<dyn std::error::Error>> {
    let header = read_header(data)?;
    let plain = gzbuf::decompress(data)?;
    let lossy = |bytes: &Vec<u8>| String::from_utf8_lossy(bytes).into_owned();

    Ok(GzipInfo {
        file: path.display().to_string(),
        compressed_size: data.len() as u64,
        uncompressed_size: plain.len() as u64,
        savings_percent: space_savings(plain.len() as u64, data.len() as u64),
        crc32: format!("{:08x}", Crc32::compute(&plain)),
        text: header.text,
        mtime: header.mtime,
        xfl: header.xfl,
        os: header.os,
        os_name: os_name(header.os),
        name: header.name.as_ref().map(lossy),
        comment: header.comment.as_ref().map(lossy),
        extra_len: header.extra.as_ref().map(Vec::len),
        header_crc: header.hcrc,
    })
}

pub fn cmd_info(input: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_input(input)?;
    let info = collect(input, &data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("gzip Information");
    println!("================");
    println!("File: {}", info.file);
    println!("Compressed size: {} bytes", info.compressed_size);
    println!("Uncompressed size: {} bytes", info.uncompressed_size);
    println!("Space savings: {:.1}%", info.savings_percent);
    println!("CRC-32: {}", info.crc32);
    println!();
    println!("Header:");
    if let Some(name) = &info.name {
        println!("  Original filename: {}", name);
    }
    if let Some(comment) = &info.comment {
        println!("  Comment: {}", comment);
    }
    if info.mtime > 0 {
        println!("  Modification time: {} (Unix timestamp)", info.mtime);
    }
    println!("  Operating system: {} ({})", info.os_name, info.os);
    println!("  Extra flags: {}", info.xfl);
    if let Some(len) = info.extra_len {
        println!("  Extra field: {} bytes", len);
    }
    println!("  Text: {}", info.text);
    println!("  Header CRC: {}", info.header_crc);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_default_header() {
        let data = gzbuf::compress(b"info test info test", Some(9)).unwrap();
        let info = collect(Path::new("x.gz"), &data).unwrap();
        assert_eq!(info.uncompressed_size, 19);
        assert_eq!(info.os, 255);
        assert_eq!(info.os_name, "unknown");
        assert_eq!(info.xfl, 2);
        assert!(info.name.is_none());
        assert_eq!(info.crc32, format!("{:08x}", Crc32::compute(b"info test info test")));
    }

    #[test]
    fn test_json_skips_missing_fields() {
        let data = gzbuf::compress(b"", None).unwrap();
        let info = collect(Path::new("empty.gz"), &data).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["uncompressed_size"], 0);
        assert!(json.get("name").is_none());
        assert_eq!(json["crc32"], "00000000");
    }

    #[test]
    fn test_not_gzip() {
        assert!(collect(Path::new("x"), b"definitely not gzip").is_err());
    }
}
