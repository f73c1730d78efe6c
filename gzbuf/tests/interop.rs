//! gzip produced here must be readable by other decoders, and vice versa.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

fn corpus() -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..20_000u32 {
        data.extend_from_slice(format!("{i}:{}\n", i.wrapping_mul(2654435761) % 1000).as_bytes());
    }
    data
}

#[test]
fn test_flate2_decodes_ours() {
    let data = corpus();
    for level in [-1, 0, 3, 9] {
        let packed = gzbuf::compress(&data, Some(level)).unwrap();
        let mut plain = Vec::new();
        GzDecoder::new(&packed[..]).read_to_end(&mut plain).unwrap();
        assert_eq!(plain, data, "level {level}");
    }
}

#[test]
fn test_we_decode_flate2() {
    let data = corpus();
    for level in [0, 1, 6, 9] {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(&data).unwrap();
        let packed = encoder.finish().unwrap();
        assert_eq!(gzbuf::decompress(&packed).unwrap(), data, "level {level}");
    }
}
