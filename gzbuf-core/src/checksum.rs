//! Checksums used by the stream wrappers.
//!
//! - **CRC-32 (ISO 3309)**: gzip trailer and the optional gzip header CRC
//! - **Adler-32**: zlib trailer
//!
//! CRC-32 uses slicing-by-8 for inputs of 16 bytes or more and a single
//! table below that.

const CRC32_POLY: u32 = 0xEDB88320;

/// CRC-32 slicing-by-8 lookup tables. Table 0 is the classic byte table.
const CRC32_TABLES: [[u32; 256]; 8] = {
    let mut tables = [[0u32; 256]; 8];

    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLY
            } else {
                crc >> 1
            };
            j += 1;
        }
        tables[0][i] = crc;
        i += 1;
    }

    let mut t = 1;
    while t < 8 {
        let mut i = 0usize;
        while i < 256 {
            let prev = tables[t - 1][i];
            tables[t][i] = tables[0][(prev & 0xFF) as usize] ^ (prev >> 8);
            i += 1;
        }
        t += 1;
    }

    tables
};

/// Incremental CRC-32 calculator.
///
/// # Example
///
/// ```
/// use gzbuf_core::checksum::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.update(b"Hello, ");
/// crc.update(b"World!");
/// assert_eq!(crc.finalize(), 0xEC4AC3D0);
/// ```
#[derive(Debug, Clone)]
pub struct Crc32 {
    crc: u32,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self { crc: 0xFFFFFFFF }
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        if data.len() >= 16 {
            crc32_slice8(&mut self.crc, data);
        } else {
            crc32_bytes(&mut self.crc, data);
        }
    }

    /// Current CRC value.
    #[inline(always)]
    pub fn value(&self) -> u32 {
        self.crc ^ 0xFFFFFFFF
    }

    /// Finalize and return the CRC value.
    #[inline(always)]
    pub fn finalize(self) -> u32 {
        self.value()
    }

    /// Compute CRC-32 for a slice in one call.
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn crc32_bytes(crc: &mut u32, data: &[u8]) {
    for &byte in data {
        *crc = CRC32_TABLES[0][((*crc ^ byte as u32) & 0xFF) as usize] ^ (*crc >> 8);
    }
}

#[inline]
fn crc32_slice8(crc: &mut u32, data: &[u8]) {
    let mut c = *crc;
    let mut chunks = data.chunks_exact(8);

    for bytes in &mut chunks {
        let x = c ^ u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        c = CRC32_TABLES[7][(x & 0xFF) as usize]
            ^ CRC32_TABLES[6][((x >> 8) & 0xFF) as usize]
            ^ CRC32_TABLES[5][((x >> 16) & 0xFF) as usize]
            ^ CRC32_TABLES[4][(x >> 24) as usize]
            ^ CRC32_TABLES[3][bytes[4] as usize]
            ^ CRC32_TABLES[2][bytes[5] as usize]
            ^ CRC32_TABLES[1][bytes[6] as usize]
            ^ CRC32_TABLES[0][bytes[7] as usize];
    }

    *crc = c;
    crc32_bytes(crc, chunks.remainder());
}

const ADLER_MOD: u32 = 65521;

/// Largest run of bytes that can be summed before `b` may overflow a `u32`.
const ADLER_NMAX: usize = 5552;

/// Incremental Adler-32 calculator.
#[derive(Debug, Clone)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a new Adler-32 calculator.
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Update the checksum with more data.
    pub fn update(&mut self, data: &[u8]) {
        let (mut a, mut b) = (self.a, self.b);
        for chunk in data.chunks(ADLER_NMAX) {
            for &byte in chunk {
                a += byte as u32;
                b += a;
            }
            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }
        self.a = a;
        self.b = b;
    }

    /// Current checksum value.
    pub fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Finalize and return the checksum.
    pub fn finalize(self) -> u32 {
        self.value()
    }

    /// Compute Adler-32 for a slice in one call.
    pub fn compute(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.finalize()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}
