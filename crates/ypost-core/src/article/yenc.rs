//! yEnc payload encoding.
//!
//! Each byte becomes `(byte + 42) mod 256`. NUL, LF, CR and `=` (and `.` in
//! the first column, so no line can be mistaken for the NNTP terminator) are
//! written as `=` followed by the encoded value plus 64. Output is folded into
//! CRLF-terminated lines of [`LINE_LENGTH`] encoded characters.

/// Encoded characters per line (`line=` in the `=ybegin` header).
pub const LINE_LENGTH: usize = 128;

const ESCAPE: u8 = b'=';

/// Upper bound on the encoded size of `len` input bytes.
pub fn max_encoded_len(len: usize) -> usize {
    // Worst case every byte escaped, plus CRLF per line.
    let chars = len * 2;
    chars + (chars / LINE_LENGTH + 1) * 2
}

#[inline]
fn needs_escape(encoded: u8, column: usize) -> bool {
    matches!(encoded, 0 | b'\n' | b'\r' | ESCAPE) || (column == 0 && encoded == b'.')
}

/// Append the yEnc encoding of `input` to `out`. Empty input appends nothing.
pub fn encode_into(input: &[u8], out: &mut Vec<u8>) {
    let mut column = 0usize;
    for &byte in input {
        let encoded = byte.wrapping_add(42);
        if needs_escape(encoded, column) {
            out.push(ESCAPE);
            out.push(encoded.wrapping_add(64));
            column += 2;
        } else {
            out.push(encoded);
            column += 1;
        }
        if column >= LINE_LENGTH {
            out.extend_from_slice(b"\r\n");
            column = 0;
        }
    }
    if column > 0 {
        out.extend_from_slice(b"\r\n");
    }
}

/// Decode a yEnc payload (without `=y` control lines) back to raw bytes.
pub fn decode(encoded: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded.len());
    let mut escaped = false;
    for &c in encoded {
        match c {
            b'\r' | b'\n' => continue,
            ESCAPE if !escaped => escaped = true,
            _ if escaped => {
                out.push(c.wrapping_sub(64).wrapping_sub(42));
                escaped = false;
            }
            _ => out.push(c.wrapping_sub(42)),
        }
    }
    out
}

/// CRC32 (IEEE) of `data`, as recorded in `pcrc32=`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
