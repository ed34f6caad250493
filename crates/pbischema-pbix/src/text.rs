//! Permissive text decoding for package entries
//!
//! Power BI Desktop writes `DataModelSchema` and `Report/Layout` as UTF-16LE,
//! usually without a byte order mark. Other producers write UTF-8.

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF16BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// Decode a JSON-ish entry, never failing
///
/// Invalid sequences are replaced with U+FFFD.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&UTF8_BOM) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&UTF16LE_BOM) {
        return decode_utf16(rest, true);
    }
    if let Some(rest) = bytes.strip_prefix(&UTF16BE_BOM) {
        return decode_utf16(rest, false);
    }
    if looks_like_utf16le(bytes) {
        return decode_utf16(bytes, true);
    }

    String::from_utf8_lossy(bytes).into_owned()
}

/// Decode binary content as UTF-8, replacing anything undecodable
pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// ASCII text encoded as UTF-16LE has a NUL in every second byte
fn looks_like_utf16le(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[0] != 0 && bytes[1] == 0 && bytes[2] != 0 && bytes[3] == 0
}

fn decode_utf16(body: &[u8], little_endian: bool) -> String {
    let code_units: Vec<u16> = body
        .chunks_exact(2)
        .map(|chunk| {
            if little_endian {
                u16::from_le_bytes([chunk[0], chunk[1]])
            } else {
                u16::from_be_bytes([chunk[0], chunk[1]])
            }
        })
        .collect();

    let text = String::from_utf16_lossy(&code_units);
    text.strip_prefix('\u{FEFF}').map(str::to_string).unwrap_or(text)
}
