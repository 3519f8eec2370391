//! Layer payload decoding: CSV text or base64 (optionally zlib/gzip compressed) into
//! global tile ids.

use std::io::Read;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::{TmxError, TmxResult};

/// Standard alphabet, lenient about padding and trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decode a `<data>` payload into global tile ids, in document order.
///
/// Unknown encodings and undecodable payloads produce an empty vector. The only hard
/// failure is `compression="zstd"`, which is refused outright.
pub fn decode_tile_data(payload: &str, encoding: &str, compression: &str) -> TmxResult<Vec<u32>> {
    match encoding {
        "csv" => Ok(decode_csv(payload)),
        "base64" => decode_base64(payload, compression),
        other => {
            log::warn!("Ignoring tile data with unsupported encoding '{other}'");
            Ok(Vec::new())
        }
    }
}

/// One id per comma separated field; whitespace anywhere is dropped and fields that do
/// not parse become `0`.
pub fn decode_csv(text: &str) -> Vec<u32> {
    let scrubbed: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    scrubbed
        .split(',')
        .map(|field| field.parse().unwrap_or(0))
        .collect()
}

pub fn decode_base64(text: &str, compression: &str) -> TmxResult<Vec<u32>> {
    if compression == "zstd" {
        return Err(TmxError::UnsupportedCompression(compression.to_string()));
    }

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect();
    let bytes = match LENIENT_BASE64.decode(cleaned) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Failed to decode base64 tile data: {e}");
            return Ok(Vec::new());
        }
    };

    match compression {
        "zlib" | "gzip" => match inflate(&bytes) {
            Ok(raw) => Ok(ids_from_le_bytes(&raw)),
            Err(e) => {
                log::warn!("Failed to decompress {compression} tile data: {e}");
                Ok(Vec::new())
            }
        },
        _ => Ok(ids_from_le_bytes(&bytes)),
    }
}

/// Inflate a zlib or gzip stream, picking the format from the header rather than the
/// declared compression.
fn inflate(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    if bytes.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(bytes).read_to_end(&mut raw)?;
    } else {
        ZlibDecoder::new(bytes).read_to_end(&mut raw)?;
    }
    Ok(raw)
}

/// Little-endian `u32`s; a trailing partial word is dropped.
fn ids_from_le_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn le_bytes(ids: &[u32]) -> Vec<u8> {
        ids.iter().flat_map(|id| id.to_le_bytes()).collect()
    }

    #[test]
    fn csv_keeps_order_and_zeroes_garbage() {
        let ids = decode_csv("1,2,\n 3 ,x,\t40");
        assert_eq!(ids, vec![1, 2, 3, 0, 40]);
    }

    #[test]
    fn csv_trailing_comma_yields_empty_cell() {
        assert_eq!(decode_csv("5,6,"), vec![5, 6, 0]);
    }

    #[test]
    fn csv_negative_values_are_unparsable() {
        assert_eq!(decode_csv("-1,2"), vec![0, 2]);
    }

    #[test]
    fn base64_uncompressed_reads_le_words() {
        let payload = STANDARD.encode(le_bytes(&[1, 258, 0, 0x8000_0001]));
        let ids = decode_tile_data(&payload, "base64", "").unwrap();
        assert_eq!(ids, vec![1, 258, 0, 0x8000_0001]);
    }

    #[test]
    fn base64_drops_partial_trailing_word() {
        let mut bytes = le_bytes(&[7, 9]);
        bytes.extend_from_slice(&[1, 2, 3]);
        let ids = decode_tile_data(&STANDARD.encode(bytes), "base64", "").unwrap();
        assert_eq!(ids, vec![7, 9]);
    }

    #[test]
    fn base64_ignores_unknown_characters() {
        let encoded = STANDARD.encode(le_bytes(&[3, 4]));
        let (head, tail) = encoded.split_at(5);
        let noisy = format!("  {head}\n\t*{tail} ");
        assert_eq!(decode_tile_data(&noisy, "base64", "").unwrap(), vec![3, 4]);
    }

    #[test]
    fn padding_inside_the_payload_yields_empty() {
        let first = STANDARD.encode(le_bytes(&[1]));
        let second = STANDARD.encode(le_bytes(&[2]));
        let joined = format!("{first}{second}");
        assert!(decode_tile_data(&joined, "base64", "").unwrap().is_empty());
    }

    #[test]
    fn zlib_round_trip() {
        let ids: Vec<u32> = (0..64).map(|i| i % 7).collect();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&le_bytes(&ids)).unwrap();
        let payload = STANDARD.encode(encoder.finish().unwrap());

        assert_eq!(decode_tile_data(&payload, "base64", "zlib").unwrap(), ids);
    }

    #[test]
    fn gzip_round_trip() {
        let ids: Vec<u32> = vec![12, 0, 0, 3, 99, 1];
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&le_bytes(&ids)).unwrap();
        let payload = STANDARD.encode(encoder.finish().unwrap());

        assert_eq!(decode_tile_data(&payload, "base64", "gzip").unwrap(), ids);
    }

    #[test]
    fn corrupt_compressed_data_yields_empty() {
        let payload = STANDARD.encode(b"definitely not deflate");
        assert!(decode_tile_data(&payload, "base64", "zlib").unwrap().is_empty());
        assert!(decode_tile_data(&payload, "base64", "gzip").unwrap().is_empty());
    }

    #[test]
    fn zstd_is_refused() {
        let payload = STANDARD.encode(le_bytes(&[1, 2, 3]));
        let err = decode_tile_data(&payload, "base64", "zstd").unwrap_err();
        assert!(matches!(err, TmxError::UnsupportedCompression(ref c) if c == "zstd"));
    }

    #[test]
    fn unknown_encoding_is_empty() {
        assert!(decode_tile_data("1,2,3", "xml", "").unwrap().is_empty());
    }
}
