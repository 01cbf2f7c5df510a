//! The object serialization format used by `save_object` / `load_object`.
//!
//! Objects are written as a gzip-compressed JSON document. The stream is
//! self-describing: readers detect the gzip header and decompress.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DataMartError;

/// File extension (without the dot) required for saved objects.
pub const OBJECT_EXTENSION: &str = "rds";

/// MIME type sent when uploading a saved object.
pub const OBJECT_CONTENT_TYPE: &str = "application/x-gzip";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Serialize `value` into `writer`.
pub fn encode<T, W>(value: &T, writer: W) -> Result<(), DataMartError>
where
    T: Serialize + ?Sized,
    W: Write,
{
    let mut encoder = GzEncoder::new(writer, Compression::default());
    serde_json::to_writer(&mut encoder, value)?;
    encoder.finish()?;
    Ok(())
}

/// Deserialize a value previously written by [`encode`].
pub fn decode<T, R>(reader: R) -> Result<T, DataMartError>
where
    T: DeserializeOwned,
    R: Read,
{
    Ok(serde_json::from_reader(GzDecoder::new(reader))?)
}

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Gunzip `bytes` when they carry a gzip header, otherwise return them as-is.
pub fn maybe_decompress(bytes: Vec<u8>) -> std::io::Result<Vec<u8>> {
    if !is_gzip(&bytes) {
        return Ok(bytes);
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes.as_slice()).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Survey {
        name: String,
        weights: Vec<f64>,
    }

    #[test]
    fn test_encoded_object_is_gzip() {
        let mut buf = Vec::new();
        encode(&vec![1, 2, 3], &mut buf).unwrap();
        assert!(is_gzip(&buf));

        let decoded: Vec<i32> = decode(buf.as_slice()).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_struct() {
        let survey = Survey {
            name: "wave 3".into(),
            weights: vec![0.5, 1.25],
        };
        let mut buf = Vec::new();
        encode(&survey, &mut buf).unwrap();

        let decoded: Survey = decode(buf.as_slice()).unwrap();
        assert_eq!(decoded, survey);
    }

    #[test]
    fn test_decode_rejects_plain_bytes() {
        let result: Result<Survey, _> = decode(&b"not compressed"[..]);
        assert!(result.is_err());
    }

    #[test]
    fn test_maybe_decompress() {
        let plain = b"This is a test line.".to_vec();
        assert_eq!(maybe_decompress(plain.clone()).unwrap(), plain);

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&plain).unwrap();
        let compressed = gz.finish().unwrap();
        assert_eq!(maybe_decompress(compressed).unwrap(), plain);
    }
}
