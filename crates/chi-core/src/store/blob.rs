//! Array columns are stored as packed little-endian `f64` blobs.

const F64_WIDTH: usize = std::mem::size_of::<f64>();

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("array blob length {length} is not a multiple of {F64_WIDTH} bytes")]
pub struct BlobError {
    pub length: usize,
}

pub fn encode_f64_blob(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn decode_f64_blob(bytes: &[u8]) -> Result<Vec<f64>, BlobError> {
    if bytes.len() % F64_WIDTH != 0 {
        return Err(BlobError {
            length: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(F64_WIDTH)
        .map(|chunk| {
            let mut raw = [0_u8; F64_WIDTH];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{BlobError, decode_f64_blob, encode_f64_blob};

    #[test]
    fn blob_layout_is_little_endian() {
        let bytes = encode_f64_blob(&[1.0]);
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
        assert_eq!(decode_f64_blob(&bytes), Ok(vec![1.0]));
        assert_eq!(decode_f64_blob(&[]), Ok(Vec::new()));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert_eq!(decode_f64_blob(&[0, 1, 2]), Err(BlobError { length: 3 }));
    }
}
