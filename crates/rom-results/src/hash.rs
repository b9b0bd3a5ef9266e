//! Content checksums for stored bases.

use sha2::{Digest, Sha256};

use crate::types::MatrixRecord;

fn update_matrix(hasher: &mut Sha256, m: &MatrixRecord) {
    hasher.update((m.rows as u64).to_le_bytes());
    hasher.update((m.cols as u64).to_le_bytes());
    for value in &m.data {
        hasher.update(value.to_bits().to_le_bytes());
    }
}

/// SHA-256 over the exact bit patterns of `V` then `W`.
pub fn payload_checksum(v: &MatrixRecord, w: &MatrixRecord) -> String {
    let mut hasher = Sha256::new();
    update_matrix(&mut hasher, v);
    update_matrix(&mut hasher, w);
    format!("{:x}", hasher.finalize())
}
