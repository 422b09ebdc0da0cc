use sha2::{Digest, Sha256};

/// SHA-256 of `input` as a 64-char lowercase hex string.
pub fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// True when the first `zeros` hex digits of `hash` are all `'0'`.
/// A zero-length prefix always matches.
pub fn meets_difficulty(hash: &str, zeros: u32) -> bool {
    let zeros = zeros as usize;
    hash.len() >= zeros && hash.bytes().take(zeros).all(|c| c == b'0')
}
