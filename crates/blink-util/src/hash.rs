/// Compute the BLAKE3 hash of a byte slice, returning the hex-encoded digest.
#[must_use]
pub fn blake3_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Short, filesystem-safe key derived from an arbitrary string.
///
/// Used to name lock files after cache entries whose names contain `@` and `/`.
#[must_use]
pub fn short_key(input: &str) -> String {
    let mut hex = blake3_bytes(input.as_bytes());
    hex.truncate(32);
    hex
}
