//! The one hash function every node, shard token and `configHash` in the
//! cluster agrees on.
//!
//! Resolves the open question in the spec's design notes: the source
//! referenced both Murmur3 and SHA-256 without picking one. This
//! implementation pins blake3, truncated to its first 8 bytes read as a
//! big-endian `u64`. It is deterministic across platforms and process runs,
//! which is exactly what the `configHash` invariant requires, and it is
//! already the content-hashing crate the rest of the workspace depends on.

/// Hash an arbitrary byte string to a 64-bit value.
///
/// Used for both key routing (`HashRing::replicas_for`) and virtual-node
/// token placement (`HashRing::add_node`) — the spec requires both use the
/// same function.
pub fn hash64(bytes: &[u8]) -> u64 {
    let digest = blake3::hash(bytes);
    let b = digest.as_bytes();
    u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(hash64(b"user:42"), hash64(b"user:42"));
    }

    #[test]
    fn distinguishes_inputs() {
        assert_ne!(hash64(b"user:42"), hash64(b"user:43"));
    }
}
