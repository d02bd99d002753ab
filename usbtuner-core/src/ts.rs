//! Transport-stream framing constants and the chunk-sizing rule.

use std::time::Duration;

/// TS packet size in bytes.
pub const TS_PACKET_SIZE: usize = 188;

/// Sync byte at the start of every TS packet.
pub const TS_SYNC_BYTE: u8 = 0x47;

/// Largest chunk handed to or received from a driver in one read.
///
/// Seven packets (1316 bytes) is the most that fits in a standard
/// 1500-byte Ethernet MTU, so downstream consumers can forward a chunk
/// without re-segmenting it.
pub const MAX_CHUNK_SIZE: usize = TS_PACKET_SIZE * 7;

/// Highest valid packet identifier (13-bit field).
pub const MAX_PID: u16 = 0x1fff;

/// PID carrying the Program Association Table.
pub const PID_PAT: u16 = 0x0000;

/// Base PID for ATSC system-information tables.
pub const PID_ATSC_SI_BASE: u16 = 0x1ffb;

/// Default bound on a single stream read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Compute the usable transfer size for a caller buffer of `requested` bytes.
///
/// The result is the largest whole multiple of [`TS_PACKET_SIZE`] that fits
/// in `requested`, capped at [`MAX_CHUNK_SIZE`]. A `requested` smaller than
/// one packet yields 0; callers pass that through to the driver unchanged
/// rather than inventing a minimum size.
pub fn effective_read_size(requested: usize) -> usize {
    let aligned = (requested / TS_PACKET_SIZE) * TS_PACKET_SIZE;
    aligned.min(MAX_CHUNK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_read_size_reference_values() {
        assert_eq!(effective_read_size(2000), 1316);
        assert_eq!(effective_read_size(300), 188);
        assert_eq!(effective_read_size(187), 0);
        assert_eq!(effective_read_size(1316), 1316);
    }

    #[test]
    fn test_effective_read_size_boundaries() {
        assert_eq!(effective_read_size(0), 0);
        assert_eq!(effective_read_size(188), 188);
        assert_eq!(effective_read_size(189), 188);
        assert_eq!(effective_read_size(1315), 1128);
        assert_eq!(effective_read_size(usize::MAX), MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_effective_read_size_invariants() {
        for requested in 0..4096 {
            let effective = effective_read_size(requested);
            assert_eq!(effective % TS_PACKET_SIZE, 0);
            assert!(effective <= requested);
            assert!(effective <= MAX_CHUNK_SIZE);
        }
    }

    #[test]
    fn test_chunk_size_fits_mtu() {
        assert_eq!(MAX_CHUNK_SIZE, 1316);
        assert!(MAX_CHUNK_SIZE <= 1500);
    }
}
