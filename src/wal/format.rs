use serde::{Deserialize, Serialize};

use crate::domain::ScanMode;

/// First line of the WAL file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalHeader {
    pub v: u32,
    pub mode: ScanMode,
    pub root: String,
    pub exts: Vec<String>,
    pub exts_hash: String,
    pub started_at: i64,
}

pub const WAL_SCHEMA_VERSION: u32 = 1;

/// Final line of the WAL file, written once on clean completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalFooter {
    pub completed_at: i64,
    pub totals: WalTotals,
    pub scan_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WalTotals {
    pub healthy: usize,
    pub corrupt: usize,
    pub suspicious: usize,
    pub error: usize,
}

/// FNV-1a over the sorted, normalized extension list. Only needs to be
/// stable across runs with identical inputs.
pub fn extensions_hash(extensions: &[String]) -> String {
    let mut sorted: Vec<&str> = extensions.iter().map(|s| s.as_str()).collect();
    sorted.sort_unstable();
    let joined = sorted.join(",");

    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in joined.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{hash:016x}")
}

/// Deterministic WAL file stem from (root, mode, extension set).
pub fn wal_stem(root: &str, mode: ScanMode, extensions: &[String]) -> String {
    let hash = extensions_hash(extensions);
    let root_hash = {
        let mut h: u64 = 0xcbf29ce484222325;
        for byte in root.as_bytes() {
            h ^= *byte as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        format!("{h:016x}")
    };
    format!("corrupt-scan-{mode}-{root_hash}-{hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_hash_is_order_independent() {
        let a = extensions_hash(&[".mp4".to_string(), ".mkv".to_string()]);
        let b = extensions_hash(&[".mkv".to_string(), ".mp4".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn extensions_hash_differs_for_different_sets() {
        let a = extensions_hash(&[".mp4".to_string()]);
        let b = extensions_hash(&[".mkv".to_string()]);
        assert_ne!(a, b);
    }
}
