use std::time::Duration;

/// The kinds of payload the Tiered Artifact Cache (C3) stores, each with
/// its own TTL per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Macro,
    PolicyNews,
    SectorFlows,
    Snapshot,
    AnalystArtifact,
}

impl CacheKind {
    pub fn ttl(self) -> Duration {
        match self {
            CacheKind::Macro => Duration::from_secs(24 * 3600),
            CacheKind::PolicyNews => Duration::from_secs(6 * 3600),
            CacheKind::SectorFlows => Duration::from_secs(3600),
            CacheKind::Snapshot => Duration::from_secs(5 * 60),
            // Per-analyst-kind TTL is documented at the call site (spec §4.3);
            // the default here matches the sector-flows cadence since most
            // analyst artifacts are produced once per trading session.
            CacheKind::AnalystArtifact => Duration::from_secs(3600),
        }
    }

    /// Whether this kind is only ever held in the in-memory LRU tier
    /// (never the persistent tier). Only snapshots are memory-only per spec §4.3.
    pub fn memory_only(self) -> bool {
        matches!(self, CacheKind::Snapshot)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::Macro => "macro",
            CacheKind::PolicyNews => "policy_news",
            CacheKind::SectorFlows => "sector_flows",
            CacheKind::Snapshot => "snapshot",
            CacheKind::AnalystArtifact => "analyst_artifact",
        }
    }
}

/// Canonical cache key shape from spec §3: `{kind}:{symbol?}:{date-bucket}`.
pub fn cache_key(kind: CacheKind, symbol: Option<&str>, date_bucket: &str) -> String {
    match symbol {
        Some(sym) => format!("{}:{}:{}", kind.as_str(), sym, date_bucket),
        None => format!("{}::{}", kind.as_str(), date_bucket),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shape_matches_spec() {
        assert_eq!(
            cache_key(CacheKind::Macro, None, "2026-01-05"),
            "macro::2026-01-05"
        );
        assert_eq!(
            cache_key(CacheKind::AnalystArtifact, Some("000001.SH"), "2026-01-05"),
            "analyst_artifact:000001.SH:2026-01-05"
        );
    }

    #[test]
    fn only_snapshot_is_memory_only() {
        for kind in [
            CacheKind::Macro,
            CacheKind::PolicyNews,
            CacheKind::SectorFlows,
            CacheKind::AnalystArtifact,
        ] {
            assert!(!kind.memory_only());
        }
        assert!(CacheKind::Snapshot.memory_only());
    }
}
