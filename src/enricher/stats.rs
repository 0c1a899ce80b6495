use serde::Serialize;

/// Counters kept by a [`DataEnricher`](super::merge::DataEnricher) over its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrichmentStats {
    pub total_processed: usize,
    pub successfully_enriched: usize,
    pub failed_enrichment: usize,
}

impl EnrichmentStats {
    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of processed records that were enriched, as a percentage.
    pub fn success_rate(&self) -> f64 {
        Self::pct(self.successfully_enriched, self.total_processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(EnrichmentStats::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(EnrichmentStats::pct(50, 100), 50.0);
        assert_eq!(EnrichmentStats::pct(1, 4), 25.0);
    }

    #[test]
    fn test_success_rate() {
        let stats = EnrichmentStats {
            total_processed: 8,
            successfully_enriched: 6,
            failed_enrichment: 2,
        };
        assert_eq!(stats.success_rate(), 75.0);
        assert_eq!(EnrichmentStats::default().success_rate(), 0.0);
    }
}
