/// Selection policy: performance first, bounded by freshness
///
/// Candidates are ranked by source priority (the `SourceKind` order). The
/// first candidate younger than the freshness threshold wins. When every
/// candidate is stale, source priority is ignored and the newest one wins;
/// equal timestamps go to the higher-priority source.
use crate::types::FetchResult;
use chrono::{DateTime, Duration, Utc};

pub fn select_candidate(
    candidates: Vec<FetchResult>,
    now: DateTime<Utc>,
    fresh_threshold: Duration,
    schema_version: &str,
) -> Option<FetchResult> {
    let mut usable: Vec<FetchResult> = candidates
        .into_iter()
        .filter(|candidate| candidate.is_usable(schema_version))
        .collect();

    // Stable, so equal priorities keep arrival order
    usable.sort_by_key(|candidate| candidate.source);

    if let Some(pos) = usable
        .iter()
        .position(|candidate| candidate.is_fresh(now, fresh_threshold))
    {
        return Some(usable.swap_remove(pos));
    }

    let mut newest: Option<FetchResult> = None;
    for candidate in usable {
        let replace = match &newest {
            Some(best) => candidate.generated_at > best.generated_at,
            None => true,
        };
        if replace {
            newest = Some(candidate);
        }
    }
    newest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use serde_json::{json, Value};

    const SCHEMA: &str = "1.0.0";

    fn candidate(source: SourceKind, age_secs: i64, now: DateTime<Utc>) -> FetchResult {
        FetchResult::new(
            json!({ "from": source.as_str() }),
            now - Duration::seconds(age_secs),
            source,
            SCHEMA,
        )
    }

    fn threshold() -> Duration {
        Duration::minutes(5)
    }

    #[test]
    fn test_first_fresh_by_priority_wins() {
        let now = Utc::now();
        let candidates = vec![
            candidate(SourceKind::LiveSource, 0, now),
            candidate(SourceKind::RemoteCacheMiss, 10, now),
            candidate(SourceKind::RemoteCacheHit, 120, now),
        ];

        let winner = select_candidate(candidates, now, threshold(), SCHEMA).unwrap();
        assert_eq!(winner.source, SourceKind::RemoteCacheHit);
    }

    #[test]
    fn test_stale_higher_priority_skipped_for_fresh() {
        let now = Utc::now();
        let candidates = vec![
            candidate(SourceKind::PersistentStore, 900, now),
            candidate(SourceKind::RemoteCacheHit, 600, now),
            candidate(SourceKind::LiveSource, 1, now),
        ];

        let winner = select_candidate(candidates, now, threshold(), SCHEMA).unwrap();
        assert_eq!(winner.source, SourceKind::LiveSource);
    }

    #[test]
    fn test_all_stale_newest_wins_regardless_of_priority() {
        let now = Utc::now();
        let candidates = vec![
            candidate(SourceKind::PersistentStore, 3600, now),
            candidate(SourceKind::RemoteCacheHit, 1200, now),
            candidate(SourceKind::LiveSource, 301, now),
            candidate(SourceKind::RemoteCacheMiss, 900, now),
        ];

        let winner = select_candidate(candidates, now, threshold(), SCHEMA).unwrap();
        assert_eq!(winner.source, SourceKind::LiveSource);
    }

    #[test]
    fn test_threshold_boundary_is_stale() {
        let now = Utc::now();
        let candidates = vec![
            candidate(SourceKind::RemoteCacheHit, 300, now),
            candidate(SourceKind::LiveSource, 299, now),
        ];

        let winner = select_candidate(candidates, now, threshold(), SCHEMA).unwrap();
        assert_eq!(winner.source, SourceKind::LiveSource);
    }

    #[test]
    fn test_equal_timestamps_prefer_priority() {
        let now = Utc::now();
        let at = now - Duration::minutes(30);
        let candidates = vec![
            FetchResult::new(json!("live"), at, SourceKind::LiveSource, SCHEMA),
            FetchResult::new(json!("miss"), at, SourceKind::RemoteCacheMiss, SCHEMA),
        ];

        let winner = select_candidate(candidates, now, threshold(), SCHEMA).unwrap();
        assert_eq!(winner.source, SourceKind::RemoteCacheMiss);
        assert_eq!(winner.payload, json!("miss"));
    }

    #[test]
    fn test_unusable_candidates_filtered() {
        let now = Utc::now();
        let candidates = vec![
            FetchResult::new(Value::Null, now, SourceKind::RemoteCacheHit, SCHEMA),
            FetchResult::new(json!(1), now, SourceKind::RemoteCacheMiss, "0.9.0"),
        ];
        assert!(select_candidate(candidates, now, threshold(), SCHEMA).is_none());
        assert!(select_candidate(Vec::new(), now, threshold(), SCHEMA).is_none());
    }
}
