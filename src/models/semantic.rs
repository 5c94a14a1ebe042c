use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single vector-store match. Ordering across a result set is
/// score-descending, ties broken by `time` descending — callers must not
/// re-sort by any other key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticHit {
    pub platform_id: String,
    pub time: DateTime<Utc>,
    pub text: String,
    pub score: f64,
}

impl SemanticHit {
    /// Comparator implementing the mandated ordering: score desc, then time desc.
    pub fn cmp_rank(a: &SemanticHit, b: &SemanticHit) -> std::cmp::Ordering {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.time.cmp(&a.time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: f64, time: DateTime<Utc>) -> SemanticHit {
        SemanticHit { platform_id: "f".into(), time, text: String::new(), score }
    }

    #[test]
    fn orders_by_score_then_time_desc() {
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(1);
        let mut hits = vec![hit(0.5, t2), hit(0.9, t1), hit(0.9, t2)];
        hits.sort_by(SemanticHit::cmp_rank);
        assert_eq!(hits[0].time, t2);
        assert_eq!(hits[0].score, 0.9);
        assert_eq!(hits[1].score, 0.9);
        assert_eq!(hits[2].score, 0.5);
    }
}
