//! Semantic Agent: embeds the query text into a deterministic 384-dim unit
//! vector and calls the vector store. The embedding algorithm is pinned from
//! the original implementation (MD5 seed → seeded PRNG → Box-Muller normal
//! samples → L2 normalize) so tests can reproduce results without an
//! embedding service.

use std::sync::Arc;

use md5::{Digest, Md5};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::models::{AgentResult, ErrorResult, Intent};
use crate::services::adapters::{SemanticFilters, VectorAdapter};

const EMBEDDING_DIM: usize = 384;
const EMBEDDING_STD: f64 = 0.1;
const BASE_MIN_SCORE: f64 = 0.5;
const BROADENED_SCORE_DROP: f64 = 0.1;
const MAX_BROADENED_K: usize = 20;

pub struct SemanticAgent {
    vector: Arc<dyn VectorAdapter>,
    known_regions: Vec<String>,
}

impl SemanticAgent {
    pub fn new(vector: Arc<dyn VectorAdapter>, known_regions: Vec<String>) -> Self {
        Self { vector, known_regions }
    }

    pub async fn run(&self, query: &str, intent: &Intent) -> AgentResult {
        let lower = query.to_lowercase();
        let embedding = embed_query(&lower);
        let region = self.known_regions.iter().find(|r| lower.contains(r.as_str())).cloned();
        let filters = SemanticFilters {
            region,
            time_range: intent.temporal_bounds,
            parameter: intent.parameters.first().copied(),
        };

        // `broaden_semantic` lowers the min-score bar and doubles k (capped
        // at 20), per the Refiner's contract for this suggestion.
        let (k, min_score) = if intent.flags.semantic_broadened {
            ((intent.limit * 2).min(MAX_BROADENED_K), (BASE_MIN_SCORE - BROADENED_SCORE_DROP).max(0.0))
        } else {
            (intent.limit, BASE_MIN_SCORE)
        };

        match self.vector.semantic_search(&embedding, k, filters).await {
            Ok(hits) => AgentResult::Semantic { hits: hits.into_iter().filter(|h| h.score >= min_score).collect() },
            Err(e) => AgentResult::Error(ErrorResult { agent: "semantic", message: e.message, retriable: e.retriable }),
        }
    }
}

/// Deterministic query embedding: lowercase input is assumed by the caller.
/// MD5 digest's first 4 bytes become a PRNG seed; 384 samples are drawn from
/// `Normal(0, EMBEDDING_STD)` via Box-Muller, then the vector is L2-normalized.
/// A zero norm (only possible if every sample rounds to exactly 0.0, which
/// does not happen in practice) is returned unchanged rather than divided by.
pub(crate) fn embed_query(lowercased_query: &str) -> [f32; EMBEDDING_DIM] {
    let mut hasher = Md5::new();
    hasher.update(lowercased_query.as_bytes());
    let digest = hasher.finalize();
    let seed = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);

    let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
    let mut values = [0.0f64; EMBEDDING_DIM];
    let mut i = 0;
    while i < EMBEDDING_DIM {
        let (z0, z1) = box_muller_pair(&mut rng);
        values[i] = z0 * EMBEDDING_STD;
        i += 1;
        if i < EMBEDDING_DIM {
            values[i] = z1 * EMBEDDING_STD;
            i += 1;
        }
    }

    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    let mut out = [0.0f32; EMBEDDING_DIM];
    if norm == 0.0 {
        return out;
    }
    for (o, v) in out.iter_mut().zip(values.iter()) {
        *o = (v / norm) as f32;
    }
    out
}

fn box_muller_pair(rng: &mut ChaCha8Rng) -> (f64, f64) {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let radius = (-2.0 * u1.ln()).sqrt();
    let angle = 2.0 * std::f64::consts::PI * u2;
    (radius * angle.cos(), radius * angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentKind, AgentMask, IntentFlags, SemanticHit};
    use crate::services::adapters::StubVectorAdapter;
    use chrono::Utc;

    #[test]
    fn embedding_is_deterministic_and_unit_length() {
        let a = embed_query("temperature near the equator");
        let b = embed_query("temperature near the equator");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn different_queries_embed_differently() {
        let a = embed_query("temperature near the equator");
        let b = embed_query("salinity in the arabian sea");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn run_delegates_to_vector_adapter_with_limit() {
        let now = Utc::now();
        let vector = Arc::new(StubVectorAdapter::new(vec![
            SemanticHit { platform_id: "a".into(), time: now, text: "x".into(), score: 0.9 },
            SemanticHit { platform_id: "b".into(), time: now, text: "y".into(), score: 0.4 },
        ]));
        let agent = SemanticAgent::new(vector, vec!["arabian sea".to_string()]);

        let intent = Intent {
            float_id: None,
            spatial_bounds: None,
            temporal_bounds: None,
            parameters: Vec::new(),
            agent_mask: AgentMask::new(&[AgentKind::Semantic]).unwrap(),
            flags: IntentFlags::default(),
            limit: 1,
        };

        let result = agent.run("similar profiles in the arabian sea", &intent).await;
        match result {
            AgentResult::Semantic { hits } => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].platform_id, "a");
            }
            other => panic!("expected Semantic, got {other:?}"),
        }
    }
}
