//! Evidence store: free-text passages (interview verbatims, feedback cells,
//! user notes) retrievable by text similarity with an optional segment filter.
//!
//! The in-memory store ranks by token overlap (cosine over token sets after
//! NFKC normalization). Ranking quality is not a goal; stable ordering is.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use unicode_normalization::UnicodeNormalization;

use crate::error::{ClarityMindError, Result};

const STOPWORDS: &[&str] = &[
    "the", "and", "or", "a", "an", "to", "of", "in", "on", "for", "with", "is", "are", "be",
    "this", "that", "it", "i", "my", "we", "was", "me",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvidenceHit {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub score: f32,
}

impl EvidenceHit {
    pub fn segment(&self) -> Option<&str> {
        self.metadata.get("segment").map(String::as_str)
    }
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Add passages. The three vectors must have equal length; an existing id
    /// is replaced. Returns the number of passages stored.
    async fn add(
        &self,
        documents: Vec<String>,
        metadata: Vec<BTreeMap<String, String>>,
        ids: Vec<String>,
    ) -> Result<usize>;

    /// Up to `k` passages most similar to `text`, restricted to `segment` when given
    async fn query(&self, text: &str, k: usize, segment: Option<&str>) -> Result<Vec<EvidenceHit>>;

    async fn delete_all(&self) -> Result<()>;

    async fn len(&self) -> usize;
}

struct StoredPassage {
    id: String,
    text: String,
    metadata: BTreeMap<String, String>,
    tokens: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryEvidenceStore {
    passages: RwLock<Vec<StoredPassage>>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Lowercased NFKC word tokens without stopwords
pub fn tokenize(text: &str) -> HashSet<String> {
    let normalized: String = text.nfkc().collect::<String>().to_lowercase();
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

fn overlap_score(query: &HashSet<String>, doc: &HashSet<String>) -> f32 {
    if query.is_empty() || doc.is_empty() {
        return 0.0;
    }
    let shared = query.intersection(doc).count() as f32;
    shared / ((query.len() * doc.len()) as f32).sqrt()
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn add(
        &self,
        documents: Vec<String>,
        metadata: Vec<BTreeMap<String, String>>,
        ids: Vec<String>,
    ) -> Result<usize> {
        if documents.len() != metadata.len() || documents.len() != ids.len() {
            return Err(ClarityMindError::InvalidParams {
                message: format!(
                    "evidence add length mismatch: {} documents, {} metadata, {} ids",
                    documents.len(),
                    metadata.len(),
                    ids.len()
                ),
            });
        }

        let mut passages = self.passages.write().await;
        let count = documents.len();
        for ((text, metadata), id) in documents.into_iter().zip(metadata).zip(ids) {
            let tokens = tokenize(&text);
            let passage = StoredPassage {
                id,
                text,
                metadata,
                tokens,
            };
            if let Some(existing) = passages.iter_mut().find(|p| p.id == passage.id) {
                *existing = passage;
            } else {
                passages.push(passage);
            }
        }
        tracing::debug!(added = count, total = passages.len(), "evidence stored");
        Ok(count)
    }

    async fn query(&self, text: &str, k: usize, segment: Option<&str>) -> Result<Vec<EvidenceHit>> {
        let query_tokens = tokenize(text);
        let passages = self.passages.read().await;

        let mut scored: Vec<(usize, f32)> = passages
            .iter()
            .enumerate()
            .filter(|(_, p)| match segment {
                Some(seg) => p
                    .metadata
                    .get("segment")
                    .is_some_and(|s| s.eq_ignore_ascii_case(seg)),
                None => true,
            })
            .map(|(i, p)| (i, overlap_score(&query_tokens, &p.tokens)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        // Highest score first, insertion order breaks ties
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| {
                let p = &passages[i];
                EvidenceHit {
                    id: p.id.clone(),
                    text: p.text.clone(),
                    metadata: p.metadata.clone(),
                    score,
                }
            })
            .collect())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut passages = self.passages.write().await;
        let dropped = passages.len();
        passages.clear();
        tracing::info!(dropped, "evidence store cleared");
        Ok(())
    }

    async fn len(&self) -> usize {
        self.passages.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(segment: &str) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("segment".to_string(), segment.to_string());
        m
    }

    async fn seeded() -> InMemoryEvidenceStore {
        let store = InMemoryEvidenceStore::new();
        store
            .add(
                vec![
                    "Cancelled because the price was too high".into(),
                    "I stopped using it, price kept going up".into(),
                    "Love the streak reminders".into(),
                ],
                vec![meta("Gen Z"), meta("Power Users"), meta("Gen Z")],
                vec!["a".into(), "b".into(), "c".into()],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_query_ranks_by_overlap_and_respects_k() {
        let store = seeded().await;
        let hits = store.query("price too high", 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_segment_filter() {
        let store = seeded().await;
        let hits = store.query("price", 5, Some("power users")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
        assert_eq!(hits[0].segment(), Some("Power Users"));
    }

    #[tokio::test]
    async fn test_add_rejects_mismatched_lengths_and_replaces_ids() {
        let store = seeded().await;
        let err = store
            .add(vec!["x".into()], vec![], vec!["x".into()])
            .await;
        assert!(err.is_err());

        store
            .add(vec!["price is fine now".into()], vec![meta("Gen Z")], vec!["a".into()])
            .await
            .unwrap();
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_delete_all_empties_store() {
        let store = seeded().await;
        store.delete_all().await.unwrap();
        assert_eq!(store.len().await, 0);
        assert!(store.query("price", 3, None).await.unwrap().is_empty());
    }
}
