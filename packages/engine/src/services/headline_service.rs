use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::error::GameError;
use crate::models::headline::{Difficulty, Headline};

const BUNDLED_CATALOG: &str = include_str!("../../data/headlines.json");

/// Supplier of pre-classified headlines.
pub trait HeadlineSource: Send {
    fn next_headline(
        &mut self,
        difficulty: Difficulty,
        category: Option<&str>,
    ) -> Result<Headline, GameError>;
}

/// Builds one headline source per session from that session's seed.
pub type HeadlineSourceFactory = Arc<dyn Fn(u64) -> Box<dyn HeadlineSource> + Send + Sync>;

pub fn parse_catalog(json: &str) -> Result<Vec<Headline>, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn bundled_catalog() -> Result<Arc<Vec<Headline>>, serde_json::Error> {
    parse_catalog(BUNDLED_CATALOG).map(Arc::new)
}

/// In-memory deck over a shared catalog. Never serves the same headline
/// twice.
pub struct HeadlineDeck {
    catalog: Arc<Vec<Headline>>,
    served: HashSet<String>,
    rng: StdRng,
}

impl HeadlineDeck {
    pub fn new(catalog: Arc<Vec<Headline>>, seed: u64) -> Self {
        Self {
            catalog,
            served: HashSet::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn factory(catalog: Arc<Vec<Headline>>) -> HeadlineSourceFactory {
        Arc::new(move |seed: u64| -> Box<dyn HeadlineSource> {
            Box::new(HeadlineDeck::new(catalog.clone(), seed))
        })
    }

    pub fn remaining(&self) -> usize {
        self.catalog.len() - self.served.len()
    }
}

impl HeadlineSource for HeadlineDeck {
    fn next_headline(
        &mut self,
        difficulty: Difficulty,
        category: Option<&str>,
    ) -> Result<Headline, GameError> {
        let candidates: Vec<&Headline> = self
            .catalog
            .iter()
            .filter(|h| !self.served.contains(&h.id))
            .filter(|h| category.map_or(true, |c| h.category.eq_ignore_ascii_case(c)))
            .collect();

        let exact: Vec<&Headline> = candidates
            .iter()
            .copied()
            .filter(|h| h.difficulty == difficulty)
            .collect();
        // 同じ難易度が尽きたら他の難易度で代用する
        let pool = if exact.is_empty() { &candidates } else { &exact };

        let Some(picked) = pool.choose(&mut self.rng).map(|h| (*h).clone()) else {
            warn!(
                "Headline deck exhausted (difficulty={}, category={:?})",
                difficulty, category
            );
            return Err(GameError::NoHeadlineAvailable);
        };

        self.served.insert(picked.id.clone());
        debug!(
            "Serving headline {} ({}), {} left in deck",
            picked.id,
            picked.difficulty,
            self.remaining()
        );
        Ok(picked)
    }
}

/// Serves a fixed sequence of headlines in order, ignoring the filters.
pub struct ScriptedHeadlines {
    queue: VecDeque<Headline>,
}

impl ScriptedHeadlines {
    pub fn new(headlines: impl IntoIterator<Item = Headline>) -> Self {
        Self {
            queue: headlines.into_iter().collect(),
        }
    }
}

impl HeadlineSource for ScriptedHeadlines {
    fn next_headline(
        &mut self,
        _difficulty: Difficulty,
        _category: Option<&str>,
    ) -> Result<Headline, GameError> {
        self.queue.pop_front().ok_or(GameError::NoHeadlineAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_parses() {
        let catalog = bundled_catalog().unwrap();
        assert_eq!(catalog.len(), 10);
        assert!(catalog.iter().any(|h| h.is_true));
        assert!(catalog.iter().any(|h| !h.is_true));
    }

    #[test]
    fn test_never_serves_twice() {
        let catalog = bundled_catalog().unwrap();
        let mut deck = HeadlineDeck::new(catalog.clone(), 7);
        let mut ids = HashSet::new();
        for _ in 0..catalog.len() {
            let headline = deck.next_headline(Difficulty::Medium, None).unwrap();
            assert!(ids.insert(headline.id));
        }
        assert_eq!(deck.remaining(), 0);
        assert_eq!(
            deck.next_headline(Difficulty::Medium, None),
            Err(GameError::NoHeadlineAvailable)
        );
    }

    #[test]
    fn test_prefers_exact_difficulty_then_falls_back() {
        let catalog = bundled_catalog().unwrap();
        let mut deck = HeadlineDeck::new(catalog, 1);
        // 難しい見出しは 1 件だけ
        let first = deck.next_headline(Difficulty::Hard, None).unwrap();
        assert_eq!(first.difficulty, Difficulty::Hard);
        let second = deck.next_headline(Difficulty::Hard, None).unwrap();
        assert_ne!(second.difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_category_is_always_honoured() {
        let catalog = bundled_catalog().unwrap();
        let mut deck = HeadlineDeck::new(catalog, 3);
        for _ in 0..4 {
            let headline = deck.next_headline(Difficulty::Hard, Some("health")).unwrap();
            assert_eq!(headline.category, "health");
        }
        assert_eq!(
            deck.next_headline(Difficulty::Hard, Some("health")),
            Err(GameError::NoHeadlineAvailable)
        );
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let catalog = bundled_catalog().unwrap();
        let mut a = HeadlineDeck::new(catalog.clone(), 99);
        let mut b = HeadlineDeck::new(catalog, 99);
        for _ in 0..5 {
            assert_eq!(
                a.next_headline(Difficulty::Easy, None).unwrap().id,
                b.next_headline(Difficulty::Easy, None).unwrap().id
            );
        }
    }
}
