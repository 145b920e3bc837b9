use std::collections::HashMap;

use crate::analysis::{self, ScriptStreams};

/// Weight applied to tokens coming from the title field.
pub const TITLE_WEIGHT: f32 = 1.0;
/// Weight applied to tokens coming from the description field.
pub const DESCRIPTION_WEIGHT: f32 = 0.4;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TermWeights {
    pub title: u32, // occurrences at title weight
    pub body: u32,  // occurrences at description weight
}

/// Inverted index over one text channel in one script stream.
#[derive(Debug, Clone, Default)]
pub struct ChannelIndex {
    terms: HashMap<String, TermWeights>,
    len: usize, // total token count across both weights
}

impl ChannelIndex {
    fn add(&mut self, tokens: &[String], titled: bool) {
        for token in tokens {
            let entry = self.terms.entry(token.clone()).or_default();
            if titled {
                entry.title += 1;
            } else {
                entry.body += 1;
            }
        }
        self.len += tokens.len();
    }

    /// Phrase semantics: every query token must be present.
    /// Callers guard against empty queries (which match everything).
    pub fn matches_all(&self, query: &[String]) -> bool {
        query.iter().all(|token| self.terms.contains_key(token))
    }

    /// Weighted term-frequency score with per-term saturation, so one field
    /// stuffed with a repeated token cannot dominate the ranking.
    pub fn score(&self, query: &[String]) -> f32 {
        let mut score = 0.0;
        for token in query {
            if let Some(weights) = self.terms.get(token) {
                let weighted =
                    weights.title as f32 * TITLE_WEIGHT + weights.body as f32 * DESCRIPTION_WEIGHT;
                score += weighted / (1.0 + weighted);
            }
        }
        score
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One channel duplicated per script stream.
#[derive(Debug, Clone, Default)]
pub struct ScriptIndex {
    pub han: ChannelIndex,
    pub latin: ChannelIndex,
}

impl ScriptIndex {
    fn from_fields(titled: Option<&str>, body: Option<&str>) -> Self {
        let mut index = ScriptIndex::default();
        if let Some(text) = titled {
            let streams = analysis::split(text);
            index.han.add(&streams.han, true);
            index.latin.add(&streams.latin, true);
        }
        if let Some(text) = body {
            let streams = analysis::split(text);
            index.han.add(&streams.han, false);
            index.latin.add(&streams.latin, false);
        }
        index
    }
}

/// Search index entry owned by a single resource. Lifecycle mirrors the
/// resource: built on insert, rebuilt on every content mutation, removed on
/// delete.
#[derive(Debug, Clone, Default)]
pub struct IndexEntry {
    pub title_desc: ScriptIndex,
    pub notes: ScriptIndex,
}

impl IndexEntry {
    pub fn build(title: &str, description: &str, notes: &str) -> Self {
        IndexEntry {
            title_desc: ScriptIndex::from_fields(Some(title), Some(description)),
            notes: ScriptIndex::from_fields(Some(notes), None),
        }
    }

    /// Session entries carry only the notes channel.
    pub fn notes_only(notes: &str) -> Self {
        IndexEntry {
            title_desc: ScriptIndex::default(),
            notes: ScriptIndex::from_fields(Some(notes), None),
        }
    }

    /// A resource matches when, for each non-empty script query, either the
    /// title+description channel or the notes channel holds all tokens of
    /// that script. An entirely empty query matches everything (unfiltered
    /// listing).
    pub fn matches(&self, query: &ScriptStreams) -> bool {
        let han_ok = query.han.is_empty()
            || self.title_desc.han.matches_all(&query.han)
            || self.notes.han.matches_all(&query.han);
        let latin_ok = query.latin.is_empty()
            || self.title_desc.latin.matches_all(&query.latin)
            || self.notes.latin.matches_all(&query.latin);
        han_ok && latin_ok
    }

    /// Relevance sums per-script scores over the title+description channel
    /// only; notes matches keep a resource in the result set but contribute
    /// nothing here.
    pub fn relevance(&self, query: &ScriptStreams) -> f32 {
        self.title_desc.han.score(&query.han) + self.title_desc.latin.score(&query.latin)
    }

    /// Relevance for kinds whose only channel is notes (sessions).
    pub fn notes_relevance(&self, query: &ScriptStreams) -> f32 {
        self.notes.han.score(&query.han) + self.notes.latin.score(&query.latin)
    }
}
