use std::sync::LazyLock;

use regex::Regex;

use crate::analysis::segmenter::segment_run;

static HAN_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Han}+").unwrap());
static LATIN_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z0-9]+").unwrap());

/// Two disjoint token streams extracted from one piece of text: an
/// ideographic stream and a Latin/digit stream. Everything outside the two
/// scripts (punctuation, whitespace, emoji) is dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptStreams {
    pub han: Vec<String>,
    pub latin: Vec<String>,
}

impl ScriptStreams {
    pub fn is_empty(&self) -> bool {
        self.han.is_empty() && self.latin.is_empty()
    }
}

/// Splits free text into its per-script token streams. Han runs are
/// re-segmented into sub-word tokens; Latin/digit runs are lowercased and
/// used as-is. Documents and query phrases go through the same split so
/// their tokens line up.
pub fn split(text: &str) -> ScriptStreams {
    let mut han = Vec::new();
    for run in HAN_RUNS.find_iter(text) {
        han.extend(segment_run(run.as_str()));
    }

    let latin = LATIN_RUNS
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    ScriptStreams { han, latin }
}
