use unicode_segmentation::UnicodeSegmentation;

/// Sub-word segmentation for ideographic runs.
///
/// Emits every single character plus every adjacent character pair, the same
/// shape a dictionary segmenter produces in search mode. Without a dictionary
/// this over-generates slightly, but queries segmented the same way still
/// land on the indexed tokens.
pub fn segment_run(run: &str) -> Vec<String> {
    let chars: Vec<&str> = run.graphemes(true).collect();

    let mut tokens = Vec::with_capacity(chars.len() * 2);
    for ch in &chars {
        tokens.push((*ch).to_string());
    }
    for pair in chars.windows(2) {
        tokens.push(format!("{}{}", pair[0], pair[1]));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_character_run() {
        assert_eq!(segment_run("學"), vec!["學"]);
    }

    #[test]
    fn emits_unigrams_and_bigrams() {
        let tokens = segment_run("學習中");
        assert_eq!(tokens, vec!["學", "習", "中", "學習", "習中"]);
    }

    #[test]
    fn query_tokens_are_a_subset_of_document_tokens() {
        let doc = segment_run("機器學習");
        for token in segment_run("學習") {
            assert!(doc.contains(&token), "missing {}", token);
        }
    }
}
