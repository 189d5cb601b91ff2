// 🔑 Keyword Scorer
// Scores a normalized description against one bucket of keywords.
// Shared by the category and origin classifiers.

/// Score for a keyword found verbatim inside the description
pub const EXACT_MATCH_SCORE: f64 = 0.8;

/// Score for each token that overlaps a keyword (plurals, fragments)
pub const TOKEN_MATCH_SCORE: f64 = 0.2;

/// Score a normalized description against an ordered keyword list.
///
/// Each keyword contributes [`EXACT_MATCH_SCORE`] when it is a substring of the
/// whole description, plus [`TOKEN_MATCH_SCORE`] for every description token that
/// is a substring of the keyword or contains it. The total is clamped to `[0, 1]`.
pub fn keyword_score<S: AsRef<str>>(description: &str, keywords: &[S]) -> f64 {
    if description.is_empty() {
        return 0.0;
    }

    let tokens: Vec<&str> = description.split_whitespace().collect();
    let mut score = 0.0;

    for keyword in keywords {
        let keyword = keyword.as_ref().to_lowercase();
        if keyword.is_empty() {
            continue;
        }

        if description.contains(keyword.as_str()) {
            score += EXACT_MATCH_SCORE;
        }

        for token in &tokens {
            if token.contains(keyword.as_str()) || keyword.contains(token) {
                score += TOKEN_MATCH_SCORE;
            }
        }
    }

    score.clamp(0.0, 1.0)
}

/// Keywords that appear verbatim in the description, in list order
pub fn matched_keywords<S: AsRef<str>>(description: &str, keywords: &[S]) -> Vec<String> {
    if description.is_empty() {
        return Vec::new();
    }

    keywords
        .iter()
        .map(|k| k.as_ref().to_lowercase())
        .filter(|k| !k.is_empty() && description.contains(k.as_str()))
        .collect()
}
