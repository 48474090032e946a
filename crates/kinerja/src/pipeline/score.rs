use super::domain::collapse_whitespace;

pub const SCORE_KURANG_BAIK: f64 = 65.0;
pub const SCORE_BAIK: f64 = 75.0;
pub const SCORE_SANGAT_BAIK: f64 = 85.0;

/// Legacy low mark some forms still emit; it stands for "kurang baik".
pub const RAW_LOW_MARK: i64 = 10;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Qualitative ratings, compared after trimming, lowercasing and collapsing
/// internal whitespace.
pub const RATING_WORDS: &[(&str, f64)] = &[
    ("kurang baik", SCORE_KURANG_BAIK),
    ("baik", SCORE_BAIK),
    ("sangat baik", SCORE_SANGAT_BAIK),
];

/// Outcome of normalizing one raw cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreCell {
    Blank,
    Score(f64),
    /// Integer that stays outside 0..=100 after bucketing.
    OutOfRange(i64),
    Unrecognized,
}

impl ScoreCell {
    pub fn sample(self) -> Option<f64> {
        match self {
            ScoreCell::Score(score) => Some(score),
            _ => None,
        }
    }
}

pub fn rating_word_score(raw: &str) -> Option<f64> {
    let key = collapse_whitespace(raw).to_lowercase();
    RATING_WORDS
        .iter()
        .find(|(word, _)| *word == key)
        .map(|(_, score)| *score)
}

/// Map a raw integer onto the rating scale. Values between 65 and 75 and
/// below 65 (other than the low mark) pass through unchanged.
pub fn bucket_integer(raw: i64) -> i64 {
    match raw {
        RAW_LOW_MARK | 65 => 65,
        75 => 75,
        76..=100 => 85,
        other => other,
    }
}

pub fn normalize_score(raw: &str) -> ScoreCell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ScoreCell::Blank;
    }

    if let Some(score) = rating_word_score(trimmed) {
        return ScoreCell::Score(score);
    }

    match trimmed.parse::<i64>() {
        Ok(value) => {
            let bucketed = bucket_integer(value);
            let score = bucketed as f64;
            if (MIN_SCORE..=MAX_SCORE).contains(&score) {
                ScoreCell::Score(score)
            } else {
                ScoreCell::OutOfRange(bucketed)
            }
        }
        Err(_) => ScoreCell::Unrecognized,
    }
}

/// Blank, numeric, or a rating word. Used to tell pure score rows from rows
/// that also carry descriptive text.
pub fn is_score_like(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.parse::<f64>().is_ok() || rating_word_score(trimmed).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_words_map_to_fixed_scores() {
        assert_eq!(normalize_score("Baik"), ScoreCell::Score(75.0));
        assert_eq!(normalize_score("sangat baik"), ScoreCell::Score(85.0));
        assert_eq!(normalize_score("  KURANG   baik "), ScoreCell::Score(65.0));
    }

    #[test]
    fn integers_are_bucketed() {
        assert_eq!(normalize_score("10"), ScoreCell::Score(65.0));
        assert_eq!(normalize_score("65"), ScoreCell::Score(65.0));
        assert_eq!(normalize_score("75"), ScoreCell::Score(75.0));
        assert_eq!(normalize_score("90"), ScoreCell::Score(85.0));
        assert_eq!(normalize_score("100"), ScoreCell::Score(85.0));
        assert_eq!(normalize_score("70"), ScoreCell::Score(70.0));
        assert_eq!(normalize_score("40"), ScoreCell::Score(40.0));
    }

    #[test]
    fn out_of_range_and_unknown_values_yield_no_sample() {
        assert_eq!(normalize_score("200"), ScoreCell::OutOfRange(200));
        assert_eq!(normalize_score("-5"), ScoreCell::OutOfRange(-5));
        assert_eq!(normalize_score("cukup"), ScoreCell::Unrecognized);
        assert_eq!(normalize_score("80.5"), ScoreCell::Unrecognized);
        assert_eq!(normalize_score(""), ScoreCell::Blank);
        assert_eq!(normalize_score("   "), ScoreCell::Blank);
        assert!(normalize_score("200").sample().is_none());
    }

    #[test]
    fn score_like_detection() {
        assert!(is_score_like(""));
        assert!(is_score_like("80.5"));
        assert!(is_score_like("Sangat Baik"));
        assert!(!is_score_like("Eselon III"));
    }
}
