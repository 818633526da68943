//! Lightweight language detection
//!
//! A stopword-count heuristic over the languages the platform actually
//! serves (English and Indonesian). The tag is stored for display and
//! analytics and drives keyword-rule selection in routing; a wrong guess
//! degrades ranking slightly, nothing more.

const ENGLISH_STOPWORDS: &[&str] = &[
    "the", "is", "are", "and", "of", "to", "in", "for", "with", "on", "what", "how", "do",
    "does", "can", "you", "your", "a", "an", "it",
];

const INDONESIAN_STOPWORDS: &[&str] = &[
    "yang", "dan", "di", "ini", "itu", "untuk", "dengan", "apa", "bagaimana", "berapa",
    "saya", "anda", "tidak", "bisa", "ada", "ke", "dari", "atau", "kalau", "ya",
];

/// Detect the dominant language of a text. Defaults to English when the
/// signal is too weak to call.
pub fn detect_language(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let en = words
        .iter()
        .filter(|w| ENGLISH_STOPWORDS.contains(*w))
        .count();
    let id = words
        .iter()
        .filter(|w| INDONESIAN_STOPWORDS.contains(*w))
        .count();

    if id > en {
        "id"
    } else {
        "en"
    }
}

/// Word count of a text, the token-cost proxy stored per chunk
pub fn word_count(text: &str) -> i32 {
    text.split_whitespace().count() as i32
}
