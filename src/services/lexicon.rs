//! 抽句和打分共用的英文词表（全部小写）

use phf::{phf_set, Set};

/// 停用词：不参与词频打分
pub static STOP_WORDS: Set<&'static str> = phf_set! {
    "a", "an", "the", "and", "or", "but", "so", "if", "then", "than", "because",
    "as", "of", "in", "on", "at", "to", "for", "from", "with", "by", "about",
    "into", "over", "after", "before", "up", "down", "out", "off",
    "i", "me", "my", "mine", "we", "us", "our", "you", "your", "he", "him", "his",
    "she", "her", "it", "its", "they", "them", "their", "this", "that", "these",
    "those", "there", "here",
    "is", "am", "are", "was", "were", "be", "been", "being", "do", "does", "did",
    "have", "has", "had", "will", "would", "can", "could", "shall", "should",
    "may", "might", "must",
    "not", "no", "yes", "very", "too", "also", "just", "all", "some", "any",
    "let's", "it's", "i'm", "don't", "doesn't", "can't",
};

/// 连接词：兜底切分时出现在前一个词位置就不切
pub static CONNECTORS: Set<&'static str> = phf_set! {
    "and", "or", "but", "so", "because", "that", "which", "who", "when", "while",
    "if", "than", "then", "to", "of", "the", "a", "an", "said", "says", "ask",
    "asks", "asked", "tell", "tells", "told", "called", "named", "like", "likes",
    "meet", "with", "from", "visit", "visits", "dear", "mr", "mrs", "ms",
    "miss", "mr.", "mrs.", "ms.", "dr.",
};

/// 频度副词：打分加成
pub static FREQUENCY_ADVERBS: Set<&'static str> = phf_set! {
    "always", "usually", "often", "sometimes", "seldom", "rarely", "never",
    "normally", "generally", "frequently", "occasionally", "hardly", "ever",
};

/// 疑问词
pub static WH_WORDS: Set<&'static str> = phf_set! {
    "what", "where", "when", "who", "whom", "whose", "which", "why", "how",
};

/// 兜底切分时可以作为新句开头的词（疑问词另算）
pub static SENTENCE_STARTERS: Set<&'static str> = phf_set! {
    "i", "we", "let's", "you", "he", "she", "they", "it", "this", "there",
};

/// 标题/标签的首词：星期、月份、学科、教材结构词
pub static LABEL_WORDS: Set<&'static str> = phf_set! {
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december",
    "english", "chinese", "maths", "math", "science", "music", "art", "pe",
    "history", "geography", "biology", "physics", "chemistry", "politics",
    "unit", "lesson", "module", "chapter", "part", "section", "topic", "page",
    "exercise", "review", "vocabulary", "grammar", "listening",
    "reading", "writing", "speaking",
};

/// 小写词形：去掉首尾标点（保留词内撇号）
pub fn bare_word(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .trim_matches('\'')
        .to_lowercase()
}
