//! 句子打分与近似去重
//!
//! 分数 = 句中不同实词在全体候选中的词频之和 + 若干加成；
//! 去重按分数从高到低贪心选择，与已选句子 Jaccard ≥ 阈值的跳过。

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::config::PipelineSettings;
use crate::models::{RawSentence, SentenceCandidate};
use crate::services::lexicon::{bare_word, FREQUENCY_ADVERBS, LABEL_WORDS, STOP_WORDS, WH_WORDS};

pub struct SentenceScorer {
    max_candidates: usize,
    similarity_threshold: f64,
}

impl SentenceScorer {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            max_candidates: settings.max_candidates,
            similarity_threshold: settings.similarity_threshold,
        }
    }

    /// 打分、去重、截断，输出按 (页码升序, 分数降序, 发现顺序) 排列
    pub fn rank(&self, sentences: Vec<RawSentence>) -> Vec<SentenceCandidate> {
        let total = sentences.len();
        let kept: Vec<RawSentence> = sentences
            .into_iter()
            .filter(|s| !is_title_or_label(&s.text))
            .collect();
        debug!("排除标题/标签 {} 条", total - kept.len());

        let mut frequency: HashMap<String, usize> = HashMap::new();
        for sentence in &kept {
            for token in tokenize(&sentence.text) {
                if !STOP_WORDS.contains(token.as_str()) {
                    *frequency.entry(token).or_insert(0) += 1;
                }
            }
        }

        let mut scored: Vec<SentenceCandidate> = kept
            .into_iter()
            .map(|s| {
                let tokens: BTreeSet<String> = tokenize(&s.text).into_iter().collect();
                let score = score_sentence(&s.text, &tokens, &frequency);
                SentenceCandidate {
                    id: format!("cand-{}", s.discovery_index),
                    text: s.text,
                    score,
                    tokens,
                    page_number: s.page_number,
                    material_id: s.material_id,
                    discovery_index: s.discovery_index,
                }
            })
            .collect();

        scored.sort_by(by_score_then_position);

        let mut selected: Vec<SentenceCandidate> = Vec::new();
        for candidate in scored {
            if selected.len() >= self.max_candidates {
                break;
            }
            let collides = selected
                .iter()
                .any(|s| jaccard(&s.tokens, &candidate.tokens) >= self.similarity_threshold);
            if collides {
                debug!("近似重复，跳过: {}", candidate.text);
                continue;
            }
            selected.push(candidate);
        }

        selected.sort_by(|a, b| {
            a.page_number
                .cmp(&b.page_number)
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.discovery_index.cmp(&b.discovery_index))
        });
        selected
    }
}

fn by_score_then_position(a: &SentenceCandidate, b: &SentenceCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.page_number.cmp(&b.page_number))
        .then_with(|| a.discovery_index.cmp(&b.discovery_index))
}

/// 小写词序列（字母、数字、撇号）
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(bare_word)
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn score_sentence(text: &str, tokens: &BTreeSet<String>, frequency: &HashMap<String, usize>) -> f64 {
    let mut score: f64 = tokens
        .iter()
        .filter_map(|t| frequency.get(t))
        .map(|f| *f as f64)
        .sum();

    let trimmed = text.trim_end();
    if trimmed.ends_with('?') {
        score += 2.5;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += 1.0;
    }
    if (3..=15).contains(&tokens.len()) {
        score += 1.5;
    }
    if text.contains([',', ';']) {
        score += 0.5;
    }
    if tokens.iter().any(|t| FREQUENCY_ADVERBS.contains(t.as_str())) {
        score += 1.0;
    }
    let first = text.split_whitespace().next().map(bare_word).unwrap_or_default();
    if WH_WORDS.contains(first.as_str()) {
        score += 1.5;
    }
    score
}

/// 标题或标签：没有句末标点，并且很短、大部分大写或以标签词开头
pub fn is_title_or_label(text: &str) -> bool {
    let trimmed = text
        .trim()
        .trim_end_matches(['"', '”', '’', '\'', ')']);
    if trimmed.ends_with(['.', '!', '?']) {
        return false;
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() <= 4 {
        return true;
    }

    let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    if !letters.is_empty() && upper as f64 >= 0.6 * letters.len() as f64 {
        return true;
    }

    let first = tokens.first().map(|t| bare_word(t)).unwrap_or_default();
    LABEL_WORDS.contains(first.as_str())
}
