//! 句子抽取 - 业务能力层
//!
//! 只负责"从一段文本里抽出候选英文句子"，不关心素材来源和后续打分。
//!
//! 处理顺序：
//! 1. 按空行 / 标题行切块，块内多行拼成一行
//! 2. 主规则：大写字母开头、句末标点结尾
//! 3. 引号内的片段单独收集
//! 4. 主规则结果太少时走兜底切分（标点切分 + 无标点长句软切分）
//! 5. 逐句校验，大小写不敏感去重

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use crate::config::PipelineSettings;
use crate::error::Result;
use crate::models::{Material, RawSentence};
use crate::services::lexicon::{bare_word, CONNECTORS, SENTENCE_STARTERS, STOP_WORDS, WH_WORDS};

const HEADING_PATTERN: &str = r"^(?i)(?:unit|lesson|module|chapter|part|section|topic)\s+(?:\d+|x{1,3}(?:ix|iv|v?i{0,3})|ix|iv|v?i{1,3}|v|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)(?:[\s:：.\-–—·]+|$)";
const LIST_MARKER_PATTERN: &str = r"^(?:[-*•·●▪]+|\(?\d{1,3}[.)、]|\(?[a-hA-H][.)])\s+";

pub struct TextExtractor {
    primary: Regex,
    quoted: Regex,
    heading: Regex,
    list_marker: Regex,
    terminated_piece: Regex,
    min_primary_sentences: usize,
    min_chars: usize,
    max_chars: usize,
}

impl TextExtractor {
    pub fn new(settings: &PipelineSettings) -> Result<Self> {
        Ok(Self {
            primary: Regex::new(r"[A-Z][^.!?]*[.!?]+")?,
            quoted: Regex::new(r#""([^"]+)"|“([^”]+)”"#)?,
            heading: Regex::new(HEADING_PATTERN)?,
            list_marker: Regex::new(LIST_MARKER_PATTERN)?,
            terminated_piece: Regex::new(r"[^.!?]+[.!?]*")?,
            min_primary_sentences: settings.min_primary_sentences,
            min_chars: settings.min_sentence_chars,
            max_chars: settings.max_sentence_chars,
        })
    }

    /// 从一段文本中抽取候选句（发现顺序）
    pub fn extract(&self, text: &str) -> Vec<String> {
        let blocks = self.split_blocks(text);
        let mut seen = HashSet::new();
        let mut sentences = Vec::new();

        for block in &blocks {
            let primary = self.primary.find_iter(block).map(|m| m.as_str());
            let quoted = self
                .quoted
                .captures_iter(block)
                .filter_map(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str());

            for raw in primary.chain(quoted) {
                self.push_accepted(raw, &mut seen, &mut sentences);
            }
        }

        if sentences.len() < self.min_primary_sentences {
            debug!(
                "主规则只找到 {} 句，启用兜底切分",
                sentences.len()
            );
            for block in &blocks {
                for piece in self.terminated_piece.find_iter(block) {
                    for part in soft_split(piece.as_str()) {
                        self.push_accepted(&part, &mut seen, &mut sentences);
                    }
                }
            }
        }

        sentences
    }

    /// 抽取素材每一页的句子，返回句子总数
    pub fn extract_material(&self, material: &mut Material) -> usize {
        for page in material.pages.iter_mut() {
            page.sentences = self.extract(&page.text);
        }
        material.sentence_count()
    }

    /// 校验并清理一个候选片段，不合格时返回 None
    pub fn accept(&self, raw: &str) -> Option<String> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let without_marker = self.list_marker.replace(&normalized, "");
        let without_heading = self.heading.replace(&without_marker, "");
        let sentence = without_heading.trim();

        let char_count = sentence.chars().count();
        if char_count < self.min_chars || char_count > self.max_chars {
            return None;
        }

        let ascii_letters = sentence.chars().filter(|c| c.is_ascii_alphabetic()).count();
        if ascii_letters < 4 {
            return None;
        }

        let non_space = sentence.chars().filter(|c| !c.is_whitespace()).count();
        let alphabetic = sentence.chars().filter(|c| c.is_alphabetic()).count();
        if (alphabetic as f64) < 0.6 * non_space as f64 {
            return None;
        }

        let tokens: Vec<&str> = sentence.split_whitespace().collect();
        let long_tokens = tokens
            .iter()
            .all(|t| t.chars().filter(|c| c.is_alphabetic()).count() >= 4);
        if tokens.len() < 3 && !long_tokens {
            return None;
        }

        Some(sentence.to_string())
    }

    fn push_accepted(&self, raw: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        if let Some(sentence) = self.accept(raw) {
            if seen.insert(sentence.to_lowercase()) {
                out.push(sentence);
            }
        }
    }

    /// 空行结束一个块，标题行单独成块
    fn split_blocks(&self, text: &str) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                flush(&mut current, &mut blocks);
            } else if self.heading.is_match(line) {
                flush(&mut current, &mut blocks);
                blocks.push(line.to_string());
            } else {
                current.push(line);
            }
        }
        flush(&mut current, &mut blocks);
        blocks
    }
}

fn flush(current: &mut Vec<&str>, blocks: &mut Vec<String>) {
    if !current.is_empty() {
        blocks.push(current.join(" "));
        current.clear();
    }
}

/// 在没有标点的长句中，按新句开头的词切开
fn soft_split(piece: &str) -> Vec<String> {
    let tokens: Vec<&str> = piece.split_whitespace().collect();
    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && starts_new_sentence(tokens[i - 1], token, current.len()) {
            parts.push(current.join(" "));
            current.clear();
        }
        current.push(token);
    }
    if !current.is_empty() {
        parts.push(current.join(" "));
    }
    parts
}

fn starts_new_sentence(prev: &str, token: &str, current_len: usize) -> bool {
    if !token.chars().next().is_some_and(char::is_uppercase) {
        return false;
    }
    if prev.ends_with([',', ';', ':']) {
        return false;
    }
    let prev_word = bare_word(prev);
    if CONNECTORS.contains(prev_word.as_str()) || STOP_WORDS.contains(prev_word.as_str()) {
        return false;
    }

    let word = bare_word(token);
    if SENTENCE_STARTERS.contains(word.as_str()) || WH_WORDS.contains(word.as_str()) {
        current_len >= 2
    } else {
        current_len >= 3
    }
}

/// 汇总所有素材的句子，跨素材大小写不敏感去重，编号为发现顺序
pub fn collect_raw_sentences(materials: &[Material]) -> Vec<RawSentence> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for material in materials {
        for page in &material.pages {
            for sentence in &page.sentences {
                if seen.insert(sentence.to_lowercase()) {
                    out.push(RawSentence {
                        text: sentence.clone(),
                        page_number: page.page_number,
                        material_id: material.id().to_string(),
                        discovery_index: out.len(),
                    });
                }
            }
        }
    }

    out
}
