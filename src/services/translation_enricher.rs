//! 翻译补全 - 业务能力层
//!
//! 策略：
//! 1. 收集缺少翻译的句子，大小写不敏感去重
//! 2. 先查缓存
//! 3. 未命中的分批翻译（控制并发 + 批次间延迟），失败按指数退避重试
//! 4. 结果写回所有共享该句子的载荷；彻底失败的保持 None

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clients::Translator;
use crate::config::PipelineSettings;
use crate::error::ServiceError;
use crate::infrastructure::{retry_with_backoff, run_in_batches, RetryPolicy, TtlCache};
use crate::models::CoursePlan;

/// 翻译服务有时返回的占位文本
const PLACEHOLDERS: &[&str] = &["[翻译生成中...]", "翻译生成中...", "N/A"];

/// 翻译统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// 去重后需要翻译的句子数
    pub unique: usize,
    pub from_cache: usize,
    pub translated: usize,
    pub failed: usize,
}

pub struct TranslationEnricher {
    translator: Arc<dyn Translator>,
    cache: Arc<TtlCache<String>>,
    concurrency: usize,
    batch_delay: Duration,
    retry: RetryPolicy,
}

impl TranslationEnricher {
    pub fn new(
        translator: Arc<dyn Translator>,
        cache: Arc<TtlCache<String>>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            translator,
            cache,
            concurrency: settings.translate_concurrency,
            batch_delay: Duration::from_millis(settings.translate_batch_delay_ms),
            retry: settings.retry_policy(),
        }
    }

    /// 为草稿中所有缺少翻译的内容项补上翻译
    pub async fn enrich(&self, plan: &mut CoursePlan) -> EnrichReport {
        let pending: Vec<String> = plan
            .payloads_mut()
            .filter(|p| p.translation.is_none())
            .map(|p| p.english.clone())
            .collect();

        let (translations, report) = self.translate_all(pending).await;

        for payload in plan.payloads_mut() {
            if payload.translation.is_none() {
                if let Some(t) = translations.get(&payload.english.to_lowercase()) {
                    payload.translation = Some(t.clone());
                }
            }
        }

        report
    }

    /// 批量翻译，返回 小写原文 -> 译文
    pub async fn translate_all(
        &self,
        sentences: Vec<String>,
    ) -> (HashMap<String, String>, EnrichReport) {
        let mut report = EnrichReport::default();
        let mut translations = HashMap::new();
        let mut to_translate = Vec::new();

        for sentence in sentences {
            let trimmed = sentence.trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if translations.contains_key(&key) || to_translate.iter().any(|(k, _)| *k == key) {
                continue;
            }
            report.unique += 1;
            match self.cache.get(&key) {
                Some(cached) => {
                    report.from_cache += 1;
                    translations.insert(key, cached);
                }
                None => to_translate.push((key, trimmed.to_string())),
            }
        }

        info!(
            "总共 {} 个句子，{} 个来自缓存，{} 个需要翻译",
            report.unique,
            report.from_cache,
            to_translate.len()
        );

        let results = run_in_batches(
            to_translate,
            self.concurrency,
            self.batch_delay,
            |(key, text)| async move {
                let result = self.translate_one(&text).await;
                (key, text, result)
            },
        )
        .await;

        for (key, text, result) in results {
            match result {
                Ok(translation) => {
                    self.cache.insert(&key, translation.clone());
                    translations.insert(key, translation);
                    report.translated += 1;
                }
                Err(e) => {
                    warn!(
                        "翻译失败: {}... ({})",
                        crate::utils::logging::truncate_text(&text, 50),
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            "批量翻译完成，成功 {}/{}",
            report.from_cache + report.translated,
            report.unique
        );
        (translations, report)
    }

    async fn translate_one(&self, text: &str) -> Result<String, ServiceError> {
        retry_with_backoff(&self.retry, "翻译", |_: &ServiceError| true, || async move {
            let raw = self.translator.translate(text).await?;
            clean_translation(&raw, text).ok_or(ServiceError::EmptyResult {
                service: "translate",
            })
        })
        .await
    }
}

/// 清理翻译结果：去掉换行并修剪；空结果、占位文本和原样返回的英文都算失败
pub fn clean_translation(raw: &str, source: &str) -> Option<String> {
    let cleaned: String = raw
        .split(['\n', '\r'])
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("");
    let cleaned = cleaned.trim();

    if cleaned.is_empty()
        || PLACEHOLDERS.contains(&cleaned)
        || cleaned.eq_ignore_ascii_case(source.trim())
    {
        return None;
    }
    Some(cleaned.to_string())
}
