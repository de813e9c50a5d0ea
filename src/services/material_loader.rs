//! 素材加载 - 业务能力层
//!
//! 按素材类型取出原始文本并挂到 `Material` 上：
//! - 图片：签名链接 → OCR（分批并发，结果缓存）
//! - 文档：PDF 按页解析，纯文本按换页符分页
//! - 音频：签名链接 → 语音识别，每个片段一行
//! - 其他：能按 UTF-8 解码就当文本，否则按图片处理
//!
//! 单个素材失败只记录下来，由调用方决定是否整体失败。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clients::transcribe_client::segments_to_text;
use crate::clients::{ObjectStore, OcrService, Transcriber};
use crate::config::PipelineSettings;
use crate::error::{PipelineError, Result, ServiceError};
use crate::infrastructure::{retry_with_backoff, run_in_batches, RetryPolicy, TtlCache};
use crate::models::{Material, SourceKind};

/// 加载失败的素材
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedMaterial {
    pub material_id: String,
    pub original_name: String,
    pub reason: String,
}

/// 加载统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// 提取到文本的素材数
    pub with_text: usize,
    pub ocr_attempted: usize,
    pub ocr_failed: usize,
    pub ocr_cache_hits: usize,
    pub skipped: Vec<SkippedMaterial>,
}

pub struct MaterialLoader {
    storage: Arc<dyn ObjectStore>,
    ocr: Arc<dyn OcrService>,
    transcriber: Arc<dyn Transcriber>,
    ocr_cache: Arc<TtlCache<String>>,
    ocr_concurrency: usize,
    ocr_batch_delay: Duration,
    retry: RetryPolicy,
}

impl MaterialLoader {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        ocr: Arc<dyn OcrService>,
        transcriber: Arc<dyn Transcriber>,
        ocr_cache: Arc<TtlCache<String>>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            storage,
            ocr,
            transcriber,
            ocr_cache,
            ocr_concurrency: settings.ocr_concurrency,
            ocr_batch_delay: Duration::from_millis(settings.ocr_batch_delay_ms),
            retry: settings.retry_policy(),
        }
    }

    /// 加载所有素材的文本
    ///
    /// 全部素材都没有文本时返回错误；图片 OCR 全部失败且没有其他文本时
    /// 返回 `AllOcrFailed`。
    pub async fn load(&self, materials: &mut [Material]) -> Result<LoadReport> {
        if materials.is_empty() {
            return Err(PipelineError::NoMaterials);
        }

        let mut report = LoadReport::default();
        let mut ocr_queue: Vec<usize> = Vec::new();

        for (index, material) in materials.iter_mut().enumerate() {
            let outcome = match material.kind {
                SourceKind::Image => {
                    ocr_queue.push(index);
                    continue;
                }
                SourceKind::Document => self.load_document(material).await,
                SourceKind::Audio => self.load_audio(material).await,
                SourceKind::Fallback => match self.load_fallback(material).await {
                    Ok(true) => Ok(()),
                    Ok(false) => {
                        ocr_queue.push(index);
                        continue;
                    }
                    Err(e) => Err(e),
                },
            };

            if let Err(e) = outcome {
                warn!("素材 {} 加载失败: {}", material.descriptor.original_name, e);
                report.skipped.push(skipped(material, &e));
            }
        }

        if !ocr_queue.is_empty() {
            self.run_ocr(materials, ocr_queue, &mut report).await;
        }

        report.with_text = materials.iter().filter(|m| m.has_text()).count();
        info!(
            "素材加载完成: {}/{} 个有文本，OCR {} 个（失败 {}，缓存命中 {}）",
            report.with_text,
            materials.len(),
            report.ocr_attempted,
            report.ocr_failed,
            report.ocr_cache_hits
        );

        if report.with_text == 0 {
            if report.ocr_attempted > 0 && report.ocr_failed == report.ocr_attempted {
                return Err(PipelineError::AllOcrFailed {
                    attempted: report.ocr_attempted,
                });
            }
            return Err(PipelineError::NoExtractableText);
        }

        Ok(report)
    }

    async fn run_ocr(
        &self,
        materials: &mut [Material],
        queue: Vec<usize>,
        report: &mut LoadReport,
    ) {
        let jobs: Vec<(usize, String, String)> = queue
            .into_iter()
            .map(|index| {
                let d = &materials[index].descriptor;
                (index, d.storage_locator.clone(), ocr_cache_key(d.storage_locator.as_str(), d.size_bytes))
            })
            .collect();
        report.ocr_attempted = jobs.len();

        let results = run_in_batches(
            jobs,
            self.ocr_concurrency,
            self.ocr_batch_delay,
            |(index, locator, key)| async move {
                if let Some(text) = self.ocr_cache.get(&key) {
                    return (index, Ok((text, true)));
                }
                let result = self.recognize(&locator).await.map(|text| {
                    self.ocr_cache.insert(&key, text.clone());
                    (text, false)
                });
                (index, result)
            },
        )
        .await;

        for (index, result) in results {
            let material = &mut materials[index];
            match result {
                Ok((text, cached)) => {
                    if cached {
                        report.ocr_cache_hits += 1;
                    }
                    debug!(
                        "OCR 完成: {} ({} 字符)",
                        material.descriptor.original_name,
                        text.chars().count()
                    );
                    material.attach_pages(vec![text]);
                }
                Err(e) => {
                    warn!("图片 {} OCR 失败，跳过: {}", material.descriptor.original_name, e);
                    report.ocr_failed += 1;
                    report.skipped.push(skipped(material, &e));
                }
            }
        }
    }

    async fn recognize(&self, locator: &str) -> std::result::Result<String, ServiceError> {
        let url = self.signed_url(locator).await?;
        retry_with_backoff(&self.retry, "OCR", ServiceError::is_transient, || {
            self.ocr.recognize(&url)
        })
        .await
    }

    async fn signed_url(&self, locator: &str) -> std::result::Result<String, ServiceError> {
        retry_with_backoff(&self.retry, "签名链接", ServiceError::is_transient, || {
            self.storage.signed_url(locator)
        })
        .await
    }

    async fn fetch(&self, locator: &str) -> std::result::Result<Vec<u8>, ServiceError> {
        retry_with_backoff(&self.retry, "下载素材", ServiceError::is_transient, || {
            self.storage.fetch(locator)
        })
        .await
    }

    async fn load_document(&self, material: &mut Material) -> std::result::Result<(), ServiceError> {
        let bytes = self.fetch(&material.descriptor.storage_locator).await?;
        let pages = if is_pdf(&material.descriptor.mime_type, &bytes) {
            pdf_pages(&bytes)?
        } else {
            let text = String::from_utf8(bytes).map_err(|e| ServiceError::Parse {
                service: "document",
                message: e.to_string(),
            })?;
            text_pages(&text)
        };
        material.attach_pages(pages);
        Ok(())
    }

    async fn load_audio(&self, material: &mut Material) -> std::result::Result<(), ServiceError> {
        let url = self.signed_url(&material.descriptor.storage_locator).await?;
        let segments = retry_with_backoff(&self.retry, "语音识别", ServiceError::is_transient, || {
            self.transcriber.transcribe(&url)
        })
        .await?;
        material.attach_pages(vec![segments_to_text(&segments)]);
        Ok(())
    }

    /// 能按文本解码时返回 true；否则需要走 OCR
    async fn load_fallback(&self, material: &mut Material) -> std::result::Result<bool, ServiceError> {
        let bytes = self.fetch(&material.descriptor.storage_locator).await?;
        match String::from_utf8(bytes) {
            Ok(text) if looks_like_text(&text) => {
                material.attach_pages(text_pages(&text));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// OCR 缓存键：同一对象、同样大小视为同一张图
fn ocr_cache_key(locator: &str, size_bytes: u64) -> String {
    format!("{}:{}", locator, size_bytes)
}

fn skipped(material: &Material, err: &ServiceError) -> SkippedMaterial {
    SkippedMaterial {
        material_id: material.id().to_string(),
        original_name: material.descriptor.original_name.clone(),
        reason: err.to_string(),
    }
}

fn is_pdf(mime_type: &str, bytes: &[u8]) -> bool {
    mime_type.eq_ignore_ascii_case("application/pdf") || bytes.starts_with(b"%PDF")
}

/// PDF 每页文本（页码顺序）
pub fn pdf_pages(bytes: &[u8]) -> std::result::Result<Vec<String>, ServiceError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ServiceError::Parse {
        service: "pdf",
        message: e.to_string(),
    })?;

    let mut pages: Vec<u32> = doc.get_pages().keys().cloned().collect();
    pages.sort();

    Ok(pages
        .iter()
        .map(|page| doc.extract_text(&[*page]).unwrap_or_default())
        .collect())
}

/// 纯文本按换页符分页
fn text_pages(text: &str) -> Vec<String> {
    text.split('\u{c}').map(str::to_string).collect()
}

/// 控制字符过多的内容不当作文本
fn looks_like_text(text: &str) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let control = text
        .chars()
        .filter(|c| c.is_control() && !c.is_whitespace())
        .count();
    control * 20 < total
}
