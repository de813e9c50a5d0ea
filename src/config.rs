use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::infrastructure::retry::RetryPolicy;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时处理的任务数量
    pub max_concurrent_jobs: usize,
    /// 任务失败后最多投递次数（含第一次）
    pub max_delivery_attempts: u32,
    /// 重新投递前等待的毫秒数
    pub redelivery_delay_ms: u64,
    /// 任务清单（TOML）存放目录
    pub jobs_folder: String,
    /// 生成结果导出目录
    pub output_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 对象存储 ---
    pub storage_base_url: String,
    pub storage_token: String,
    // --- OCR / 语音识别 ---
    pub ocr_api_url: String,
    pub ocr_api_key: String,
    pub transcribe_api_url: String,
    pub transcribe_api_key: String,
    pub service_timeout_secs: u64,
    // --- 翻译 LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 流水线参数
    pub pipeline: PipelineSettings,
}

/// 流水线参数
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// 轮次数 R
    pub round_count: usize,
    /// 每轮容量 C
    pub round_capacity: usize,
    /// 候选句上限
    pub max_candidates: usize,
    /// 近似重复阈值（Jaccard）
    pub similarity_threshold: f64,
    /// 主正则至少匹配到多少句，否则走兜底切分
    pub min_primary_sentences: usize,
    pub min_sentence_chars: usize,
    pub max_sentence_chars: usize,
    /// 关卡难度默认值
    pub default_difficulty: u8,
    pub ocr_concurrency: usize,
    pub ocr_batch_delay_ms: u64,
    pub translate_concurrency: usize,
    pub translate_batch_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_factor: f64,
    /// 序号冲突时单个关卡最多尝试次数
    pub sequence_retry_attempts: u32,
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_delivery_attempts: 3,
            redelivery_delay_ms: 5_000,
            jobs_folder: "jobs".to_string(),
            output_folder: "output".to_string(),
            verbose_logging: false,
            storage_base_url: "http://localhost:54321/storage/v1".to_string(),
            storage_token: String::new(),
            ocr_api_url: "http://localhost:8090/ocr".to_string(),
            ocr_api_key: String::new(),
            transcribe_api_url: "http://localhost:8090/asr".to_string(),
            transcribe_api_key: String::new(),
            service_timeout_secs: 60,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4.1-mini".to_string(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            round_count: 4,
            round_capacity: 16,
            max_candidates: 400,
            similarity_threshold: 0.85,
            min_primary_sentences: 3,
            min_sentence_chars: 10,
            max_sentence_chars: 200,
            default_difficulty: 2,
            ocr_concurrency: 3,
            ocr_batch_delay_ms: 300,
            translate_concurrency: 3,
            translate_batch_delay_ms: 500,
            retry_attempts: 3,
            retry_base_delay_ms: 1_000,
            retry_factor: 1.5,
            sequence_retry_attempts: 5,
            cache_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl PipelineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            factor: self.retry_factor,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺省字段使用默认值，再叠加环境变量
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    fn with_env_overrides(self) -> Self {
        let d = self;
        Self {
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS").unwrap_or(d.max_concurrent_jobs),
            max_delivery_attempts: env_parse("MAX_DELIVERY_ATTEMPTS").unwrap_or(d.max_delivery_attempts),
            redelivery_delay_ms: env_parse("REDELIVERY_DELAY_MS").unwrap_or(d.redelivery_delay_ms),
            jobs_folder: std::env::var("JOBS_FOLDER").unwrap_or(d.jobs_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(d.output_folder),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(d.verbose_logging),
            storage_base_url: std::env::var("STORAGE_BASE_URL").unwrap_or(d.storage_base_url),
            storage_token: std::env::var("STORAGE_TOKEN").unwrap_or(d.storage_token),
            ocr_api_url: std::env::var("OCR_API_URL").unwrap_or(d.ocr_api_url),
            ocr_api_key: std::env::var("OCR_API_KEY").unwrap_or(d.ocr_api_key),
            transcribe_api_url: std::env::var("TRANSCRIBE_API_URL").unwrap_or(d.transcribe_api_url),
            transcribe_api_key: std::env::var("TRANSCRIBE_API_KEY").unwrap_or(d.transcribe_api_key),
            service_timeout_secs: env_parse("SERVICE_TIMEOUT_SECS").unwrap_or(d.service_timeout_secs),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(d.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(d.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(d.llm_model_name),
            pipeline: PipelineSettings {
                round_count: env_parse("ROUND_COUNT").unwrap_or(d.pipeline.round_count),
                round_capacity: env_parse("ROUND_CAPACITY").unwrap_or(d.pipeline.round_capacity),
                ..d.pipeline
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
