//! 错误类型
//!
//! 按来源分为三类：
//! - `ServiceError`：外部黑盒服务（对象存储 / OCR / 语音识别 / 翻译）
//! - `StoreError`：持久化层
//! - `PipelineError`：生成流水线本身，包含输入缺陷和上面两类错误

use std::time::Duration;

use thiserror::Error;

/// 外部服务错误
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 单次调用超时
    #[error("{service} 调用超时 ({timeout:?})")]
    Timeout {
        service: &'static str,
        timeout: Duration,
    },

    /// 网络请求失败
    #[error("{service} 请求失败: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 服务返回错误状态
    #[error("{service} 返回错误响应: status={status}, body={body}")]
    BadResponse {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// 服务返回空结果
    #[error("{service} 返回空结果")]
    EmptyResult { service: &'static str },

    /// 响应解析失败
    #[error("{service} 响应解析失败: {message}")]
    Parse {
        service: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub fn request(
        service: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ServiceError::Request {
            service,
            source: Box::new(source),
        }
    }

    /// 是否属于可以重试的瞬时错误
    ///
    /// 超时、连接错误、429 和 5xx 视为瞬时错误；空结果和解析失败重试也没有意义。
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Timeout { .. } | ServiceError::Request { .. } => true,
            ServiceError::BadResponse { status, .. } => *status == 429 || *status >= 500,
            ServiceError::EmptyResult { .. } | ServiceError::Parse { .. } => false,
        }
    }
}

/// 持久化层错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 记录不存在
    #[error("{entity} 不存在: {id}")]
    NotFound { entity: &'static str, id: String },

    /// 关卡序号唯一约束冲突（通常是并发任务写入了同一个序号）
    #[error("关卡序号冲突: version={version_id}, sequence={sequence}")]
    SequenceConflict { version_id: String, sequence: u32 },

    /// 其他存储后端错误
    #[error("存储后端错误: {0}")]
    Backend(String),
}

/// 生成流水线错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 任务没有任何素材
    #[error("任务没有可用的素材")]
    NoMaterials,

    /// 所有素材都没有提取出文本
    #[error("未能从素材中提取有效文本，请确认内容质量")]
    NoExtractableText,

    /// 所有图片素材 OCR 都失败了
    #[error("所有图片素材 OCR 均失败 (共 {attempted} 个)")]
    AllOcrFailed { attempted: usize },

    /// 过滤后没有任何可用句子
    #[error("no usable sentences（过滤后没有可用的句子）")]
    NoUsableSentences,

    /// 任务缺少关联课程包
    #[error("当前任务缺少关联课程包，无法生成内容")]
    MissingPackage,

    /// 任务不存在
    #[error("GenerationJob {0} 不存在")]
    JobNotFound(String),

    /// 同一关卡的序号冲突重试耗尽
    #[error("关卡 {title} 写入失败，序号冲突已重试 {attempts} 次")]
    SequenceRetriesExhausted { title: String, attempts: u32 },

    /// 内置正则编译失败
    #[error("正则表达式编译失败: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// 是否属于输入缺陷（素材本身的问题，重投递也不会成功）
    pub fn is_input_defect(&self) -> bool {
        matches!(
            self,
            PipelineError::NoMaterials
                | PipelineError::NoExtractableText
                | PipelineError::AllOcrFailed { .. }
                | PipelineError::NoUsableSentences
                | PipelineError::MissingPackage
        )
    }
}

/// 流水线结果类型
pub type Result<T> = std::result::Result<T, PipelineError>;
