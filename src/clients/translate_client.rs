//! 翻译客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（如 Azure, Hunyuan, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ServiceError;

const SERVICE: &str = "translate";

const SYSTEM_PROMPT: &str = "你是专业的英语翻译助手。请将英文句子准确翻译成中文。要求：1. 只返回翻译结果，不要添加任何解释；2. 翻译要准确、自然；3. 不要添加课程标题、学习目标等额外内容；4. 只返回纯粹的中文翻译。";

#[async_trait]
pub trait Translator: Send + Sync {
    /// 翻译一个英文句子，返回服务的原始输出
    async fn translate(&self, text: &str) -> Result<String, ServiceError>;
}

/// 基于 LLM 的翻译器
pub struct LlmTranslator {
    client: Client<OpenAIConfig>,
    model_name: String,
    timeout: Duration,
}

impl LlmTranslator {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            timeout: config.service_timeout(),
        }
    }

    async fn send_to_llm(&self, user_message: &str) -> Result<String, OpenAIError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_message)
                    .build()?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.2)
            .max_tokens(1024u32)
            .build()?;

        let response = self.client.chat().create(request).await?;

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str) -> Result<String, ServiceError> {
        let user_message = format!("请将以下英文句子翻译成中文：\n\n{}", text);

        let content = tokio::time::timeout(self.timeout, self.send_to_llm(&user_message))
            .await
            .map_err(|_| ServiceError::Timeout {
                service: SERVICE,
                timeout: self.timeout,
            })?
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                ServiceError::request(SERVICE, e)
            })?;

        debug!("LLM API 调用成功");

        if content.trim().is_empty() {
            return Err(ServiceError::EmptyResult { service: SERVICE });
        }
        Ok(content)
    }
}
