//! Telegram 传输模块 - Bot API 客户端与文本归一化
//!
//! 负责消息收发和把用户文本归一化成核心能理解的事件
//! （开始 / 是 / 否）。核心只接收已分类的 [`InboundEvent`]，
//! 不接触原始文本。

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Bot API 默认地址
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// 长轮询默认超时（秒）
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token（@BotFather 签发）
    pub bot_token: String,
    /// API 地址（支持自建代理）
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// 长轮询超时（秒）
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_poll_timeout() -> u64 {
    DEFAULT_POLL_TIMEOUT_SECS
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// 入站事件（已归一化）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundEvent {
    /// 开始一次新的查找
    Start,
    /// 对当前探测点的判定：能 / 不能看到损毁
    Verdict(bool),
}

/// 把用户文本归一化成事件
///
/// 识别范围：
/// - "/start" / "start" / "开始" -> Start
/// - "y" / "yes" / "是" / "有" / "能" / "看到" -> Verdict(true)
/// - "n" / "no" / "否" / "没" / "没有" / "看不到" -> Verdict(false)
/// - 其他文本 -> None（由调用方决定是否提示用法）
pub fn classify(text: &str) -> Option<InboundEvent> {
    let normalized = text.trim().to_lowercase();

    match normalized.as_str() {
        "/start" | "start" | "开始" | "重新开始" => Some(InboundEvent::Start),
        "y" | "yes" | "是" | "有" | "能" | "看到" | "看得到" => {
            Some(InboundEvent::Verdict(true))
        }
        "n" | "no" | "否" | "不" | "没" | "没有" | "看不到" => {
            Some(InboundEvent::Verdict(false))
        }
        _ => None,
    }
}

/// getUpdates 返回的一条更新
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

/// 消息（只取我们关心的字段）
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

/// 聊天
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Bot API 响应包装
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SendPhotoPayload<'a> {
    chat_id: i64,
    photo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
}

/// Telegram Bot API 客户端
#[derive(Debug)]
pub struct TelegramClient {
    client: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    /// 创建客户端
    pub fn new(config: TelegramConfig) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(anyhow!("bot_token is required"));
        }

        // 请求超时要盖过长轮询窗口
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base, self.config.bot_token, method
        )
    }

    /// 长轮询拉取更新
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let url = self.method_url("getUpdates");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.config.poll_timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".to_string()),
            ])
            .send()
            .await
            .context("getUpdates request failed")?;

        let api: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .context("Failed to parse getUpdates response")?;

        if !api.ok {
            return Err(anyhow!(
                "getUpdates rejected: {}",
                api.description.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        Ok(api.result.unwrap_or_default())
    }

    /// 发送纯文本消息
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let payload = SendMessagePayload { chat_id, text };
        self.call("sendMessage", &payload).await
    }

    /// 按 URL 发送图片
    pub async fn send_photo(&self, chat_id: i64, photo_url: &str, caption: &str) -> Result<()> {
        let payload = SendPhotoPayload {
            chat_id,
            photo: photo_url,
            caption: Some(caption),
        };
        self.call("sendPhoto", &payload).await
    }

    async fn call<T: Serialize>(&self, method: &str, payload: &T) -> Result<()> {
        let url = self.method_url(method);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;

        let api: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if !api.ok {
            warn!(method, description = ?api.description, "Telegram API rejected the call");
            return Err(anyhow!(
                "{} rejected: {}",
                method,
                api.description.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        debug!(method, "Telegram call ok");
        Ok(())
    }
}
