//! Bot 模块 - 把传输、目录与查找核心接到一起
//!
//! 长轮询事件循环：拉取更新 -> 归一化文本 -> 驱动
//! [`SessionRegistry`] -> 把探测点或结果发回对话。
//! 目录检索和消息发送都发生在 registry 锁外。

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::bisect::CandidateImage;
use crate::catalog::CatalogClient;
use crate::config::AppConfig;
use crate::session::{ChatId, SessionRegistry, VerdictOutcome};
use crate::telegram::{classify, InboundEvent, TelegramClient, Update};

/// 拉取失败后的退避（秒）
const POLL_RETRY_SECS: u64 = 5;

/// Bot 运行器
pub struct BotRunner {
    telegram: TelegramClient,
    catalog: CatalogClient,
    registry: SessionRegistry,
    start_date: NaiveDate,
}

impl BotRunner {
    pub fn new(config: AppConfig) -> Result<Self> {
        let start_date = config.catalog.start_date;
        let telegram = TelegramClient::new(config.telegram).context("Telegram 客户端初始化失败")?;
        let catalog = CatalogClient::new(config.catalog).context("目录客户端初始化失败")?;

        Ok(Self {
            telegram,
            catalog,
            registry: SessionRegistry::new(),
            start_date,
        })
    }

    /// 长轮询主循环，直到进程退出
    pub async fn run(&self) -> Result<()> {
        info!(start_date = %self.start_date, "Bot started, polling for updates");
        let mut offset = 0i64;

        loop {
            let updates = match self.telegram.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, retrying");
                    sleep(Duration::from_secs(POLL_RETRY_SECS)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Err(e) = self.handle_update(&update).await {
                    error!(update_id = update.update_id, error = %e, "Failed to handle update");
                }
            }
        }
    }

    async fn handle_update(&self, update: &Update) -> Result<()> {
        let Some(ref message) = update.message else {
            return Ok(());
        };
        let Some(ref text) = message.text else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        match classify(text) {
            Some(InboundEvent::Start) => self.handle_start(chat_id).await,
            Some(InboundEvent::Verdict(verdict)) => self.handle_verdict(chat_id, verdict).await,
            None => {
                // 有活跃查找时提示用法；否则这条消息与我们无关
                if self.registry.has_session(chat_id) {
                    self.telegram
                        .send_message(chat_id, "请回复 是 / 否（能否看到火灾损毁）")
                        .await?;
                } else {
                    debug!(chat_id, "Unrecognized text without a session, ignoring");
                }
                Ok(())
            }
        }
    }

    async fn handle_start(&self, chat_id: ChatId) -> Result<()> {
        self.telegram
            .send_message(chat_id, "正在检索可用影像，请稍候……")
            .await?;

        // 目录检索在任何锁之外
        let candidates = match self.catalog.search(self.start_date).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(chat_id, error = %e, "Catalog search failed");
                self.telegram
                    .send_message(chat_id, "影像目录暂时不可用，请稍后再试")
                    .await?;
                return Ok(());
            }
        };

        match self.registry.handle_start(chat_id, candidates) {
            Ok(probe) => self.show_probe(chat_id, &probe).await,
            Err(e) => {
                // 空候选集：显式报告，不创建会话
                self.telegram.send_message(chat_id, &format!("{}", e)).await
            }
        }
    }

    async fn handle_verdict(&self, chat_id: ChatId, verdict: bool) -> Result<()> {
        match self.registry.handle_verdict(chat_id, verdict) {
            VerdictOutcome::NoSession => {
                debug!(chat_id, "Verdict with no active search, ignoring");
                Ok(())
            }
            VerdictOutcome::NextProbe(probe) => self.show_probe(chat_id, &probe).await,
            VerdictOutcome::Finished { culprit } => {
                self.telegram
                    .send_message(chat_id, &result_message(culprit))
                    .await
            }
        }
    }

    async fn show_probe(&self, chat_id: ChatId, probe: &CandidateImage) -> Result<()> {
        let url = self.catalog.image_url(probe.date);
        self.telegram
            .send_photo(chat_id, &url, &probe_caption(probe.date))
            .await
    }
}

/// 探测点图片的说明文字
pub fn probe_caption(date: NaiveDate) -> String {
    format!("这张影像拍摄于 {}。能看到火灾损毁吗？回复 是 / 否", date)
}

/// 查找结束时的结果文字
pub fn result_message(culprit: Option<NaiveDate>) -> String {
    match culprit {
        Some(date) => format!("查找完成：最早能看到火灾损毁的影像日期是 {}", date),
        None => "查找完成：整个日期范围内都没有看到火灾损毁".to_string(),
    }
}
