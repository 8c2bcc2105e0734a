//! 配置模块 - 加载 bot 与影像目录配置
//!
//! 配置文件：`~/.config/burndate/config.json`（JSON 格式）。
//!
//! Bot token 读取优先级：
//! 1. 环境变量 `BURNDATE_BOT_TOKEN`
//! 2. 环境变量 `TELEGRAM_BOT_TOKEN`
//! 3. 配置文件 `telegram.bot_token` 字段

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::CatalogConfig;
use crate::telegram::TelegramConfig;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Telegram 传输配置
    pub telegram: TelegramConfig,
    /// 影像目录配置
    pub catalog: CatalogConfig,
}

/// 配置文件路径
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/burndate")
        .join("config.json")
}

impl AppConfig {
    /// 从默认路径加载配置，并应用环境变量覆盖
    pub fn auto_load() -> Result<Self> {
        let mut config = Self::load(&config_path())?;

        for var in ["BURNDATE_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"] {
            if let Ok(token) = std::env::var(var) {
                if !token.trim().is_empty() {
                    debug!(var, "Using bot token from environment");
                    config.telegram.bot_token = token.trim().to_string();
                    break;
                }
            }
        }

        Ok(config)
    }

    /// 从指定路径加载配置
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "配置文件不存在: {}，请先创建（至少包含 telegram.bot_token 和 catalog 的 lat/lon/start_date）",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;

        Ok(config)
    }
}
