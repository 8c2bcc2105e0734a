//! 影像目录模块 - STAC 检索与快照 URL
//!
//! 两个对外动作：按固定地点 + 起始日期检索可用影像的日期列表
//! （STAC item search），以及把某个日期解析成可展示的快照图片
//! URL（Worldview 风格的按日期取图）。
//!
//! 快照是按日期取图而不是按场景 ID 取图：同一天多景、或目录
//! 与快照服务数据不一致时，展示的图片可能和检索到的场景不是
//! 同一张。这是数据源的已知限制，这里不做补偿。

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bisect::CandidateImage;

/// 默认 STAC 检索端点（Earth Search，免费无需密钥）
pub const DEFAULT_STAC_URL: &str = "https://earth-search.aws.element84.com/v1";

/// 默认数据集
pub const DEFAULT_COLLECTION: &str = "sentinel-2-l2a";

/// 默认快照服务（NASA Worldview Snapshots，按日期出图）
pub const DEFAULT_SNAPSHOT_URL: &str = "https://wvs.earthdata.nasa.gov/api/v1/snapshot";

/// 默认快照图层
pub const DEFAULT_SNAPSHOT_LAYERS: &str = "MODIS_Terra_CorrectedReflectance_TrueColor";

/// 检索请求超时（秒）
const SEARCH_TIMEOUT_SECS: u64 = 30;

/// 单次检索最多取回的 item 数
const SEARCH_LIMIT: u32 = 500;

/// 目录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// STAC API 地址
    #[serde(default = "default_stac_url")]
    pub stac_url: String,
    /// STAC collection 名称
    #[serde(default = "default_collection")]
    pub collection: String,
    /// 观察点纬度
    pub lat: f64,
    /// 观察点经度
    pub lon: f64,
    /// 检索起始日期
    pub start_date: NaiveDate,
    /// STAC API 密钥（公开端点不需要）
    #[serde(default)]
    pub api_key: Option<String>,
    /// 快照服务地址
    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: String,
    /// 快照图层
    #[serde(default = "default_snapshot_layers")]
    pub snapshot_layers: String,
    /// 快照范围：以观察点为中心的半边长（度）
    #[serde(default = "default_bbox_half_deg")]
    pub bbox_half_deg: f64,
}

fn default_stac_url() -> String {
    DEFAULT_STAC_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_snapshot_url() -> String {
    DEFAULT_SNAPSHOT_URL.to_string()
}

fn default_snapshot_layers() -> String {
    DEFAULT_SNAPSHOT_LAYERS.to_string()
}

fn default_bbox_half_deg() -> f64 {
    0.05
}

/// STAC item search 响应（只取需要的字段）
#[derive(Debug, Deserialize)]
struct ItemCollection {
    #[serde(default)]
    features: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    id: Option<String>,
    properties: ItemProperties,
}

#[derive(Debug, Deserialize)]
struct ItemProperties {
    datetime: Option<String>,
}

/// 影像目录客户端
#[derive(Debug)]
pub struct CatalogClient {
    client: Client,
    config: CatalogConfig,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// 检索从 `from` 到今天为止、覆盖观察点的影像日期
    ///
    /// 返回按日期升序、同日去重（保留目录顺序里的第一条）的
    /// 候选列表。空结果返回空 Vec，由调用方决定如何报告。
    pub async fn search(&self, from: NaiveDate) -> Result<Vec<CandidateImage>> {
        let url = format!("{}/search", self.config.stac_url);
        let bbox = self.bbox();
        let datetime = format!("{}T00:00:00Z/..", from);

        debug!(%url, collection = %self.config.collection, %datetime, "STAC search");

        let mut request = self.client.get(&url).query(&[
            ("collections", self.config.collection.clone()),
            ("bbox", bbox),
            ("datetime", datetime),
            ("limit", SEARCH_LIMIT.to_string()),
        ]);

        if let Some(ref key) = self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.context("STAC search request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("STAC search failed with status {}", status);
        }

        let items: ItemCollection = response
            .json()
            .await
            .context("Failed to parse STAC search response")?;

        let candidates = collect_candidates(items);
        info!(count = candidates.len(), "Catalog search done");
        Ok(candidates)
    }

    /// 按日期构造可展示的快照图片 URL
    ///
    /// 按日期而不是按场景 ID 取图（快照服务没有场景概念）。
    pub fn image_url(&self, date: NaiveDate) -> String {
        format!(
            "{}?REQUEST=GetSnapshot&TIME={}&BBOX={}&CRS=EPSG:4326&LAYERS={}&WRAP=day&FORMAT=image/jpeg&WIDTH=768&HEIGHT=768",
            self.config.snapshot_url, date, self.bbox(), self.config.snapshot_layers
        )
    }

    /// 观察点周围的 bbox，"minLon,minLat,maxLon,maxLat"
    fn bbox(&self) -> String {
        let d = self.config.bbox_half_deg;
        format!(
            "{},{},{},{}",
            self.config.lon - d,
            self.config.lat - d,
            self.config.lon + d,
            self.config.lat + d
        )
    }
}

/// 把 STAC items 整理成候选列表：解析日期、升序、同日去重
fn collect_candidates(items: ItemCollection) -> Vec<CandidateImage> {
    let mut candidates: Vec<CandidateImage> = items
        .features
        .into_iter()
        .filter_map(|item| {
            let datetime = item.properties.datetime?;
            // "2021-06-15T10:20:31Z" -> 天精度
            let date: NaiveDate = datetime.get(..10)?.parse().ok()?;
            Some(CandidateImage::new(date, item.id))
        })
        .collect();

    candidates.sort_by_key(|c| c.date);
    candidates.dedup_by_key(|c| c.date);
    candidates
}
