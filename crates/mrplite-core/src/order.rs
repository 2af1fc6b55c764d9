//! 生產訂單模型

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bom::ProductionMode;
use crate::time;

/// 訂單狀態（線性推進：draft → released → issued → finished，不可跳躍）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Released,
    Issued,
    Finished,
}

impl OrderStatus {
    pub fn is_draft(&self) -> bool {
        matches!(self, OrderStatus::Draft)
    }

    pub fn is_released(&self) -> bool {
        matches!(self, OrderStatus::Released)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, OrderStatus::Finished)
    }

    /// 此狀態下訂單是否可刪除（尚未過帳任何領料）
    pub fn is_deletable(&self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::Released)
    }

    /// 中文標籤（用於錯誤信息）
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "草稿",
            OrderStatus::Released => "已下达",
            OrderStatus::Issued => "已领料",
            OrderStatus::Finished => "已完工",
        }
    }
}

/// 生產訂單
///
/// 創建時釘死具體的 `bom_version_id`（而非「最新版」），
/// 之後的 BOM 編輯不會追溯影響在途訂單。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOrder {
    /// 記錄ID
    pub id: i64,

    /// 單號
    pub code: String,

    /// 引用的 BOM
    pub bom_id: i64,

    /// 釘死的 BOM 版本
    pub bom_version_id: i64,

    /// 計劃產出數量
    pub planned_quantity: Decimal,

    /// 計劃產出單位
    pub unit: String,

    /// 計劃日期
    pub planned_date: NaiveDate,

    /// 狀態
    pub status: OrderStatus,

    /// 生產方式
    pub production_mode: ProductionMode,

    /// 受託廠商（委外時）
    #[serde(default)]
    pub manufacturer: Option<String>,

    /// 創建時間
    #[serde(with = "time::datetime_string")]
    pub created_at: NaiveDateTime,

    /// 完工時間
    #[serde(default, with = "time::option_datetime_string")]
    pub finished_at: Option<NaiveDateTime>,
}

impl ProductionOrder {
    /// 創建新的訂單（初始狀態 draft）
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        code: String,
        bom_id: i64,
        bom_version_id: i64,
        planned_quantity: Decimal,
        unit: String,
        planned_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            code,
            bom_id,
            bom_version_id,
            planned_quantity,
            unit,
            planned_date,
            status: OrderStatus::Draft,
            production_mode: ProductionMode::InHouse,
            manufacturer: None,
            created_at: time::now(),
            finished_at: None,
        }
    }

    /// 建構器模式：設置為委外
    pub fn with_subcontracted(mut self, manufacturer: String) -> Self {
        self.production_mode = ProductionMode::Subcontracted;
        self.manufacturer = Some(manufacturer);
        self
    }
}
