//! 領料單模型

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bom::ItemType;
use crate::time;

/// 領料單狀態
///
/// draft → posted，取消過帳回到 draft（不是第三個狀態，
/// 僅在單據上留下何時、何人取消的記錄）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Draft,
    Posted,
}

impl IssueStatus {
    pub fn is_draft(&self) -> bool {
        matches!(self, IssueStatus::Draft)
    }

    pub fn is_posted(&self) -> bool {
        matches!(self, IssueStatus::Posted)
    }

    /// 中文標籤（用於錯誤信息）
    pub fn label(&self) -> &'static str {
        match self {
            IssueStatus::Draft => "草稿",
            IssueStatus::Posted => "已过账",
        }
    }
}

/// 領料單行項（由 BOM 展開生成）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueLine {
    /// 物料類型
    pub item_type: ItemType,

    /// 物料ID
    pub item_id: i64,

    /// 物料名稱快取
    pub item_name: String,

    /// 需求數量
    pub quantity: Decimal,

    /// 數量單位
    pub unit: String,

    /// 投料階段
    #[serde(default)]
    pub phase: Option<String>,
}

/// 領料單
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialIssue {
    /// 記錄ID
    pub id: i64,

    /// 單號
    pub code: String,

    /// 所屬生產訂單
    pub order_id: i64,

    /// 狀態
    pub status: IssueStatus,

    /// 行項
    pub lines: Vec<IssueLine>,

    /// 創建時間
    #[serde(with = "time::datetime_string")]
    pub created_at: NaiveDateTime,

    /// 過帳時間
    #[serde(default, with = "time::option_datetime_string")]
    pub posted_at: Option<NaiveDateTime>,

    /// 最近一次取消過帳的時間
    #[serde(default, with = "time::option_datetime_string")]
    pub cancelled_at: Option<NaiveDateTime>,

    /// 最近一次取消過帳的操作人
    #[serde(default)]
    pub cancelled_by: Option<String>,
}

impl MaterialIssue {
    /// 創建新的領料單（初始為草稿）
    pub fn new(id: i64, code: String, order_id: i64, lines: Vec<IssueLine>) -> Self {
        Self {
            id,
            code,
            order_id,
            status: IssueStatus::Draft,
            lines,
            created_at: time::now(),
            posted_at: None,
            cancelled_at: None,
            cancelled_by: None,
        }
    }
}
