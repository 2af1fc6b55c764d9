//! 庫存流水模型
//!
//! 流水帳是唯一事實來源，物料上的快照只是派生快取。
//! 流水記錄嚴格只追加：過帳後絕不修改、絕不刪除，
//! 更正一律通過追加沖銷記錄完成。

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::time;

/// 出入庫類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// 入庫（採購等）
    In,
    /// 出庫（一般發料）
    Out,
    /// 完工入庫
    ProduceIn,
    /// 生產領料出庫
    ConsumeOut,
    /// 盤盈調整
    AdjustIn,
    /// 盤虧調整
    AdjustOut,
    /// 退回入庫（取消領料過帳）
    ReturnIn,
}

impl MovementKind {
    /// 是否入向（加庫存）
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            MovementKind::In
                | MovementKind::ProduceIn
                | MovementKind::AdjustIn
                | MovementKind::ReturnIn
        )
    }

    /// 帶符號的數量（入向為正，出向為負）
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        if self.is_inbound() {
            quantity
        } else {
            -quantity
        }
    }
}

/// 關聯單據類型（產品側流水回鏈到來源單據）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedDocType {
    /// 生產訂單
    Order,
    /// 領料單
    Issue,
    /// 出貨單
    Shipment,
}

/// 原料庫存流水記錄（只追加）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// 記錄ID
    pub id: i64,

    /// 物料ID
    pub material_id: i64,

    /// 出入庫類型
    pub kind: MovementKind,

    /// 數量（以物料自身單位計，恆為正值）
    pub quantity: Decimal,

    /// 數量單位
    pub unit: String,

    /// 原因/備註（領料出庫時攜帶換算前的原始數量與單位）
    pub reason: String,

    /// 操作人
    pub operator: String,

    /// 記帳時間
    #[serde(with = "time::datetime_string")]
    pub at: NaiveDateTime,

    /// 寫入時點的餘額快照（本筆生效後）
    pub snapshot_stock: Decimal,
}

impl InventoryRecord {
    /// 記錄日期是否早於基準日（對帳期初切分用）
    pub fn is_before(&self, benchmark: NaiveDate) -> bool {
        self.at.date() < benchmark
    }
}

/// 產品類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// 成品
    Finished,
    /// 半成品
    SemiFinished,
}

/// 產品庫存（成品/半成品），鏡像原料模型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInventory {
    /// 記錄ID
    pub id: i64,

    /// 產品名稱
    pub name: String,

    /// 產品類型
    pub kind: ProductKind,

    /// 庫存單位
    pub unit: String,

    /// 當前庫存快照
    pub stock_quantity: Decimal,

    /// 建檔日期
    pub created_date: NaiveDate,

    /// 最近一次庫存變動時間
    #[serde(default, with = "time::option_datetime_string")]
    pub stock_updated_at: Option<NaiveDateTime>,
}

impl ProductInventory {
    /// 創建新的產品庫存
    pub fn new(id: i64, name: String, kind: ProductKind, unit: String) -> Self {
        Self {
            id,
            name,
            kind,
            unit,
            stock_quantity: Decimal::ZERO,
            created_date: time::now().date(),
            stock_updated_at: None,
        }
    }

    /// 歸一化匹配鍵（去空白、不分大小寫的名稱 + 類型）
    pub fn normalized_key(&self) -> (String, ProductKind) {
        normalized_product_key(&self.name, self.kind)
    }

    /// 更新庫存快照
    pub fn set_stock(&mut self, quantity: Decimal, at: NaiveDateTime) {
        self.stock_quantity = quantity;
        self.stock_updated_at = Some(at);
    }
}

/// 產品匹配鍵歸一化
pub fn normalized_product_key(name: &str, kind: ProductKind) -> (String, ProductKind) {
    (name.trim().to_lowercase(), kind)
}

/// 產品庫存流水記錄（只追加），比原料側多一條回鏈
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInventoryRecord {
    /// 記錄ID
    pub id: i64,

    /// 產品ID
    pub product_id: i64,

    /// 出入庫類型
    pub kind: MovementKind,

    /// 數量（恆為正值）
    pub quantity: Decimal,

    /// 數量單位
    pub unit: String,

    /// 原因/備註
    pub reason: String,

    /// 操作人
    pub operator: String,

    /// 記帳時間
    #[serde(with = "time::datetime_string")]
    pub at: NaiveDateTime,

    /// 寫入時點的餘額快照
    pub snapshot_stock: Decimal,

    /// 關聯單據類型
    #[serde(default)]
    pub related_doc_type: Option<RelatedDocType>,

    /// 關聯單據ID
    #[serde(default)]
    pub related_doc_id: Option<i64>,
}
