//! BOM 模型（配方主檔、版本、行項）

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::time;

/// 行項數量對應的預設產出基準（yield_base 缺失或為零時的回退值）
pub const DEFAULT_YIELD_BASE: i64 = 1_000;

/// BOM 類別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BomCategory {
    /// 母液
    MotherLiquor,
    /// 促進劑
    Accelerator,
    /// 成品
    FinishedProduct,
}

/// 生產方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionMode {
    /// 自產
    InHouse,
    /// 委外（配合主檔上的受託廠商名稱）
    Subcontracted,
}

/// 版本審批狀態
///
/// pending / rejected 的版本永不參與展開。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalStatus::Approved)
    }

    /// 中文標籤（用於錯誤信息）
    pub fn label(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "待审批",
            ApprovalStatus::Approved => "已审批",
            ApprovalStatus::Rejected => "已驳回",
        }
    }
}

/// 行項引用的物料類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// 原料
    RawMaterial,
    /// 產品（使 BOM 結構遞歸：子配方）
    Product,
}

/// BOM 行項
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomLine {
    /// 物料類型
    pub item_type: ItemType,

    /// 物料ID
    pub item_id: i64,

    /// 物料名稱快取（ID 失效時的回退匹配鍵）
    pub item_name: String,

    /// yield_base 產出對應的用量
    pub quantity: Decimal,

    /// 用量單位
    pub unit: String,

    /// 投料階段（自由文本，如「A段」）
    #[serde(default)]
    pub phase: Option<String>,

    /// 替代說明
    #[serde(default)]
    pub substitute_note: Option<String>,
}

impl BomLine {
    /// 創建新的行項
    pub fn new(
        item_type: ItemType,
        item_id: i64,
        item_name: String,
        quantity: Decimal,
        unit: String,
    ) -> Self {
        Self {
            item_type,
            item_id,
            item_name,
            quantity,
            unit,
            phase: None,
            substitute_note: None,
        }
    }

    /// 建構器模式：設置投料階段
    pub fn with_phase(mut self, phase: String) -> Self {
        self.phase = Some(phase);
        self
    }

    /// 差異比對用鍵
    pub fn key(&self) -> (ItemType, i64) {
        (self.item_type, self.item_id)
    }
}

/// BOM 版本
///
/// 行項集合以版本為單位演進；鎖定後的版本需特權覆寫才能再編輯。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomVersion {
    /// 記錄ID
    pub id: i64,

    /// 所屬 BOM
    pub bom_id: i64,

    /// 版本號（如 "V1"）
    pub version: String,

    /// 生效日期
    pub effective_from: NaiveDate,

    /// 行項用量對應的產出基準數量
    pub yield_base: Decimal,

    /// 審批狀態
    pub status: ApprovalStatus,

    /// 鎖定標記
    #[serde(default)]
    pub locked: bool,

    /// 行項（舊資料以 `ingredients` 鍵寫入，讀取邊界統一成 composition）
    #[serde(alias = "ingredients")]
    pub composition: Vec<BomLine>,

    /// 創建時間
    #[serde(with = "time::datetime_string")]
    pub created_at: NaiveDateTime,
}

impl BomVersion {
    /// 創建新的版本（初始為待審批、未鎖定）
    pub fn new(id: i64, bom_id: i64, version: String, effective_from: NaiveDate) -> Self {
        Self {
            id,
            bom_id,
            version,
            effective_from,
            yield_base: Decimal::from(DEFAULT_YIELD_BASE),
            status: ApprovalStatus::Pending,
            locked: false,
            composition: Vec::new(),
            created_at: time::now(),
        }
    }

    /// 建構器模式：設置產出基準
    pub fn with_yield_base(mut self, yield_base: Decimal) -> Self {
        self.yield_base = yield_base;
        self
    }

    /// 建構器模式：設置行項
    pub fn with_composition(mut self, composition: Vec<BomLine>) -> Self {
        self.composition = composition;
        self
    }

    /// 是否有行項
    pub fn has_lines(&self) -> bool {
        !self.composition.is_empty()
    }

    /// 展開用的產出基準（零或負值回退到預設 1000，避免除零）
    pub fn effective_yield_base(&self) -> Decimal {
        if self.yield_base > Decimal::ZERO {
            self.yield_base
        } else {
            Decimal::from(DEFAULT_YIELD_BASE)
        }
    }

    /// 是否可參與展開（已審批且有行項）
    pub fn is_explodable(&self) -> bool {
        self.status.is_approved() && self.has_lines()
    }
}

/// BOM 主檔
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bom {
    /// 記錄ID
    pub id: i64,

    /// 編碼
    pub code: String,

    /// 名稱
    pub name: String,

    /// 類別
    pub category: BomCategory,

    /// 生產方式
    pub production_mode: ProductionMode,

    /// 受託廠商（委外時必填）
    #[serde(default)]
    pub manufacturer: Option<String>,

    /// 創建時間
    #[serde(with = "time::datetime_string")]
    pub created_at: NaiveDateTime,
}

impl Bom {
    /// 創建新的 BOM（預設自產）
    pub fn new(id: i64, code: String, name: String, category: BomCategory) -> Self {
        Self {
            id,
            code,
            name,
            category,
            production_mode: ProductionMode::InHouse,
            manufacturer: None,
            created_at: time::now(),
        }
    }

    /// 建構器模式：設置為委外
    pub fn with_subcontracted(mut self, manufacturer: String) -> Self {
        self.production_mode = ProductionMode::Subcontracted;
        self.manufacturer = Some(manufacturer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_yield_base_fallback() {
        let mut v = BomVersion::new(
            1,
            1,
            "V1".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        );
        assert_eq!(v.effective_yield_base(), Decimal::from(1_000));

        v.yield_base = Decimal::ZERO;
        assert_eq!(v.effective_yield_base(), Decimal::from(1_000));

        v.yield_base = Decimal::from(100);
        assert_eq!(v.effective_yield_base(), Decimal::from(100));
    }

    #[test]
    fn test_explodable_requires_approved_and_lines() {
        let mut v = BomVersion::new(
            1,
            1,
            "V1".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        );
        assert!(!v.is_explodable()); // 待審批且無行項

        v.composition.push(BomLine::new(
            ItemType::RawMaterial,
            1,
            "树脂".to_string(),
            Decimal::from(10),
            "kg".to_string(),
        ));
        assert!(!v.is_explodable()); // 仍待審批

        v.status = ApprovalStatus::Approved;
        assert!(v.is_explodable());

        v.status = ApprovalStatus::Rejected;
        assert!(!v.is_explodable());
    }

    #[test]
    fn test_legacy_ingredients_alias() {
        // 舊資料用 ingredients 鍵，讀取邊界歸一到 composition
        let json = r#"{
            "id": 7, "bom_id": 3, "version": "V2",
            "effective_from": "2026-01-01",
            "yield_base": 100, "status": "approved",
            "ingredients": [
                {"item_type": "raw_material", "item_id": 1, "item_name": "树脂",
                 "quantity": 10, "unit": "kg"}
            ],
            "created_at": "2026-01-01 08:00:00"
        }"#;
        let v: BomVersion = serde_json::from_str(json).unwrap();
        assert_eq!(v.composition.len(), 1);
        assert_eq!(v.composition[0].item_name, "树脂");
    }
}
