//! 單一持久化文件（Document）
//!
//! 全部業務資料持久化為一個 JSON 對象：類別名 → 記錄數組。
//! 排除模組（實驗記錄、項目追蹤等）擁有的類別原樣透傳，
//! 本 crate 只對自己的八個類別建模。

use serde::{Deserialize, Serialize};

use crate::bom::{Bom, BomVersion};
use crate::issue::MaterialIssue;
use crate::ledger::{
    normalized_product_key, InventoryRecord, ProductInventory, ProductInventoryRecord, ProductKind,
};
use crate::material::RawMaterial;
use crate::order::ProductionOrder;
use crate::{MrpError, Result};

/// 有整數ID的記錄
pub trait HasId {
    fn id(&self) -> i64;
}

macro_rules! impl_has_id {
    ($($ty:ty),+ $(,)?) => {
        $(impl HasId for $ty {
            fn id(&self) -> i64 {
                self.id
            }
        })+
    };
}

impl_has_id!(
    RawMaterial,
    Bom,
    BomVersion,
    ProductionOrder,
    MaterialIssue,
    InventoryRecord,
    ProductInventory,
    ProductInventoryRecord,
);

/// 類別內分配下一個ID（max + 1，刪除後不復用）
pub fn next_id<T: HasId>(records: &[T]) -> i64 {
    records.iter().map(HasId::id).max().unwrap_or(0) + 1
}

/// 持久化文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    /// 原料主檔
    pub raw_materials: Vec<RawMaterial>,

    /// BOM 主檔
    pub boms: Vec<Bom>,

    /// BOM 版本
    pub bom_versions: Vec<BomVersion>,

    /// 生產訂單
    pub production_orders: Vec<ProductionOrder>,

    /// 領料單
    pub material_issues: Vec<MaterialIssue>,

    /// 原料庫存流水（只追加）
    pub inventory_records: Vec<InventoryRecord>,

    /// 產品庫存
    pub product_inventories: Vec<ProductInventory>,

    /// 產品庫存流水（只追加）
    pub product_inventory_records: Vec<ProductInventoryRecord>,

    /// 排除模組擁有的類別，讀寫時原樣保留
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// 空文件（首次運行時由持久層寫入）
    pub fn empty() -> Self {
        Self::default()
    }

    // ---- 原料 ----

    pub fn raw_material(&self, id: i64) -> Result<&RawMaterial> {
        self.raw_materials
            .iter()
            .find(|m| m.id == id)
            .ok_or(MrpError::not_found("原料", id))
    }

    pub fn raw_material_mut(&mut self, id: i64) -> Result<&mut RawMaterial> {
        self.raw_materials
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(MrpError::not_found("原料", id))
    }

    /// 按名稱查原料（ID 失效時的回退匹配）
    pub fn raw_material_by_name(&self, name: &str) -> Option<&RawMaterial> {
        let key = name.trim();
        self.raw_materials.iter().find(|m| m.name == key)
    }

    // ---- BOM ----

    pub fn bom(&self, id: i64) -> Result<&Bom> {
        self.boms
            .iter()
            .find(|b| b.id == id)
            .ok_or(MrpError::not_found("BOM", id))
    }

    pub fn bom_mut(&mut self, id: i64) -> Result<&mut Bom> {
        self.boms
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(MrpError::not_found("BOM", id))
    }

    pub fn bom_version(&self, id: i64) -> Result<&BomVersion> {
        self.bom_versions
            .iter()
            .find(|v| v.id == id)
            .ok_or(MrpError::not_found("BOM版本", id))
    }

    pub fn bom_version_mut(&mut self, id: i64) -> Result<&mut BomVersion> {
        self.bom_versions
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(MrpError::not_found("BOM版本", id))
    }

    /// 某 BOM 的全部版本
    pub fn versions_of(&self, bom_id: i64) -> Vec<&BomVersion> {
        self.bom_versions
            .iter()
            .filter(|v| v.bom_id == bom_id)
            .collect()
    }

    // ---- 訂單 / 領料單 ----

    pub fn production_order(&self, id: i64) -> Result<&ProductionOrder> {
        self.production_orders
            .iter()
            .find(|o| o.id == id)
            .ok_or(MrpError::not_found("生產訂單", id))
    }

    pub fn production_order_mut(&mut self, id: i64) -> Result<&mut ProductionOrder> {
        self.production_orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(MrpError::not_found("生產訂單", id))
    }

    pub fn material_issue(&self, id: i64) -> Result<&MaterialIssue> {
        self.material_issues
            .iter()
            .find(|i| i.id == id)
            .ok_or(MrpError::not_found("領料單", id))
    }

    pub fn material_issue_mut(&mut self, id: i64) -> Result<&mut MaterialIssue> {
        self.material_issues
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(MrpError::not_found("領料單", id))
    }

    /// 某訂單的全部領料單
    pub fn issues_of_order(&self, order_id: i64) -> Vec<&MaterialIssue> {
        self.material_issues
            .iter()
            .filter(|i| i.order_id == order_id)
            .collect()
    }

    // ---- 產品庫存 ----

    pub fn product_inventory(&self, id: i64) -> Result<&ProductInventory> {
        self.product_inventories
            .iter()
            .find(|p| p.id == id)
            .ok_or(MrpError::not_found("產品庫存", id))
    }

    /// 按歸一化鍵（名稱 + 類型）查產品庫存
    pub fn product_inventory_by_key(
        &mut self,
        name: &str,
        kind: ProductKind,
    ) -> Option<&mut ProductInventory> {
        let key = normalized_product_key(name, kind);
        self.product_inventories
            .iter_mut()
            .find(|p| p.normalized_key() == key)
    }

    // ---- 引用檢查（刪除守衛） ----

    /// 原料是否被任何 BOM 行項引用
    pub fn material_referenced_by_bom(&self, material_id: i64) -> bool {
        use crate::bom::ItemType;
        self.bom_versions.iter().any(|v| {
            v.composition
                .iter()
                .any(|l| l.item_type == ItemType::RawMaterial && l.item_id == material_id)
        })
    }

    /// BOM 是否被任何生產訂單引用
    pub fn bom_referenced_by_order(&self, bom_id: i64) -> bool {
        self.production_orders.iter().any(|o| o.bom_id == bom_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_next_id_is_max_plus_one() {
        let mut doc = Document::empty();
        assert_eq!(next_id(&doc.raw_materials), 1);

        doc.raw_materials.push(RawMaterial::new(
            1,
            "树脂".to_string(),
            "kg".to_string(),
            Decimal::ZERO,
        ));
        doc.raw_materials.push(RawMaterial::new(
            7,
            "固化剂".to_string(),
            "kg".to_string(),
            Decimal::ZERO,
        ));
        // 刪除不影響：即使 2..6 缺號，下一個ID仍是 max+1
        assert_eq!(next_id(&doc.raw_materials), 8);
    }

    #[test]
    fn test_lookup_not_found() {
        let doc = Document::empty();
        let err = doc.raw_material(42).unwrap_err();
        assert!(matches!(
            err,
            crate::MrpError::NotFound { entity: "原料", id: 42 }
        ));
    }

    #[test]
    fn test_foreign_categories_survive_round_trip() {
        // 排除模組的類別（如實驗記錄）必須原樣透傳
        let json = r#"{
            "raw_materials": [],
            "experiments": [{"id": 1, "title": "批次试验"}]
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert!(doc.extra.contains_key("experiments"));

        let out = serde_json::to_string(&doc).unwrap();
        let back: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(back["experiments"][0]["title"], "批次试验");
    }

    #[test]
    fn test_product_key_lookup_is_normalized() {
        let mut doc = Document::empty();
        doc.product_inventories.push(ProductInventory::new(
            1,
            "促进剂-A".to_string(),
            ProductKind::Finished,
            "kg".to_string(),
        ));

        assert!(doc
            .product_inventory_by_key(" 促进剂-a ", ProductKind::Finished)
            .is_some());
        assert!(doc
            .product_inventory_by_key("促进剂-A", ProductKind::SemiFinished)
            .is_none());
    }
}
