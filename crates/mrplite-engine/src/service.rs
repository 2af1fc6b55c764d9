//! 對外服務門面
//!
//! UI / 授權層只跟 `MrpEngine` 打交道。每個變更操作都是
//! 載入 → 變更 → 保存 一個整體（鎖內執行），調用間不緩存文件；
//! 讀操作載入當前文件快照。操作人身份由調用方顯式傳入。

use chrono::NaiveDate;
use mrplite_core::{
    Bom, BomCategory, BomLine, BomVersion, Document, MaterialIssue, MovementKind,
    ProductInventory, ProductionOrder, RawMaterial, RelatedDocType, Result,
};
use mrplite_store::{Store, StoreConfig};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::bom::{self, BomNode, LineDelta, RequirementLine, VersionPatch};
use crate::catalog::{self, BomPatch, MaterialPatch};
use crate::issue::{self, CancelOutcome, PostOutcome};
use crate::order::{self, IssueCreation, OrderPatch};
use crate::reconcile::{self, ReconciliationFinding};
use crate::OpWarning;

/// MRP 引擎門面
pub struct MrpEngine {
    store: Store,
}

impl MrpEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// 以默認配置打開指定資料檔
    pub fn open(data_path: impl Into<PathBuf>) -> Self {
        Self::new(Store::new(StoreConfig::new(data_path)))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// 載入當前文件快照（讀操作入口）
    pub fn document(&self) -> Result<Document> {
        self.store.load()
    }

    // ---- 原料主檔 ----

    pub fn add_raw_material(
        &self,
        name: &str,
        unit: &str,
        initial_stock: Decimal,
    ) -> Result<i64> {
        self.store
            .mutate(|doc| catalog::add_raw_material(doc, name, unit, initial_stock))
    }

    pub fn update_raw_material(&self, id: i64, patch: MaterialPatch) -> Result<()> {
        self.store
            .mutate(|doc| catalog::update_raw_material(doc, id, patch))
    }

    pub fn delete_raw_material(&self, id: i64) -> Result<()> {
        self.store.mutate(|doc| catalog::delete_raw_material(doc, id))
    }

    pub fn raw_materials(&self) -> Result<Vec<RawMaterial>> {
        Ok(self.store.load()?.raw_materials)
    }

    // ---- BOM 主檔與版本 ----

    pub fn add_bom(&self, code: &str, name: &str, category: BomCategory) -> Result<i64> {
        self.store
            .mutate(|doc| catalog::add_bom(doc, code, name, category))
    }

    pub fn update_bom(&self, id: i64, patch: BomPatch) -> Result<()> {
        self.store.mutate(|doc| catalog::update_bom(doc, id, patch))
    }

    pub fn delete_bom(&self, id: i64) -> Result<()> {
        self.store.mutate(|doc| catalog::delete_bom(doc, id))
    }

    pub fn boms(&self) -> Result<Vec<Bom>> {
        Ok(self.store.load()?.boms)
    }

    pub fn add_bom_version(
        &self,
        bom_id: i64,
        version: &str,
        effective_from: NaiveDate,
        yield_base: Decimal,
        composition: Vec<BomLine>,
    ) -> Result<i64> {
        self.store.mutate(|doc| {
            bom::add_version(doc, bom_id, version, effective_from, yield_base, composition)
        })
    }

    /// 更新版本；`privileged` 為調用方傳入的特權標誌（鎖定版本覆寫用）
    pub fn update_bom_version(
        &self,
        version_id: i64,
        patch: VersionPatch,
        privileged: bool,
    ) -> Result<()> {
        self.store
            .mutate(|doc| bom::update_version(doc, version_id, patch, privileged))
    }

    pub fn approve_bom_version(&self, version_id: i64) -> Result<()> {
        self.store.mutate(|doc| bom::approve_version(doc, version_id))
    }

    pub fn reject_bom_version(&self, version_id: i64) -> Result<()> {
        self.store.mutate(|doc| bom::reject_version(doc, version_id))
    }

    pub fn bom_versions(&self, bom_id: i64) -> Result<Vec<BomVersion>> {
        let doc = self.store.load()?;
        Ok(doc.versions_of(bom_id).into_iter().cloned().collect())
    }

    pub fn effective_version(&self, bom_id: i64, as_of: NaiveDate) -> Result<Option<BomVersion>> {
        let doc = self.store.load()?;
        Ok(bom::effective_version(&doc, bom_id, as_of).cloned())
    }

    pub fn explode(&self, version_id: i64, target_qty: Decimal) -> Result<Vec<RequirementLine>> {
        let doc = self.store.load()?;
        let version = doc.bom_version(version_id)?;
        Ok(bom::explode(version, target_qty))
    }

    /// 多層 BOM 結構樹（帶循環守衛）
    pub fn bom_structure(&self, bom_id: i64, as_of: NaiveDate) -> Result<BomNode> {
        let doc = self.store.load()?;
        bom::render_structure(&doc, bom_id, as_of)
    }

    pub fn diff_versions(&self, version_a: i64, version_b: i64) -> Result<Vec<LineDelta>> {
        let doc = self.store.load()?;
        let a = doc.bom_version(version_a)?;
        let b = doc.bom_version(version_b)?;
        Ok(bom::diff_versions(a, b))
    }

    // ---- 生產訂單 ----

    pub fn create_order(
        &self,
        bom_id: i64,
        planned_quantity: Decimal,
        unit: &str,
        planned_date: NaiveDate,
    ) -> Result<i64> {
        self.store
            .mutate(|doc| order::create_order(doc, bom_id, planned_quantity, unit, planned_date))
    }

    pub fn update_order(&self, order_id: i64, patch: OrderPatch) -> Result<()> {
        self.store.mutate(|doc| order::update_order(doc, order_id, patch))
    }

    pub fn release_order(&self, order_id: i64) -> Result<()> {
        self.store.mutate(|doc| order::release_order(doc, order_id))
    }

    pub fn create_issue_from_order(&self, order_id: i64) -> Result<IssueCreation> {
        self.store
            .mutate(|doc| order::create_issue_from_order(doc, order_id))
    }

    pub fn finish_order(&self, order_id: i64, operator: &str) -> Result<Vec<OpWarning>> {
        self.store
            .mutate(|doc| order::finish_order(doc, order_id, operator))
    }

    pub fn delete_order(&self, order_id: i64) -> Result<()> {
        self.store.mutate(|doc| order::delete_order(doc, order_id))
    }

    pub fn production_orders(&self) -> Result<Vec<ProductionOrder>> {
        Ok(self.store.load()?.production_orders)
    }

    // ---- 領料單 ----

    pub fn post_issue(&self, issue_id: i64, operator: &str) -> Result<PostOutcome> {
        self.store
            .mutate(|doc| issue::post_issue(doc, issue_id, operator))
    }

    pub fn cancel_issue(&self, issue_id: i64, operator: &str) -> Result<CancelOutcome> {
        self.store
            .mutate(|doc| issue::cancel_issue(doc, issue_id, operator))
    }

    pub fn delete_issue(&self, issue_id: i64) -> Result<()> {
        self.store.mutate(|doc| issue::delete_issue(doc, issue_id))
    }

    pub fn material_issues(&self, order_id: i64) -> Result<Vec<MaterialIssue>> {
        let doc = self.store.load()?;
        Ok(doc.issues_of_order(order_id).into_iter().cloned().collect())
    }

    // ---- 庫存帳務 ----

    pub fn compute_balance(&self, material_id: i64, as_of: Option<NaiveDate>) -> Result<Decimal> {
        let doc = self.store.load()?;
        doc.raw_material(material_id)?;
        Ok(reconcile::compute_balance(&doc, material_id, as_of))
    }

    pub fn compute_product_balance(
        &self,
        product_id: i64,
        as_of: Option<NaiveDate>,
    ) -> Result<Decimal> {
        let doc = self.store.load()?;
        doc.product_inventory(product_id)?;
        Ok(reconcile::compute_product_balance(&doc, product_id, as_of))
    }

    pub fn reconcile(&self, benchmark: NaiveDate) -> Result<Vec<ReconciliationFinding>> {
        let doc = self.store.load()?;
        Ok(reconcile::reconcile(&doc, benchmark))
    }

    pub fn apply_calibration(&self, material_id: i64, operator: &str) -> Result<Option<i64>> {
        self.store
            .mutate(|doc| reconcile::apply_calibration(doc, material_id, operator))
    }

    pub fn record_movement(
        &self,
        material_id: i64,
        kind: MovementKind,
        quantity: Decimal,
        unit: &str,
        reason: &str,
        operator: &str,
    ) -> Result<Vec<OpWarning>> {
        self.store.mutate(|doc| {
            reconcile::record_movement(doc, material_id, kind, quantity, unit, reason, operator)
        })
    }

    /// 手工記一筆產品出入庫（出貨等），可選回鏈來源單據
    #[allow(clippy::too_many_arguments)]
    pub fn record_product_movement(
        &self,
        product_id: i64,
        kind: MovementKind,
        quantity: Decimal,
        unit: &str,
        reason: &str,
        operator: &str,
        related: Option<(RelatedDocType, i64)>,
    ) -> Result<Vec<OpWarning>> {
        self.store.mutate(|doc| {
            reconcile::record_product_movement(
                doc, product_id, kind, quantity, unit, reason, operator, related,
            )
        })
    }

    pub fn product_inventories(&self) -> Result<Vec<ProductInventory>> {
        Ok(self.store.load()?.product_inventories)
    }
}
