//! # MRP-Lite
//!
//! 輕量級單機 MRP 引擎：BOM 版本管理與展開、生產訂單狀態機、
//! 領料過帳、只追加庫存流水與對帳。全部數據持久化為單一 JSON
//! 文件（寫臨時文件後原子改名，寫前自動備份）。
//!
//! ## 快速開始
//!
//! ```no_run
//! use mrp_lite::{BomCategory, MrpEngine};
//! use rust_decimal::Decimal;
//!
//! # fn main() -> mrp_lite::Result<()> {
//! let engine = MrpEngine::open("data/mrp.json");
//! let resin = engine.add_raw_material("树脂", "kg", Decimal::from(1_000))?;
//! let bom = engine.add_bom("CJJ-001", "促进剂", BomCategory::Accelerator)?;
//! # let _ = (resin, bom);
//! # Ok(())
//! # }
//! ```

pub use mrplite_core::{
    convert, convert_units, is_stock_exempt, next_id, ApprovalStatus, Bom, BomCategory, BomLine,
    BomVersion, Document, HasId, InventoryRecord, IssueLine, IssueStatus, ItemType, MaterialIssue,
    MovementKind, MrpError, OrderStatus, ProductInventory, ProductInventoryRecord, ProductKind,
    ProductionMode, ProductionOrder, RawMaterial, RelatedDocType, Result, Unit, UnitFamily,
};
pub use mrplite_engine::{
    BomNode, BomPatch, CancelOutcome, IssueCreation, LineDelta, LineProblem, MaterialPatch,
    MrpEngine, OpWarning, OrderPatch, PostOutcome, ReconciliationFinding, RequirementLine,
    VersionPatch,
};
pub use mrplite_store::{Store, StoreConfig};

/// 細粒度 API（繞過門面直接在 `Document` 上操作時使用）
pub mod engine {
    pub use mrplite_engine::{bom, catalog, issue, order, reconcile};
}
