//! # MRP-Lite Engine
//!
//! 業務引擎：BOM 展開、生產訂單狀態機、領料過帳、庫存對帳。
//!
//! 所有函數在載入好的 `Document` 上純內存運算；
//! 持久化統一走 `service::MrpEngine`（載入 → 變更 → 保存）。

pub mod bom;
pub mod catalog;
pub mod issue;
pub mod order;
pub mod reconcile;
pub mod service;

// Re-export 主要類型
pub use bom::{BomNode, LineDelta, RequirementLine, VersionPatch};
pub use catalog::{BomPatch, MaterialPatch};
pub use issue::{CancelOutcome, PostOutcome};
pub use order::{IssueCreation, OrderPatch};
pub use reconcile::{compute_balance, reconcile_epsilon, ReconciliationFinding};
pub use service::MrpEngine;

/// 操作警告（降級路徑：不中止操作，但必須回傳給調用方）
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpWarning {
    /// 涉及對象（物料名、單號等）
    pub subject: String,
    /// 說明
    pub message: String,
}

impl OpWarning {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// 批量操作中單行的失敗記錄
///
/// 過帳等批量操作不因單行壞數據整體中止：壞行跳過並記錄在這裡，
/// 一併回傳給調用方，絕不靜默丟棄。
#[derive(Debug, Clone, serde::Serialize)]
pub struct LineProblem {
    /// 行序號（0 起）
    pub line_index: usize,
    /// 行上的物料名稱快取
    pub item_name: String,
    /// 失敗原因
    pub message: String,
}

impl LineProblem {
    pub fn new(line_index: usize, item_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line_index,
            item_name: item_name.into(),
            message: message.into(),
        }
    }
}
