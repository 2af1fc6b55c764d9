//! # MRP-Lite Core
//!
//! 核心資料模型與類型定義：
//! 單一文件資料庫（Document）、BOM、生產訂單、領料單、庫存流水。

pub mod bom;
pub mod document;
pub mod issue;
pub mod ledger;
pub mod material;
pub mod order;
pub mod time;
pub mod unit;

// Re-export 主要類型
pub use bom::{ApprovalStatus, Bom, BomCategory, BomLine, BomVersion, ItemType, ProductionMode};
pub use document::{next_id, Document, HasId};
pub use issue::{IssueLine, IssueStatus, MaterialIssue};
pub use ledger::{
    normalized_product_key, InventoryRecord, MovementKind, ProductInventory,
    ProductInventoryRecord, ProductKind, RelatedDocType,
};
pub use material::{is_stock_exempt, RawMaterial, STOCK_EXEMPT_NAMES};
pub use order::{OrderStatus, ProductionOrder};
pub use unit::{convert, convert_units, Unit, UnitFamily};

/// MRP 錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum MrpError {
    #[error("找不到{entity}: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} {id} 當前狀態為「{current}」，不允許此操作")]
    InvalidState {
        entity: &'static str,
        id: i64,
        current: String,
    },

    #[error("資料驗證失敗: {0}")]
    Validation(String),

    #[error("唯一鍵重複: {0}")]
    Duplicate(String),

    #[error("BOM 版本 {0} 已鎖定，需要特權覆寫才能修改")]
    VersionLocked(i64),

    #[error("獲取資料檔案鎖逾時（{0} 秒），請稍後重試")]
    LockTimeout(u64),

    #[error("持久化失敗: {0}")]
    Persistence(String),

    #[error("IO 錯誤: {0}")]
    Io(#[from] std::io::Error),
}

impl MrpError {
    /// 建構 not-found 錯誤
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// 建構 invalid-state 錯誤（攜帶當前狀態，方便調用方解釋衝突）
    pub fn invalid_state(entity: &'static str, id: i64, current: impl Into<String>) -> Self {
        Self::InvalidState {
            entity,
            id,
            current: current.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MrpError>;
