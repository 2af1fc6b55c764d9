//! 原料模型

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::time;

/// 免庫存追蹤的物料名稱（「水」類）
///
/// 針對這些物料的出入庫流水照常記錄，但絕不更新其庫存快照，
/// 對帳時也整體排除。
pub const STOCK_EXEMPT_NAMES: [&str; 6] = ["水", "纯水", "纯净水", "去离子水", "自来水", "water"];

/// 物料名稱是否免庫存追蹤
pub fn is_stock_exempt(name: &str) -> bool {
    let key = name.trim().to_lowercase();
    STOCK_EXEMPT_NAMES.iter().any(|n| *n == key)
}

/// 原料
///
/// `stock_quantity` 是流水帳的派生快照：除了尚待對帳的暫時漂移之外，
/// 必須等於按流水重放出的餘額。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMaterial {
    /// 記錄ID（類別內唯一，max+1 分配，刪除後不復用）
    pub id: i64,

    /// 名稱（唯一鍵）
    pub name: String,

    /// 庫存單位（通常為質量單位）
    pub unit: String,

    /// 當前庫存快照（以自身單位計）
    pub stock_quantity: Decimal,

    /// 建檔日期
    pub created_date: NaiveDate,

    /// 最近一次庫存變動時間
    #[serde(default, with = "time::option_datetime_string")]
    pub stock_updated_at: Option<NaiveDateTime>,
}

impl RawMaterial {
    /// 創建新的原料記錄
    pub fn new(id: i64, name: String, unit: String, stock_quantity: Decimal) -> Self {
        Self {
            id,
            name,
            unit,
            stock_quantity,
            created_date: time::now().date(),
            stock_updated_at: None,
        }
    }

    /// 是否免庫存追蹤
    pub fn is_stock_exempt(&self) -> bool {
        is_stock_exempt(&self.name)
    }

    /// 更新庫存快照
    pub fn set_stock(&mut self, quantity: Decimal, at: NaiveDateTime) {
        self.stock_quantity = quantity;
        self.stock_updated_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_exempt_names() {
        assert!(is_stock_exempt("水"));
        assert!(is_stock_exempt("去离子水"));
        assert!(is_stock_exempt("Water"));
        assert!(is_stock_exempt(" water "));
        assert!(!is_stock_exempt("树脂"));
        assert!(!is_stock_exempt("盐水")); // 僅固定名單，不做子串匹配
    }

    #[test]
    fn test_set_stock_touches_timestamp() {
        let mut m = RawMaterial::new(1, "树脂".to_string(), "kg".to_string(), Decimal::from(100));
        assert!(m.stock_updated_at.is_none());

        let at = time::now();
        m.set_stock(Decimal::from(80), at);
        assert_eq!(m.stock_quantity, Decimal::from(80));
        assert_eq!(m.stock_updated_at, Some(at));
    }
}
