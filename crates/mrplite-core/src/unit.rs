//! 單位換算工具
//!
//! 純函數、無狀態。負責單位名稱正規化（kg/公斤/千克 視為同一單位）
//! 與同族單位間的數量換算。跨族換算（質量 <-> 體積）一律回傳 `None`，
//! 調用方保留原值並記錄警告，絕不靜默換算。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 單位族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitFamily {
    /// 質量
    Mass,
    /// 體積
    Volume,
}

/// 已識別的計量單位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// 公斤
    Kilogram,
    /// 克
    Gram,
    /// 吨
    Ton,
    /// 磅
    Pound,
    /// 升
    Liter,
    /// 毫升
    Milliliter,
}

impl Unit {
    /// 正規化單位名稱（大小寫不敏感，支持拉丁縮寫與中文字形）
    pub fn normalize(name: &str) -> Option<Unit> {
        let key = name.trim().to_lowercase();
        match key.as_str() {
            "kg" | "kgs" | "kilogram" | "kilograms" | "公斤" | "千克" => Some(Unit::Kilogram),
            "g" | "gram" | "grams" | "克" => Some(Unit::Gram),
            "t" | "ton" | "tons" | "tonne" | "tonnes" | "吨" | "噸" => Some(Unit::Ton),
            "lb" | "lbs" | "pound" | "pounds" | "磅" => Some(Unit::Pound),
            "l" | "liter" | "liters" | "litre" | "litres" | "升" => Some(Unit::Liter),
            "ml" | "milliliter" | "milliliters" | "millilitre" | "毫升" => Some(Unit::Milliliter),
            _ => None,
        }
    }

    /// 所屬單位族
    pub fn family(&self) -> UnitFamily {
        match self {
            Unit::Kilogram | Unit::Gram | Unit::Ton | Unit::Pound => UnitFamily::Mass,
            Unit::Liter | Unit::Milliliter => UnitFamily::Volume,
        }
    }

    /// 標準顯示名
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Kilogram => "kg",
            Unit::Gram => "g",
            Unit::Ton => "t",
            Unit::Pound => "lb",
            Unit::Liter => "L",
            Unit::Milliliter => "mL",
        }
    }

    /// 換算到族基準單位（質量 -> 克，體積 -> 毫升）的係數
    fn base_factor(&self) -> Decimal {
        match self {
            Unit::Kilogram => Decimal::from(1_000),
            Unit::Gram => Decimal::ONE,
            Unit::Ton => Decimal::from(1_000_000),
            // 1 lb = 453.59237 g（國際磅定義）
            Unit::Pound => Decimal::new(45_359_237, 5),
            Unit::Liter => Decimal::from(1_000),
            Unit::Milliliter => Decimal::ONE,
        }
    }
}

/// 同族單位間換算；跨族或無法識別回傳 `None`
pub fn convert_units(quantity: Decimal, from: Unit, to: Unit) -> Option<Decimal> {
    if from.family() != to.family() {
        return None;
    }
    Some(quantity * from.base_factor() / to.base_factor())
}

/// 按單位名稱換算
///
/// 任一名稱無法識別、或兩者不同族，回傳 `None`。
/// 調用方應保留原值並記錄警告（參見領料過帳邏輯）。
pub fn convert(quantity: Decimal, from: &str, to: &str) -> Option<Decimal> {
    let from = Unit::normalize(from)?;
    let to = Unit::normalize(to)?;
    convert_units(quantity, from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("kg", Unit::Kilogram)]
    #[case("KG", Unit::Kilogram)]
    #[case("公斤", Unit::Kilogram)]
    #[case("千克", Unit::Kilogram)]
    #[case("吨", Unit::Ton)]
    #[case("噸", Unit::Ton)]
    #[case(" ton ", Unit::Ton)]
    #[case("T", Unit::Ton)]
    #[case("lbs", Unit::Pound)]
    #[case("磅", Unit::Pound)]
    #[case("mL", Unit::Milliliter)]
    #[case("毫升", Unit::Milliliter)]
    #[case("L", Unit::Liter)]
    #[case("升", Unit::Liter)]
    #[case("克", Unit::Gram)]
    fn test_normalize_aliases(#[case] name: &str, #[case] expected: Unit) {
        assert_eq!(Unit::normalize(name), Some(expected));
    }

    #[test]
    fn test_normalize_unknown() {
        assert_eq!(Unit::normalize("桶"), None);
        assert_eq!(Unit::normalize(""), None);
    }

    #[test]
    fn test_mass_conversion() {
        // 1 吨 = 1000 kg
        assert_eq!(
            convert(Decimal::ONE, "吨", "kg"),
            Some(Decimal::from(1_000))
        );
        // 500 kg = 0.5 吨
        assert_eq!(
            convert(Decimal::from(500), "kg", "t"),
            Some(Decimal::new(5, 1))
        );
        // 1 lb = 453.59237 g
        assert_eq!(
            convert(Decimal::ONE, "lb", "g"),
            Some(Decimal::new(45_359_237, 5))
        );
    }

    #[test]
    fn test_volume_conversion() {
        assert_eq!(
            convert(Decimal::from(2), "L", "mL"),
            Some(Decimal::from(2_000))
        );
    }

    #[test]
    fn test_cross_family_is_none() {
        // 質量 -> 體積 絕不靜默換算
        assert_eq!(convert(Decimal::from(10), "kg", "L"), None);
        assert_eq!(convert(Decimal::from(10), "mL", "吨"), None);
    }

    const ALL_UNITS: [Unit; 6] = [
        Unit::Kilogram,
        Unit::Gram,
        Unit::Ton,
        Unit::Pound,
        Unit::Liter,
        Unit::Milliliter,
    ];

    proptest! {
        /// Convert(x, u, u) == x（恆等換算）
        #[test]
        fn prop_identity_conversion(x in 0i64..1_000_000, idx in 0usize..6) {
            let u = ALL_UNITS[idx];
            let qty = Decimal::from(x);
            prop_assert_eq!(convert_units(qty, u, u), Some(qty));
        }

        /// 同族往返換算 Convert(Convert(x, a, b), b, a) ≈ x
        #[test]
        fn prop_round_trip_conversion(x in 0i64..1_000_000, a in 0usize..6, b in 0usize..6) {
            let (ua, ub) = (ALL_UNITS[a], ALL_UNITS[b]);
            prop_assume!(ua.family() == ub.family());
            let qty = Decimal::from(x);
            let there = convert_units(qty, ua, ub).unwrap();
            let back = convert_units(there, ub, ua).unwrap();
            let eps = Decimal::new(1, 6);
            prop_assert!((back - qty).abs() <= eps, "back={} qty={}", back, qty);
        }
    }
}
