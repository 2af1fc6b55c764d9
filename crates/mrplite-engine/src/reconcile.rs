//! 庫存對帳
//!
//! 流水是唯一事實來源，快照是派生快取。對帳把每個物料的流水
//! 按基準日切成期初與期間兩段，重算理論餘額並與快照比對；
//! 差異只生成候選，確認後才追加校準流水——歷史記錄絕不改寫。

use chrono::NaiveDate;
use mrplite_core::{
    next_id, time, Document, InventoryRecord, MovementKind, MrpError, RelatedDocType, Result,
};
use rayon::prelude::*;
use rust_decimal::Decimal;

use crate::issue::{apply_material_movement, apply_product_movement};
use crate::OpWarning;

/// 對帳容差（1e-6，Decimal 比較用）
pub fn reconcile_epsilon() -> Decimal {
    Decimal::new(1, 6)
}

/// 重放流水計算原料理論餘額
///
/// `as_of` 給定時只累計當日（含）之前的記錄。
pub fn compute_balance(doc: &Document, material_id: i64, as_of: Option<NaiveDate>) -> Decimal {
    doc.inventory_records
        .iter()
        .filter(|r| r.material_id == material_id)
        .filter(|r| as_of.map_or(true, |d| r.at.date() <= d))
        .map(|r| r.kind.signed(r.quantity))
        .sum()
}

/// 重放流水計算產品理論餘額
pub fn compute_product_balance(doc: &Document, product_id: i64, as_of: Option<NaiveDate>) -> Decimal {
    doc.product_inventory_records
        .iter()
        .filter(|r| r.product_id == product_id)
        .filter(|r| as_of.map_or(true, |d| r.at.date() <= d))
        .map(|r| r.kind.signed(r.quantity))
        .sum()
}

/// 單個物料的對帳結果（理論與快照的差異超過容差時生成）
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReconciliationFinding {
    pub material_id: i64,
    pub material_name: String,
    /// 基準日前流水合計
    pub opening: Decimal,
    /// 期間入向（in / produce-in / return-in）
    pub period_in: Decimal,
    /// 期間消耗（out / consume-out）
    pub period_consumed: Decimal,
    /// 期間調整淨額（adjust-in − adjust-out）
    pub period_adjusted: Decimal,
    /// 理論餘額 = 期初 + 入 − 耗 + 調
    pub theoretical: Decimal,
    /// 當前快照
    pub snapshot: Decimal,
    /// 理論 − 快照
    pub difference: Decimal,
}

fn reconcile_material(
    doc: &Document,
    material_id: i64,
    material_name: &str,
    snapshot: Decimal,
    benchmark: NaiveDate,
) -> ReconciliationFinding {
    let mut opening = Decimal::ZERO;
    let mut period_in = Decimal::ZERO;
    let mut period_consumed = Decimal::ZERO;
    let mut period_adjusted = Decimal::ZERO;

    for r in doc
        .inventory_records
        .iter()
        .filter(|r| r.material_id == material_id)
    {
        if r.is_before(benchmark) {
            opening += r.kind.signed(r.quantity);
            continue;
        }
        match r.kind {
            MovementKind::In | MovementKind::ProduceIn | MovementKind::ReturnIn => {
                period_in += r.quantity;
            }
            MovementKind::Out | MovementKind::ConsumeOut => {
                period_consumed += r.quantity;
            }
            MovementKind::AdjustIn => period_adjusted += r.quantity,
            MovementKind::AdjustOut => period_adjusted -= r.quantity,
        }
    }

    let theoretical = opening + period_in - period_consumed + period_adjusted;
    ReconciliationFinding {
        material_id,
        material_name: material_name.to_string(),
        opening,
        period_in,
        period_consumed,
        period_adjusted,
        theoretical,
        snapshot,
        difference: theoretical - snapshot,
    }
}

/// 全量對帳：回傳差異超過容差的物料清單（免追蹤物料不參與）
///
/// 只讀不寫——校準必須由調用方逐個確認後調用 [`apply_calibration`]。
pub fn reconcile(doc: &Document, benchmark: NaiveDate) -> Vec<ReconciliationFinding> {
    let eps = reconcile_epsilon();
    let findings: Vec<ReconciliationFinding> = doc
        .raw_materials
        .par_iter()
        .filter(|m| !m.is_stock_exempt())
        .map(|m| reconcile_material(doc, m.id, &m.name, m.stock_quantity, benchmark))
        .filter(|f| f.difference.abs() > eps)
        .collect();

    if !findings.is_empty() {
        tracing::warn!("對帳發現 {} 個物料存在差異", findings.len());
    }
    findings
}

/// 確認校準：追加一筆恰好抹平差異的調整流水
///
/// 快照是操作人確認過的盤點實際數，調整流水把重放餘額帶回快照：
/// 理論多於快照沖出（盤虧），少於快照沖入（盤盈）。
/// 校準後「重放 == 快照」重新成立，再跑對帳無差異、重複校準是 no-op。
/// 差異在容差內時不追加記錄，回傳 None。
pub fn apply_calibration(
    doc: &mut Document,
    material_id: i64,
    operator: &str,
) -> Result<Option<i64>> {
    let material = doc.raw_material(material_id)?;
    if material.is_stock_exempt() {
        return Err(MrpError::Validation(format!(
            "物料「{}」免庫存追蹤，不參與校準",
            material.name
        )));
    }
    let (name, unit, snapshot) = (
        material.name.clone(),
        material.unit.clone(),
        material.stock_quantity,
    );

    let theoretical = compute_balance(doc, material_id, None);
    let gap = theoretical - snapshot;
    if gap.abs() <= reconcile_epsilon() {
        return Ok(None);
    }

    let kind = if gap > Decimal::ZERO {
        MovementKind::AdjustOut
    } else {
        MovementKind::AdjustIn
    };
    let now = time::now();
    let record_id = next_id(&doc.inventory_records);
    doc.inventory_records.push(InventoryRecord {
        id: record_id,
        material_id,
        kind,
        quantity: gap.abs(),
        unit,
        reason: format!("對帳校準 理論 {theoretical} → 快照 {snapshot}"),
        operator: operator.to_string(),
        at: now,
        snapshot_stock: snapshot,
    });
    doc.raw_material_mut(material_id)?.set_stock(snapshot, now);

    tracing::info!("物料 {} 校準 {}（{:?}），重放餘額對齊快照 {}", name, gap, kind, snapshot);
    Ok(Some(record_id))
}

/// 手工記一筆出入庫（採購入庫、盤點調整等）
///
/// 數量按物料庫存單位換算後入帳；免追蹤物料照記流水、不動快照。
pub fn record_movement(
    doc: &mut Document,
    material_id: i64,
    kind: MovementKind,
    quantity: Decimal,
    unit: &str,
    reason: &str,
    operator: &str,
) -> Result<Vec<OpWarning>> {
    if quantity <= Decimal::ZERO {
        return Err(MrpError::Validation("出入庫數量必須為正".to_string()));
    }
    let name = doc.raw_material(material_id)?.name.clone();

    apply_material_movement(
        doc,
        material_id,
        &name,
        quantity,
        unit,
        kind,
        reason,
        operator,
        time::now(),
    )
    .map_err(|_| MrpError::not_found("原料", material_id))
}

/// 手工記一筆產品出入庫（出貨、盤點調整等），可選回鏈來源單據
#[allow(clippy::too_many_arguments)]
pub fn record_product_movement(
    doc: &mut Document,
    product_id: i64,
    kind: MovementKind,
    quantity: Decimal,
    unit: &str,
    reason: &str,
    operator: &str,
    related: Option<(RelatedDocType, i64)>,
) -> Result<Vec<OpWarning>> {
    if quantity <= Decimal::ZERO {
        return Err(MrpError::Validation("出入庫數量必須為正".to_string()));
    }
    let name = doc.product_inventory(product_id)?.name.clone();

    apply_product_movement(
        doc,
        product_id,
        &name,
        quantity,
        unit,
        kind,
        reason,
        operator,
        time::now(),
        related,
    )
    .map_err(|_| MrpError::not_found("產品", product_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::add_raw_material;
    use chrono::{Duration, NaiveDateTime};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate) -> NaiveDateTime {
        d.and_hms_opt(8, 0, 0).unwrap()
    }

    /// 直接改快照，模擬流水之外的外部漂移
    fn tamper_snapshot(doc: &mut Document, material_id: i64, qty: i64) {
        doc.raw_material_mut(material_id).unwrap().stock_quantity = Decimal::from(qty);
    }

    fn push_record(
        doc: &mut Document,
        material_id: i64,
        kind: MovementKind,
        qty: i64,
        when: NaiveDateTime,
    ) {
        let id = next_id(&doc.inventory_records);
        doc.inventory_records.push(InventoryRecord {
            id,
            material_id,
            kind,
            quantity: Decimal::from(qty),
            unit: "kg".to_string(),
            reason: String::new(),
            operator: "张三".to_string(),
            at: when,
            snapshot_stock: Decimal::ZERO,
        });
    }

    #[test]
    fn test_compute_balance_replays_all_kinds() {
        let mut doc = Document::empty();
        let mid = add_raw_material(&mut doc, "树脂", "kg", Decimal::ZERO).unwrap();
        let d = date(2026, 3, 1);
        push_record(&mut doc, mid, MovementKind::In, 1_000, at(d));
        push_record(&mut doc, mid, MovementKind::ConsumeOut, 50, at(d));
        push_record(&mut doc, mid, MovementKind::ReturnIn, 5, at(d));
        push_record(&mut doc, mid, MovementKind::AdjustOut, 3, at(d));

        assert_eq!(
            compute_balance(&doc, mid, None),
            Decimal::from(1_000 - 50 + 5 - 3)
        );
        // 截止日早於所有記錄時餘額為零
        assert_eq!(
            compute_balance(&doc, mid, Some(d - Duration::days(1))),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_benchmark_splits_opening_and_period() {
        let mut doc = Document::empty();
        let mid = add_raw_material(&mut doc, "树脂", "kg", Decimal::ZERO).unwrap();
        tamper_snapshot(&mut doc, mid, 940);
        // 基準日前：期初 1000 − 100 = 900
        push_record(&mut doc, mid, MovementKind::In, 1_000, at(date(2026, 1, 5)));
        push_record(&mut doc, mid, MovementKind::ConsumeOut, 100, at(date(2026, 1, 20)));
        // 基準日起：入 80、耗 20、調 −10
        push_record(&mut doc, mid, MovementKind::In, 80, at(date(2026, 2, 1)));
        push_record(&mut doc, mid, MovementKind::ConsumeOut, 20, at(date(2026, 2, 3)));
        push_record(&mut doc, mid, MovementKind::AdjustOut, 10, at(date(2026, 2, 4)));

        let findings = reconcile(&doc, date(2026, 2, 1));
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.opening, Decimal::from(900));
        assert_eq!(f.period_in, Decimal::from(80));
        assert_eq!(f.period_consumed, Decimal::from(20));
        assert_eq!(f.period_adjusted, Decimal::from(-10));
        assert_eq!(f.theoretical, Decimal::from(950));
        assert_eq!(f.difference, Decimal::from(10));
    }

    #[test]
    fn test_matching_snapshot_yields_no_finding() {
        let mut doc = Document::empty();
        let mid = add_raw_material(&mut doc, "树脂", "kg", Decimal::ZERO).unwrap();
        tamper_snapshot(&mut doc, mid, 950);
        push_record(&mut doc, mid, MovementKind::In, 1_000, at(date(2026, 1, 5)));
        push_record(&mut doc, mid, MovementKind::ConsumeOut, 50, at(date(2026, 1, 6)));

        assert!(reconcile(&doc, date(2026, 2, 1)).is_empty());
    }

    #[test]
    fn test_exempt_material_excluded() {
        let mut doc = Document::empty();
        let water = add_raw_material(&mut doc, "去离子水", "kg", Decimal::from(100)).unwrap();
        // 流水與快照嚴重不符，但免追蹤物料不參與對帳
        push_record(&mut doc, water, MovementKind::ConsumeOut, 999, at(date(2026, 1, 5)));

        assert!(reconcile(&doc, date(2026, 2, 1)).is_empty());
        let err = apply_calibration(&mut doc, water, "张三").unwrap_err();
        assert!(matches!(err, MrpError::Validation(_)));
    }

    #[test]
    fn test_calibration_closes_positive_gap_with_adjust_out() {
        let mut doc = Document::empty();
        // 理論 950，快照（盤點數）940：帳面多記 10，沖出
        let mid = add_raw_material(&mut doc, "树脂", "kg", Decimal::ZERO).unwrap();
        tamper_snapshot(&mut doc, mid, 940);
        push_record(&mut doc, mid, MovementKind::In, 1_000, at(date(2026, 1, 5)));
        push_record(&mut doc, mid, MovementKind::ConsumeOut, 50, at(date(2026, 1, 6)));
        let before: Vec<(i64, Decimal)> = doc
            .inventory_records
            .iter()
            .map(|r| (r.id, r.quantity))
            .collect();

        let record_id = apply_calibration(&mut doc, mid, "张三").unwrap();
        assert!(record_id.is_some());

        assert_eq!(
            doc.raw_material(mid).unwrap().stock_quantity,
            Decimal::from(940)
        );
        let last = doc.inventory_records.last().unwrap();
        assert_eq!(last.kind, MovementKind::AdjustOut);
        assert_eq!(last.quantity, Decimal::from(10));
        assert_eq!(last.snapshot_stock, Decimal::from(940));
        // 重放餘額落回快照
        assert_eq!(compute_balance(&doc, mid, None), Decimal::from(940));

        // 既有記錄一條未動
        for (id, qty) in before {
            let r = doc.inventory_records.iter().find(|r| r.id == id).unwrap();
            assert_eq!(r.quantity, qty);
        }
    }

    #[test]
    fn test_calibration_negative_gap_uses_adjust_in() {
        let mut doc = Document::empty();
        // 理論 950，快照 960：帳面少記 10，沖入
        let mid = add_raw_material(&mut doc, "树脂", "kg", Decimal::ZERO).unwrap();
        tamper_snapshot(&mut doc, mid, 960);
        push_record(&mut doc, mid, MovementKind::In, 950, at(date(2026, 1, 5)));

        apply_calibration(&mut doc, mid, "张三").unwrap();
        let last = doc.inventory_records.last().unwrap();
        assert_eq!(last.kind, MovementKind::AdjustIn);
        assert_eq!(last.quantity, Decimal::from(10));
        assert_eq!(
            doc.raw_material(mid).unwrap().stock_quantity,
            Decimal::from(960)
        );
        assert_eq!(compute_balance(&doc, mid, None), Decimal::from(960));
    }

    #[test]
    fn test_calibration_converges_and_second_reconcile_is_clean() {
        let mut doc = Document::empty();
        let mid = add_raw_material(&mut doc, "树脂", "kg", Decimal::ZERO).unwrap();
        tamper_snapshot(&mut doc, mid, 940);
        push_record(&mut doc, mid, MovementKind::In, 1_000, at(date(2026, 1, 5)));
        push_record(&mut doc, mid, MovementKind::ConsumeOut, 50, at(date(2026, 1, 6)));
        assert_eq!(reconcile(&doc, date(2026, 1, 1)).len(), 1);

        apply_calibration(&mut doc, mid, "张三").unwrap();

        // 校準收斂：再跑對帳無差異、重複校準不再追加
        assert!(reconcile(&doc, date(2026, 1, 1)).is_empty());
        let count = doc.inventory_records.len();
        assert!(apply_calibration(&mut doc, mid, "张三").unwrap().is_none());
        assert_eq!(doc.inventory_records.len(), count);
    }

    #[test]
    fn test_calibration_within_epsilon_is_noop() {
        let mut doc = Document::empty();
        let mid = add_raw_material(&mut doc, "树脂", "kg", Decimal::ZERO).unwrap();
        tamper_snapshot(&mut doc, mid, 950);
        push_record(&mut doc, mid, MovementKind::In, 950, at(date(2026, 1, 5)));
        let count = doc.inventory_records.len();

        assert!(apply_calibration(&mut doc, mid, "张三").unwrap().is_none());
        assert_eq!(doc.inventory_records.len(), count);
    }

    #[test]
    fn test_record_movement_converts_and_updates() {
        let mut doc = Document::empty();
        let mid = add_raw_material(&mut doc, "石灰石", "吨", Decimal::from(10)).unwrap();

        record_movement(
            &mut doc,
            mid,
            MovementKind::In,
            Decimal::from(2_000),
            "kg",
            "采购入库",
            "张三",
        )
        .unwrap();

        assert_eq!(
            doc.raw_material(mid).unwrap().stock_quantity,
            Decimal::from(12)
        );
        let record = doc.inventory_records.last().unwrap();
        assert_eq!(record.unit, "吨");
        assert_eq!(record.quantity, Decimal::from(2));

        let err = record_movement(
            &mut doc,
            mid,
            MovementKind::Out,
            Decimal::ZERO,
            "吨",
            "",
            "张三",
        )
        .unwrap_err();
        assert!(matches!(err, MrpError::Validation(_)));
    }

    #[test]
    fn test_record_product_movement_links_shipment() {
        use mrplite_core::{ProductInventory, ProductKind};

        let mut doc = Document::empty();
        let mut product =
            ProductInventory::new(1, "促进剂".to_string(), ProductKind::Finished, "吨".to_string());
        product.stock_quantity = Decimal::from(10);
        doc.product_inventories.push(product);

        record_product_movement(
            &mut doc,
            1,
            MovementKind::Out,
            Decimal::from(2_000),
            "kg",
            "发货出库",
            "张三",
            Some((RelatedDocType::Shipment, 77)),
        )
        .unwrap();

        // 2000 kg = 2 吨
        assert_eq!(
            doc.product_inventory(1).unwrap().stock_quantity,
            Decimal::from(8)
        );
        let record = doc.product_inventory_records.last().unwrap();
        assert_eq!(record.kind, MovementKind::Out);
        assert_eq!(record.quantity, Decimal::from(2));
        assert_eq!(record.related_doc_type, Some(RelatedDocType::Shipment));
        assert_eq!(record.related_doc_id, Some(77));

        let err = record_product_movement(
            &mut doc,
            1,
            MovementKind::Out,
            Decimal::ZERO,
            "吨",
            "",
            "张三",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, MrpError::Validation(_)));
    }
}
