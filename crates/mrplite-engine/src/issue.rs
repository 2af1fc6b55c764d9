//! 領料單生命週期
//!
//! draft → posted，取消過帳沖回並回到 draft。
//! 過帳按行盡力而為：單行壞數據跳過並記錄，絕不整體中止、
//! 也絕不靜默丟棄——問題清單隨結果一併回傳。

use mrplite_core::{
    next_id, time, unit as units, Document, InventoryRecord, IssueStatus, ItemType, MovementKind,
    MrpError, ProductInventoryRecord, RelatedDocType, Result,
};
use rust_decimal::Decimal;

use crate::{LineProblem, OpWarning};

/// 過帳結果
#[derive(Debug, Clone)]
pub struct PostOutcome {
    pub issue_id: i64,
    /// 跳過的壞行（ID 與名稱都無法解析等）
    pub problems: Vec<LineProblem>,
    /// 降級路徑（單位無法換算等）
    pub warnings: Vec<OpWarning>,
}

/// 取消過帳結果
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub issue_id: i64,
    pub problems: Vec<LineProblem>,
    pub warnings: Vec<OpWarning>,
}

/// 單行結算的上下文：行數量換算到庫存單位後的扣減值
struct ResolvedLine {
    converted_qty: Decimal,
    stock_unit: String,
    warning: Option<OpWarning>,
}

/// 把行數量換算到物料庫存單位；跨族/無法識別時保留原值並給出警告
fn resolve_quantity(
    line_qty: Decimal,
    line_unit: &str,
    stock_unit: &str,
    item_name: &str,
) -> ResolvedLine {
    match units::convert(line_qty, line_unit, stock_unit) {
        Some(v) => ResolvedLine {
            converted_qty: v,
            stock_unit: stock_unit.to_string(),
            warning: None,
        },
        None => {
            tracing::warn!(
                "物料 {} 單位無法換算（{} → {}），按原值記帳",
                item_name,
                line_unit,
                stock_unit
            );
            ResolvedLine {
                converted_qty: line_qty,
                stock_unit: stock_unit.to_string(),
                warning: Some(OpWarning::new(
                    item_name,
                    format!("單位無法換算（{line_unit} → {stock_unit}），按原值記帳"),
                )),
            }
        }
    }
}

/// 過帳：對每行扣減庫存並追加 consume-out 流水
pub fn post_issue(doc: &mut Document, issue_id: i64, operator: &str) -> Result<PostOutcome> {
    let issue = doc.material_issue(issue_id)?;
    if !issue.status.is_draft() {
        return Err(MrpError::invalid_state("領料單", issue_id, issue.status.label()));
    }
    if issue.lines.is_empty() {
        return Err(MrpError::Validation(format!(
            "領料單 {} 沒有行項，空單不能過帳",
            issue.code
        )));
    }

    let (issue_code, order_id, lines) =
        (issue.code.clone(), issue.order_id, issue.lines.clone());
    let order = doc.production_order(order_id)?;
    let (order_code, bom_id, version_id) =
        (order.code.clone(), order.bom_id, order.bom_version_id);

    let now = time::now();
    let mut problems = Vec::new();
    let mut warnings = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        // 追溯文本：攜帶換算前的原始數量/單位與來源單據鏈
        let reason = format!(
            "生产领料 {issue_code} 订单{order_code} BOM{bom_id}/版本{version_id} 原始数量 {} {}",
            line.quantity, line.unit
        );

        let applied = match line.item_type {
            ItemType::RawMaterial => apply_material_movement(
                doc,
                line.item_id,
                &line.item_name,
                line.quantity,
                &line.unit,
                MovementKind::ConsumeOut,
                &reason,
                operator,
                now,
            ),
            ItemType::Product => apply_product_movement(
                doc,
                line.item_id,
                &line.item_name,
                line.quantity,
                &line.unit,
                MovementKind::ConsumeOut,
                &reason,
                operator,
                now,
                Some((RelatedDocType::Issue, issue_id)),
            ),
        };

        match applied {
            Ok(mut ws) => warnings.append(&mut ws),
            Err(message) => {
                // 壞行跳過，過帳繼續；問題一併回傳
                tracing::warn!("領料單 {} 第 {} 行跳過: {}", issue_code, idx, message);
                problems.push(LineProblem::new(idx, line.item_name.clone(), message));
            }
        }
    }

    let issue = doc.material_issue_mut(issue_id)?;
    issue.status = IssueStatus::Posted;
    issue.posted_at = Some(now);
    tracing::info!(
        "領料單 {} 過帳完成（{} 行，{} 行跳過）",
        issue_code,
        lines.len(),
        problems.len()
    );

    Ok(PostOutcome {
        issue_id,
        problems,
        warnings,
    })
}

/// 取消過帳：逐行沖回，領料單回到草稿
pub fn cancel_issue(doc: &mut Document, issue_id: i64, operator: &str) -> Result<CancelOutcome> {
    let issue = doc.material_issue(issue_id)?;
    if !issue.status.is_posted() {
        return Err(MrpError::invalid_state("領料單", issue_id, issue.status.label()));
    }
    let (issue_code, lines) = (issue.code.clone(), issue.lines.clone());

    let now = time::now();
    let mut problems = Vec::new();
    let mut warnings = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let reason = format!("ISSUE_CANCEL {issue_code} 原始数量 {} {}", line.quantity, line.unit);

        let applied = match line.item_type {
            ItemType::RawMaterial => apply_material_movement(
                doc,
                line.item_id,
                &line.item_name,
                line.quantity,
                &line.unit,
                MovementKind::ReturnIn,
                &reason,
                operator,
                now,
            ),
            ItemType::Product => apply_product_movement(
                doc,
                line.item_id,
                &line.item_name,
                line.quantity,
                &line.unit,
                MovementKind::ReturnIn,
                &reason,
                operator,
                now,
                Some((RelatedDocType::Issue, issue_id)),
            ),
        };

        match applied {
            Ok(mut ws) => warnings.append(&mut ws),
            Err(message) => {
                tracing::warn!("取消過帳 {} 第 {} 行跳過: {}", issue_code, idx, message);
                problems.push(LineProblem::new(idx, line.item_name.clone(), message));
            }
        }
    }

    let issue = doc.material_issue_mut(issue_id)?;
    issue.status = IssueStatus::Draft;
    issue.posted_at = None;
    issue.cancelled_at = Some(now);
    issue.cancelled_by = Some(operator.to_string());
    tracing::info!("領料單 {} 已取消過帳，回到草稿", issue_code);

    Ok(CancelOutcome {
        issue_id,
        problems,
        warnings,
    })
}

/// 刪除草稿領料單
pub fn delete_issue(doc: &mut Document, issue_id: i64) -> Result<()> {
    let issue = doc.material_issue(issue_id)?;
    if !issue.status.is_draft() {
        return Err(MrpError::invalid_state("領料單", issue_id, issue.status.label()));
    }
    doc.material_issues.retain(|i| i.id != issue_id);
    Ok(())
}

/// 對原料施加一筆出入庫：更新快照（免追蹤物料除外）並追加流水
///
/// 回傳 Err(原因) 表示該行無法解析，由調用方決定跳過。
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_material_movement(
    doc: &mut Document,
    item_id: i64,
    item_name: &str,
    quantity: Decimal,
    unit: &str,
    kind: MovementKind,
    reason: &str,
    operator: &str,
    now: chrono::NaiveDateTime,
) -> std::result::Result<Vec<OpWarning>, String> {
    // ID 優先，名稱回退（ID 失效的舊單據）
    let material = doc
        .raw_materials
        .iter()
        .find(|m| m.id == item_id)
        .or_else(|| doc.raw_material_by_name(item_name))
        .ok_or_else(|| format!("原料無法解析（id={item_id}，名称「{item_name}」）"))?;
    let (mat_id, stock_unit, exempt, stock) = (
        material.id,
        material.unit.clone(),
        material.is_stock_exempt(),
        material.stock_quantity,
    );

    let resolved = resolve_quantity(quantity, unit, &stock_unit, item_name);
    let mut warnings = Vec::new();
    if let Some(w) = resolved.warning {
        warnings.push(w);
    }

    let snapshot_stock = if exempt {
        // 免追蹤物料：流水照記，快照不動
        tracing::debug!("物料 {} 免庫存追蹤，跳過快照更新", item_name);
        stock
    } else {
        let new_stock = stock + kind.signed(resolved.converted_qty);
        if let Ok(m) = doc.raw_material_mut(mat_id) {
            m.set_stock(new_stock, now);
        }
        new_stock
    };

    let record_id = next_id(&doc.inventory_records);
    doc.inventory_records.push(InventoryRecord {
        id: record_id,
        material_id: mat_id,
        kind,
        quantity: resolved.converted_qty,
        unit: resolved.stock_unit,
        reason: reason.to_string(),
        operator: operator.to_string(),
        at: now,
        snapshot_stock,
    });

    Ok(warnings)
}

/// 對產品施加一筆出入庫（鏡像原料側，多一條單據回鏈）
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_product_movement(
    doc: &mut Document,
    item_id: i64,
    item_name: &str,
    quantity: Decimal,
    unit: &str,
    kind: MovementKind,
    reason: &str,
    operator: &str,
    now: chrono::NaiveDateTime,
    related: Option<(RelatedDocType, i64)>,
) -> std::result::Result<Vec<OpWarning>, String> {
    let key = item_name.trim().to_lowercase();
    let product = doc
        .product_inventories
        .iter()
        .find(|p| p.id == item_id)
        .or_else(|| {
            doc.product_inventories
                .iter()
                .find(|p| p.name.trim().to_lowercase() == key)
        })
        .ok_or_else(|| format!("產品無法解析（id={item_id}，名称「{item_name}」）"))?;
    let (product_id, stock_unit, stock) =
        (product.id, product.unit.clone(), product.stock_quantity);

    let resolved = resolve_quantity(quantity, unit, &stock_unit, item_name);
    let mut warnings = Vec::new();
    if let Some(w) = resolved.warning {
        warnings.push(w);
    }

    let new_stock = stock + kind.signed(resolved.converted_qty);
    if let Some(p) = doc
        .product_inventories
        .iter_mut()
        .find(|p| p.id == product_id)
    {
        p.set_stock(new_stock, now);
    }

    let record_id = next_id(&doc.product_inventory_records);
    doc.product_inventory_records.push(ProductInventoryRecord {
        id: record_id,
        product_id,
        kind,
        quantity: resolved.converted_qty,
        unit: resolved.stock_unit,
        reason: reason.to_string(),
        operator: operator.to_string(),
        at: now,
        snapshot_stock: new_stock,
        related_doc_type: related.map(|(t, _)| t),
        related_doc_id: related.map(|(_, id)| id),
    });

    Ok(warnings)
}
