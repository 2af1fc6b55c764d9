//! 生產訂單狀態機
//!
//! draft → released → issued → finished，線性推進、不可跳躍；
//! 刪除是獨立操作，不是狀態。

use chrono::NaiveDate;
use mrplite_core::{
    next_id, time, unit as units, BomCategory, Document, IssueLine, IssueStatus, MaterialIssue,
    MovementKind, MrpError, OrderStatus, ProductInventory, ProductInventoryRecord, ProductKind,
    ProductionOrder, RelatedDocType, Result,
};
use rust_decimal::Decimal;

use crate::bom::{effective_version, explode};
use crate::OpWarning;

/// 創建訂單（初始 draft）
///
/// 要求該 BOM 存在至少一個已審批且非空的版本；
/// 創建時即釘死具體版本ID，之後的 BOM 編輯不影響本訂單。
pub fn create_order(
    doc: &mut Document,
    bom_id: i64,
    planned_quantity: Decimal,
    unit: &str,
    planned_date: NaiveDate,
) -> Result<i64> {
    doc.bom(bom_id)?;
    if planned_quantity <= Decimal::ZERO {
        return Err(MrpError::Validation("計劃產量必須大於零".to_string()));
    }

    let version = effective_version(doc, bom_id, planned_date).ok_or_else(|| {
        MrpError::Validation(format!(
            "BOM {bom_id} 沒有已審批且非空的版本，不能下單"
        ))
    })?;
    let bom_version_id = version.id;

    let id = next_id(&doc.production_orders);
    let code = format!("SC-{}-{:03}", planned_date.format("%Y%m%d"), id);
    let bom = doc.bom(bom_id)?;
    let mut order = ProductionOrder::new(
        id,
        code.clone(),
        bom_id,
        bom_version_id,
        planned_quantity,
        unit.trim().to_string(),
        planned_date,
    );
    order.production_mode = bom.production_mode;
    order.manufacturer = bom.manufacturer.clone();
    doc.production_orders.push(order);

    tracing::info!("創建生產訂單 {}（釘死版本 {}）", code, bom_version_id);
    Ok(id)
}

/// 訂單變更（僅草稿可編輯計劃量/計劃日期）
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub planned_quantity: Option<Decimal>,
    pub planned_date: Option<NaiveDate>,
}

pub fn update_order(doc: &mut Document, order_id: i64, patch: OrderPatch) -> Result<()> {
    let order = doc.production_order_mut(order_id)?;
    if !order.status.is_draft() {
        return Err(MrpError::invalid_state(
            "生產訂單",
            order_id,
            order.status.label(),
        ));
    }

    if let Some(qty) = patch.planned_quantity {
        if qty <= Decimal::ZERO {
            return Err(MrpError::Validation("計劃產量必須大於零".to_string()));
        }
        order.planned_quantity = qty;
    }
    if let Some(date) = patch.planned_date {
        order.planned_date = date;
    }
    Ok(())
}

/// 下達：draft → released
pub fn release_order(doc: &mut Document, order_id: i64) -> Result<()> {
    let order = doc.production_order_mut(order_id)?;
    if !order.status.is_draft() {
        return Err(MrpError::invalid_state(
            "生產訂單",
            order_id,
            order.status.label(),
        ));
    }
    order.status = OrderStatus::Released;
    tracing::info!("訂單 {} 已下達", order.code);
    Ok(())
}

/// 生成領料單的結果
#[derive(Debug, Clone)]
pub struct IssueCreation {
    pub issue_id: i64,
    pub warnings: Vec<OpWarning>,
}

/// 從訂單生成領料單，並把訂單推進到 issued
///
/// 按釘死的 BOM 版本、訂單計劃量展開為草稿領料單。
/// 訂單仍處 released/issued 時可重複生成（補領料）。
/// 展開為零行時照常生成空領料單，但必須回傳可見警告。
pub fn create_issue_from_order(doc: &mut Document, order_id: i64) -> Result<IssueCreation> {
    let order = doc.production_order(order_id)?;
    if !matches!(order.status, OrderStatus::Released | OrderStatus::Issued) {
        return Err(MrpError::invalid_state(
            "生產訂單",
            order_id,
            order.status.label(),
        ));
    }
    let (order_code, version_id, planned_qty) = (
        order.code.clone(),
        order.bom_version_id,
        order.planned_quantity,
    );

    let version = doc.bom_version(version_id)?;
    let requirement = explode(version, planned_qty);

    let mut warnings = Vec::new();
    if requirement.is_empty() {
        tracing::warn!("訂單 {} 的 BOM 版本展開為零行", order_code);
        warnings.push(OpWarning::new(
            order_code.clone(),
            format!("BOM 版本 {version_id} 展開為零行，請檢查配方數據"),
        ));
    }

    let lines: Vec<IssueLine> = requirement
        .into_iter()
        .map(|r| IssueLine {
            item_type: r.item_type,
            item_id: r.item_id,
            item_name: r.item_name,
            quantity: r.quantity,
            unit: r.unit,
            phase: r.phase,
        })
        .collect();

    let issue_id = next_id(&doc.material_issues);
    let code = format!("LL-{order_code}-{issue_id:03}");
    doc.material_issues
        .push(MaterialIssue::new(issue_id, code.clone(), order_id, lines));

    doc.production_order_mut(order_id)?.status = OrderStatus::Issued;
    tracing::info!("訂單 {} 生成領料單 {}", order_code, code);

    Ok(IssueCreation { issue_id, warnings })
}

/// 完工：issued → finished
///
/// 前置條件：訂單名下每張領料單都已過帳。
/// 成功後按歸一化（名稱+類型）鍵找到或創建成品庫存，
/// 以計劃量（換算到產品庫存單位）入庫，並追加一條
/// produce-in 產品流水回鏈本訂單。
pub fn finish_order(
    doc: &mut Document,
    order_id: i64,
    operator: &str,
) -> Result<Vec<OpWarning>> {
    let order = doc.production_order(order_id)?;
    if !matches!(order.status, OrderStatus::Issued) {
        return Err(MrpError::invalid_state(
            "生產訂單",
            order_id,
            order.status.label(),
        ));
    }
    for issue in doc.issues_of_order(order_id) {
        if !issue.status.is_posted() {
            return Err(MrpError::invalid_state(
                "領料單",
                issue.id,
                issue.status.label(),
            ));
        }
    }

    let (order_code, bom_id, planned_qty, order_unit) = (
        order.code.clone(),
        order.bom_id,
        order.planned_quantity,
        order.unit.clone(),
    );
    let bom = doc.bom(bom_id)?;
    let product_name = bom.name.clone();
    let product_kind = match bom.category {
        BomCategory::FinishedProduct => ProductKind::Finished,
        BomCategory::MotherLiquor | BomCategory::Accelerator => ProductKind::SemiFinished,
    };

    let mut warnings = Vec::new();
    let now = time::now();

    // 找到或創建產品庫存（歸一化鍵匹配）
    let product_id = match doc.product_inventory_by_key(&product_name, product_kind) {
        Some(p) => p.id,
        None => {
            let id = next_id(&doc.product_inventories);
            doc.product_inventories.push(ProductInventory::new(
                id,
                product_name.clone(),
                product_kind,
                order_unit.clone(),
            ));
            tracing::info!("創建產品庫存 {}（id={}）", product_name, id);
            id
        }
    };

    let product = doc.product_inventory(product_id)?;
    let (product_unit, current_stock) = (product.unit.clone(), product.stock_quantity);

    // 計劃量換算到產品庫存單位；跨族/無法識別時保留原值並警告
    let credited = match units::convert(planned_qty, &order_unit, &product_unit) {
        Some(v) => v,
        None => {
            tracing::warn!(
                "訂單 {} 完工入庫單位無法換算（{} → {}），按原值入帳",
                order_code,
                order_unit,
                product_unit
            );
            warnings.push(OpWarning::new(
                product_name.clone(),
                format!("單位無法換算（{order_unit} → {product_unit}），按原值入帳"),
            ));
            planned_qty
        }
    };

    let new_stock = current_stock + credited;
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
        kind: MovementKind::ProduceIn,
        quantity: credited,
        unit: product_unit,
        reason: format!("完工入庫 訂單{order_code}"),
        operator: operator.to_string(),
        at: now,
        snapshot_stock: new_stock,
        related_doc_type: Some(RelatedDocType::Order),
        related_doc_id: Some(order_id),
    });

    let order = doc.production_order_mut(order_id)?;
    order.status = OrderStatus::Finished;
    order.finished_at = Some(now);
    tracing::info!("訂單 {} 完工，入庫 {}", order_code, credited);

    Ok(warnings)
}

/// 刪除訂單
///
/// 僅 draft/released 可刪；名下草稿領料單級聯刪除。
/// 只要有任何已過帳領料單，永遠拒絕並說明原因。
pub fn delete_order(doc: &mut Document, order_id: i64) -> Result<()> {
    let order = doc.production_order(order_id)?;

    if let Some(posted) = doc
        .issues_of_order(order_id)
        .into_iter()
        .find(|i| i.status.is_posted())
    {
        return Err(MrpError::Validation(format!(
            "訂單 {order_id} 名下領料單 {} 已過帳，不能刪除；如需更正請先取消過帳",
            posted.code
        )));
    }
    if !order.status.is_deletable() {
        return Err(MrpError::invalid_state(
            "生產訂單",
            order_id,
            order.status.label(),
        ));
    }

    doc.material_issues
        .retain(|i| !(i.order_id == order_id && i.status == IssueStatus::Draft));
    doc.production_orders.retain(|o| o.id != order_id);
    tracing::info!("刪除訂單 id={}（含草稿領料單）", order_id);
    Ok(())
}
