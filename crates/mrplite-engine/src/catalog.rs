//! 主檔維護（原料、BOM 主檔）
//!
//! 唯一鍵校驗與刪除守衛都在這裡：驗證失敗是普通返回路徑，不是異常。

use mrplite_core::{
    next_id, time, Bom, BomCategory, Document, InventoryRecord, MovementKind, MrpError,
    ProductionMode, RawMaterial, Result,
};
use rust_decimal::Decimal;

/// 新增原料（名稱唯一）；期初庫存同時生成一筆入庫流水
pub fn add_raw_material(
    doc: &mut Document,
    name: &str,
    unit: &str,
    initial_stock: Decimal,
) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MrpError::Validation("原料名稱不能為空".to_string()));
    }
    if doc.raw_material_by_name(name).is_some() {
        return Err(MrpError::Duplicate(format!("原料名稱「{name}」已存在")));
    }
    if initial_stock < Decimal::ZERO {
        return Err(MrpError::Validation("期初庫存不能為負".to_string()));
    }

    let id = next_id(&doc.raw_materials);
    let material = RawMaterial::new(id, name.to_string(), unit.trim().to_string(), initial_stock);
    let exempt = material.is_stock_exempt();
    doc.raw_materials.push(material);

    // 期初庫存入帳，保持「快照 = 流水重放」不變式（免追蹤物料除外）
    if initial_stock > Decimal::ZERO && !exempt {
        let record_id = next_id(&doc.inventory_records);
        doc.inventory_records.push(InventoryRecord {
            id: record_id,
            material_id: id,
            kind: MovementKind::In,
            quantity: initial_stock,
            unit: unit.trim().to_string(),
            reason: "期初建档".to_string(),
            operator: "系统".to_string(),
            at: time::now(),
            snapshot_stock: initial_stock,
        });
    }
    tracing::info!("新增原料 {}（id={}）", name, id);
    Ok(id)
}

/// 原料主檔變更
#[derive(Debug, Clone, Default)]
pub struct MaterialPatch {
    pub name: Option<String>,
    pub unit: Option<String>,
}

/// 更新原料主檔（不碰庫存快照；庫存只經流水變動）
pub fn update_raw_material(doc: &mut Document, id: i64, patch: MaterialPatch) -> Result<()> {
    if let Some(name) = &patch.name {
        let name = name.trim();
        if doc
            .raw_material_by_name(name)
            .is_some_and(|existing| existing.id != id)
        {
            return Err(MrpError::Duplicate(format!("原料名稱「{name}」已存在")));
        }
    }

    let material = doc.raw_material_mut(id)?;
    if let Some(name) = patch.name {
        material.name = name.trim().to_string();
    }
    if let Some(unit) = patch.unit {
        material.unit = unit.trim().to_string();
    }
    Ok(())
}

/// 刪除原料；被任何配方行項引用時拒絕
pub fn delete_raw_material(doc: &mut Document, id: i64) -> Result<()> {
    doc.raw_material(id)?;
    if doc.material_referenced_by_bom(id) {
        return Err(MrpError::Validation(format!(
            "原料 {id} 仍被配方引用，不能刪除"
        )));
    }
    doc.raw_materials.retain(|m| m.id != id);
    tracing::info!("刪除原料 id={}", id);
    Ok(())
}

/// 新增 BOM 主檔（編碼唯一）
pub fn add_bom(doc: &mut Document, code: &str, name: &str, category: BomCategory) -> Result<i64> {
    let code = code.trim();
    if code.is_empty() || name.trim().is_empty() {
        return Err(MrpError::Validation("BOM 編碼與名稱不能為空".to_string()));
    }
    if doc.boms.iter().any(|b| b.code == code) {
        return Err(MrpError::Duplicate(format!("BOM 編碼「{code}」已存在")));
    }

    let id = next_id(&doc.boms);
    doc.boms.push(Bom::new(
        id,
        code.to_string(),
        name.trim().to_string(),
        category,
    ));
    tracing::info!("新增 BOM {}（id={}）", code, id);
    Ok(id)
}

/// BOM 主檔變更
#[derive(Debug, Clone, Default)]
pub struct BomPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub category: Option<BomCategory>,
    pub production_mode: Option<ProductionMode>,
    pub manufacturer: Option<Option<String>>,
}

/// 更新 BOM 主檔（版本與行項走版本接口，不在這裡）
pub fn update_bom(doc: &mut Document, id: i64, patch: BomPatch) -> Result<()> {
    if let Some(code) = &patch.code {
        let code = code.trim();
        if doc.boms.iter().any(|b| b.code == code && b.id != id) {
            return Err(MrpError::Duplicate(format!("BOM 編碼「{code}」已存在")));
        }
    }

    let bom = doc.bom_mut(id)?;
    if let Some(code) = patch.code {
        bom.code = code.trim().to_string();
    }
    if let Some(name) = patch.name {
        bom.name = name.trim().to_string();
    }
    if let Some(category) = patch.category {
        bom.category = category;
    }
    if let Some(mode) = patch.production_mode {
        bom.production_mode = mode;
    }
    if let Some(manufacturer) = patch.manufacturer {
        bom.manufacturer = manufacturer;
    }
    Ok(())
}

/// 刪除 BOM；仍被生產訂單引用時拒絕，否則連同其版本一併刪除
pub fn delete_bom(doc: &mut Document, id: i64) -> Result<()> {
    doc.bom(id)?;
    if doc.bom_referenced_by_order(id) {
        return Err(MrpError::Validation(format!(
            "BOM {id} 仍被生產訂單引用，不能刪除"
        )));
    }
    doc.boms.retain(|b| b.id != id);
    doc.bom_versions.retain(|v| v.bom_id != id);
    tracing::info!("刪除 BOM id={}", id);
    Ok(())
}
