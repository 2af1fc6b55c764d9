//! BOM 引擎
//!
//! 版本維護、生效版本選擇、展開、結構渲染與版本差異。

use chrono::NaiveDate;
use mrplite_core::{
    next_id, BomLine, BomVersion, Document, ItemType, MrpError, Result,
};
use rust_decimal::Decimal;

/// 展開結果行：版本行項按目標產量等比縮放後的需求量
#[derive(Debug, Clone, serde::Serialize)]
pub struct RequirementLine {
    pub item_type: ItemType,
    pub item_id: i64,
    pub item_name: String,
    /// 需求數量 = 行用量 × (目標產量 / yield_base)
    pub quantity: Decimal,
    pub unit: String,
    pub phase: Option<String>,
}

/// 新增版本（初始待審批）
pub fn add_version(
    doc: &mut Document,
    bom_id: i64,
    version: &str,
    effective_from: NaiveDate,
    yield_base: Decimal,
    composition: Vec<BomLine>,
) -> Result<i64> {
    doc.bom(bom_id)?;
    if version.trim().is_empty() {
        return Err(MrpError::Validation("版本號不能為空".to_string()));
    }
    if doc
        .versions_of(bom_id)
        .iter()
        .any(|v| v.version == version.trim())
    {
        return Err(MrpError::Duplicate(format!(
            "BOM {bom_id} 已存在版本「{}」",
            version.trim()
        )));
    }

    let id = next_id(&doc.bom_versions);
    doc.bom_versions.push(
        BomVersion::new(id, bom_id, version.trim().to_string(), effective_from)
            .with_yield_base(yield_base)
            .with_composition(composition),
    );
    tracing::info!("BOM {} 新增版本 {}（id={}）", bom_id, version, id);
    Ok(id)
}

/// 版本變更
#[derive(Debug, Clone, Default)]
pub struct VersionPatch {
    pub version: Option<String>,
    pub effective_from: Option<NaiveDate>,
    pub yield_base: Option<Decimal>,
    pub composition: Option<Vec<BomLine>>,
    pub locked: Option<bool>,
}

/// 更新版本
///
/// 已鎖定的版本拒絕任何變更，除非帶特權覆寫標誌
/// （特權判定屬於排除的授權層，這裡只收一個標誌）。
pub fn update_version(
    doc: &mut Document,
    version_id: i64,
    patch: VersionPatch,
    privileged: bool,
) -> Result<()> {
    let v = doc.bom_version_mut(version_id)?;
    if v.locked && !privileged {
        return Err(MrpError::VersionLocked(version_id));
    }

    if let Some(version) = patch.version {
        v.version = version;
    }
    if let Some(effective_from) = patch.effective_from {
        v.effective_from = effective_from;
    }
    if let Some(yield_base) = patch.yield_base {
        v.yield_base = yield_base;
    }
    if let Some(composition) = patch.composition {
        v.composition = composition;
    }
    if let Some(locked) = patch.locked {
        v.locked = locked;
    }
    Ok(())
}

/// 審批通過
pub fn approve_version(doc: &mut Document, version_id: i64) -> Result<()> {
    let v = doc.bom_version_mut(version_id)?;
    v.status = mrplite_core::ApprovalStatus::Approved;
    tracing::info!("版本 {} 審批通過", version_id);
    Ok(())
}

/// 駁回
pub fn reject_version(doc: &mut Document, version_id: i64) -> Result<()> {
    let v = doc.bom_version_mut(version_id)?;
    v.status = mrplite_core::ApprovalStatus::Rejected;
    tracing::info!("版本 {} 被駁回", version_id);
    Ok(())
}

/// 選擇生效版本
///
/// 候選 = 已審批且有行項的版本。優先取 `effective_from <= as_of`
/// 中生效日最晚者；按日期無人入選時回退到創建最晚的候選；
/// 完全沒有候選回傳 `None`。
pub fn effective_version<'a>(
    doc: &'a Document,
    bom_id: i64,
    as_of: NaiveDate,
) -> Option<&'a BomVersion> {
    let candidates: Vec<&BomVersion> = doc
        .versions_of(bom_id)
        .into_iter()
        .filter(|v| v.is_explodable())
        .collect();

    let by_date = candidates
        .iter()
        .filter(|v| v.effective_from <= as_of)
        .max_by_key(|v| (v.effective_from, v.id))
        .copied();

    by_date.or_else(|| {
        candidates
            .into_iter()
            .max_by_key(|v| (v.created_at, v.id))
    })
}

/// 展開：把版本行項等比縮放到目標產量
///
/// 空行項展開為空結果（不是錯誤）；調用方應視為數據質量警告。
pub fn explode(version: &BomVersion, target_qty: Decimal) -> Vec<RequirementLine> {
    let ratio = target_qty / version.effective_yield_base();
    version
        .composition
        .iter()
        .map(|line| RequirementLine {
            item_type: line.item_type,
            item_id: line.item_id,
            item_name: line.item_name.clone(),
            quantity: line.quantity * ratio,
            unit: line.unit.clone(),
            phase: line.phase.clone(),
        })
        .collect()
}

/// BOM 結構樹節點
///
/// 行項引用產品時結構遞歸（子配方）；遍歷對每個分支
/// 複製一份已訪問集合，回環渲染為終端「循環」標記而非無限遞歸。
#[derive(Debug, Clone, serde::Serialize)]
pub enum BomNode {
    /// 原料葉節點
    Material {
        item_id: i64,
        name: String,
        quantity: Decimal,
        unit: String,
        phase: Option<String>,
    },
    /// 子配方分支（產品行項指向另一個 BOM）
    SubBom {
        bom_id: i64,
        name: String,
        quantity: Decimal,
        unit: String,
        children: Vec<BomNode>,
    },
    /// 無對應 BOM 的產品行項（外購半成品等），按葉節點渲染
    ProductLeaf {
        item_id: i64,
        name: String,
        quantity: Decimal,
        unit: String,
    },
    /// 檢測到循環引用
    Cycle { bom_id: i64, name: String },
}

/// 渲染多層 BOM 結構（以今日生效版本為準）
pub fn render_structure(doc: &Document, bom_id: i64, as_of: NaiveDate) -> Result<BomNode> {
    let bom = doc.bom(bom_id)?;
    let children = render_children(doc, bom_id, as_of, &[bom_id]);
    Ok(BomNode::SubBom {
        bom_id,
        name: bom.name.clone(),
        quantity: Decimal::ONE,
        unit: String::new(),
        children,
    })
}

fn render_children(
    doc: &Document,
    bom_id: i64,
    as_of: NaiveDate,
    visited: &[i64],
) -> Vec<BomNode> {
    let Some(version) = effective_version(doc, bom_id, as_of) else {
        return Vec::new();
    };

    version
        .composition
        .iter()
        .map(|line| match line.item_type {
            ItemType::RawMaterial => BomNode::Material {
                item_id: line.item_id,
                name: line.item_name.clone(),
                quantity: line.quantity,
                unit: line.unit.clone(),
                phase: line.phase.clone(),
            },
            ItemType::Product => render_product_line(doc, line, as_of, visited),
        })
        .collect()
}

fn render_product_line(
    doc: &Document,
    line: &BomLine,
    as_of: NaiveDate,
    visited: &[i64],
) -> BomNode {
    let Ok(sub_bom) = doc.bom(line.item_id) else {
        // 產品行項沒有對應 BOM：按葉節點渲染
        return BomNode::ProductLeaf {
            item_id: line.item_id,
            name: line.item_name.clone(),
            quantity: line.quantity,
            unit: line.unit.clone(),
        };
    };

    if visited.contains(&sub_bom.id) {
        tracing::warn!("BOM 結構存在循環引用: {}（id={}）", sub_bom.name, sub_bom.id);
        return BomNode::Cycle {
            bom_id: sub_bom.id,
            name: sub_bom.name.clone(),
        };
    }

    // 每個分支複製自己的已訪問集合，兄弟分支不會被祖先誤判
    let mut branch_visited = visited.to_vec();
    branch_visited.push(sub_bom.id);

    BomNode::SubBom {
        bom_id: sub_bom.id,
        name: sub_bom.name.clone(),
        quantity: line.quantity,
        unit: line.unit.clone(),
        children: render_children(doc, sub_bom.id, as_of, &branch_visited),
    }
}

/// 兩版本的行項差異
#[derive(Debug, Clone, serde::Serialize)]
pub enum LineDelta {
    Added {
        item_type: ItemType,
        item_id: i64,
        item_name: String,
        quantity: Decimal,
    },
    Removed {
        item_type: ItemType,
        item_id: i64,
        item_name: String,
        quantity: Decimal,
    },
    QuantityChanged {
        item_type: ItemType,
        item_id: i64,
        item_name: String,
        from: Decimal,
        to: Decimal,
        /// 變化百分比；原值為零時無法計算
        percent: Option<Decimal>,
    },
}

/// 版本差異：按（物料類型, 物料ID）配對行項
pub fn diff_versions(a: &BomVersion, b: &BomVersion) -> Vec<LineDelta> {
    let mut deltas = Vec::new();

    for line_a in &a.composition {
        match b.composition.iter().find(|l| l.key() == line_a.key()) {
            None => deltas.push(LineDelta::Removed {
                item_type: line_a.item_type,
                item_id: line_a.item_id,
                item_name: line_a.item_name.clone(),
                quantity: line_a.quantity,
            }),
            Some(line_b) if line_b.quantity != line_a.quantity => {
                let percent = if line_a.quantity != Decimal::ZERO {
                    Some(
                        (line_b.quantity - line_a.quantity) / line_a.quantity
                            * Decimal::from(100),
                    )
                } else {
                    None
                };
                deltas.push(LineDelta::QuantityChanged {
                    item_type: line_a.item_type,
                    item_id: line_a.item_id,
                    item_name: line_a.item_name.clone(),
                    from: line_a.quantity,
                    to: line_b.quantity,
                    percent,
                });
            }
            Some(_) => {}
        }
    }

    for line_b in &b.composition {
        if !a.composition.iter().any(|l| l.key() == line_b.key()) {
            deltas.push(LineDelta::Added {
                item_type: line_b.item_type,
                item_id: line_b.item_id,
                item_name: line_b.item_name.clone(),
                quantity: line_b.quantity,
            });
        }
    }

    deltas
}
