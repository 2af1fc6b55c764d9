//! 保存前備份與保留清理
//!
//! 每次保存前把現有資料檔全量複製到備份目錄，
//! 檔名帶創建時間戳；隨後把超出保留數的舊備份按最舊先刪。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use mrplite_core::Result;

/// 備份檔名時間戳格式（含毫秒，避免同秒內兩次保存互相覆蓋）
const STAMP_FMT: &str = "%Y%m%d_%H%M%S_%3f";

/// 備份現有資料檔；資料檔尚不存在（首次運行）時為 no-op
pub fn backup_current(data_path: &Path, backup_dir: &Path) -> Result<Option<PathBuf>> {
    if !data_path.exists() {
        return Ok(None);
    }

    fs::create_dir_all(backup_dir)?;

    let stem = data_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    let stamp = Local::now().format(STAMP_FMT);
    let target = backup_dir.join(format!("{stem}_{stamp}.json"));

    fs::copy(data_path, &target)?;
    tracing::debug!("已備份資料檔到 {}", target.display());
    Ok(Some(target))
}

/// 刪除超出保留數的舊備份（最舊先刪）
pub fn prune_backups(backup_dir: &Path, retention: usize) -> Result<usize> {
    if !backup_dir.exists() {
        return Ok(0);
    }

    let mut backups: Vec<PathBuf> = fs::read_dir(backup_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();

    if backups.len() <= retention {
        return Ok(0);
    }

    // 檔名內嵌時間戳，字典序即時間序
    backups.sort();

    let excess = backups.len() - retention;
    for old in backups.iter().take(excess) {
        fs::remove_file(old)?;
        tracing::debug!("已清理舊備份 {}", old.display());
    }
    Ok(excess)
}
