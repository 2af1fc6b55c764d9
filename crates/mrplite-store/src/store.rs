//! 資料檔存取
//!
//! `load` 不持鎖（讀者讀到的是略舊但完整的快照）；
//! 一次邏輯寫入（`mutate`）在同一把檔案鎖內完成
//! 載入 → 變更 → 備份 → 原子保存。

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use mrplite_core::{Document, MrpError, Result};

use crate::backup::{backup_current, prune_backups};
use crate::lock::FileLock;
use crate::{DEFAULT_BACKUP_RETENTION, DEFAULT_LOCK_TIMEOUT_SECS};

/// 持久層配置
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// 資料檔路徑
    pub data_path: PathBuf,

    /// 備份目錄
    pub backup_dir: PathBuf,

    /// 備份保留數
    pub backup_retention: usize,

    /// 檔案鎖逾時（秒）
    pub lock_timeout_secs: u64,
}

impl StoreConfig {
    /// 以資料檔路徑創建配置（備份目錄預設為同級 `backups/`）
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        let data_path: PathBuf = data_path.into();
        let backup_dir = data_path
            .parent()
            .map(|p| p.join("backups"))
            .unwrap_or_else(|| PathBuf::from("backups"));
        Self {
            data_path,
            backup_dir,
            backup_retention: DEFAULT_BACKUP_RETENTION,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }

    /// 建構器模式：設置備份目錄
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    /// 建構器模式：設置備份保留數
    pub fn with_backup_retention(mut self, retention: usize) -> Self {
        self.backup_retention = retention;
        self
    }

    /// 建構器模式：設置鎖逾時
    pub fn with_lock_timeout_secs(mut self, secs: u64) -> Self {
        self.lock_timeout_secs = secs;
        self
    }
}

/// 單一資料檔的存取入口
#[derive(Debug, Clone)]
pub struct Store {
    config: StoreConfig,
}

impl Store {
    /// 創建存取入口
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// 以預設配置打開資料檔
    pub fn open(data_path: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::new(data_path))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// 載入整個文件
    ///
    /// 首次運行（檔案不存在）或內容無法解析為 JSON 對象時，
    /// 合成一份最小空文件並落盤——這是唯一的自我修復行為，
    /// 在檔案鎖內執行，且原有內容先全量備份再覆蓋。
    /// 內容是對象但類別格式錯誤，一律硬錯誤上拋。
    pub fn load(&self) -> Result<Document> {
        self.load_impl(false)
    }

    fn load_impl(&self, holds_lock: bool) -> Result<Document> {
        let path = &self.config.data_path;
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("資料檔不存在，初始化空文件: {}", path.display());
                return self.heal_with_empty(holds_lock);
            }
            Err(e) => return Err(MrpError::Io(e)),
        };

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("資料檔無法解析（{}），以空文件重建", e);
                return self.heal_with_empty(holds_lock);
            }
        };
        if !value.is_object() {
            tracing::warn!("資料檔頂層不是對象，以空文件重建");
            return self.heal_with_empty(holds_lock);
        }

        serde_json::from_value(value)
            .map_err(|e| MrpError::Persistence(format!("資料檔類別格式錯誤: {e}")))
    }

    /// 保存整個文件（獨立調用；完整寫入紀律見 `mutate`）
    pub fn save(&self, doc: &Document) -> Result<()> {
        let _lock = FileLock::acquire(&self.config.data_path, self.config.lock_timeout_secs)?;
        self.backup_and_save(doc)
    }

    /// 一次邏輯寫入：鎖內 載入 → 變更 → 備份 → 原子保存
    ///
    /// 閉包出錯即中止，正式檔原封不動。
    pub fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let _lock = FileLock::acquire(&self.config.data_path, self.config.lock_timeout_secs)?;
        let mut doc = self.load_impl(true)?;
        let out = f(&mut doc)?;
        self.backup_and_save(&doc)?;
        Ok(out)
    }

    fn backup_and_save(&self, doc: &Document) -> Result<()> {
        backup_current(&self.config.data_path, &self.config.backup_dir)?;
        prune_backups(&self.config.backup_dir, self.config.backup_retention)?;
        self.write_atomic(doc)
    }

    /// 以空文件重建；損壞的原始內容先備份，絕不無痕銷毀
    fn heal_with_empty(&self, holds_lock: bool) -> Result<Document> {
        let _lock = if holds_lock {
            None
        } else {
            Some(FileLock::acquire(
                &self.config.data_path,
                self.config.lock_timeout_secs,
            )?)
        };
        backup_current(&self.config.data_path, &self.config.backup_dir)?;
        prune_backups(&self.config.backup_dir, self.config.backup_retention)?;
        let doc = Document::empty();
        self.write_atomic(&doc)?;
        Ok(doc)
    }

    /// 寫臨時檔 → fsync → rename 覆蓋正式檔
    fn write_atomic(&self, doc: &Document) -> Result<()> {
        let path = &self.config.data_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let payload = serde_json::to_string_pretty(doc)
            .map_err(|e| MrpError::Persistence(format!("文件序列化失敗: {e}")))?;

        let tmp = tmp_path(path);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(payload.as_bytes())?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp, path) {
            // rename 失敗時臨時檔不能留在資料目錄裡
            let _ = fs::remove_file(&tmp);
            return Err(MrpError::Io(e));
        }
        tracing::debug!("資料檔已保存: {}", path.display());
        Ok(())
    }
}

fn tmp_path(data_path: &Path) -> PathBuf {
    let mut p = data_path.as_os_str().to_owned();
    p.push(format!(".tmp.{}", std::process::id()));
    PathBuf::from(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn store_in(dir: &Path) -> Store {
        Store::new(StoreConfig::new(dir.join("data.json")).with_backup_dir(dir.join("backups")))
    }

    #[test]
    fn test_first_run_synthesizes_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let doc = store.load().unwrap();
        assert!(doc.raw_materials.is_empty());
        // 自我修復會落盤；尚無舊內容可備份
        assert!(dir.path().join("data.json").exists());
        assert!(!dir.path().join("backups").exists());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let mut doc = Document::empty();
        doc.raw_materials.push(mrplite_core::RawMaterial::new(
            1,
            "树脂".to_string(),
            "kg".to_string(),
            Decimal::from(1_000),
        ));
        store.save(&doc).unwrap();

        let back = store.load().unwrap();
        assert_eq!(back.raw_materials.len(), 1);
        assert_eq!(back.raw_materials[0].name, "树脂");
        assert_eq!(back.raw_materials[0].stock_quantity, Decimal::from(1_000));
    }

    #[test]
    fn test_garbage_file_self_heals() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(dir.path().join("data.json"), b"not json at all").unwrap();

        let doc = store.load().unwrap();
        assert!(doc.raw_materials.is_empty());
    }

    #[test]
    fn test_self_heal_backs_up_corrupt_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(dir.path().join("data.json"), b"{ truncated").unwrap();

        store.load().unwrap();

        // 損壞的原始內容完整進了備份目錄
        let backups: Vec<_> = fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read(&backups[0]).unwrap(), b"{ truncated");
        // 鎖已釋放
        assert!(store.mutate(|_| Ok(())).is_ok());
    }

    #[test]
    fn test_mutate_on_corrupt_file_heals_without_deadlock() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(dir.path().join("data.json"), b"[1,2,3]").unwrap();

        // mutate 已持鎖；修復路徑不得再次搶鎖
        store
            .mutate(|doc| {
                doc.raw_materials.push(mrplite_core::RawMaterial::new(
                    1,
                    "树脂".to_string(),
                    "kg".to_string(),
                    Decimal::ZERO,
                ));
                Ok(())
            })
            .unwrap();

        assert_eq!(store.load().unwrap().raw_materials.len(), 1);
        // 損壞的原始內容在備份目錄裡
        let preserved = fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .map(|e| fs::read(e.unwrap().path()).unwrap())
            .any(|bytes| bytes == b"[1,2,3]");
        assert!(preserved);
    }

    #[test]
    fn test_non_object_self_heals() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(dir.path().join("data.json"), b"[1,2,3]").unwrap();

        assert!(store.load().is_ok());
    }

    #[test]
    fn test_malformed_category_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        // 頂層是對象，但 raw_materials 不是數組——不允許自我修復
        fs::write(dir.path().join("data.json"), br#"{"raw_materials": 42}"#).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, MrpError::Persistence(_)));
    }

    #[test]
    fn test_save_creates_backup_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(
            StoreConfig::new(dir.path().join("data.json"))
                .with_backup_dir(dir.path().join("backups"))
                .with_backup_retention(2),
        );

        let doc = Document::empty();
        store.save(&doc).unwrap(); // 尚無正式檔，無備份
        store.save(&doc).unwrap();
        store.save(&doc).unwrap();
        store.save(&doc).unwrap();

        let backups: Vec<_> = fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .collect();
        assert_eq!(backups.len(), 2);
    }

    #[test]
    fn test_mutate_failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let mut doc = Document::empty();
        doc.raw_materials.push(mrplite_core::RawMaterial::new(
            1,
            "树脂".to_string(),
            "kg".to_string(),
            Decimal::from(7),
        ));
        store.save(&doc).unwrap();

        let err = store.mutate(|doc| {
            doc.raw_materials.clear();
            Err::<(), _>(MrpError::Validation("模擬失敗".to_string()))
        });
        assert!(err.is_err());

        // 失敗的寫入不落盤
        let back = store.load().unwrap();
        assert_eq!(back.raw_materials.len(), 1);
        // 鎖也已釋放
        assert!(store.mutate(|_| Ok(())).is_ok());
    }

    #[test]
    fn test_mutate_serializes_writers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.save(&Document::empty()).unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                store.mutate(|doc| {
                    let id = mrplite_core::next_id(&doc.raw_materials);
                    doc.raw_materials.push(mrplite_core::RawMaterial::new(
                        id,
                        format!("原料-{i}"),
                        "kg".to_string(),
                        Decimal::ZERO,
                    ));
                    Ok(())
                })
            }));
        }
        for h in handles {
            h.join().unwrap().unwrap();
        }

        let doc = store.load().unwrap();
        assert_eq!(doc.raw_materials.len(), 4);
        // ID 不重複
        let mut ids: Vec<_> = doc.raw_materials.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }
}
