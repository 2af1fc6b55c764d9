//! # MRP-Lite Store
//!
//! 持久層：單一資料檔案的原子讀寫。
//!
//! 寫入紀律：寫臨時檔 → flush + fsync → rename 覆蓋正式檔。
//! rename 是讀者唯一可見的操作，寫到一半崩潰不會損壞正式檔，
//! 失敗的保存讓舊檔原封不動，重試永遠安全。
//! 每次保存前先做一份帶時間戳的全量備份，超過保留數的舊備份按最舊先刪。
//! 同一資料檔的並發寫者通過協作式檔案鎖串行化（讀者不持鎖，
//! 可能讀到略舊但絕不讀到殘缺的快照）。

pub mod backup;
pub mod lock;
pub mod store;

// Re-export 主要類型
pub use lock::FileLock;
pub use store::{Store, StoreConfig};

/// 備份保留數預設值
pub const DEFAULT_BACKUP_RETENTION: usize = 50;

/// 檔案鎖逾時預設值（秒）
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 10;
