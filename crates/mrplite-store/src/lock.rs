//! 協作式檔案鎖
//!
//! 以 `<資料檔>.lock` 的獨占創建（create_new）作為鎖。
//! 獲取失敗時輪詢重試，逾時即放棄並回報可重試錯誤，絕不死等。
//! 崩潰的寫者會留下殘鎖檔；這裡選擇逾時報錯而不是按 mtime 搶鎖，
//! 單寫者保證無條件成立，殘鎖由運維手動清除。

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use mrplite_core::{MrpError, Result};

/// 重試輪詢間隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 持有期間存在於磁碟上的鎖檔，Drop 時釋放
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// 鎖檔路徑（資料檔路徑 + ".lock"）
    pub fn lock_path(data_path: &Path) -> PathBuf {
        let mut p = data_path.as_os_str().to_owned();
        p.push(".lock");
        PathBuf::from(p)
    }

    /// 阻塞獲取鎖，超過 `timeout_secs` 秒後回報 `LockTimeout`
    pub fn acquire(data_path: &Path, timeout_secs: u64) -> Result<FileLock> {
        let path = Self::lock_path(data_path);
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // 記下持有者 pid，方便排查殘鎖
                    let _ = write!(file, "{}", std::process::id());
                    tracing::debug!("獲取檔案鎖: {}", path.display());
                    return Ok(FileLock { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        tracing::warn!("獲取檔案鎖逾時: {}", path.display());
                        return Err(MrpError::LockTimeout(timeout_secs));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(MrpError::Io(e)),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("釋放檔案鎖失敗 {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("釋放檔案鎖: {}", self.path.display());
        }
    }
}
