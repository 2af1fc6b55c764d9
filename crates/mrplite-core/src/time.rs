//! 日期時間格式
//!
//! 資料檔案中日期固定為 `YYYY-MM-DD` 字串、時間戳固定為
//! `YYYY-MM-DD HH:MM:SS` 字串（chrono 預設的 NaiveDateTime 序列化帶 `T`，
//! 與既有資料不相容，所以這裡提供自訂 serde 模組）。

use chrono::{Local, NaiveDateTime, Timelike};

/// 時間戳格式
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// 當前本地時間（截斷到秒，與持久化格式對齊）
pub fn now() -> NaiveDateTime {
    let t = Local::now().naive_local();
    t.with_nanosecond(0).unwrap_or(t)
}

/// `NaiveDateTime` <-> `"YYYY-MM-DD HH:MM:SS"`
pub mod datetime_string {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::DATETIME_FMT;

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(DATETIME_FMT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, DATETIME_FMT).map_err(serde::de::Error::custom)
    }
}

/// `Option<NaiveDateTime>` <-> `"YYYY-MM-DD HH:MM:SS"` 或 null
pub mod option_datetime_string {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::DATETIME_FMT;

    pub fn serialize<S: Serializer>(t: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match t {
            Some(t) => s.serialize_some(&t.format(DATETIME_FMT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            Some(raw) => NaiveDateTime::parse_from_str(&raw, DATETIME_FMT)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
