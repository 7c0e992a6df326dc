//! 利用者向け通知（チェックアウト画面に表示されるメッセージ）
//!
//! 見積もり処理は失敗を呼び出し元に返さず、通知として報告する。
//! 通知の表示方法はホスト側が `NoticeSink` を実装して決める。

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// 通知の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Error,
    Notice,
    Success,
}

/// 通知1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// 通知の出力先トレイト（テスト用モック対応）
#[cfg_attr(test, mockall::automock)]
pub trait NoticeSink: Send + Sync {
    fn add_notice(&self, level: NoticeLevel, message: &str);
}

/// メモリ上に通知を溜めるシンク
#[derive(Debug, Default)]
pub struct NoticeLog {
    entries: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 溜まった通知のコピーを返す
    pub fn notices(&self) -> Vec<Notice> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices().iter().filter(|n| n.level == level).count()
    }
}

impl NoticeSink for NoticeLog {
    fn add_notice(&self, level: NoticeLevel, message: &str) {
        let notice = Notice {
            level,
            message: message.to_string(),
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(notice),
            Err(poisoned) => poisoned.into_inner().push(notice),
        }
    }
}

impl<T: NoticeSink + ?Sized> NoticeSink for std::sync::Arc<T> {
    fn add_notice(&self, level: NoticeLevel, message: &str) {
        (**self).add_notice(level, message);
    }
}
