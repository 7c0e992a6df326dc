//! 配送業者アイコンの解決
//!
//! アイコンは `<dir>/<小文字の業者コード>.svg`、なければ `.png` を探す。
//! どちらもなければアイコンなし（エラーにはしない）。

use std::path::PathBuf;

/// ラベルに埋め込むアイコンの表示スタイル
const ICON_STYLE: &str = "height: 20px; width: auto; vertical-align: middle; margin-right: 8px;";

/// アイコン探索の優先順
const ICON_EXTENSIONS: [&str; 2] = ["svg", "png"];

/// 配送業者アイコンの格納場所
#[derive(Debug, Clone)]
pub struct CarrierIcons {
    /// アイコンファイルのディレクトリ
    dir: PathBuf,
    /// 公開URLのベース（末尾スラッシュ有無は問わない）
    base_url: String,
}

impl CarrierIcons {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into(),
        }
    }

    /// 業者コードからアイコンのURLを返す
    pub fn resolve(&self, carrier_code: &str) -> Option<String> {
        let code = carrier_code.trim().to_lowercase();
        if code.is_empty() {
            return None;
        }

        ICON_EXTENSIONS.iter().find_map(|ext| {
            let file_name = format!("{code}.{ext}");
            if self.dir.join(&file_name).is_file() {
                Some(format!(
                    "{}/{}",
                    self.base_url.trim_end_matches('/'),
                    file_name
                ))
            } else {
                None
            }
        })
    }

    /// ラベル先頭に付ける `<img>` タグ（アイコンがなければ空文字）
    pub fn label_prefix(&self, carrier_code: &str, carrier_name: &str) -> String {
        match self.resolve(carrier_code) {
            Some(url) => format!(
                r#"<img src="{}" alt="{}" style="{}" /> "#,
                escape_attr(&url),
                escape_attr(carrier_name),
                ICON_STYLE
            ),
            None => String::new(),
        }
    }
}

/// HTML属性値のエスケープ
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
