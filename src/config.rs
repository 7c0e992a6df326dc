//! 配送方法の設定ファイル管理
//!
//! タイトル・発送元・配送業者・既定サービスなどを enviame_config.json で管理する。
//! APIキーは別ファイル（`api_key` モジュール）に分離する。

use crate::carriers::{is_known_carrier, DEFAULT_CARRIER};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "enviame_config.json";

/// Enviame 料金APIのエンドポイント
pub const DEFAULT_ENDPOINT: &str = "https://api.enviame.io/api/v1/prices";

pub const DEFAULT_TITLE: &str = "Enviame Shipping";
pub const DEFAULT_ORIGIN: &str = "Santiago";
pub const DEFAULT_SERVICE: &str = "standard";

/// 配送業者アイコンの設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconSettings {
    /// アイコンファイルのディレクトリ
    pub dir: PathBuf,
    /// アイコンの公開URLベース
    pub base_url: String,
}

/// 配送方法の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_title")]
    pub title: String,
    /// 発送元の市区名（APIが受け付ける値と一致している必要がある）
    #[serde(default = "default_origin")]
    pub default_origin: String,
    #[serde(default = "default_carriers")]
    pub carriers: Vec<String>,
    /// 既定サービスコード（例: standard, sameday）
    #[serde(default = "default_service")]
    pub service: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub icons: Option<IconSettings>,
    /// 有効時はリクエストURL・レスポンスを通知としても出す
    #[serde(default)]
    pub debug: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_carriers() -> Vec<String> {
    vec![DEFAULT_CARRIER.to_string()]
}

fn default_service() -> Option<String> {
    Some(DEFAULT_SERVICE.to_string())
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for ShippingSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            title: default_title(),
            default_origin: default_origin(),
            carriers: default_carriers(),
            service: default_service(),
            endpoint: default_endpoint(),
            icons: None,
            debug: false,
        }
    }
}

impl ShippingSettings {
    /// 前後の空白を除いた既定サービス（空なら None）
    pub fn default_service(&self) -> Option<&str> {
        self.service
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// 設定値を検証する
    ///
    /// 一覧にない業者コードはAPI側で有効な可能性があるため警告のみ。
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Shipping method title is empty".to_string());
        }
        if self.default_origin.trim().is_empty() {
            return Err("Origin city is empty".to_string());
        }

        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|e| format!("Invalid Enviame endpoint URL: {e}"))?;
        if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
            return Err(format!(
                "Enviame endpoint must be an http(s) URL, got scheme: {}",
                endpoint.scheme()
            ));
        }

        if let Some(carrier) = self.carriers.iter().find(|c| c.trim().is_empty()) {
            return Err(format!("Carrier code is empty: {carrier:?}"));
        }
        for carrier in self.carriers.iter().filter(|c| !is_known_carrier(c)) {
            log::warn!("Carrier code not in catalog, passing it to Enviame as-is: {carrier}");
        }

        Ok(())
    }
}

/// 設定を読み込む。ファイルが存在しない場合はデフォルトを返し、保存する。
pub fn load(config_dir: &Path) -> Result<ShippingSettings, String> {
    let path = config_dir.join(CONFIG_FILENAME);

    let settings = if path.exists() {
        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        serde_json::from_str(&contents).map_err(|e| format!("Invalid config JSON: {e}"))?
    } else {
        let settings = ShippingSettings::default();
        save(config_dir, &settings)?;
        settings
    };

    settings.validate()?;
    Ok(settings)
}

/// 設定を保存する。
pub fn save(config_dir: &Path, settings: &ShippingSettings) -> Result<(), String> {
    fs::create_dir_all(config_dir).map_err(|e| format!("Failed to create config dir: {e}"))?;

    let path = config_dir.join(CONFIG_FILENAME);
    let contents = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize config: {e}"))?;

    fs::write(&path, contents).map_err(|e| format!("Failed to write config file: {e}"))
}
