//! Enviame APIキー管理（設定ディレクトリ内のJSONファイル）
//!
//! # セキュリティガイドライン
//! - APIキーは絶対にログに出力しないこと
//! - 設定ファイル（enviame_config.json）とは別ファイルに保存する

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// APIキー設定ファイルの構造
#[derive(Debug, Serialize, Deserialize)]
pub struct EnviameApiKeyConfig {
    pub api_key: String,
}

/// APIキー設定ファイルのパスを取得
pub fn get_config_path(config_dir: &Path) -> PathBuf {
    config_dir.join("enviame_api_key.json")
}

/// APIキーが設定されているかチェック
pub fn has_api_key(config_dir: &Path) -> bool {
    load_api_key(config_dir).is_ok()
}

/// APIキーをファイルから読み込み
///
/// # セキュリティ
/// APIキーはログに出力されません
pub fn load_api_key(config_dir: &Path) -> Result<String, String> {
    let config_path = get_config_path(config_dir);

    if !config_path.exists() {
        return Err(format!(
            "Enviame API key file not found. Please place enviame_api_key.json at: {}\n\n\
            File format: {{\"api_key\": \"YOUR_API_KEY\"}}",
            config_path.display()
        ));
    }

    let content = std::fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read Enviame API key file: {e}"))?;

    let config: EnviameApiKeyConfig = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse Enviame API key file: {e}"))?;

    if config.api_key.trim().is_empty() {
        return Err("Enviame API key is empty".to_string());
    }

    log::info!("Enviame API key loaded successfully");

    Ok(config.api_key.trim().to_string())
}

/// APIキーをファイルに保存
///
/// # セキュリティ
/// APIキーはログに出力されません
pub fn save_api_key(config_dir: &Path, api_key: &str) -> Result<(), String> {
    if api_key.trim().is_empty() {
        return Err("Enviame API key is empty".to_string());
    }

    std::fs::create_dir_all(config_dir)
        .map_err(|e| format!("Failed to create config dir: {e}"))?;

    let config = EnviameApiKeyConfig {
        api_key: api_key.trim().to_string(),
    };

    let content = serde_json::to_string_pretty(&config)
        .map_err(|e| format!("Failed to serialize API key config: {e}"))?;

    std::fs::write(get_config_path(config_dir), content)
        .map_err(|e| format!("Failed to write Enviame API key file: {e}"))?;

    log::info!("Enviame API key saved successfully");

    Ok(())
}

/// APIキーファイルを削除
pub fn delete_api_key(config_dir: &Path) -> Result<(), String> {
    let config_path = get_config_path(config_dir);
    if !config_path.exists() {
        return Ok(());
    }

    std::fs::remove_file(&config_path)
        .map_err(|e| format!("Failed to delete Enviame API key file: {e}"))?;

    log::info!("Enviame API key deleted successfully");
    Ok(())
}
