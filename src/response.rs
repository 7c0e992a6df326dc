//! 料金APIレスポンスの型付きデコード
//!
//! 成功時は `{"data": [...]}`、エラー時は `{"errors": [{"type": ...}]}`。
//! 各エントリのフィールドは欠落・型不一致を None として受け付け、
//! 不完全なエントリは後段（レート生成）でスキップする。

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// エラーエントリの種別
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 指定した配送業者がAPI側に存在しない
    CarrierNotFound,
    Other(String),
}

impl From<String> for ApiErrorKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "CarrierNotFoundException" => Self::CarrierNotFound,
            _ => Self::Other(value),
        }
    }
}

/// エラー一覧の1件
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default, deserialize_with = "lenient_error_kind")]
    pub kind: Option<ApiErrorKind>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
}

/// エラーレスポンス本体
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default, deserialize_with = "lenient_errors")]
    pub errors: Vec<ApiError>,
}

impl ErrorEnvelope {
    /// ボディをデコードする。JSONでない場合はエラー一覧なしとして扱う
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    pub fn has_carrier_not_found(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.kind == Some(ApiErrorKind::CarrierNotFound))
    }
}

/// サービス（配送プラン）1件
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceOffer {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: Option<f64>,
}

/// 配送業者1件とそのサービス一覧
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarrierResult {
    #[serde(default, deserialize_with = "lenient_string")]
    pub carrier: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_services")]
    pub services: Vec<ServiceOffer>,
}

/// 成功レスポンスの分類結果
#[derive(Debug, Clone)]
pub enum SuccessBody {
    /// `data` 配列あり
    Carriers(Vec<CarrierResult>),
    /// JSONでない、または `data` 配列がない
    Malformed,
}

impl SuccessBody {
    pub fn from_body(body: &[u8]) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            data: Option<Value>,
        }

        let data = match serde_json::from_slice::<Envelope>(body) {
            Ok(Envelope {
                data: Some(Value::Array(items)),
            }) => items,
            Ok(_) => return Self::Malformed,
            Err(e) => {
                log::warn!("Failed to decode Enviame response body: {e}");
                return Self::Malformed;
            }
        };

        let carriers = data
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect();
        Self::Carriers(carriers)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_error_kind<'de, D>(deserializer: D) -> Result<Option<ApiErrorKind>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.map(ApiErrorKind::from))
}

/// 価格は数値・数値文字列のどちらでも受け付ける
fn lenient_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn lenient_services<'de, D>(deserializer: D) -> Result<Vec<ServiceOffer>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_errors<'de, D>(deserializer: D) -> Result<Vec<ApiError>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
