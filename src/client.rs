//! Enviame 料金APIクライアント
//!
//! # セキュリティガイドライン
//! - APIキーはログに出力しない（`x-api-key` ヘッダーでのみ送信）
//!
//! HTTPエラー（4xx/5xx）はデータとして返し、分類は呼び出し側で行う。
//! `Err` になるのは接続失敗・ボディ読み取り失敗・タイムアウトのみ。

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// リクエストタイムアウト（秒）
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// HTTPレスポンス（ステータスとボディ）
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    /// ステータスの説明文（例: "Not Found"）
    pub reason: String,
    pub body: Bytes,
}

impl HttpReply {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// ボディを文字列として返す（不正なUTF-8は置換）
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// 料金APIクライアントトレイト（テスト用モック対応）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingClientTrait: Send + Sync {
    /// 料金APIにGETリクエストを送る
    async fn get_prices(&self, url: &str) -> Result<HttpReply, String>;
}

/// Enviame クライアント実装
pub struct EnviameClient {
    api_key: String,
    http_client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
}

impl EnviameClient {
    /// 新しい Enviame クライアントを作成
    ///
    /// # セキュリティ
    /// APIキーはログに出力されません
    pub fn new(api_key: String) -> Self {
        // OS の証明書ストアが使えない環境では同梱のルート証明書を使う
        let builder = match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                log::warn!("Native root certificates unavailable, using bundled roots: {e}");
                hyper_rustls::HttpsConnectorBuilder::new().with_webpki_roots()
            }
        };
        let https = builder
            .https_or_http()
            .enable_http1()
            .build();

        let http_client = Client::builder(TokioExecutor::new()).build(https);

        log::info!("EnviameClient created");

        Self {
            api_key,
            http_client,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// タイムアウトを変更する
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PricingClientTrait for EnviameClient {
    async fn get_prices(&self, url: &str) -> Result<HttpReply, String> {
        log::debug!("Enviame request URL: {}", url);

        let req = Request::builder()
            .method(Method::GET)
            .uri(url)
            .header("Accept", "application/json")
            .header("x-api-key", &self.api_key)
            .body(Full::new(Bytes::new()))
            .map_err(|e| format!("Failed to build request: {e}"))?;

        let request_result = tokio::time::timeout(self.timeout, async {
            let response = self
                .http_client
                .request(req)
                .await
                .map_err(|e| format!("Failed to send request to Enviame: {e}"))?;
            let status = response.status();
            let body_bytes = response
                .into_body()
                .collect()
                .await
                .map_err(|e| format!("Failed to read response body: {e}"))?
                .to_bytes();
            Ok::<_, String>((status, body_bytes))
        })
        .await;

        let (status, body) = match request_result {
            Ok(Ok((s, b))) => (s, b),
            Ok(Err(e)) => {
                log::error!("Failed to complete Enviame request: {e}");
                return Err(e);
            }
            Err(_) => {
                log::error!(
                    "Enviame request timed out after {} seconds",
                    self.timeout.as_secs_f64()
                );
                return Err(format!(
                    "Request timed out after {} seconds",
                    self.timeout.as_secs_f64()
                ));
            }
        };

        log::info!(
            "Enviame response status {}, body length: {} bytes",
            status,
            body.len()
        );

        Ok(HttpReply {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}
