//! 配送料金の見積もり
//!
//! パッケージから料金APIへのクエリを組み立て、レスポンスを配送料金に変換する。
//! どの失敗も呼び出し元には伝播させず、「料金なし + 通知」に縮退させる。
//! 再試行は「配送業者が見つからない」エラー時の、業者指定なしでの1回のみ。

use crate::client::{HttpReply, PricingClientTrait};
use crate::config::ShippingSettings;
use crate::icons::CarrierIcons;
use crate::notice::{NoticeLevel, NoticeSink};
use crate::package::{AggregatedDimensions, Package};
use crate::query::PricingQuery;
use crate::rate::{Rate, TaxMode};
use crate::response::{CarrierResult, ErrorEnvelope, SuccessBody};

pub const MSG_TRANSPORT_ERROR: &str = "Error al contactar API Enviame: ";
pub const MSG_FALLBACK_FAILED: &str =
    "No se pudieron obtener opciones de envío. Por favor contacte al administrador.";
pub const MSG_FALLBACK_TRANSPORT_ERROR: &str =
    "Error al calcular opciones de envío. Por favor contacte al administrador.";
pub const MSG_NO_OPTIONS: &str = "Enviame no devolvió opciones de envío para esta cotización.";
pub const MSG_MALFORMED: &str = "La respuesta de Enviame no tiene el formato esperado. Respuesta: ";

/// 配送料金見積もり
pub struct ShippingRateQuoter<C, N> {
    settings: ShippingSettings,
    client: C,
    notices: N,
    icons: Option<CarrierIcons>,
}

impl<C, N> ShippingRateQuoter<C, N>
where
    C: PricingClientTrait,
    N: NoticeSink,
{
    /// 設定にアイコン設定があればアイコン解決も有効にする
    pub fn new(settings: ShippingSettings, client: C, notices: N) -> Self {
        let icons = settings
            .icons
            .as_ref()
            .map(|icons| CarrierIcons::new(icons.dir.clone(), icons.base_url.clone()));
        Self {
            settings,
            client,
            notices,
            icons,
        }
    }

    pub fn with_icons(mut self, icons: CarrierIcons) -> Self {
        self.icons = Some(icons);
        self
    }

    pub fn settings(&self) -> &ShippingSettings {
        &self.settings
    }

    /// パッケージの配送料金を見積もる
    ///
    /// 配送先の市区名がない場合、または配送方法が無効な場合は
    /// APIを呼ばずに空の一覧を返す。
    pub async fn quote(&self, package: &Package) -> Vec<Rate> {
        if !self.settings.enabled {
            log::debug!("Enviame shipping method is disabled, skipping quote");
            return Vec::new();
        }

        let Some(destination) = package.destination_city() else {
            log::debug!("Package has no destination city, skipping quote");
            return Vec::new();
        };

        let dimensions = AggregatedDimensions::from_items(&package.contents);
        let origin = self.settings.default_origin.trim();

        log::info!(
            "Quoting {} line item(s) with {} selected carrier(s)",
            package.contents.len(),
            self.settings.carriers.len()
        );

        let query = PricingQuery::for_selection(
            &dimensions,
            origin,
            destination,
            &self.settings.carriers,
            self.settings.default_service(),
        );

        let Some(reply) = self.send(&query, MSG_TRANSPORT_ERROR, true).await else {
            return Vec::new();
        };

        let reply = if reply.is_error() {
            match self.handle_error_reply(reply, &dimensions, origin, destination).await {
                Some(fallback) => fallback,
                None => return Vec::new(),
            }
        } else {
            reply
        };

        self.rates_from_success(&reply)
    }

    /// リクエストを送り、通信失敗時は通知して None を返す
    ///
    /// `append_cause` が true の場合は通知メッセージの後ろに失敗理由を付ける。
    async fn send(
        &self,
        query: &PricingQuery,
        transport_message: &str,
        append_cause: bool,
    ) -> Option<HttpReply> {
        let url = query.to_url(&self.settings.endpoint);
        if self.settings.debug {
            self.notices
                .add_notice(NoticeLevel::Notice, &format!("Enviame Request URL: {url}"));
        }

        match self.client.get_prices(&url).await {
            Ok(reply) => {
                if self.settings.debug {
                    self.notices.add_notice(
                        NoticeLevel::Notice,
                        &format!("Enviame Response Code: {}", reply.status),
                    );
                    self.notices.add_notice(
                        NoticeLevel::Notice,
                        &format!("Enviame Response Body: {}", reply.body_text()),
                    );
                }
                Some(reply)
            }
            Err(e) => {
                log::error!("Enviame request failed: {e}");
                let message = if append_cause {
                    format!("{transport_message}{e}")
                } else {
                    transport_message.to_string()
                };
                self.notices.add_notice(NoticeLevel::Error, &message);
                None
            }
        }
    }

    /// HTTPエラーの処理
    ///
    /// 「配送業者が見つからない」エラーの場合のみ、業者・サービス指定なしで1回だけ再試行し、
    /// 成功したレスポンスを返す。それ以外は通知して None。
    async fn handle_error_reply(
        &self,
        reply: HttpReply,
        dimensions: &AggregatedDimensions,
        origin: &str,
        destination: &str,
    ) -> Option<HttpReply> {
        let body = reply.body_text();
        let envelope = ErrorEnvelope::from_body(&reply.body);

        if !envelope.has_carrier_not_found() {
            log::error!("Enviame HTTP error {}: {}", reply.status, body);
            self.notices.add_notice(
                NoticeLevel::Error,
                &format!(
                    "Error al consultar API Enviame ({}): {}. Detalles: {}",
                    reply.status, reply.reason, body
                ),
            );
            return None;
        }

        log::warn!("Enviame reported carrier not found, retrying without carrier selection");

        let fallback_query = PricingQuery::common(dimensions, origin, destination);
        let fallback = self
            .send(&fallback_query, MSG_FALLBACK_TRANSPORT_ERROR, false)
            .await?;

        if fallback.is_error() {
            log::error!(
                "Enviame fallback request also failed ({}): {}",
                fallback.status,
                fallback.body_text()
            );
            self.notices
                .add_notice(NoticeLevel::Error, MSG_FALLBACK_FAILED);
            return None;
        }

        log::info!("Enviame fallback without carrier succeeded");
        Some(fallback)
    }

    /// 成功レスポンスから配送料金を生成する
    fn rates_from_success(&self, reply: &HttpReply) -> Vec<Rate> {
        let carriers = match SuccessBody::from_body(&reply.body) {
            SuccessBody::Carriers(carriers) => carriers,
            SuccessBody::Malformed => {
                let body = reply.body_text();
                log::error!("Unexpected Enviame response shape: {}", body);
                self.notices
                    .add_notice(NoticeLevel::Notice, &format!("{MSG_MALFORMED}{body}"));
                return Vec::new();
            }
        };

        if carriers.is_empty() {
            log::info!("Enviame returned no shipping options");
            self.notices.add_notice(NoticeLevel::Notice, MSG_NO_OPTIONS);
            return Vec::new();
        }

        let rates: Vec<Rate> = carriers
            .iter()
            .flat_map(|carrier| self.rates_for_carrier(carrier))
            .collect();

        log::info!("Enviame quote produced {} rate(s)", rates.len());
        rates
    }

    fn rates_for_carrier(&self, carrier: &CarrierResult) -> Vec<Rate> {
        let mut rates = Vec::with_capacity(carrier.services.len());

        for service in &carrier.services {
            let (Some(carrier_code), Some(carrier_name), Some(code), Some(name), Some(price)) = (
                carrier.carrier.as_deref(),
                carrier.name.as_deref(),
                service.code.as_deref(),
                service.name.as_deref(),
                service.price,
            ) else {
                log::warn!(
                    "Skipping incomplete Enviame entry: carrier={:?} service={:?}",
                    carrier.carrier,
                    service
                );
                continue;
            };

            let icon = self
                .icons
                .as_ref()
                .map(|icons| icons.label_prefix(carrier_code, carrier_name))
                .unwrap_or_default();

            rates.push(Rate {
                id: Rate::rate_id(carrier_code, code),
                label: format!(
                    "{}{} ({} - {})",
                    icon, self.settings.title, carrier_name, name
                ),
                cost: price,
                calc_tax: TaxMode::PerOrder,
            });
        }

        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockPricingClientTrait;
    use crate::notice::{MockNoticeSink, Notice, NoticeLog};
    use crate::package::{Destination, LineItem, Product};
    use bytes::Bytes;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::sync::Arc;
    use tempfile::TempDir;

    const TWO_CARRIERS: &str = r#"{"data":[
        {"carrier":"BLX","name":"Blue Express","services":[{"code":"standard","name":"Normal","price":3500}]},
        {"carrier":"SKN","name":"Starken","services":[{"code":"express","name":"Express","price":4990}]}
    ]}"#;

    const CARRIER_NOT_FOUND: &str =
        r#"{"errors":[{"type":"CarrierNotFoundException","message":"Carrier XYZ not found"}]}"#;

    fn reply(status: u16, body: &str) -> HttpReply {
        HttpReply {
            status,
            reason: match status {
                200 => "OK",
                404 => "Not Found",
                422 => "Unprocessable Entity",
                500 => "Internal Server Error",
                _ => "",
            }
            .to_string(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn package(city: Option<&str>) -> Package {
        Package {
            destination: Destination {
                city: city.map(str::to_string),
                ..Destination::default()
            },
            contents: vec![LineItem {
                product: Product {
                    name: Some("Polera".to_string()),
                    weight: Some(0.5),
                    length: Some(30.0),
                    width: Some(20.0),
                    height: Some(5.0),
                },
                quantity: 2,
            }],
        }
    }

    fn settings(carriers: &[&str]) -> ShippingSettings {
        ShippingSettings {
            carriers: carriers.iter().map(|c| c.to_string()).collect(),
            endpoint: "https://api.enviame.io/api/v1/prices".to_string(),
            ..ShippingSettings::default()
        }
    }

    fn quoter(
        settings: ShippingSettings,
        client: MockPricingClientTrait,
    ) -> (
        ShippingRateQuoter<MockPricingClientTrait, Arc<NoticeLog>>,
        Arc<NoticeLog>,
    ) {
        let log = Arc::new(NoticeLog::new());
        (
            ShippingRateQuoter::new(settings, client, Arc::clone(&log)),
            log,
        )
    }

    #[tokio::test]
    async fn test_empty_destination_makes_no_call() {
        let mut client = MockPricingClientTrait::new();
        client.expect_get_prices().never();
        let (quoter, log) = quoter(settings(&["BLX"]), client);

        assert!(quoter.quote(&package(None)).await.is_empty());
        assert!(quoter.quote(&package(Some("  "))).await.is_empty());
        assert!(log.notices().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_method_makes_no_call() {
        let mut client = MockPricingClientTrait::new();
        client.expect_get_prices().never();
        let settings = ShippingSettings {
            enabled: false,
            ..settings(&["BLX"])
        };
        let (quoter, _log) = quoter(settings, client);

        assert!(quoter.quote(&package(Some("Temuco"))).await.is_empty());
    }

    #[tokio::test]
    async fn test_two_carriers_produce_two_rates() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .withf(|url| {
                url.contains("weight=1&")
                    && url.contains("to_place=Temuco")
                    && url.contains("&carriers=BLX&carriers=SKN&services=standard")
            })
            .times(1)
            .returning(|_| Ok(reply(200, TWO_CARRIERS)));
        let (quoter, log) = quoter(settings(&["BLX", "SKN"]), client);

        let rates = quoter.quote(&package(Some("Temuco"))).await;
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].id, "BLX_standard");
        assert_eq!(rates[0].cost, 3500.0);
        assert_eq!(rates[0].label, "Enviame Shipping (Blue Express - Normal)");
        assert_eq!(rates[0].calc_tax, TaxMode::PerOrder);
        assert_eq!(rates[1].id, "SKN_express");
        assert_eq!(rates[1].cost, 4990.0);
        assert!(log.notices().is_empty());
    }

    #[tokio::test]
    async fn test_single_carrier_query_uses_singular_key() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .withf(|url| {
                url.contains("&carrier=CHX&service=standard") && !url.contains("carriers=")
            })
            .times(1)
            .returning(|_| Ok(reply(200, r#"{"data":[]}"#)));
        let (quoter, _log) = quoter(settings(&["CHX"]), client);

        quoter.quote(&package(Some("Temuco"))).await;
    }

    #[tokio::test]
    async fn test_no_carriers_query_has_no_carrier_keys() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .withf(|url| !url.contains("carrier") && !url.contains("service"))
            .times(1)
            .returning(|_| Ok(reply(200, r#"{"data":[]}"#)));
        let (quoter, _log) = quoter(settings(&[]), client);

        quoter.quote(&package(Some("Temuco"))).await;
    }

    #[tokio::test]
    async fn test_carrier_not_found_falls_back_once_without_carrier() {
        let mut seq = Sequence::new();
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .withf(|url| url.contains("carrier=XYZ"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply(404, CARRIER_NOT_FOUND)));
        client
            .expect_get_prices()
            .withf(|url| !url.contains("carrier") && !url.contains("service"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply(200, TWO_CARRIERS)));
        let (quoter, log) = quoter(settings(&["XYZ"]), client);

        let rates = quoter.quote(&package(Some("Temuco"))).await;
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].id, "BLX_standard");
        assert!(log.notices().is_empty());
    }

    #[tokio::test]
    async fn test_carrier_not_found_on_other_error_status_also_falls_back() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .times(1)
            .withf(|url| url.contains("carriers="))
            .returning(|_| Ok(reply(422, CARRIER_NOT_FOUND)));
        client
            .expect_get_prices()
            .times(1)
            .withf(|url| !url.contains("carriers="))
            .returning(|_| Ok(reply(200, TWO_CARRIERS)));
        let (quoter, _log) = quoter(settings(&["XYZ", "BLX"]), client);

        assert_eq!(quoter.quote(&package(Some("Temuco"))).await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fallback_reports_error() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .times(2)
            .returning(|_| Ok(reply(404, CARRIER_NOT_FOUND)));
        let (quoter, log) = quoter(settings(&["XYZ"]), client);

        assert!(quoter.quote(&package(Some("Temuco"))).await.is_empty());
        assert_eq!(
            log.notices(),
            vec![Notice {
                level: NoticeLevel::Error,
                message: MSG_FALLBACK_FAILED.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_fallback_transport_failure_reports_error() {
        let mut seq = Sequence::new();
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply(404, CARRIER_NOT_FOUND)));
        client
            .expect_get_prices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err("connection reset".to_string()));
        let (quoter, log) = quoter(settings(&["XYZ"]), client);

        assert!(quoter.quote(&package(Some("Temuco"))).await.is_empty());
        let notices = log.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, MSG_FALLBACK_TRANSPORT_ERROR);
    }

    #[tokio::test]
    async fn test_other_http_error_is_not_retried() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .times(1)
            .returning(|_| Ok(reply(500, r#"{"errors":[{"type":"ServerException"}]}"#)));
        let (quoter, log) = quoter(settings(&["BLX"]), client);

        assert!(quoter.quote(&package(Some("Temuco"))).await.is_empty());
        let notices = log.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0]
            .message
            .starts_with("Error al consultar API Enviame (500): Internal Server Error."));
        assert!(notices[0].message.contains("ServerException"));
    }

    #[tokio::test]
    async fn test_404_without_carrier_not_found_is_not_retried() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .times(1)
            .returning(|_| Ok(reply(404, "Not here")));
        let (quoter, log) = quoter(settings(&["BLX"]), client);

        assert!(quoter.quote(&package(Some("Temuco"))).await.is_empty());
        assert_eq!(log.count(NoticeLevel::Error), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported_and_not_retried() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .times(1)
            .returning(|_| Err("Request timed out after 15 seconds".to_string()));
        let (quoter, log) = quoter(settings(&["BLX"]), client);

        assert!(quoter.quote(&package(Some("Temuco"))).await.is_empty());
        let notices = log.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0].message,
            "Error al contactar API Enviame: Request timed out after 15 seconds"
        );
    }

    #[tokio::test]
    async fn test_empty_data_records_informational_notice() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .returning(|_| Ok(reply(200, r#"{"data":[]}"#)));
        let (quoter, log) = quoter(settings(&["BLX"]), client);

        assert!(quoter.quote(&package(Some("Temuco"))).await.is_empty());
        assert_eq!(
            log.notices(),
            vec![Notice {
                level: NoticeLevel::Notice,
                message: MSG_NO_OPTIONS.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_malformed_success_body_records_notice_with_body() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .times(1)
            .returning(|_| Ok(reply(200, r#"{"message":"ok"}"#)));
        let (quoter, log) = quoter(settings(&["BLX"]), client);

        assert!(quoter.quote(&package(Some("Temuco"))).await.is_empty());
        let notices = log.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Notice);
        assert_eq!(
            notices[0].message,
            format!("{MSG_MALFORMED}{{\"message\":\"ok\"}}")
        );
    }

    #[tokio::test]
    async fn test_incomplete_entries_are_skipped_silently() {
        let body = r#"{"data":[
            {"carrier":"BLX","name":"Blue Express","services":[
                {"code":"standard","name":"Normal","price":3500},
                {"code":"express","name":"Express"},
                {"name":"Sin código","price":100}
            ]},
            {"carrier":"SKN","services":[{"code":"std","name":"Normal","price":2000}]},
            {"name":"Sin código de carrier","services":[{"code":"std","name":"Normal","price":2000}]}
        ]}"#;
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .returning(move |_| Ok(reply(200, body)));
        let (quoter, log) = quoter(settings(&["BLX", "SKN"]), client);

        let rates = quoter.quote(&package(Some("Temuco"))).await;
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].id, "BLX_standard");
        assert!(log.notices().is_empty());
    }

    #[tokio::test]
    async fn test_label_uses_configured_title_and_icon() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blx.svg"), "<svg/>").unwrap();

        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .returning(|_| Ok(reply(200, TWO_CARRIERS)));
        let settings = ShippingSettings {
            title: "Despacho".to_string(),
            ..settings(&["BLX", "SKN"])
        };
        let (quoter, _log) = quoter(settings, client);
        let quoter = quoter.with_icons(CarrierIcons::new(dir.path(), "https://shop.example.cl/icons"));

        let rates = quoter.quote(&package(Some("Temuco"))).await;
        assert_eq!(
            rates[0].label,
            "<img src=\"https://shop.example.cl/icons/blx.svg\" alt=\"Blue Express\" \
             style=\"height: 20px; width: auto; vertical-align: middle; margin-right: 8px;\" /> \
             Despacho (Blue Express - Normal)"
        );
        // skn のアイコンはないのでラベルのみ
        assert_eq!(rates[1].label, "Despacho (Starken - Express)");
    }

    #[tokio::test]
    async fn test_debug_mode_emits_request_and_response_notices() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .returning(|_| Ok(reply(200, TWO_CARRIERS)));
        let settings = ShippingSettings {
            debug: true,
            ..settings(&["BLX"])
        };
        let (quoter, log) = quoter(settings, client);

        let rates = quoter.quote(&package(Some("Temuco"))).await;
        assert_eq!(rates.len(), 2);

        let notices = log.notices();
        assert_eq!(notices.len(), 3);
        assert!(notices[0]
            .message
            .starts_with("Enviame Request URL: https://api.enviame.io/api/v1/prices?weight=1"));
        assert_eq!(notices[1].message, "Enviame Response Code: 200");
        assert!(notices[2].message.starts_with("Enviame Response Body: "));
    }

    #[tokio::test]
    async fn test_notice_sink_receives_error_level() {
        let mut client = MockPricingClientTrait::new();
        client
            .expect_get_prices()
            .returning(|_| Err("dns failure".to_string()));

        let mut sink = MockNoticeSink::new();
        sink.expect_add_notice()
            .with(
                eq(NoticeLevel::Error),
                eq("Error al contactar API Enviame: dns failure"),
            )
            .times(1)
            .return_const(());

        let quoter = ShippingRateQuoter::new(settings(&["BLX"]), client, sink);
        assert!(quoter.quote(&package(Some("Temuco"))).await.is_empty());
    }
}
