//! 料金APIのクエリ構築
//!
//! 選択された配送業者の数によってクエリの形が変わる:
//! - 0件: 共通パラメータのみ
//! - 1件: `carrier=<code>`（+ `service=<code>`）
//! - 2件以上: `carriers=<code>` を業者ごとに繰り返し（+ `services=<code>` を1回）
//!
//! 同じキーの繰り返しを潰さないよう、パラメータは順序付きのペア列で保持する。

use crate::package::AggregatedDimensions;

/// 料金APIへ送るクエリ（キーと値の順序付きペア）
#[derive(Debug, Clone, PartialEq)]
pub struct PricingQuery {
    pairs: Vec<(String, String)>,
}

impl PricingQuery {
    /// 業者・サービス指定なしの共通パラメータのみのクエリ
    pub fn common(dimensions: &AggregatedDimensions, origin: &str, destination: &str) -> Self {
        let pairs = vec![
            ("weight".to_string(), dimensions.weight.to_string()),
            ("from_place".to_string(), origin.to_string()),
            ("to_place".to_string(), destination.to_string()),
            ("length".to_string(), dimensions.length.to_string()),
            ("height".to_string(), dimensions.height.to_string()),
            ("width".to_string(), dimensions.width.to_string()),
        ];
        Self { pairs }
    }

    /// 業者選択に応じたクエリを構築する
    ///
    /// `service` は前後の空白を除去し、空なら指定なしとして扱う。
    /// 業者1件でサービス未指定の場合もそのまま送信する（API側で拒否される可能性あり）。
    pub fn for_selection(
        dimensions: &AggregatedDimensions,
        origin: &str,
        destination: &str,
        carriers: &[String],
        service: Option<&str>,
    ) -> Self {
        let mut query = Self::common(dimensions, origin, destination);
        let service = service.map(str::trim).filter(|s| !s.is_empty());

        match carriers {
            [] => {}
            [carrier] => {
                query.push("carrier", carrier);
                match service {
                    Some(service) => query.push("service", service),
                    None => log::warn!(
                        "No default service configured; querying carrier {carrier} without a service"
                    ),
                }
            }
            many => {
                for carrier in many {
                    query.push("carriers", carrier);
                }
                match service {
                    Some(service) => query.push("services", service),
                    None => log::warn!(
                        "No default service configured; querying {} carriers without a service",
                        many.len()
                    ),
                }
            }
        }

        query
    }

    fn push(&mut self, key: &str, value: &str) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// 指定キーの値をすべて返す（出現順）
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// URLエンコード済みのクエリ文字列
    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// エンドポイントにクエリを付けた完全なURL
    pub fn to_url(&self, endpoint: &str) -> String {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}{}", endpoint, separator, self.to_query_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> AggregatedDimensions {
        AggregatedDimensions {
            weight: 2.5,
            length: 30.0,
            width: 20.0,
            height: 10.0,
        }
    }

    fn codes(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_common_params_order_and_values() {
        let query = PricingQuery::common(&dims(), "Santiago", "Temuco");
        assert_eq!(
            query.to_query_string(),
            "weight=2.5&from_place=Santiago&to_place=Temuco&length=30&height=10&width=20"
        );
    }

    #[test]
    fn test_no_carriers_has_no_carrier_keys() {
        let query =
            PricingQuery::for_selection(&dims(), "Santiago", "Temuco", &[], Some("standard"));
        assert!(!query.contains_key("carrier"));
        assert!(!query.contains_key("carriers"));
        assert!(!query.contains_key("service"));
        assert!(!query.contains_key("services"));
        assert_eq!(query, PricingQuery::common(&dims(), "Santiago", "Temuco"));
    }

    #[test]
    fn test_single_carrier_uses_singular_keys() {
        let query = PricingQuery::for_selection(
            &dims(),
            "Santiago",
            "Temuco",
            &codes(&["BLX"]),
            Some(" standard "),
        );
        assert_eq!(query.values("carrier"), vec!["BLX"]);
        assert_eq!(query.values("service"), vec!["standard"]);
        assert!(!query.contains_key("carriers"));
        assert!(!query.contains_key("services"));
    }

    #[test]
    fn test_single_carrier_without_service_is_still_built() {
        let query =
            PricingQuery::for_selection(&dims(), "Santiago", "Temuco", &codes(&["CHX"]), None);
        assert_eq!(query.values("carrier"), vec!["CHX"]);
        assert!(!query.contains_key("service"));

        let blank =
            PricingQuery::for_selection(&dims(), "Santiago", "Temuco", &codes(&["CHX"]), Some("  "));
        assert!(!blank.contains_key("service"));
    }

    #[test]
    fn test_multiple_carriers_are_repeated_not_collapsed() {
        let query = PricingQuery::for_selection(
            &dims(),
            "Santiago",
            "Temuco",
            &codes(&["BLX", "SKN", "99M"]),
            Some("standard"),
        );
        assert_eq!(query.values("carriers"), vec!["BLX", "SKN", "99M"]);
        assert_eq!(query.values("services"), vec!["standard"]);
        assert!(!query.contains_key("carrier"));

        let qs = query.to_query_string();
        assert!(qs.ends_with("&carriers=BLX&carriers=SKN&carriers=99M&services=standard"));
    }

    #[test]
    fn test_values_are_url_encoded() {
        let query = PricingQuery::common(&dims(), "Santiago Centro", "Viña del Mar");
        let qs = query.to_query_string();
        assert!(qs.contains("from_place=Santiago%20Centro"));
        assert!(qs.contains("to_place=Vi%C3%B1a%20del%20Mar"));
    }

    #[test]
    fn test_to_url_appends_with_correct_separator() {
        let query = PricingQuery::common(&dims(), "A", "B");
        assert!(query
            .to_url("https://api.enviame.io/api/v1/prices")
            .starts_with("https://api.enviame.io/api/v1/prices?weight=2.5"));
        assert!(query
            .to_url("https://example.com/prices?debug=1")
            .starts_with("https://example.com/prices?debug=1&weight=2.5"));
    }
}
