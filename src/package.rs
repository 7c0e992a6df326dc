//! 配送見積もり対象のパッケージと寸法集計
//!
//! ホスト（カート/チェックアウト）から渡されるパッケージを受け取り、
//! 見積もりAPIに送る重量・寸法へ集計する。

use serde::{Deserialize, Serialize};

/// 合計重量が 0 の場合に代わりに使う最小重量（kg）
pub const MIN_WEIGHT: f64 = 0.1;

/// 各寸法が 0 の場合に代わりに使う最小値（cm）
pub const MIN_DIMENSION: f64 = 10.0;

/// 配送先
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Destination {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// 商品の重量・寸法（未設定の項目は 0 として扱う）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// カート内の1行（商品と数量）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub product: Product,
    pub quantity: u32,
}

/// 見積もり対象のパッケージ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub contents: Vec<LineItem>,
}

impl Package {
    /// 配送先の市区名（空文字・空白のみは None）
    pub fn destination_city(&self) -> Option<&str> {
        self.destination
            .city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
    }
}

/// API に送る集計済みの重量・寸法
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedDimensions {
    pub weight: f64,
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl AggregatedDimensions {
    /// ラインアイテムから重量・寸法を集計する
    ///
    /// - 重量: 単位重量 × 数量 の合計
    /// - 長さ・幅・高さ: 全アイテムの最大値
    ///
    /// 集計値がちょうど 0 の場合のみ最小値で置き換える。
    pub fn from_items(items: &[LineItem]) -> Self {
        let mut weight = 0.0_f64;
        let mut length = 0.0_f64;
        let mut width = 0.0_f64;
        let mut height = 0.0_f64;

        for item in items {
            let product = &item.product;
            weight += product.weight.unwrap_or(0.0) * f64::from(item.quantity);
            length = length.max(product.length.unwrap_or(0.0));
            width = width.max(product.width.unwrap_or(0.0));
            height = height.max(product.height.unwrap_or(0.0));
        }

        Self {
            weight: floor_if_zero(weight, MIN_WEIGHT),
            length: floor_if_zero(length, MIN_DIMENSION),
            width: floor_if_zero(width, MIN_DIMENSION),
            height: floor_if_zero(height, MIN_DIMENSION),
        }
    }
}

fn floor_if_zero(value: f64, floor: f64) -> f64 {
    if value == 0.0 {
        floor
    } else {
        value
    }
}
