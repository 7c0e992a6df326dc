//! チェックアウトに提示する配送料金

use serde::{Deserialize, Serialize};

/// 配送方法ID（ホストの配送方法一覧上の識別子）
pub const METHOD_ID: &str = "enviame";

/// 税計算モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// 注文単位で1回だけ課税
    PerOrder,
    /// 商品ごとに課税
    PerItem,
}

/// 配送料金1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    /// `<carrier_code>_<service_code>`
    pub id: String,
    pub label: String,
    pub cost: f64,
    pub calc_tax: TaxMode,
}

impl Rate {
    pub fn rate_id(carrier_code: &str, service_code: &str) -> String {
        format!("{carrier_code}_{service_code}")
    }

    /// ホスト全体で一意なID
    ///
    /// インスタンスID 0 はゾーン外の配送方法を表し、インスタンス部分を省略する。
    pub fn qualified_id(&self, method_id: &str, instance_id: u32) -> String {
        if instance_id == 0 {
            format!("{}:{}", method_id, self.id)
        } else {
            format!("{}:{}:{}", method_id, instance_id, self.id)
        }
    }
}
