//! Enviame 配送料金見積もり
//!
//! カートのパッケージから Enviame 料金APIへ問い合わせ、チェックアウトに出す
//! 配送料金一覧を作る。ホスト側は設定・HTTPクライアント・通知の出力先を
//! `ShippingRateQuoter` に渡して使う。

use std::io::Write;

pub mod api_key;
pub mod carriers;
pub mod client;
pub mod config;
pub mod icons;
pub mod notice;
pub mod package;
pub mod query;
pub mod quoter;
pub mod rate;
pub mod response;

pub use client::{EnviameClient, HttpReply, PricingClientTrait};
pub use config::ShippingSettings;
pub use notice::{Notice, NoticeLevel, NoticeLog, NoticeSink};
pub use package::{AggregatedDimensions, Destination, LineItem, Package, Product};
pub use quoter::ShippingRateQuoter;
pub use rate::{Rate, TaxMode};

/// ロガーを初期化する
///
/// リリースビルドではWarnレベル以上、デバッグビルドではInfoレベル以上を出力する。
/// `RUST_LOG` が設定されていればそちらを優先する。
/// 時刻は店舗のタイムゾーン（America/Santiago）で出力する。
pub fn init_logging() {
    #[cfg(debug_assertions)]
    let default_level = log::LevelFilter::Info;
    #[cfg(not(debug_assertions))]
    let default_level = log::LevelFilter::Warn;

    let env = env_logger::Env::default().default_filter_or(default_level.as_str());

    let result = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5} {}] {}",
                chrono::Utc::now()
                    .with_timezone(&chrono_tz::America::Santiago)
                    .format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to initialize logger: {e}");
    }
}
