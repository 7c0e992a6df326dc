//! 設定画面で選択可能な配送業者の一覧

/// (業者コード, 表示名)
pub const CARRIERS: [(&str, &str); 9] = [
    ("BLX", "Blue Express"),
    ("CHX", "Chilexpress"),
    ("SKN", "Starken"),
    ("CCH", "Correos Chile"),
    ("99M", "99 Minutos"),
    ("POST", "Correos de Chile"),
    ("FDX", "Fedex"),
    ("CKX", "Ckicks"),
    ("CHD", "Falabella"),
];

/// 初期設定で選択される業者
pub const DEFAULT_CARRIER: &str = "BLX";

pub fn carrier_display_name(code: &str) -> Option<&'static str> {
    CARRIERS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
        .map(|(_, name)| *name)
}

pub fn is_known_carrier(code: &str) -> bool {
    carrier_display_name(code).is_some()
}
