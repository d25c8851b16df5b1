use std::time::Duration;

use serde::Deserialize;

use crate::status::Locale;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// TOTP サービスのベース URL
    #[serde(default = "default_totp_api_base")]
    pub totp_api_base: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // セッション設定
    /// 起動時のユーザーID
    #[serde(default = "default_user_id")]
    pub default_user_id: u64,
    /// ステータス文言の言語（ja / en / zh）
    #[serde(default)]
    pub status_locale: Locale,

    /// TOTP サービスへのリクエストタイムアウト（未指定なら無制限）
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    // CORS 設定（カンマ区切り、空なら無効）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

const DEFAULT_TOTP_API_BASE: &str = "http://localhost:8080";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_USER_ID: u64 = 1001;

fn default_totp_api_base() -> String {
    DEFAULT_TOTP_API_BASE.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_user_id() -> u64 {
    DEFAULT_USER_ID
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
