use std::time::Duration;

use reqwest::{
    StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap},
};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::WorkflowError;
use crate::session::{EnrollmentDetails, QrArtifact};

/// エンロール時の Accept ヘッダー（JSON と PNG の両方を受け付ける）
pub const ENROLL_ACCEPT: &str = "application/json, image/png";

/// JSON として解釈できなかったボディを格納するフィールド名
pub const RAW_FIELD: &str = "raw";

/// エンロールレスポンス（JSON 形式）のフィールド名
const SECRET_FIELD: &str = "secret";
const QR_FIELD: &str = "qrcode_base64";

/// 有効化・検証リクエスト（console → TOTP サービス）
#[derive(Debug, Serialize)]
pub struct CodeRequest<'a> {
    pub user_id: u64,
    pub code: &'a str,
}

/// 無効化リクエスト（console → TOTP サービス）
#[derive(Debug, Serialize)]
pub struct DisableRequest {
    pub user_id: u64,
}

/// エンロールレスポンスのデコード結果
///
/// Content-Type によってどちらの形式かが決まる。
#[derive(Debug)]
pub enum EnrollPayload {
    /// JSON（シークレットと Base64 QR コード）
    Json {
        secret: Option<SecretString>,
        qr: Option<QrArtifact>,
        details: EnrollmentDetails,
    },
    /// 画像バイナリ（シークレットなし）
    Image(QrArtifact),
}

/// 安全にデコードされたレスポンス
#[derive(Debug, Clone)]
pub struct DecodedResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Value,
}

impl DecodedResponse {
    /// `ok` フィールド（存在しない場合は `None`）
    pub fn ok_field(&self) -> Option<&Value> {
        self.body.get("ok")
    }

    /// 失敗理由として表示する文字列
    ///
    /// `error` / `message` / `raw` の順に探し、なければ JSON 全体を返す。
    pub fn describe(&self) -> String {
        let text = match &self.body {
            Value::Object(map) => ["error", "message", RAW_FIELD]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| self.body.to_string()),
            other => other.to_string(),
        };

        if text.trim().is_empty() {
            self.status.canonical_reason().unwrap_or_default().to_string()
        } else {
            text
        }
    }

    pub fn http_error(&self) -> WorkflowError {
        WorkflowError::Http {
            status: self.status,
            cause: self.describe(),
        }
    }

    pub fn protocol_violation(&self) -> WorkflowError {
        let body = match self.body.get(RAW_FIELD).and_then(Value::as_str) {
            Some(raw) => raw.to_string(),
            None => self.body.to_string(),
        };
        WorkflowError::ProtocolViolation {
            status: self.status,
            content_type: self.content_type.clone(),
            body,
        }
    }
}

/// Content-Type ヘッダーの値（なければ空文字）
pub fn content_type_of(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// パラメータを除いた小文字のメディアタイプ
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_json(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence == "application/json" || essence.ends_with("+json")
}

pub fn is_image(content_type: &str) -> bool {
    essence(content_type).starts_with("image/")
}

/// 空でない文字列フィールド
fn str_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn u32_field(fields: &Map<String, Value>, key: &str) -> Option<u32> {
    fields
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

fn raw_fallback(text: String) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(RAW_FIELD.to_string(), Value::String(text));
    Value::Object(map)
}

/// レスポンスを安全にデコードする
///
/// JSON と宣言されていればそのまま解釈し、そうでなければテキストを JSON として試す。
/// どちらも失敗した場合は `{"raw": <本文>}` を返す。失敗しない。
pub async fn safe_json(response: reqwest::Response) -> DecodedResponse {
    let status = response.status();
    let content_type = content_type_of(response.headers());

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = ?e, status = %status, "レスポンスボディの読み込みに失敗");
            return DecodedResponse {
                status,
                content_type,
                body: raw_fallback(String::new()),
            };
        }
    };

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => value,
        Err(e) => {
            if is_json(&content_type) {
                tracing::warn!(error = %e, status = %status, "JSON と宣言されたボディのパースに失敗");
            }
            raw_fallback(String::from_utf8_lossy(&bytes).into_owned())
        }
    };

    DecodedResponse {
        status,
        content_type,
        body,
    }
}

/// エンロールレスポンスを Content-Type に応じてデコードする
pub async fn decode_enroll_response(
    response: reqwest::Response,
) -> Result<EnrollPayload, WorkflowError> {
    let status = response.status();
    let content_type = content_type_of(response.headers());

    tracing::debug!(status = %status, content_type = %content_type, "エンロールレスポンス受信");

    if !status.is_success() {
        return Err(safe_json(response).await.http_error());
    }

    if is_json(&content_type) {
        let bytes = response.bytes().await?;
        let violation = |detail: String| WorkflowError::ProtocolViolation {
            status,
            content_type: content_type.clone(),
            body: detail,
        };

        let parsed = serde_json::from_slice::<Value>(&bytes)
            .map_err(|_| violation(String::from_utf8_lossy(&bytes).into_owned()))?;
        let Value::Object(fields) = parsed else {
            return Err(violation(String::from_utf8_lossy(&bytes).into_owned()));
        };

        // secret / qrcode_base64 以外は付加情報。型が合わなければ無視する
        let qr = match str_field(&fields, QR_FIELD) {
            Some(encoded) => Some(QrArtifact::from_base64_png(encoded).map_err(|e| {
                tracing::error!(error = %e, "QRコードの Base64 デコードに失敗");
                violation(String::from_utf8_lossy(&bytes).into_owned())
            })?),
            None => None,
        };
        let secret = str_field(&fields, SECRET_FIELD).map(|s| SecretString::from(s.to_string()));

        if qr.is_none() && secret.is_none() {
            return Err(violation(String::from_utf8_lossy(&bytes).into_owned()));
        }

        Ok(EnrollPayload::Json {
            secret,
            qr,
            details: EnrollmentDetails {
                provision_uri: str_field(&fields, "provision_uri").map(str::to_string),
                digits: u32_field(&fields, "digits"),
                period: u32_field(&fields, "period"),
                algorithm: str_field(&fields, "algorithm").map(str::to_string),
            },
        })
    } else if is_image(&content_type) {
        let bytes = response.bytes().await?;
        Ok(EnrollPayload::Image(QrArtifact::from_bytes(
            essence(&content_type),
            bytes.to_vec(),
        )))
    } else {
        let body = response.text().await?;
        Err(WorkflowError::ProtocolViolation {
            status,
            content_type,
            body,
        })
    }
}

/// TOTP サービス API クライアント
#[derive(Clone)]
pub struct TotpApiClient {
    client: reqwest::Client,
    api_base: String,
}

impl TotpApiClient {
    /// 新しい TotpApiClient を作成
    ///
    /// タイムアウト未指定の場合は reqwest の既定動作に従う
    pub fn new(api_base: impl Into<String>, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// QRコード（とシークレット）を取得
    pub async fn enroll(&self, user_id: u64) -> Result<EnrollPayload, WorkflowError> {
        let url = format!(
            "{}/enroll?user_id={}",
            self.api_base,
            urlencoding::encode(&user_id.to_string())
        );

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, ENROLL_ACCEPT)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "エンロールリクエスト送信失敗");
                WorkflowError::Network(e)
            })?;

        decode_enroll_response(response).await
    }

    /// TOTP を有効化（初回コード確認）
    pub async fn activate(&self, user_id: u64, code: &str) -> Result<DecodedResponse, WorkflowError> {
        let body = CodeRequest {
            user_id,
            code: code.trim(),
        };
        self.post_json("activate", &body).await
    }

    /// ワンタイムコードを検証
    pub async fn verify(&self, user_id: u64, code: &str) -> Result<DecodedResponse, WorkflowError> {
        let body = CodeRequest {
            user_id,
            code: code.trim(),
        };
        self.post_json("verify", &body).await
    }

    /// TOTP を無効化
    pub async fn disable(&self, user_id: u64) -> Result<DecodedResponse, WorkflowError> {
        self.post_json("disable", &DisableRequest { user_id }).await
    }

    async fn post_json<T: Serialize>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<DecodedResponse, WorkflowError> {
        let url = format!("{}/{}", self.api_base, endpoint);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, endpoint, "TOTP サービスへのリクエスト送信失敗");
                WorkflowError::Network(e)
            })?;

        let decoded = safe_json(response).await;
        tracing::debug!(endpoint, status = %decoded.status, "TOTP サービスのレスポンス受信");
        Ok(decoded)
    }
}
