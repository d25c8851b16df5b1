use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// ワンタイムコードの桁数
pub const OTP_LENGTH: usize = 6;

/// JSON 形式のエンロールレスポンスに埋め込まれる QR コードのメディアタイプ
pub const QR_MEDIA_TYPE: &str = "image/png";

/// 入力値を正規化する（数字以外を除去し、6文字に切り詰める）
///
/// 入力変更のたびに呼ばれる純粋関数。6桁であることは保証しない。
pub fn normalize_otp_input(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_digit)
        .take(OTP_LENGTH)
        .collect()
}

/// 直前の操作結果の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// リクエスト送信中
    Pending,
    Succeeded,
    /// コード未入力（リクエストは送信していない）
    CodeRequired,
    /// バックエンドが業務的に拒否（コード不正・期限切れなど）
    Rejected,
    TransportError,
    ProtocolViolation,
}

/// 表示可能な QR コード画像
#[derive(Clone, PartialEq, Eq)]
pub struct QrArtifact {
    media_type: String,
    bytes: Vec<u8>,
}

impl QrArtifact {
    /// バイナリレスポンスから直接作成
    pub fn from_bytes(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }

    /// JSON レスポンスの Base64 文字列から PNG 画像を作成
    pub fn from_base64_png(encoded: &str) -> Result<Self, base64::DecodeError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Ok(Self::from_bytes(QR_MEDIA_TYPE, bytes))
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `data:` URL 形式（img タグにそのまま渡せる）
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for QrArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QrArtifact")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// JSON エンロールレスポンスに付随する鍵パラメータ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrollmentDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provision_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

/// エンロール成功時に保持する一時データ
#[derive(Debug)]
pub struct PendingEnrollment {
    pub secret: Option<SecretString>,
    pub qr: Option<QrArtifact>,
    pub details: Option<EnrollmentDetails>,
}

/// プレゼンテーション層向けの読み取り専用スナップショット
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub user_id: u64,
    pub status: String,
    pub outcome: Option<Outcome>,
    pub in_flight: bool,
    pub has_qr_code: bool,
    pub has_secret: bool,
    /// 認証アプリへの手入力用に表示するシークレット
    pub secret: Option<String>,
    pub otp_input: String,
    pub enrollment: Option<EnrollmentDetails>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// TOTP 登録ワークフローのセッション状態
///
/// プロセス内にのみ存在し、永続化しない。
/// シークレットは `SecretString` で保持し、Debug 出力に含めない。
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    user_id: u64,
    pending_secret: Option<SecretString>,
    pending_qr: Option<QrArtifact>,
    enrollment: Option<EnrollmentDetails>,
    otp_input: String,
    status: String,
    outcome: Option<Outcome>,
    in_flight: bool,
    updated_at: Option<OffsetDateTime>,
}

impl Session {
    pub fn new(user_id: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            pending_secret: None,
            pending_qr: None,
            enrollment: None,
            otp_input: String::new(),
            status: String::new(),
            outcome: None,
            in_flight: false,
            updated_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn set_user_id(&mut self, user_id: u64) {
        self.user_id = user_id;
    }

    pub fn otp_input(&self) -> &str {
        &self.otp_input
    }

    /// 生の入力を正規化して保持し、正規化後の値を返す
    pub fn set_otp_input(&mut self, raw: &str) -> &str {
        self.otp_input = normalize_otp_input(raw);
        &self.otp_input
    }

    pub fn pending_secret(&self) -> Option<&SecretString> {
        self.pending_secret.as_ref()
    }

    pub fn qr_artifact(&self) -> Option<&QrArtifact> {
        self.pending_qr.as_ref()
    }

    pub fn enrollment(&self) -> Option<&EnrollmentDetails> {
        self.enrollment.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            user_id: self.user_id,
            status: self.status.clone(),
            outcome: self.outcome,
            in_flight: self.in_flight,
            has_qr_code: self.pending_qr.is_some(),
            has_secret: self.pending_secret.is_some(),
            secret: self
                .pending_secret
                .as_ref()
                .map(|s| s.expose_secret().to_string()),
            otp_input: self.otp_input.clone(),
            enrollment: self.enrollment.clone(),
            updated_at: self.updated_at,
        }
    }

    /// リクエスト開始（in-flight をセットし、進行中ステータスを表示）
    pub(crate) fn begin(&mut self, status: String) {
        self.in_flight = true;
        self.set_status(status, Outcome::Pending);
    }

    /// リクエスト完了（in-flight を解除し、結果ステータスを表示）
    pub(crate) fn finish(&mut self, status: String, outcome: Outcome) {
        self.in_flight = false;
        self.set_status(status, outcome);
    }

    pub(crate) fn set_status(&mut self, status: String, outcome: Outcome) {
        self.status = status;
        self.outcome = Some(outcome);
        self.updated_at = Some(OffsetDateTime::now_utc());
    }

    pub(crate) fn store_enrollment(&mut self, pending: PendingEnrollment) {
        self.pending_secret = pending.secret;
        self.pending_qr = pending.qr;
        self.enrollment = pending.details;
    }

    /// 登録前の状態に戻す（QR / シークレットを破棄）
    pub(crate) fn discard_enrollment(&mut self) {
        self.pending_secret = None;
        self.pending_qr = None;
        self.enrollment = None;
    }

    /// 無効化成功時のリセット（入力中のコードも破棄）
    pub(crate) fn reset(&mut self) {
        self.discard_enrollment();
        self.otp_input.clear();
    }
}
