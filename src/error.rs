use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::session::Outcome;

/// ワークフローコマンド内部のエラー
///
/// コマンドの外には出さず、必ずステータス文言に変換する。
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// 通信エラー（レスポンスなし）
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    /// 2xx 以外で、業務的な判定ができないレスポンス
    #[error("HTTP {status}: {cause}")]
    Http { status: StatusCode, cause: String },

    /// 想定外の Content-Type、または解釈できないボディ
    #[error("unexpected response (HTTP {status}, content type `{content_type}`): {body}")]
    ProtocolViolation {
        status: StatusCode,
        content_type: String,
        body: String,
    },

    /// 正常に届いたレスポンスが `ok: false` を返した
    #[error("rejected by backend (HTTP {status})")]
    Rejected { status: StatusCode },

    /// コード未入力（リクエスト未送信）
    #[error("one-time code is required")]
    CodeRequired,
}

impl WorkflowError {
    /// HTTP ステータス（レスポンスを受け取れた場合のみ）
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Network(e) => e.status(),
            Self::Http { status, .. }
            | Self::ProtocolViolation { status, .. }
            | Self::Rejected { status } => Some(*status),
            Self::CodeRequired => None,
        }
    }

    /// ステータス文言に埋め込む詳細（HTTP ステータスは呼び出し側で付与する）
    pub fn detail(&self) -> String {
        match self {
            Self::Http { cause, .. } => cause.clone(),
            other => other.to_string(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Network(_) | Self::Http { .. } => Outcome::TransportError,
            Self::ProtocolViolation { .. } => Outcome::ProtocolViolation,
            Self::Rejected { .. } => Outcome::Rejected,
            Self::CodeRequired => Outcome::CodeRequired,
        }
    }
}

/// コンソール API のエラー
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("リクエストを処理中です")]
    RequestInFlight,

    #[error("QRコードがありません")]
    QrCodeNotAvailable,

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RequestInFlight => (
                StatusCode::CONFLICT,
                "前のリクエストが完了するまでお待ちください".to_string(),
            ),
            Self::QrCodeNotAvailable => (
                StatusCode::NOT_FOUND,
                "QRコードがありません。先に登録してください".to_string(),
            ),
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
