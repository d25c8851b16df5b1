use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use garde::Validate;
use serde::Deserialize;

use crate::error::AppError;
use crate::session::SessionView;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SetUserRequest {
    #[garde(range(min = 1))]
    pub user_id: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetOtpRequest {
    /// 生の入力値（サーバー側で正規化する）
    #[garde(length(max = 64))]
    pub value: String,
}

/// GET /api/session
///
/// 現在のセッション状態を返す（リクエスト実行中でも読み取れる）
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.current_view())
}

/// PUT /api/session/user
pub async fn set_user(
    State(state): State<AppState>,
    Json(request): Json<SetUserRequest>,
) -> Result<Json<SessionView>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut controller = state.try_controller()?;
    let view = controller.set_user_id(request.user_id);

    tracing::debug!(user_id = request.user_id, "ユーザーID変更");

    Ok(Json(view))
}

/// PUT /api/session/otp
///
/// 入力変更のたびに呼ばれる。数字以外を除去し6文字に切り詰めた値を保持する。
/// コードはログ出力禁止。
pub async fn set_otp(
    State(state): State<AppState>,
    Json(request): Json<SetOtpRequest>,
) -> Result<Json<SessionView>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut controller = state.try_controller()?;
    Ok(Json(controller.set_otp_input(&request.value)))
}

/// GET /api/session/qr
///
/// 取得済みの QR コード画像をそのままのメディアタイプで返す
pub async fn get_qr_code(State(state): State<AppState>) -> Result<Response, AppError> {
    let controller = state.try_controller()?;
    let artifact = controller
        .session()
        .qr_artifact()
        .ok_or(AppError::QrCodeNotAvailable)?;

    Ok((
        [(header::CONTENT_TYPE, artifact.media_type().to_string())],
        artifact.bytes().to_vec(),
    )
        .into_response())
}
