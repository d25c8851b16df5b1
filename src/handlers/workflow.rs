use axum::{Json, extract::State};

use crate::error::AppError;
use crate::session::SessionView;
use crate::state::AppState;
use crate::status::Command;

// 各コマンドはセッションのユーザーID・入力中コードを使う。
// 結果は常に SessionView のステータスで返す（ワークフローの失敗は HTTP エラーにしない）。

/// POST /api/enroll
pub async fn enroll(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    run(&state, Command::Enroll).await
}

/// POST /api/activate
pub async fn activate(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    run(&state, Command::Activate).await
}

/// POST /api/verify
pub async fn verify(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    run(&state, Command::Verify).await
}

/// POST /api/disable
pub async fn disable(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    run(&state, Command::Disable).await
}

/// コマンドを別タスクで実行する
///
/// クライアントが切断してハンドラーが破棄されても、コマンドは完了まで進み
/// ロックもそれまで保持される。
async fn run(state: &AppState, command: Command) -> Result<Json<SessionView>, AppError> {
    let mut controller = state.try_controller_owned()?;

    let task = tokio::spawn(async move {
        let user_id = controller.session().user_id();
        let code = controller.session().otp_input().to_string();
        match command {
            Command::Enroll => controller.enroll(user_id).await,
            Command::Activate => controller.activate(user_id, &code).await,
            Command::Verify => controller.verify(user_id, &code).await,
            Command::Disable => controller.disable(user_id).await,
        }
    });

    let view = task.await.map_err(|e| {
        tracing::error!(error = ?e, command = %command, "コマンド実行タスクが異常終了");
        AppError::Internal(anyhow::anyhow!("command task failed: {}", e))
    })?;

    Ok(Json(view))
}
