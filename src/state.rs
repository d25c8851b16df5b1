use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard, watch};

use crate::config::Config;
use crate::error::AppError;
use crate::services::{EnrollmentController, TotpApiClient};
use crate::session::SessionView;

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// ワークフローコントローラー（コマンド実行中はロックされる）
    pub controller: Arc<Mutex<EnrollmentController>>,
    /// 最新のセッション状態（実行中でも読み取れる）
    pub view: watch::Receiver<SessionView>,
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(config: Config) -> Result<Self, AppError> {
        let api = TotpApiClient::new(config.totp_api_base.clone(), config.request_timeout())
            .map_err(|e| {
                tracing::error!(error = ?e, "HTTP クライアントの初期化に失敗");
                AppError::Internal(anyhow::anyhow!("failed to build http client: {}", e))
            })?;

        let controller =
            EnrollmentController::new(api, config.default_user_id, config.status_locale);
        let view = controller.subscribe();

        Ok(Self {
            controller: Arc::new(Mutex::new(controller)),
            view,
            config: Arc::new(config),
        })
    }

    /// コントローラーを取得（リクエスト実行中なら 409）
    pub fn try_controller(&self) -> Result<MutexGuard<'_, EnrollmentController>, AppError> {
        self.controller
            .try_lock()
            .map_err(|_| AppError::RequestInFlight)
    }

    /// 所有権付きでコントローラーを取得（別タスクへ渡す用、実行中なら 409）
    pub fn try_controller_owned(&self) -> Result<OwnedMutexGuard<EnrollmentController>, AppError> {
        self.controller
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::RequestInFlight)
    }

    pub fn current_view(&self) -> SessionView {
        self.view.borrow().clone()
    }
}
