use serde_json::Value;
use tokio::sync::watch;

use crate::error::WorkflowError;
use crate::services::totp_api::{DecodedResponse, EnrollPayload, TotpApiClient};
use crate::session::{Outcome, PendingEnrollment, Session, SessionView};
use crate::status::{Command, Locale};

/// 検証結果（`ok: false` はエラーではなく正常な判定結果）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Rejected,
}

/// 有効化レスポンスの判定
///
/// 2xx かつ `ok == true` の場合のみ成功。
pub fn interpret_activation(response: &DecodedResponse) -> Result<(), WorkflowError> {
    if !response.status.is_success() {
        return Err(response.http_error());
    }
    match response.ok_field() {
        Some(Value::Bool(true)) => Ok(()),
        _ => Err(WorkflowError::Rejected {
            status: response.status,
        }),
    }
}

/// 検証レスポンスの判定（3通り）
///
/// - 2xx かつ `ok == true` → 検証成功
/// - 2xx かつ `ok == false` → コード不正・期限切れ
/// - それ以外 → 通信 / プロトコルエラー
pub fn interpret_verification(response: &DecodedResponse) -> Result<Verification, WorkflowError> {
    if !response.status.is_success() {
        return Err(response.http_error());
    }
    match response.ok_field() {
        Some(Value::Bool(true)) => Ok(Verification::Verified),
        Some(Value::Bool(false)) => Ok(Verification::Rejected),
        _ => Err(response.protocol_violation()),
    }
}

/// 無効化レスポンスの判定
///
/// `ok` が存在しない場合も成功とみなす（ボディなしの ACK を許容）。
pub fn interpret_disable(response: &DecodedResponse) -> Result<(), WorkflowError> {
    if !response.status.is_success() {
        return Err(response.http_error());
    }
    match response.ok_field() {
        None | Some(Value::Bool(true)) => Ok(()),
        Some(_) => Err(WorkflowError::Rejected {
            status: response.status,
        }),
    }
}

/// TOTP 登録ワークフローのコントローラー
///
/// セッション状態を所有し、4つのコマンド（登録・有効化・検証・無効化）を提供する。
/// 各コマンドはリクエストを1回だけ送信し、結果を必ずステータス文言に変換する。
/// エラーを呼び出し元に返すことはない。
///
/// 状態が変わるたびに `SessionView` を watch チャネルで配信する。
pub struct EnrollmentController {
    api: TotpApiClient,
    session: Session,
    locale: Locale,
    publisher: watch::Sender<SessionView>,
}

impl EnrollmentController {
    pub fn new(api: TotpApiClient, user_id: u64, locale: Locale) -> Self {
        let session = Session::new(user_id);
        let (publisher, _) = watch::channel(session.view());
        Self {
            api,
            session,
            locale,
            publisher,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// セッション状態の購読
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.publisher.subscribe()
    }

    pub fn set_user_id(&mut self, user_id: u64) -> SessionView {
        self.session.set_user_id(user_id);
        self.publish()
    }

    /// コード入力の変更（正規化して保持）
    pub fn set_otp_input(&mut self, raw: &str) -> SessionView {
        self.session.set_otp_input(raw);
        self.publish()
    }

    /// 登録: QRコード（とシークレット）を取得する
    ///
    /// 既存の QR / シークレットはリクエスト前に破棄する。
    pub async fn enroll(&mut self, user_id: u64) -> SessionView {
        self.session.discard_enrollment();
        self.start(Command::Enroll);

        let result = self.api.enroll(user_id).await;

        match result {
            Ok(payload) => {
                let pending = match payload {
                    EnrollPayload::Json {
                        secret,
                        qr,
                        details,
                    } => PendingEnrollment {
                        secret,
                        qr,
                        details: Some(details),
                    },
                    EnrollPayload::Image(qr) => PendingEnrollment {
                        secret: None,
                        qr: Some(qr),
                        details: None,
                    },
                };
                tracing::info!(
                    session_id = %self.session.id(),
                    user_id,
                    has_qr_code = pending.qr.is_some(),
                    has_secret = pending.secret.is_some(),
                    "TOTP 登録用 QR コード取得"
                );
                self.session.store_enrollment(pending);
                self.succeed(Command::Enroll)
            }
            Err(e) => self.fail(Command::Enroll, user_id, &e),
        }
    }

    /// 有効化: 初回コードを送信する
    ///
    /// コード未入力の場合はリクエストを送信しない。
    pub async fn activate(&mut self, user_id: u64, code: &str) -> SessionView {
        if code.trim().is_empty() {
            return self.require_code(Command::Activate);
        }
        self.start(Command::Activate);

        let result = self
            .api
            .activate(user_id, code)
            .await
            .and_then(|response| interpret_activation(&response));

        match result {
            Ok(()) => {
                tracing::info!(session_id = %self.session.id(), user_id, "TOTP 有効化完了");
                self.succeed(Command::Activate)
            }
            Err(e) => self.fail(Command::Activate, user_id, &e),
        }
    }

    /// 検証: コードを送信する
    ///
    /// コード不正（`ok: false`）と通信エラーは別の文言になる。
    pub async fn verify(&mut self, user_id: u64, code: &str) -> SessionView {
        if code.trim().is_empty() {
            return self.require_code(Command::Verify);
        }
        self.start(Command::Verify);

        let result = self
            .api
            .verify(user_id, code)
            .await
            .and_then(|response| {
                interpret_verification(&response).and_then(|verification| match verification {
                    Verification::Verified => Ok(()),
                    Verification::Rejected => Err(WorkflowError::Rejected {
                        status: response.status,
                    }),
                })
            });

        match result {
            Ok(()) => {
                tracing::info!(session_id = %self.session.id(), user_id, "TOTP 検証成功");
                self.succeed(Command::Verify)
            }
            Err(e) => self.fail(Command::Verify, user_id, &e),
        }
    }

    /// 無効化: 成功時は登録前の状態に戻す
    pub async fn disable(&mut self, user_id: u64) -> SessionView {
        self.start(Command::Disable);

        let result = self
            .api
            .disable(user_id)
            .await
            .and_then(|response| interpret_disable(&response));

        match result {
            Ok(()) => {
                tracing::info!(session_id = %self.session.id(), user_id, "TOTP 無効化完了");
                self.session.reset();
                self.succeed(Command::Disable)
            }
            Err(e) => self.fail(Command::Disable, user_id, &e),
        }
    }

    fn start(&mut self, command: Command) {
        tracing::debug!(session_id = %self.session.id(), command = %command, "リクエスト開始");
        self.session.begin(self.locale.in_progress(command));
        self.publish();
    }

    fn succeed(&mut self, command: Command) -> SessionView {
        self.session
            .finish(self.locale.succeeded(command), Outcome::Succeeded);
        self.publish()
    }

    fn fail(&mut self, command: Command, user_id: u64, error: &WorkflowError) -> SessionView {
        match error {
            WorkflowError::Rejected { status } => {
                tracing::info!(
                    session_id = %self.session.id(),
                    command = %command,
                    user_id,
                    status = %status,
                    "TOTP サービスが拒否"
                );
            }
            _ => {
                tracing::warn!(
                    session_id = %self.session.id(),
                    command = %command,
                    user_id,
                    error = %error,
                    "TOTP サービスとの通信に失敗"
                );
            }
        }
        self.session
            .finish(self.locale.failed(command, error), error.outcome());
        self.publish()
    }

    fn require_code(&mut self, command: Command) -> SessionView {
        self.session.set_status(
            self.locale.code_required(command),
            WorkflowError::CodeRequired.outcome(),
        );
        self.publish()
    }

    fn publish(&self) -> SessionView {
        let view = self.session.view();
        self.publisher.send_replace(view.clone());
        view
    }
}
