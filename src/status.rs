use std::fmt;

use serde::Deserialize;

use crate::error::WorkflowError;

/// ワークフローのコマンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Enroll,
    Activate,
    Verify,
    Disable,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enroll => "enroll",
            Self::Activate => "activate",
            Self::Verify => "verify",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ステータス文言の言語
///
/// 表示のバリエーションは設定（`STATUS_LOCALE`）で切り替える。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ja,
    En,
    Zh,
}

impl Locale {
    /// リクエスト送信中の文言
    pub fn in_progress(self, command: Command) -> String {
        let text = match (self, command) {
            (Self::Ja, Command::Enroll) => "QRコードを取得しています…",
            (Self::Ja, Command::Activate) => "有効化しています…",
            (Self::Ja, Command::Verify) => "検証しています…",
            (Self::Ja, Command::Disable) => "無効化しています…",
            (Self::En, Command::Enroll) => "Requesting QR code…",
            (Self::En, Command::Activate) => "Activating…",
            (Self::En, Command::Verify) => "Verifying…",
            (Self::En, Command::Disable) => "Disabling…",
            (Self::Zh, Command::Enroll) => "正在申请二维码…",
            (Self::Zh, Command::Activate) => "正在激活…",
            (Self::Zh, Command::Verify) => "正在验证…",
            (Self::Zh, Command::Disable) => "正在解绑/注销…",
        };
        text.to_string()
    }

    /// 成功時の文言
    pub fn succeeded(self, command: Command) -> String {
        let text = match (self, command) {
            (Self::Ja, Command::Enroll) => {
                "QRコードを生成しました。認証アプリでスキャンし、6桁のコードを入力して「有効化」してください。"
            }
            (Self::Ja, Command::Activate) => "有効化しました ✅",
            (Self::Ja, Command::Verify) => "検証に成功しました ✅",
            (Self::Ja, Command::Disable) => "無効化しました ✅",
            (Self::En, Command::Enroll) => {
                "QR code generated. Scan it with your authenticator app, then enter the 6-digit code and activate."
            }
            (Self::En, Command::Activate) => "Activated ✅",
            (Self::En, Command::Verify) => "Verified ✅",
            (Self::En, Command::Disable) => "Disabled ✅",
            (Self::Zh, Command::Enroll) => {
                "二维码已生成，请扫码并输入 6 位验证码后点击“激活”。"
            }
            (Self::Zh, Command::Activate) => "激活成功 ✅",
            (Self::Zh, Command::Verify) => "验证成功 ✅",
            (Self::Zh, Command::Disable) => "解绑成功 ✅",
        };
        text.to_string()
    }

    /// コード未入力時の文言
    pub fn code_required(self, command: Command) -> String {
        match (self, command) {
            (Self::Ja, Command::Verify) => "6桁のコードを入力してから検証してください".to_string(),
            (Self::Ja, _) => "6桁のコードを入力してから有効化してください".to_string(),
            (Self::En, Command::Verify) => "Enter the 6-digit code before verifying".to_string(),
            (Self::En, _) => "Enter the 6-digit code before activating".to_string(),
            (Self::Zh, Command::Verify) => "请输入 6 位验证码再验证".to_string(),
            (Self::Zh, _) => "请输入 6 位验证码再激活".to_string(),
        }
    }

    /// 失敗時の文言
    ///
    /// レスポンスを受け取れた失敗には必ず HTTP ステータスを含める。
    /// 検証の `ok: false` だけは通信エラーと区別した文言にする。
    pub fn failed(self, command: Command, error: &WorkflowError) -> String {
        if matches!(error, WorkflowError::CodeRequired) {
            return self.code_required(command);
        }

        if command == Command::Enroll {
            let label = self.failure_label(command);
            return match self {
                Self::Zh => format!("{}：{}", label, error),
                _ => format!("{}: {}", label, error),
            };
        }

        if command == Command::Verify && matches!(error, WorkflowError::Rejected { .. }) {
            return match self {
                Self::Ja => "検証に失敗しました ❌（コードが正しくないか期限切れです）".to_string(),
                Self::En => "Verification failed ❌ (code is incorrect or expired)".to_string(),
                Self::Zh => "验证失败 ❌（验证码不正确或过期）".to_string(),
            };
        }

        let Some(status) = error.status() else {
            // レスポンスなし（接続失敗など）
            let label = self.request_error_label(command);
            return match self {
                Self::Zh => format!("{}：{}", label, error),
                _ => format!("{}: {}", label, error),
            };
        };

        let label = self.failure_label(command);
        let code = status.as_u16();
        match error {
            WorkflowError::Rejected { .. } => match self {
                Self::Ja => format!("{} ❌（HTTP {}）", label, code),
                Self::En => format!("{} ❌ (HTTP {})", label, code),
                Self::Zh => format!("{} ❌（HTTP {}）", label, code),
            },
            _ => match self {
                Self::Ja => format!("{} ❌（HTTP {}）: {}", label, code, error.detail()),
                Self::En => format!("{} ❌ (HTTP {}): {}", label, code, error.detail()),
                Self::Zh => format!("{} ❌（HTTP {}）：{}", label, code, error.detail()),
            },
        }
    }

    fn failure_label(self, command: Command) -> &'static str {
        match (self, command) {
            (Self::Ja, Command::Enroll) => "登録に失敗しました",
            (Self::Ja, Command::Activate) => "有効化に失敗しました",
            (Self::Ja, Command::Verify) => "検証に失敗しました",
            (Self::Ja, Command::Disable) => "無効化に失敗しました",
            (Self::En, Command::Enroll) => "Enrollment failed",
            (Self::En, Command::Activate) => "Activation failed",
            (Self::En, Command::Verify) => "Verification failed",
            (Self::En, Command::Disable) => "Disable failed",
            (Self::Zh, Command::Enroll) => "绑定失败",
            (Self::Zh, Command::Activate) => "激活失败",
            (Self::Zh, Command::Verify) => "验证失败",
            (Self::Zh, Command::Disable) => "解绑失败",
        }
    }

    fn request_error_label(self, command: Command) -> &'static str {
        match (self, command) {
            (Self::Ja, Command::Enroll) => "登録リクエストでエラーが発生しました",
            (Self::Ja, Command::Activate) => "有効化リクエストでエラーが発生しました",
            (Self::Ja, Command::Verify) => "検証リクエストでエラーが発生しました",
            (Self::Ja, Command::Disable) => "無効化リクエストでエラーが発生しました",
            (Self::En, Command::Enroll) => "Enrollment request error",
            (Self::En, Command::Activate) => "Activation request error",
            (Self::En, Command::Verify) => "Verification request error",
            (Self::En, Command::Disable) => "Disable request error",
            (Self::Zh, Command::Enroll) => "绑定请求异常",
            (Self::Zh, Command::Activate) => "激活请求异常",
            (Self::Zh, Command::Verify) => "验证请求异常",
            (Self::Zh, Command::Disable) => "解绑请求异常",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const LOCALES: [Locale; 3] = [Locale::Ja, Locale::En, Locale::Zh];

    #[test]
    fn test_activation_rejection_mentions_http_status() {
        let err = WorkflowError::Rejected {
            status: StatusCode::OK,
        };
        for locale in LOCALES {
            assert!(locale.failed(Command::Activate, &err).contains("HTTP 200"));
        }
    }

    #[test]
    fn test_verify_outcomes_are_distinct() {
        let rejected = WorkflowError::Rejected {
            status: StatusCode::OK,
        };
        let transport = WorkflowError::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            cause: "boom".to_string(),
        };
        for locale in LOCALES {
            let ok = locale.succeeded(Command::Verify);
            let bad_code = locale.failed(Command::Verify, &rejected);
            let server = locale.failed(Command::Verify, &transport);
            assert_ne!(ok, bad_code);
            assert_ne!(bad_code, server);
            assert!(server.contains("HTTP 500"));
            assert!(!bad_code.contains("HTTP"));
        }
    }

    #[test]
    fn test_enroll_failure_embeds_reason() {
        let err = WorkflowError::ProtocolViolation {
            status: StatusCode::OK,
            content_type: "text/plain".to_string(),
            body: "not a qr".to_string(),
        };
        for locale in LOCALES {
            let message = locale.failed(Command::Enroll, &err);
            assert!(message.contains("text/plain"));
            assert!(message.contains("not a qr"));
        }
    }

    #[test]
    fn test_code_required_is_command_specific() {
        assert_ne!(
            Locale::En.failed(Command::Activate, &WorkflowError::CodeRequired),
            Locale::En.failed(Command::Verify, &WorkflowError::CodeRequired)
        );
    }

    #[test]
    fn test_locale_deserializes_lowercase() {
        let locale: Locale = serde_json::from_str("\"zh\"").unwrap();
        assert_eq!(locale, Locale::Zh);
        assert_eq!(Locale::default(), Locale::Ja);
    }
}
