//! 統合テスト用のモック TOTP サービス

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Query, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use totp_rs::{Algorithm, Secret, TOTP};

pub const ISSUER: &str = "MyCompany";

/// ルーターを 127.0.0.1 の空きポートで起動し、ベース URL を返す
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// 受信したリクエスト
#[derive(Debug, Clone)]
pub struct Recorded {
    pub uri: String,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// 固定レスポンス
#[derive(Debug, Clone)]
pub struct Fixed {
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl Fixed {
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json"),
            body: body.to_string().into_bytes(),
        }
    }

    pub fn new(status: StatusCode, content_type: Option<&'static str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }
}

impl IntoResponse for Fixed {
    fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.status);
        if let Some(content_type) = self.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

/// 固定レスポンスを返し、受信したリクエストを記録するバックエンド
#[derive(Clone)]
pub struct FixedBackend {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FixedBackend {
    pub async fn start(routes: Vec<(&'static str, Fixed)>) -> Self {
        Self::start_sequence(
            routes
                .into_iter()
                .map(|(path, fixed)| (path, vec![fixed]))
                .collect(),
        )
        .await
    }

    /// 呼ばれるたびに順番にレスポンスを返す（最後のものは繰り返す）
    pub async fn start_sequence(routes: Vec<(&'static str, Vec<Fixed>)>) -> Self {
        let requests: Arc<Mutex<Vec<Recorded>>> = Arc::default();
        let mut router = Router::new();

        for (path, responses) in routes {
            let requests = requests.clone();
            let responses = Arc::new(Mutex::new(VecDeque::from(responses)));
            router = router.route(
                path,
                any(move |uri: Uri, body: Bytes| {
                    let requests = requests.clone();
                    let responses = responses.clone();
                    async move {
                        requests.lock().unwrap().push(Recorded {
                            uri: uri.to_string(),
                            body: body.to_vec(),
                        });
                        let mut queue = responses.lock().unwrap();
                        let next = if queue.len() > 1 {
                            queue.pop_front().unwrap()
                        } else {
                            queue.front().cloned().unwrap()
                        };
                        next
                    }
                }),
            );
        }

        let base_url = spawn(router).await;
        Self { base_url, requests }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum SeedStatus {
    Pending,
    Active,
    Disabled,
}

struct Seed {
    totp: TOTP,
    status: SeedStatus,
}

#[derive(Clone, Default)]
struct TotpState {
    seeds: Arc<Mutex<HashMap<u64, Seed>>>,
}

#[derive(Deserialize)]
struct EnrollQuery {
    user_id: u64,
}

#[derive(Deserialize)]
struct CodeBody {
    user_id: u64,
    code: String,
}

#[derive(Deserialize)]
struct DisableBody {
    user_id: u64,
}

/// ユーザーごとの TOTP を作成（シークレットはユーザーIDから決定的に作る）
pub fn totp_for(user_id: u64) -> TOTP {
    let secret = format!("secret-for-user-{:08}", user_id).into_bytes();
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret,
        Some(ISSUER.to_string()),
        format!("user{}@mycompany", user_id),
    )
    .unwrap()
}

/// Base32 シークレットから現在のコードを計算（認証アプリの代わり）
pub fn current_code(secret_base32: &str) -> String {
    let bytes = Secret::Encoded(secret_base32.to_string()).to_bytes().unwrap();
    TOTP::new(Algorithm::SHA1, 6, 1, 30, bytes, None, "app".to_string())
        .unwrap()
        .generate_current()
        .unwrap()
}

async fn enroll(State(state): State<TotpState>, Query(query): Query<EnrollQuery>) -> Response {
    let totp = totp_for(query.user_id);
    let qr = totp.get_qr_base64().unwrap();
    let body = json!({
        "secret": totp.get_secret_base32(),
        "provision_uri": totp.get_url(),
        "qrcode_base64": qr,
        "digits": 6,
        "period": 30,
        "algorithm": "SHA1",
    });

    state.seeds.lock().unwrap().insert(
        query.user_id,
        Seed {
            totp,
            status: SeedStatus::Pending,
        },
    );

    Json(body).into_response()
}

fn check(state: &TotpState, body: &CodeBody) -> Result<bool, Response> {
    let mut seeds = state.seeds.lock().unwrap();
    let seed = seeds
        .get_mut(&body.user_id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "user not found").into_response())?;

    let ok = seed.totp.check_current(&body.code).unwrap_or(false);
    if ok && seed.status == SeedStatus::Pending {
        seed.status = SeedStatus::Active;
    }
    Ok(ok)
}

async fn activate(State(state): State<TotpState>, Json(body): Json<CodeBody>) -> Response {
    match check(&state, &body) {
        Ok(ok) => Json(json!({ "ok": ok })).into_response(),
        Err(response) => response,
    }
}

async fn verify(State(state): State<TotpState>, Json(body): Json<CodeBody>) -> Response {
    match check(&state, &body) {
        Ok(ok) => Json(json!({ "ok": ok })).into_response(),
        Err(response) => response,
    }
}

async fn disable(State(state): State<TotpState>, Json(body): Json<DisableBody>) -> Response {
    let mut seeds = state.seeds.lock().unwrap();
    match seeds.get_mut(&body.user_id) {
        Some(seed) => {
            seed.status = SeedStatus::Disabled;
            Json(json!({ "ok": true })).into_response()
        }
        None => (StatusCode::NOT_FOUND, "user not found").into_response(),
    }
}

/// 実際に TOTP を発行・検証するモックバックエンドを起動
pub async fn spawn_totp_backend() -> String {
    let router = Router::new()
        .route("/enroll", get(enroll))
        .route("/activate", post(activate))
        .route("/verify", post(verify))
        .route("/disable", post(disable))
        .with_state(TotpState::default());
    spawn(router).await
}
