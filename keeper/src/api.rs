use crate::chain::RoundState;
use crate::error::Error;
use crate::trigger::TriggerExecutor;
use actix_web::{
    body::BoxBody, http::StatusCode, web, App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use log::{error, info};
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;

#[derive(Debug, Serialize, Clone)]
pub struct ApiResult<T = ()> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Cow<'static, str>>,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip)]
    pub code: u16,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TriggerData {
    pub digest: String,
}

impl<T: Serialize> ApiResult<T> {
    pub fn new() -> Self {
        Self {
            ok: true,
            error: None,
            data: None,
            code: 200,
        }
    }
    pub fn code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }
    pub fn with_error<S: Into<Cow<'static, str>>>(mut self, msg: S) -> Self {
        self.ok = false;
        self.error = Some(msg.into());
        self
    }
    pub fn log(&self, req: &HttpRequest) {
        info!(
            "{} \"{} {} {:?}\" {}",
            req.peer_addr().map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
            req.method(),
            req.uri(),
            req.version(),
            self.code
        );
    }
    pub fn to_resp(&self) -> HttpResponse {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::build(status).json(self)
    }
}

impl<T: Serialize> Default for ApiResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> Responder for ApiResult<T> {
    type Body = BoxBody;

    fn respond_to(self, req: &HttpRequest) -> HttpResponse {
        self.log(req);
        self.to_resp()
    }
}

pub struct AppState {
    pub executor: Arc<TriggerExecutor>,
}

/// Manual trigger. Bypasses the retry policy; an operator decides whether to
/// try again.
pub async fn trigger(state: web::Data<AppState>) -> ApiResult<TriggerData> {
    let executor = state.executor.clone();
    // detached: a client hanging up must not cancel a half-sent transaction
    let handle = tokio::spawn(async move { executor.try_trigger_round().await });
    match handle.await {
        Ok(Ok(digest)) => ApiResult::new().with_data(TriggerData { digest }),
        Ok(Err(e @ Error::InProgress)) => ApiResult::new().code(409).with_error(e.to_string()),
        Ok(Err(e)) => {
            error!("manual trigger failed: {}", e);
            ApiResult::new().code(500).with_error(e.to_string())
        }
        Err(e) => {
            error!("manual trigger task failed: {}", e);
            ApiResult::new().code(500).with_error("trigger task aborted")
        }
    }
}

pub async fn round(state: web::Data<AppState>) -> ApiResult<RoundState> {
    match state.executor.chain().read_round_state().await {
        Ok(round) => ApiResult::new().with_data(round),
        Err(e) => ApiResult::new().code(500).with_error(e.to_string()),
    }
}

pub async fn health(state: web::Data<AppState>) -> ApiResult<serde_json::Value> {
    ApiResult::new().with_data(serde_json::json!({ "triggerInProgress": state.executor.is_busy() }))
}

pub async fn notfound() -> ApiResult {
    ApiResult::new().code(404).with_error("route not found")
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/trigger", web::post().to(trigger))
        .route("/round", web::get().to(round))
        .route("/health", web::get().to(health));
}

pub async fn serve(executor: Arc<TriggerExecutor>, port: u16) -> std::io::Result<()> {
    let data = web::Data::new(AppState { executor });
    info!("keeper http server listening on http://0.0.0.0:{}", port);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(routes)
            .default_service(web::to(notfound))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubChain, StubProver};
    use actix_web::test;
    use serde_json::Value;
    use std::time::Duration;

    fn app_state(chain: StubChain, prover: StubProver) -> (web::Data<AppState>, Arc<StubChain>) {
        let chain = Arc::new(chain);
        let executor = Arc::new(TriggerExecutor::new(chain.clone(), Arc::new(prover)));
        (web::Data::new(AppState { executor }), chain)
    }

    macro_rules! app {
        ($data:expr) => {
            test::init_service(
                App::new()
                    .app_data($data.clone())
                    .configure(routes)
                    .default_service(web::to(notfound)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_trigger_success() {
        let (data, chain) = app_state(StubChain::active(1, 0), StubProver::ok());
        let app = app!(data);

        let req = test::TestRequest::post().uri("/trigger").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({"ok": true, "digest": "digest-1"}));
        assert_eq!(chain.submit_count(), 1);
    }

    #[actix_web::test]
    async fn test_trigger_failure_is_server_error_without_retry() {
        let chain = Arc::new(StubChain::active(1, 0));
        let prover = Arc::new(StubProver::failing());
        let executor = Arc::new(TriggerExecutor::new(chain.clone(), prover.clone()));
        let data = web::Data::new(AppState { executor });
        let app = app!(data);

        let req = test::TestRequest::post().uri("/trigger").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], Value::Bool(false));
        assert!(body["error"].as_str().unwrap().contains("vrf prover error"));
        assert_eq!(prover.call_count(), 1);
    }

    #[actix_web::test]
    async fn test_trigger_in_progress_is_conflict() {
        let (data, chain) = app_state(
            StubChain::active(1, 0).with_submit_delay(Duration::from_millis(300)),
            StubProver::ok(),
        );
        let app = app!(data);

        let executor = data.executor.clone();
        let first = tokio::spawn(async move { executor.trigger_round().await });
        while !data.executor.is_busy() {
            tokio::task::yield_now().await;
        }

        let req = test::TestRequest::post().uri("/trigger").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        first.await.unwrap().unwrap();
        assert_eq!(chain.submit_count(), 1);
    }

    #[actix_web::test]
    async fn test_round_endpoint() {
        let (data, _chain) = app_state(StubChain::active(9, 1234), StubProver::ok());
        let app = app!(data);

        let req = test::TestRequest::get().uri("/round").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["ok"], Value::Bool(true));
        assert_eq!(body["round_number"], 9);
        assert_eq!(body["end_time_ms"], 1234);
        assert_eq!(body["has_active_round"], true);
    }

    #[actix_web::test]
    async fn test_round_read_error() {
        let (data, chain) = app_state(StubChain::idle(0), StubProver::ok());
        chain.fail_reads(1);
        let app = app!(data);

        let req = test::TestRequest::get().uri("/round").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_unknown_route_and_health() {
        let (data, _chain) = app_state(StubChain::idle(0), StubProver::ok());
        let app = app!(data);

        let req = test::TestRequest::get().uri("/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, serde_json::json!({"ok": true, "triggerInProgress": false}));
    }
}
