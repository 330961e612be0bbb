//! Route handlers.

use crate::server::{ApiError, AppState};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use skylens_core::AppError;
use skylens_knowledge::{Answer, CacheStats, DEFAULT_AIRPORT, MAX_TOP_K};

/// Camera and layer actions the map client understands.
const INTENT_ACTIONS: [&str; 5] = ["fly_to", "orbit", "follow", "chase", "set_layer"];

/// Only airport the demo camera can fly to.
const DEMO_TARGET: &str = "EGLL";

const MAX_SPEED: f64 = 1000.0;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusHealth {
    pub airports: Vec<String>,
    pub records: usize,
    pub content_hash: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub time: String,
    pub corpus: CorpusHealth,
    pub cache: CacheStats,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.service.corpus_stats();
    Json(HealthResponse {
        status: "ok",
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        corpus: CorpusHealth {
            airports: stats.airports,
            records: stats.records,
            content_hash: stats.content_hash,
        },
        cache: state.service.cache_stats(),
    })
}

#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub action: String,
    pub target: Option<String>,
    pub speed: Option<f64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MappedIntent {
    pub target: Option<String>,
    pub speed: Option<f64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct IntentResponse {
    pub ok: bool,
    pub action: String,
    pub mapped: MappedIntent,
}

/// Validate an intent and map it onto what the map client can do.
pub fn map_intent(request: IntentRequest) -> Result<IntentResponse, ApiError> {
    if !INTENT_ACTIONS.contains(&request.action.as_str()) {
        return Err(ApiError::unprocessable(format!(
            "Invalid action: {}",
            request.action
        )));
    }

    let target = match request.action.as_str() {
        "fly_to" | "orbit" => match request.target {
            Some(target) if target.eq_ignore_ascii_case(DEMO_TARGET) => Some(target),
            _ => Some(DEMO_TARGET.to_string()),
        },
        "set_layer" => match request.target {
            Some(target) if target.starts_with("buildings:") => Some(target.to_lowercase()),
            _ => {
                return Err(ApiError::bad_request(
                    "set_layer requires target like 'buildings:on'",
                ))
            }
        },
        _ => request.target,
    };

    Ok(IntentResponse {
        ok: true,
        action: request.action,
        mapped: MappedIntent {
            target,
            speed: request.speed.map(|s| s.clamp(0.0, MAX_SPEED)),
        },
    })
}

pub async fn intent(
    payload: Result<Json<IntentRequest>, JsonRejection>,
) -> Result<Json<IntentResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    tracing::debug!(action = %request.action, "Intent received");
    map_intent(request).map(Json)
}

#[derive(Debug, Deserialize)]
pub struct MetarParams {
    pub icao: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MetarResponse {
    pub icao: String,
    pub raw: String,
    pub observed: String,
    pub provider: String,
    pub cache_hit: bool,
    pub cache_age_sec: u64,
}

/// Demo METAR; the response shape matches the live providers.
pub async fn metar(
    State(state): State<AppState>,
    Query(params): Query<MetarParams>,
) -> Json<MetarResponse> {
    let icao = params
        .icao
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| DEFAULT_AIRPORT.to_string());
    tracing::debug!(icao = %icao, configured = %state.metar_provider, "Serving demo METAR");

    Json(MetarResponse {
        raw: format!("{} 130920Z 25008KT 9999 FEW035 SCT250 12/08 Q1023 NOSIG=", icao),
        icao,
        observed: "2025-08-13T09:20:00Z".to_string(),
        provider: "demo".to_string(),
        cache_hit: false,
        cache_age_sec: 0,
    })
}

/// Sample B738 track around EGLL for time-dynamic entity rendering.
pub async fn sample_flight() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "flightId": "DEMO001",
        "callsign": "SKYLENS1",
        "aircraft": {
            "icaoType": "B738",
            "registration": "G-DEMO"
        },
        "positions": [
            {"time": "2025-08-13T10:00:00Z", "lon": -0.454295, "lat": 51.470020, "alt": 1000},
            {"time": "2025-08-13T10:05:00Z", "lon": -0.450000, "lat": 51.475000, "alt": 2000},
            {"time": "2025-08-13T10:10:00Z", "lon": -0.445000, "lat": 51.480000, "alt": 3000}
        ],
        "meta": {
            "source": "demo",
            "duration_minutes": 10
        }
    }))
}

#[derive(Debug, Deserialize)]
pub struct NotamParams {
    pub q: Option<String>,
    pub icao: Option<String>,
    pub k: Option<i64>,
}

pub async fn notam(
    State(state): State<AppState>,
    params: Result<Query<NotamParams>, QueryRejection>,
) -> Result<Json<Answer>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let question = params
        .q
        .ok_or_else(|| AppError::InvalidRequest("Query parameter 'q' is required".to_string()))?;
    let k = params
        .k
        .map(|k| {
            usize::try_from(k).map_err(|_| {
                AppError::InvalidRequest(format!(
                    "Parameter 'k' must be between 1 and {}, got {}",
                    MAX_TOP_K, k
                ))
            })
        })
        .transpose()?;

    let answer = state
        .service
        .ask(&question, params.icao.as_deref(), k)
        .await?;
    Ok(Json(answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::router;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use skylens_knowledge::{
        AnswerComposer, CorpusSource, CorpusStore, NotamService, ResultCache,
        RetrievalCoordinator,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    async fn app_with_origins(origins: &[&str]) -> Router {
        let store = Arc::new(CorpusStore::open(CorpusSource::Builtin, None).await.unwrap());
        let service = NotamService::new(
            Arc::clone(&store),
            RetrievalCoordinator::lexical(store),
            AnswerComposer::extractive(),
            ResultCache::new(Duration::from_secs(300), 64),
        );
        router(AppState {
            service: Arc::new(service),
            metar_provider: "awc".to_string(),
            allow_origins: origins.iter().map(|o| o.to_string()).collect(),
        })
    }

    async fn app() -> Router {
        app_with_origins(&["*"]).await
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_corpus_and_cache() {
        let (status, body) = send(app().await, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["time"].as_str().unwrap().ends_with('Z'));
        assert_eq!(body["corpus"]["records"], 10);
        assert_eq!(body["corpus"]["airports"], serde_json::json!(["EGLC", "EGLL"]));
        assert!(body["corpus"]["contentHash"].is_string());
        assert_eq!(body["cache"]["entries"], 0);
    }

    #[tokio::test]
    async fn test_notam_answer_with_citations() {
        let (status, body) = send(
            app().await,
            get("/ai/notam?q=runway%20closures%20at%20Heathrow&icao=EGLL&k=5"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "local");
        let citations = body["citations"].as_array().unwrap();
        assert!(!citations.is_empty());
        let matched: Vec<&str> = body["matches"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        for id in citations {
            assert!(matched.contains(&id.as_str().unwrap()));
        }
        assert_eq!(body["matches"][0]["airport"], "EGLL");
    }

    #[tokio::test]
    async fn test_notam_defaults_to_heathrow() {
        let (status, body) = send(app().await, get("/ai/notam?q=crane")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["citations"][0], "EGLL-2025-004");
    }

    #[tokio::test]
    async fn test_notam_unknown_airport_is_empty() {
        for uri in ["/ai/notam?q=runway&icao=ZZZZ", "/ai/notam?q=runway&icao=LONDON"] {
            let (status, body) = send(app().await, get(uri)).await;

            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(body["matches"].as_array().unwrap().is_empty(), "{uri}");
            assert!(body["answer"].as_str().unwrap().contains("No relevant NOTAMs"), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_notam_rejects_bad_parameters() {
        for uri in [
            "/ai/notam",
            "/ai/notam?q=",
            "/ai/notam?q=runway&k=0",
            "/ai/notam?q=runway&k=21",
            "/ai/notam?q=runway&k=-3",
            "/ai/notam?q=runway&k=five",
        ] {
            let (status, body) = send(app().await, get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["detail"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_intent_mapping() {
        let (status, body) = send(
            app().await,
            post_json(
                "/ai/intent",
                serde_json::json!({"action": "fly_to", "target": "KJFK", "speed": 5000}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({
                "ok": true,
                "action": "fly_to",
                "mapped": {"target": "EGLL", "speed": 1000.0}
            })
        );
    }

    #[tokio::test]
    async fn test_intent_validation_errors() {
        let (status, body) = send(
            app().await,
            post_json("/ai/intent", serde_json::json!({"action": "barrel_roll"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "Invalid action: barrel_roll");

        let (status, _) = send(
            app().await,
            post_json(
                "/ai/intent",
                serde_json::json!({"action": "set_layer", "target": "terrain"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_map_intent_rules() {
        let layer = map_intent(IntentRequest {
            action: "set_layer".to_string(),
            target: Some("buildings:ON".to_string()),
            speed: Some(-4.0),
        })
        .unwrap();
        assert_eq!(layer.mapped.target.as_deref(), Some("buildings:on"));
        assert_eq!(layer.mapped.speed, Some(0.0));

        let follow = map_intent(IntentRequest {
            action: "follow".to_string(),
            target: None,
            speed: None,
        })
        .unwrap();
        assert_eq!(follow.mapped, MappedIntent { target: None, speed: None });

        let orbit = map_intent(IntentRequest {
            action: "orbit".to_string(),
            target: Some("egll".to_string()),
            speed: None,
        })
        .unwrap();
        assert_eq!(orbit.mapped.target.as_deref(), Some("egll"));

        let err = map_intent(IntentRequest {
            action: "set_layer".to_string(),
            target: None,
            speed: None,
        })
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_metar_and_flight_sample() {
        let (status, body) = send(app().await, get("/weather/metar?icao=eglc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["icao"], "EGLC");
        assert_eq!(body["provider"], "demo");
        assert_eq!(body["cache_hit"], false);
        assert!(body["raw"].as_str().unwrap().starts_with("EGLC "));

        let (_, body) = send(app().await, get("/weather/metar")).await;
        assert_eq!(body["icao"], "EGLL");

        let (status, body) = send(app().await, get("/flights/sample")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["aircraft"]["icaoType"], "B738");
        assert_eq!(body["positions"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/ai/notam")
            .header(header::ORIGIN, "https://skylens.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app().await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://skylens.example"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        let methods: Vec<&str> = headers[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap()
            .split(',')
            .map(str::trim)
            .collect();
        assert_eq!(methods, vec!["GET", "POST"]);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type");
    }

    #[tokio::test]
    async fn test_cors_restricted_origins() {
        let allowed = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://skylens.example")
            .body(Body::empty())
            .unwrap();
        let response = app_with_origins(&["https://skylens.example"])
            .await
            .oneshot(allowed)
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://skylens.example"
        );

        let denied = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = app_with_origins(&["https://skylens.example"])
            .await
            .oneshot(denied)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
