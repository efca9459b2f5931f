//! Implementation of the actix server.

use actix_web::{
    http::StatusCode,
    middleware::Logger,
    post,
    web::{self, Data},
    App, HttpRequest, HttpResponse, HttpServer, ResponseError,
};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::matcher::{
    rank::{MatchCandidate, Ranker},
    schema::MatchRequest,
};

use super::{Args, WebServerData};

/// Media type of Matchmaker Exchange requests and responses.
pub const API_MIME_TYPE: &str = "application/vnd.ga4gh.matchmaker.v1.0+json";

/// Header carrying the peer's token.
pub const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug)]
struct CustomError {
    status: StatusCode,
    err: anyhow::Error,
}

impl std::fmt::Display for CustomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl CustomError {
    fn new(status: StatusCode, err: anyhow::Error) -> Self {
        CustomError { status, err }
    }
}

impl ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status)
            .content_type(API_MIME_TYPE)
            .json(serde_json::json!({ "message": self.to_string() }))
    }
}

/// Optional query parameters of `/match`.
#[derive(Deserialize, Debug, Clone, Default)]
struct MatchQuery {
    limit: Option<usize>,
    min_score: Option<f64>,
}

/// Result type of `/match`.
#[derive(Serialize, Debug)]
struct MatchResponse<'a> {
    results: Vec<MatchCandidate<'a>>,
}

/// Rank the corpus against the submitted patient.
#[post("/match")]
async fn handle_match(
    req: HttpRequest,
    data: Data<WebServerData>,
    query: web::Query<MatchQuery>,
    body: web::Bytes,
) -> actix_web::Result<HttpResponse, CustomError> {
    let token = req
        .headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let server = data.conf.authenticate(token).ok_or_else(|| {
        CustomError::new(
            StatusCode::UNAUTHORIZED,
            anyhow!("missing or invalid {} header", AUTH_HEADER),
        )
    })?;

    if let Some(min_score) = query.min_score {
        if !min_score.is_finite() {
            return Err(CustomError::new(
                StatusCode::BAD_REQUEST,
                anyhow!("min_score must be finite"),
            ));
        }
    }

    // Malformed JSON is a bad request, a record of the wrong shape is not
    // processable.
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| CustomError::new(StatusCode::BAD_REQUEST, e.into()))?;
    let request: MatchRequest = serde_json::from_value(value)
        .map_err(|e| CustomError::new(StatusCode::UNPROCESSABLE_ENTITY, e.into()))?;
    request
        .patient
        .validate()
        .map_err(|e| CustomError::new(StatusCode::UNPROCESSABLE_ENTITY, e.into()))?;
    tracing::info!(
        "match request for {} from {}",
        request.patient.id,
        server.server_id
    );
    let patient = request.patient.normalized(&data.ontology, &data.xlink);

    let candidates = data
        .store
        .fetch_all()
        .map_err(|e| CustomError::new(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    let ranking = &data.conf.ranking;
    let ranker = Ranker::new(&data.ontology, &data.xlink, ranking.clone());
    let results = ranker
        .rank(
            &patient,
            &candidates,
            query.limit.unwrap_or(ranking.limit),
            query.min_score.unwrap_or(ranking.min_score),
        )
        .map_err(|e| CustomError::new(StatusCode::INTERNAL_SERVER_ERROR, e.into()))?;

    Ok(HttpResponse::Ok()
        .content_type(API_MIME_TYPE)
        .json(MatchResponse { results }))
}

#[actix_web::main]
pub async fn main(args: &Args, data: Data<WebServerData>) -> std::io::Result<()> {
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(handle_match)
            .wrap(Logger::default())
    })
    .bind((args.listen_host.as_str(), args.listen_port))?
    .run()
    .await
}
