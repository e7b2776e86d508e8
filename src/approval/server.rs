//! Decision HTTP surface.
//!
//! `GET /approve/{id}` shows the decision page; decisions themselves are
//! `POST /action/{approve|approve-deploy|reject}/{id}`. Previews are served
//! from `/preview`. When a token is configured every page and action needs
//! it, as `?token=` on pages and as a form field or `X-Folio-Token` header on
//! actions.

use std::path::Path;
use std::sync::Arc;

use actix_files::Files;
use actix_web::web::{self, get, scope};
use actix_web::{HttpRequest, HttpResponse, HttpServer, Scope};
use serde::Deserialize;

use super::{page, ApprovalCoordinator};
use crate::core::Error;

/// Header carrying the shared token on action requests.
pub const TOKEN_HEADER: &str = "X-Folio-Token";

/// State shared by all handlers.
pub struct ServerState {
    /// The coordinator that applies decisions
    pub coordinator: Arc<ApprovalCoordinator>,

    /// Shared token, if decisions are protected
    pub token: Option<String>,
}

impl ServerState {
    fn authorized(&self, supplied: Option<&str>) -> bool {
        match self.token.as_deref() {
            None => true,
            Some(expected) => supplied == Some(expected),
        }
    }
}

/// Query string of pages.
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    token: Option<String>,
}

/// Form body of actions.
#[derive(Debug, Deserialize)]
pub struct ActionForm {
    token: Option<String>,
}

/// A decision that can be posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Approve,
    ApproveDeploy,
    Reject,
}

impl Decision {
    fn parse(action: &str) -> Option<Self> {
        match action {
            "approve" => Some(Self::Approve),
            "approve-deploy" => Some(Self::ApproveDeploy),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Self::Approve => "Article approved",
            Self::ApproveDeploy => "Article approved and deployed",
            Self::Reject => "Article rejected",
        }
    }
}

/// Accept IDs with or without the leading `#`.
fn normalize_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with('#') {
        raw.to_string()
    } else {
        format!("#{raw}")
    }
}

fn forbidden() -> HttpResponse {
    HttpResponse::Forbidden().content_type("text/plain; charset=utf-8").body("Missing or invalid token")
}

fn not_pending(id: &str) -> HttpResponse {
    HttpResponse::NotFound().content_type("text/plain; charset=utf-8").body(format!("Article {id} is not pending approval"))
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(body)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body("ok")
}

async fn index(state: web::Data<ServerState>, query: web::Query<TokenQuery>) -> HttpResponse {
    if !state.authorized(query.token.as_deref()) {
        return forbidden();
    }
    html(page::pending_list(&state.coordinator.pending(), state.token.as_deref()))
}

async fn decision_page(
    state: web::Data<ServerState>,
    id: web::Path<String>,
    query: web::Query<TokenQuery>,
) -> HttpResponse {
    if !state.authorized(query.token.as_deref()) {
        return forbidden();
    }

    let id = normalize_id(&id);
    match state.coordinator.get(&id) {
        Some(pending) => html(page::decision_page(&pending, state.token.as_deref())),
        None => not_pending(&id),
    }
}

async fn decide(
    state: web::Data<ServerState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
    form: Option<web::Form<ActionForm>>,
) -> HttpResponse {
    let header_token = req.headers().get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    let form_token = form.as_ref().and_then(|f| f.token.as_deref());
    if !state.authorized(form_token.or(header_token)) {
        return forbidden();
    }

    let (action, raw_id) = path.into_inner();
    let Some(decision) = Decision::parse(&action) else {
        return HttpResponse::NotFound().content_type("text/plain; charset=utf-8").body(format!("Unknown action '{action}'"));
    };
    let id = normalize_id(&raw_id);

    let coordinator = &state.coordinator;
    let result = match decision {
        Decision::Approve => coordinator.approve(&id).await,
        Decision::ApproveDeploy => coordinator.approve_and_deploy(&id).await,
        Decision::Reject => coordinator.reject(&id).await,
    };

    match result {
        Ok(article) => html(page::confirmation(decision.heading(), &article)),
        Err(Error::NotFound(_)) => not_pending(&id),
        Err(e @ (Error::Build(_) | Error::Deploy { .. })) => {
            tracing::error!(id = %id, error = %e, "Approved but publishing failed");
            HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body(format!("Article {id} was approved, but {e}"))
        }
        Err(e) => {
            tracing::error!(id = %id, action = %action, error = %e, "Decision failed");
            HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body(format!("Decision '{action}' for article {id} could not be completed: {e}"))
        }
    }
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header(("Allow", "POST"))
        .content_type("text/plain; charset=utf-8")
        .body("Decisions must be submitted with POST")
}

/// Configures and returns the decision routes.
///
/// * `GET /` lists pending articles
/// * `GET /health` answers `ok`
/// * `GET /approve/{id}` shows the decision page
/// * `POST /action/{action}/{id}` applies a decision; other methods get 405
pub fn configure_routes() -> Scope {
    scope("")
        .route("/", get().to(index))
        .route("/health", get().to(health))
        .route("/approve/{id}", get().to(decision_page))
        .service(
            web::resource("/action/{action}/{id}")
                .route(web::post().to(decide))
                .route(web::route().to(method_not_allowed)),
        )
}

/// Static mount for built previews.
pub fn preview_files(preview_dir: &Path) -> Files {
    Files::new("/preview", preview_dir).index_file("index.html")
}

/// Run the approval server until it is stopped.
pub async fn serve(
    coordinator: Arc<ApprovalCoordinator>,
    token: Option<String>,
    preview_dir: &Path,
    host: &str,
    port: u16,
) -> std::io::Result<()> {
    std::fs::create_dir_all(preview_dir)?;
    let state = web::Data::new(ServerState { coordinator, token });
    let preview_dir = preview_dir.to_path_buf();

    tracing::info!(host, port, "Approval server listening");

    HttpServer::new(move || {
        actix_web::App::new()
            .app_data(state.clone())
            .service(preview_files(&preview_dir))
            .service(configure_routes())
    })
    .bind((host, port))?
    .run()
    .await
}
