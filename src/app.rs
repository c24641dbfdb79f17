use actix_cors::Cors;
use actix_web::{get, http::StatusCode, post, put, web, HttpResponse, ResponseError};
use serde_json::json;
use tracing::error;

use crate::auth::Identity;
use crate::config::Config;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::payments::{upi_link, UpiLink, UpiLinkRequest};
use crate::schemas::{GroupId, NewExpense, NewGroup, NewMember, NewSettlement, UserProfile};
use crate::wealth::{NewHolding, Wealth};

type Reply = Result<HttpResponse, LedgerError>;

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::SplitMismatch { .. }
            | LedgerError::NotInGroup { .. }
            | LedgerError::Invalid(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotAMember { .. } => StatusCode::FORBIDDEN,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::AlreadyMember { .. } => StatusCode::CONFLICT,
            LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            LedgerError::Store(err) => {
                error!(%err, "store failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": message,
        }))
    }
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[put("/me")]
async fn save_profile(
    ledger: web::Data<Ledger>,
    identity: Identity,
    profile: web::Json<UserProfile>,
) -> Reply {
    let user = ledger.register_user(&identity, profile.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[get("/me")]
async fn get_profile(ledger: web::Data<Ledger>, identity: Identity) -> Reply {
    Ok(HttpResponse::Ok().json(ledger.profile(&identity).await?))
}

#[post("/groups")]
async fn create_group(
    ledger: web::Data<Ledger>,
    identity: Identity,
    json: web::Json<NewGroup>,
) -> Reply {
    let group = ledger.create_group(&identity, json.into_inner()).await?;
    Ok(HttpResponse::Created().json(group))
}

#[get("/groups")]
async fn list_groups(ledger: web::Data<Ledger>, identity: Identity) -> Reply {
    Ok(HttpResponse::Ok().json(ledger.list_groups(&identity).await?))
}

#[get("/groups/{id}")]
async fn get_group(
    ledger: web::Data<Ledger>,
    identity: Identity,
    id: web::Path<GroupId>,
) -> Reply {
    Ok(HttpResponse::Ok().json(ledger.get_group(&identity, id.into_inner()).await?))
}

#[post("/groups/{id}/members")]
async fn add_member(
    ledger: web::Data<Ledger>,
    identity: Identity,
    id: web::Path<GroupId>,
    json: web::Json<NewMember>,
) -> Reply {
    let member = ledger
        .add_member(&identity, id.into_inner(), json.into_inner().user_id)
        .await?;
    Ok(HttpResponse::Created().json(member))
}

#[post("/groups/{id}/expenses")]
async fn add_expense(
    ledger: web::Data<Ledger>,
    identity: Identity,
    id: web::Path<GroupId>,
    expense: web::Json<NewExpense>,
) -> Reply {
    let expense = ledger
        .record_expense(&identity, id.into_inner(), expense.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(expense))
}

#[get("/groups/{id}/expenses")]
async fn list_expenses(
    ledger: web::Data<Ledger>,
    identity: Identity,
    id: web::Path<GroupId>,
) -> Reply {
    Ok(HttpResponse::Ok().json(ledger.expenses(&identity, id.into_inner()).await?))
}

#[post("/groups/{id}/settlements")]
async fn add_settlement(
    ledger: web::Data<Ledger>,
    identity: Identity,
    id: web::Path<GroupId>,
    settlement: web::Json<NewSettlement>,
) -> Reply {
    let settlement = ledger
        .record_settlement(&identity, id.into_inner(), settlement.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(settlement))
}

#[get("/groups/{id}/settlements")]
async fn list_settlements(
    ledger: web::Data<Ledger>,
    identity: Identity,
    id: web::Path<GroupId>,
) -> Reply {
    Ok(HttpResponse::Ok().json(ledger.settlements(&identity, id.into_inner()).await?))
}

#[get("/groups/{id}/balances")]
async fn get_balances(
    ledger: web::Data<Ledger>,
    identity: Identity,
    id: web::Path<GroupId>,
) -> Reply {
    Ok(HttpResponse::Ok().json(ledger.balances(&identity, id.into_inner()).await?))
}

#[get("/groups/{id}/settle-up")]
async fn settle_up(
    ledger: web::Data<Ledger>,
    config: web::Data<Config>,
    identity: Identity,
    id: web::Path<GroupId>,
) -> Reply {
    let suggestions = ledger
        .settle_up(&identity, id.into_inner(), &config.upi)
        .await?;
    Ok(HttpResponse::Ok().json(suggestions))
}

#[post("/payments/upi-link")]
async fn create_upi_link(
    config: web::Data<Config>,
    _identity: Identity,
    request: web::Json<UpiLinkRequest>,
) -> Reply {
    let link = upi_link(&request, &config.upi)?;
    Ok(HttpResponse::Ok().json(UpiLink { link }))
}

#[post("/wealth/holdings")]
async fn add_holding(
    wealth: web::Data<Wealth>,
    identity: Identity,
    json: web::Json<NewHolding>,
) -> Reply {
    let holding = wealth.add_holding(&identity, json.into_inner()).await?;
    Ok(HttpResponse::Created().json(holding))
}

#[get("/wealth/holdings")]
async fn list_holdings(wealth: web::Data<Wealth>, identity: Identity) -> Reply {
    Ok(HttpResponse::Ok().json(wealth.holdings(&identity).await?))
}

#[get("/wealth/summary")]
async fn wealth_summary(wealth: web::Data<Wealth>, identity: Identity) -> Reply {
    Ok(HttpResponse::Ok().json(wealth.summary(&identity).await?))
}

/// Registers every route. Expects `Data<Ledger>`, `Data<Wealth>` and
/// `Data<Config>` to be provided by the `App`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(save_profile)
        .service(get_profile)
        .service(create_group)
        .service(list_groups)
        .service(get_group)
        .service(add_member)
        .service(add_expense)
        .service(list_expenses)
        .service(add_settlement)
        .service(list_settlements)
        .service(get_balances)
        .service(settle_up)
        .service(create_upi_link)
        .service(add_holding)
        .service(list_holdings)
        .service(wealth_summary);
}

pub fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
}
