use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use ledger_core::error::LedgerError;
use ledger_core::storage::{CreditOutcome, LedgerStore, WithdrawalOutcome};
use ledger_core::types::{
    ActivityKind, AdKind, Balance, EarningEntry, PaymentMethod, SocialPlatform, TaskKind,
    WithdrawalRequest,
};
use ledger_engine::{
    AdEngagement, CommissionCascadeProcessor, CommissionPayout, EarningsLedger, RewardEngine,
    WeeklyBonusRunner, WithdrawalProcessor,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared handler state: the engine components, all cheaply cloneable.
#[derive(Clone)]
pub struct AppContext {
    pub ledger: Arc<EarningsLedger>,
    pub rewards: RewardEngine,
    pub cascade: CommissionCascadeProcessor,
    pub withdrawals: WithdrawalProcessor,
    pub weekly: WeeklyBonusRunner,
    pub store: Arc<dyn LedgerStore>,
}

/// Maps domain errors onto the HTTP surface. Rejections are 422 with the
/// machine-readable reason; persistence trouble is a retryable 503.
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            LedgerError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            LedgerError::Rejected(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.0.to_string(), "rejection": reason }),
            ),
            LedgerError::WithdrawalNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("withdrawal {id} not found") }),
            ),
            LedgerError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, json!({ "error": self.0.to_string() }))
            }
            LedgerError::Persistence(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "persistence unavailable, try again" }),
            ),
            LedgerError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": msg }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Serialize)]
pub struct EarningResponse {
    /// True when the event had already been credited; the entry is the
    /// original one in that case.
    pub duplicate: bool,
    pub entry: EarningEntry,
}

impl From<CreditOutcome> for EarningResponse {
    fn from(outcome: CreditOutcome) -> Self {
        match outcome {
            CreditOutcome::Applied(entry) => Self {
                duplicate: false,
                entry,
            },
            CreditOutcome::Duplicate(entry) => Self {
                duplicate: true,
                entry,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskRewardRequest {
    pub user_id: String,
    pub task_id: String,
    pub kind: TaskKind,
}

#[derive(Debug, Deserialize)]
pub struct AdRewardRequest {
    pub user_id: String,
    pub ad_id: String,
    pub ad: AdKind,
    #[serde(default = "default_engagement")]
    pub engagement: AdEngagement,
}

fn default_engagement() -> AdEngagement {
    AdEngagement::View
}

#[derive(Debug, Deserialize)]
pub struct SocialRewardRequest {
    pub user_id: String,
    pub platform: SocialPlatform,
}

#[derive(Debug, Deserialize)]
pub struct ActivityBonusRequest {
    pub user_id: String,
    pub kind: ActivityKind,
    #[serde(default = "default_streak")]
    pub streak: u32,
}

fn default_streak() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct ActivationRequest {
    pub user_id: String,
    #[serde(default)]
    pub activation_amount: i64,
}

#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub payouts: Vec<CommissionPayout>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalSubmitRequest {
    pub user_id: String,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_details: serde_json::Value,
}

/// Terminal payment-rail callback payload.
#[derive(Debug, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FinalizeRequest {
    Completed { gateway_reference: String },
    Failed { reason: String },
}

#[derive(Debug, Deserialize)]
pub struct ReferralRequest {
    pub referrer_id: String,
    pub referred_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AgentFlagRequest {
    pub agent: bool,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/rewards/task", post(task_reward))
        .route("/rewards/ad", post(ad_reward))
        .route("/rewards/social", post(social_reward))
        .route("/rewards/activity", post(activity_bonus))
        .route("/activations", post(activation))
        .route("/withdrawals", post(submit_withdrawal))
        .route("/withdrawals/:id/processing", post(begin_processing))
        .route("/withdrawals/:id/finalize", post(finalize_withdrawal))
        .route("/withdrawals/:id", get(get_withdrawal))
        .route("/balances/:user", get(get_balance))
        .route("/earnings/:user", get(get_earnings))
        .route("/referrals", post(record_referral))
        .route("/agents/:user", put(set_agent))
        .route("/sweeps/weekly", post(run_weekly_sweep))
        .route("/health", get(health_check))
        .with_state(ctx)
}

async fn task_reward(
    State(ctx): State<AppContext>,
    Json(req): Json<TaskRewardRequest>,
) -> ApiResult<Json<EarningResponse>> {
    let outcome = ctx
        .rewards
        .process_task_reward(&req.user_id, &req.task_id, req.kind)
        .await?;
    Ok(Json(outcome.into()))
}

async fn ad_reward(
    State(ctx): State<AppContext>,
    Json(req): Json<AdRewardRequest>,
) -> ApiResult<Json<EarningResponse>> {
    let outcome = ctx
        .rewards
        .process_ad_reward(&req.user_id, &req.ad_id, req.ad, req.engagement)
        .await?;
    Ok(Json(outcome.into()))
}

async fn social_reward(
    State(ctx): State<AppContext>,
    Json(req): Json<SocialRewardRequest>,
) -> ApiResult<Json<EarningResponse>> {
    let outcome = ctx
        .rewards
        .process_social_reward(&req.user_id, req.platform)
        .await?;
    Ok(Json(outcome.into()))
}

async fn activity_bonus(
    State(ctx): State<AppContext>,
    Json(req): Json<ActivityBonusRequest>,
) -> ApiResult<Json<EarningResponse>> {
    let outcome = ctx
        .rewards
        .process_activity_bonus(&req.user_id, req.kind, req.streak, Utc::now())
        .await?;
    Ok(Json(outcome.into()))
}

async fn activation(
    State(ctx): State<AppContext>,
    Json(req): Json<ActivationRequest>,
) -> ApiResult<Json<ActivationResponse>> {
    let payouts = ctx
        .cascade
        .process_activation(&req.user_id, req.activation_amount)
        .await?;
    Ok(Json(ActivationResponse { payouts }))
}

async fn submit_withdrawal(
    State(ctx): State<AppContext>,
    Json(req): Json<WithdrawalSubmitRequest>,
) -> ApiResult<(StatusCode, Json<WithdrawalRequest>)> {
    let request = ctx
        .withdrawals
        .submit(&req.user_id, req.amount, req.payment_method, req.payment_details)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn begin_processing(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WithdrawalRequest>> {
    Ok(Json(ctx.withdrawals.begin_processing(id).await?))
}

async fn finalize_withdrawal(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<FinalizeRequest>,
) -> ApiResult<Json<WithdrawalRequest>> {
    let outcome = match req {
        FinalizeRequest::Completed { gateway_reference } => {
            WithdrawalOutcome::Completed { gateway_reference }
        }
        FinalizeRequest::Failed { reason } => WithdrawalOutcome::Failed { reason },
    };
    Ok(Json(ctx.withdrawals.finalize(id, outcome).await?))
}

async fn get_withdrawal(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WithdrawalRequest>> {
    let request = ctx
        .store
        .withdrawal(id)
        .await?
        .ok_or(LedgerError::WithdrawalNotFound(id))?;
    Ok(Json(request))
}

async fn get_balance(
    State(ctx): State<AppContext>,
    Path(user): Path<String>,
) -> ApiResult<Json<Balance>> {
    Ok(Json(ctx.ledger.balance(&user).await?))
}

async fn get_earnings(
    State(ctx): State<AppContext>,
    Path(user): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<EarningEntry>>> {
    Ok(Json(
        ctx.ledger
            .list_earnings(&user, page.limit, page.offset)
            .await?,
    ))
}

async fn record_referral(
    State(ctx): State<AppContext>,
    Json(req): Json<ReferralRequest>,
) -> ApiResult<StatusCode> {
    if req.referrer_id == req.referred_id {
        return Err(LedgerError::Validation(
            "a user cannot refer themselves".to_string(),
        )
        .into());
    }
    ctx.store
        .record_referral(&req.referrer_id, &req.referred_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_agent(
    State(ctx): State<AppContext>,
    Path(user): Path<String>,
    Json(req): Json<AgentFlagRequest>,
) -> ApiResult<StatusCode> {
    ctx.store.set_agent(&user, req.agent).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn run_weekly_sweep(
    State(ctx): State<AppContext>,
) -> ApiResult<Json<ledger_engine::WeeklySweepReport>> {
    Ok(Json(ctx.weekly.run(Utc::now()).await?))
}

async fn health_check() -> impl IntoResponse {
    "OK"
}
