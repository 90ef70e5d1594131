// region:    --- Imports
use crate::bidding::commands::{handle_place_bid, BidError, PlaceBidCommand};
use crate::bidding::model::{AuctionWithBids, BidPublic};
use crate::database::DatabaseManager;
use crate::event_store::PostgresEventStore;
use crate::message_broker::KafkaProducer;
use crate::query;
use crate::query::read_model::AuctionReadModel;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

type AppState = (
    Arc<DatabaseManager>,
    Arc<KafkaProducer>,
    Arc<AuctionReadModel>,
);

// region:    --- Command Handlers

/// 입찰 요청 처리
pub async fn handle_bid(
    State((db_manager, kafka_producer, _)): State<AppState>,
    Json(cmd): Json<PlaceBidCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    let event_store =
        PostgresEventStore::new(db_manager.get_pool(), Arc::clone(&kafka_producer));

    match handle_place_bid(cmd, &event_store, &db_manager).await {
        Ok(bid) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "입찰이 성공적으로 처리되었습니다.",
                "bid": BidPublic::from(&bid)
            })),
        )
            .into_response(),
        Err(e) => bid_error_response(e),
    }
}

/// 입찰 오류를 상태 코드 + JSON 본문으로 변환
/// 하한 미달이면 재제출 안내를 위해 현재 하한을 함께 내려준다.
fn bid_error_response(e: BidError) -> Response {
    let status = match &e {
        BidError::ValidationFailed(_) | BidError::BelowFloor { .. } | BidError::AuctionClosed => {
            StatusCode::BAD_REQUEST
        }
        BidError::AuctionNotFound(_) => StatusCode::NOT_FOUND,
        BidError::StorageUnavailable(_) | BidError::TooManyConflicts => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        BidError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = serde_json::json!({
        "error": e.to_string(),
        "code": e.code(),
    });
    if let Some(floor) = e.floor() {
        body["floor"] = serde_json::json!(floor);
    }

    (status, Json(body)).into_response()
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 활성 경매 스냅샷 조회
pub async fn handle_get_active_auction(
    State((_, _, read_model)): State<AppState>,
) -> impl IntoResponse {
    info!("{:<12} --> 활성 경매 스냅샷 조회", "HandlerQuery");
    Json(read_model.snapshot())
}

/// 읽기 모델 수동 재적재
pub async fn handle_refresh_active_auction(
    State((_, _, read_model)): State<AppState>,
) -> impl IntoResponse {
    info!("{:<12} --> 읽기 모델 재적재 요청", "HandlerQuery");
    read_model.refresh().await;
    Json(read_model.snapshot())
}

/// 경매 상태 조회 (최고 입찰, 입찰 수 포함)
pub async fn handle_get_auction(
    State((db_manager, _, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 상태 조회 id: {}", "HandlerQuery", auction_id);
    match fetch_auction_with_bids(&db_manager, auction_id).await {
        Ok(Some(auction)) => Json(auction).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "경매를 찾을 수 없습니다").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 최고 입찰가 조회
pub async fn handle_get_highest_bid(
    State((db_manager, _, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 최고 입찰가 조회 id: {}",
        "HandlerQuery", auction_id
    );
    match query::handlers::get_highest_bid(&db_manager, auction_id).await {
        Ok(bid) => Json(bid.as_ref().map(BidPublic::from)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 입찰 이력 조회
pub async fn handle_get_bid_history(
    State((db_manager, _, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "HandlerQuery", auction_id);
    match query::handlers::get_bid_history(&db_manager, auction_id).await {
        Ok(history) => {
            let history: Vec<BidPublic> = history.iter().map(BidPublic::from).collect();
            Json(history).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 가장 최근 종료 경매와 낙찰 입찰 조회
pub async fn handle_get_ended_auction(
    State((db_manager, _, _)): State<AppState>,
) -> impl IntoResponse {
    info!("{:<12} --> 종료 경매 조회", "HandlerQuery");
    match fetch_latest_ended(&db_manager).await {
        Ok(Some(auction)) => Json(auction).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "종료된 경매가 없습니다").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn fetch_auction_with_bids(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<AuctionWithBids>, sqlx::Error> {
    let auction = match query::handlers::get_auction(db_manager, auction_id).await {
        Ok(auction) => auction,
        Err(sqlx::Error::RowNotFound) => return Ok(None),
        Err(e) => return Err(e),
    };
    let highest_bid = query::handlers::get_highest_bid(db_manager, auction_id).await?;
    let bid_count = query::handlers::get_bid_count(db_manager, auction_id).await?;
    Ok(Some(AuctionWithBids {
        auction,
        highest_bid: highest_bid.as_ref().map(BidPublic::from),
        bid_count,
    }))
}

async fn fetch_latest_ended(
    db_manager: &DatabaseManager,
) -> Result<Option<AuctionWithBids>, sqlx::Error> {
    let Some(auction) = query::handlers::get_latest_ended_auction(db_manager).await? else {
        return Ok(None);
    };
    let highest_bid = query::handlers::get_highest_bid(db_manager, auction.id).await?;
    let bid_count = query::handlers::get_bid_count(db_manager, auction.id).await?;
    Ok(Some(AuctionWithBids {
        auction,
        highest_bid: highest_bid.as_ref().map(BidPublic::from),
        bid_count,
    }))
}

// endregion: --- Query Handlers
