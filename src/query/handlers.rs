// region:    --- Imports
use super::queries;
use crate::bidding::model::{Auction, Bid};
use crate::database::DatabaseManager;
use sqlx::Error as SqlxError;
use sqlx::Row;
use tracing::info;

// endregion: --- Imports

// region:    --- Query Handlers

/// 현재 활성 경매 조회
pub async fn get_active_auction(
    db_manager: &DatabaseManager,
) -> Result<Option<Auction>, SqlxError> {
    info!("{:<12} --> 활성 경매 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(queries::GET_ACTIVE_AUCTION)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 경매 단건 조회
pub async fn get_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Auction, SqlxError> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(queries::GET_AUCTION)
                    .bind(auction_id)
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await
}

/// 가장 최근에 종료된 경매 조회
pub async fn get_latest_ended_auction(
    db_manager: &DatabaseManager,
) -> Result<Option<Auction>, SqlxError> {
    info!("{:<12} --> 종료 경매 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(queries::GET_LATEST_ENDED_AUCTION)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 최고 입찰 조회
pub async fn get_highest_bid(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<Bid>, SqlxError> {
    info!("{:<12} --> 최고 입찰 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Bid>(queries::GET_HIGHEST_BID)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 입찰 수 조회
pub async fn get_bid_count(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<i64, SqlxError> {
    info!("{:<12} --> 입찰 수 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_scalar::<_, i64>(queries::GET_BID_COUNT)
                    .bind(auction_id)
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await
}

/// 입찰 id 목록 조회
pub async fn get_bid_ids(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Vec<i64>, SqlxError> {
    info!("{:<12} --> 입찰 id 목록 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_scalar::<_, i64>(queries::GET_BID_IDS)
                    .bind(auction_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 입찰 이력 조회
pub async fn get_bid_history(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Vec<Bid>, SqlxError> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Bid>(queries::GET_BID_HISTORY)
                    .bind(auction_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 경매의 이벤트 버전과 최고 수락 금액 조회
/// 입찰 하한 재검증은 반드시 이 값을 기준으로 한다.
pub async fn get_auction_floor_state(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<(i64, Option<i64>), SqlxError> {
    info!("{:<12} --> 하한 상태 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let row = sqlx::query(queries::GET_AUCTION_FLOOR)
                    .bind(auction_id)
                    .fetch_one(&mut **tx)
                    .await?;

                let version: i64 = row.get("version");
                let highest_amount: Option<i64> = row.get("highest_amount");
                Ok((version, highest_amount))
            })
        })
        .await
}

// endregion: --- Query Handlers
