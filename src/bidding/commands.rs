/// 입찰 커맨드 처리
/// 하한(현재 최고 수락 금액 + 최소 증가 단위) 검증과 이벤트 기록을
/// 경매별 버전 CAS로 직렬화한다.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::bidding::model::Bid;
use crate::bidding::validation::{self, ValidationError};
use crate::database::DatabaseManager;
use crate::event_store::{Event, EventStore, EventStoreError};
use crate::query::handlers;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Commands

/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub bidder_name: String,
    pub bidder_phone: String,
    pub bid_amount: i64,
}

/// 최소 입찰 증가 단위 (통화 단위)
pub const MIN_INCREMENT: i64 = 100;

// 버전 충돌 시 최대 재시도 횟수
const MAX_RETRIES: i32 = 100;

#[derive(Error, Debug)]
pub enum BidError {
    #[error("{0}")]
    ValidationFailed(#[from] ValidationError),
    #[error("입찰 금액이 현재 하한보다 낮습니다 (하한: {floor})")]
    BelowFloor { floor: i64 },
    #[error("경매가 이미 종료되었습니다")]
    AuctionClosed,
    #[error("경매를 찾을 수 없습니다: {0}")]
    AuctionNotFound(i64),
    #[error("일시적인 저장소 오류가 발생했습니다")]
    StorageUnavailable(#[source] sqlx::Error),
    #[error("이벤트 직렬화 실패")]
    Serialization(#[from] serde_json::Error),
    #[error("입찰 경합이 심해 처리하지 못했습니다. 잠시 후 다시 시도해 주세요")]
    TooManyConflicts,
}

impl BidError {
    /// 응답 본문에 실리는 오류 코드
    pub fn code(&self) -> &'static str {
        match self {
            BidError::ValidationFailed(_) => "VALIDATION_FAILED",
            BidError::BelowFloor { .. } => "BELOW_FLOOR",
            BidError::AuctionClosed => "ALREADY_ENDED",
            BidError::AuctionNotFound(_) => "NOT_FOUND",
            BidError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            BidError::Serialization(_) => "INTERNAL",
            BidError::TooManyConflicts => "MAX_RETRIES_EXCEEDED",
        }
    }

    /// 재제출 안내용 현재 하한
    pub fn floor(&self) -> Option<i64> {
        match self {
            BidError::BelowFloor { floor } => Some(*floor),
            _ => None,
        }
    }
}

/// 입찰 하한 계산
/// 수락된 입찰이 있으면 그 금액 + 최소 증가 단위, 없으면 경매 시작가.
pub fn compute_floor(highest_amount: Option<i64>, min_bid_amount: i64) -> i64 {
    match highest_amount {
        Some(amount) => amount + MIN_INCREMENT,
        None => min_bid_amount,
    }
}

/// 입찰 처리
///
/// 하한은 이벤트 로그 기준으로 읽고, 기록은 (aggregate_id, version) 유니크
/// 제약의 조건부 INSERT로 수행한다. 버전 충돌은 다른 입찰이 끼어들었다는
/// 뜻이므로 하한을 다시 읽고 재시도한다. 같은 하한을 본 동시 입찰 중
/// 하나만 기록되고, 나머지는 새 하한 기준으로 거절된다.
pub async fn handle_place_bid(
    cmd: PlaceBidCommand,
    event_store: &impl EventStore,
    db_manager: &DatabaseManager,
) -> Result<Bid, BidError> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    validation::validate_bid_input(&cmd.bidder_name, &cmd.bidder_phone, cmd.bid_amount)?;
    let bidder_name = cmd.bidder_name.trim().to_string();
    let bidder_phone = cmd.bidder_phone.trim().to_string();

    let mut retries = 0;
    while retries < MAX_RETRIES {
        let auction = handlers::get_auction(db_manager, cmd.auction_id)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => BidError::AuctionNotFound(cmd.auction_id),
                e => BidError::StorageUnavailable(e),
            })?;

        let now = Utc::now();
        // is_active와 end_time 중 하나라도 종료를 가리키면 받지 않는다.
        if !auction.is_active || now > auction.end_time {
            return Err(BidError::AuctionClosed);
        }

        let (current_version, highest_amount) =
            handlers::get_auction_floor_state(db_manager, cmd.auction_id)
                .await
                .map_err(BidError::StorageUnavailable)?;

        let floor = compute_floor(highest_amount, auction.min_bid_amount);
        if cmd.bid_amount < floor {
            return Err(BidError::BelowFloor { floor });
        }

        let bid_event = AuctionEvent::BidPlaced {
            auction_id: cmd.auction_id,
            bid_amount: cmd.bid_amount,
            bidder_name: bidder_name.clone(),
            bidder_phone: bidder_phone.clone(),
            timestamp: now,
        };

        let event = Event {
            id: 0,
            aggregate_id: cmd.auction_id,
            event_type: "BidPlaced".to_string(),
            data: serde_json::to_value(&bid_event)?,
            timestamp: now,
            version: current_version + 1,
        };

        match event_store.append_and_publish_event(event).await {
            Ok(event_id) => {
                info!(
                    "{:<12} --> 입찰 수락: 경매 {} 금액 {} (입찰 id: {})",
                    "Command", cmd.auction_id, cmd.bid_amount, event_id
                );
                return Ok(Bid {
                    id: event_id,
                    auction_id: cmd.auction_id,
                    bid_amount: cmd.bid_amount,
                    bidder_name,
                    bidder_phone,
                    is_winner: false,
                    created_at: now,
                });
            }
            Err(EventStoreError::VersionConflict) => {
                warn!(
                    "{:<12} --> 버전 충돌: 하한 재계산 후 재시도 ({}회)",
                    "Command",
                    retries + 1
                );
                retries += 1;
                continue;
            }
            Err(EventStoreError::Database(e)) => {
                return Err(BidError::StorageUnavailable(e));
            }
        }
    }

    Err(BidError::TooManyConflicts)
}

// endregion: --- Commands
