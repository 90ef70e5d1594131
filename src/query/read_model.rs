/// 활성 경매 읽기 모델
/// 저장소에서 초기 상태를 적재한 뒤, 입찰 생성 알림만으로 최고 입찰과 입찰 수를
/// 증분 갱신한다. 알림은 최소 1회 전달이므로 입찰 id 기준으로 중복을 제거하고,
/// 최고 입찰 갱신은 max 연산이라 순서가 뒤섞여 도착해도 안전하다.
// region:    --- Imports
use crate::bidding::model::{Auction, Bid, BidPublic};
use crate::database::DatabaseManager;
use crate::query::handlers;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Snapshot

/// 화면단에 내보내는 읽기 모델 스냅샷
/// 입찰자 이름은 마스킹되고 전화번호는 포함되지 않는다.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AuctionSnapshot {
    pub auction: Option<Auction>,
    pub highest_bid: Option<BidPublic>,
    pub bid_count: i64,
    pub is_loading: bool,
    pub error: Option<String>,
}

// endregion: --- Snapshot

// region:    --- Read State

/// 읽기 모델 내부 상태
#[derive(Default)]
struct ReadState {
    auction: Option<Auction>,
    highest_bid: Option<Bid>,
    bid_count: i64,
    seen_bid_ids: HashSet<i64>,
    is_loading: bool,
    error: Option<String>,
}

impl ReadState {
    /// 상태 초기화 (재적재 직전)
    fn reset(&mut self) {
        self.auction = None;
        self.highest_bid = None;
        self.bid_count = 0;
        self.seen_bid_ids.clear();
    }

    /// 입찰 생성 알림 적용. 상태가 바뀌었으면 true를 돌려준다.
    /// 추적 중인 경매가 아니거나 이미 반영된 입찰이면 아무것도 하지 않는다.
    fn apply_bid_created(&mut self, bid: &Bid) -> bool {
        let Some(auction) = &self.auction else {
            return false;
        };
        if bid.auction_id != auction.id {
            return false;
        }
        if !self.seen_bid_ids.insert(bid.id) {
            // 중복 전달된 알림
            return false;
        }

        self.bid_count += 1;

        let is_new_highest = self
            .highest_bid
            .as_ref()
            .map(|highest| bid.bid_amount > highest.bid_amount)
            .unwrap_or(true);
        if is_new_highest {
            self.highest_bid = Some(bid.clone());
        }
        true
    }

    fn snapshot(&self) -> AuctionSnapshot {
        AuctionSnapshot {
            auction: self.auction.clone(),
            highest_bid: self.highest_bid.as_ref().map(BidPublic::from),
            bid_count: self.bid_count,
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }
}

// endregion: --- Read State

// region:    --- Auction Read Model

pub struct AuctionReadModel {
    db_manager: Arc<DatabaseManager>,
    state: RwLock<ReadState>,
    watch_tx: watch::Sender<AuctionSnapshot>,
}

impl AuctionReadModel {
    pub fn new(db_manager: Arc<DatabaseManager>) -> Self {
        let (watch_tx, _) = watch::channel(AuctionSnapshot::default());
        Self {
            db_manager,
            state: RwLock::new(ReadState::default()),
            watch_tx,
        }
    }

    /// 현재 활성 경매 기준으로 상태 적재
    pub async fn load(&self) -> Result<(), sqlx::Error> {
        info!("{:<12} --> 활성 경매 적재 시작", "ReadModel");
        let mut state = self.state.write().await;
        state.is_loading = true;
        state.error = None;
        self.publish(&state);

        let result = self.fetch_active_into(&mut state).await;

        state.is_loading = false;
        if let Err(e) = &result {
            state.error = Some(e.to_string());
        }
        self.publish(&state);
        result
    }

    /// 추적 경매 교체: 기존 상태를 버리고 지정 경매 기준으로 재적재
    pub async fn switch_auction(&self, auction_id: i64) -> Result<(), sqlx::Error> {
        info!("{:<12} --> 추적 경매 교체 id: {}", "ReadModel", auction_id);
        let mut state = self.state.write().await;
        state.is_loading = true;
        state.error = None;
        self.publish(&state);

        let result = self.fetch_auction_into(&mut state, auction_id).await;

        state.is_loading = false;
        if let Err(e) = &result {
            state.error = Some(e.to_string());
        }
        self.publish(&state);
        result
    }

    /// 전체 재적재
    /// 알림 스트림이 끊겼을 때 빠진 이벤트를 개별 보정하는 대신 이걸 호출한다.
    pub async fn refresh(&self) {
        if let Err(e) = self.load().await {
            warn!("{:<12} --> 재적재 실패: {:?}", "ReadModel", e);
        }
    }

    /// 입찰 생성 알림 반영
    pub async fn apply_bid_created(&self, bid: Bid) {
        let mut state = self.state.write().await;
        if state.apply_bid_created(&bid) {
            info!(
                "{:<12} --> 입찰 반영: 경매 {} 금액 {} (총 {}건)",
                "ReadModel", bid.auction_id, bid.bid_amount, state.bid_count
            );
            self.publish(&state);
        }
    }

    /// 현재 스냅샷 조회
    pub fn snapshot(&self) -> AuctionSnapshot {
        self.watch_tx.borrow().clone()
    }

    /// 스냅샷 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<AuctionSnapshot> {
        self.watch_tx.subscribe()
    }

    async fn fetch_active_into(&self, state: &mut ReadState) -> Result<(), sqlx::Error> {
        state.reset();
        let Some(auction) = handlers::get_active_auction(&self.db_manager).await? else {
            info!("{:<12} --> 활성 경매 없음", "ReadModel");
            return Ok(());
        };
        self.fetch_bids_into(state, auction).await
    }

    async fn fetch_auction_into(
        &self,
        state: &mut ReadState,
        auction_id: i64,
    ) -> Result<(), sqlx::Error> {
        state.reset();
        let auction = handlers::get_auction(&self.db_manager, auction_id).await?;
        self.fetch_bids_into(state, auction).await
    }

    async fn fetch_bids_into(
        &self,
        state: &mut ReadState,
        auction: Auction,
    ) -> Result<(), sqlx::Error> {
        let highest_bid = handlers::get_highest_bid(&self.db_manager, auction.id).await?;
        let bid_count = handlers::get_bid_count(&self.db_manager, auction.id).await?;
        let bid_ids = handlers::get_bid_ids(&self.db_manager, auction.id).await?;

        info!(
            "{:<12} --> 적재 완료: 경매 {} 입찰 {}건",
            "ReadModel", auction.id, bid_count
        );

        state.auction = Some(auction);
        state.highest_bid = highest_bid;
        state.bid_count = bid_count;
        state.seen_bid_ids = bid_ids.into_iter().collect();
        Ok(())
    }

    fn publish(&self, state: &ReadState) {
        self.watch_tx.send_replace(state.snapshot());
    }
}

// endregion: --- Auction Read Model

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn test_auction(id: i64) -> Auction {
        Auction {
            id,
            title: "테스트 경매".to_string(),
            description: None,
            min_bid_amount: 500,
            end_time: Utc::now() + Duration::hours(1),
            is_active: true,
            image_urls: vec![],
            winner_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_bid(id: i64, auction_id: i64, amount: i64) -> Bid {
        Bid {
            id,
            auction_id,
            bid_amount: amount,
            bidder_name: "Ali Can".to_string(),
            bidder_phone: "0532 123 45 67".to_string(),
            is_winner: false,
            created_at: Utc::now(),
        }
    }

    fn ready_state(auction_id: i64) -> ReadState {
        ReadState {
            auction: Some(test_auction(auction_id)),
            ..ReadState::default()
        }
    }

    #[test]
    fn apply_increments_count_and_replaces_highest() {
        let mut state = ready_state(1);

        assert!(state.apply_bid_created(&test_bid(10, 1, 500)));
        assert!(state.apply_bid_created(&test_bid(11, 1, 600)));

        assert_eq!(state.bid_count, 2);
        assert_eq!(state.highest_bid.as_ref().map(|b| b.bid_amount), Some(600));
    }

    #[test]
    fn late_lower_bid_keeps_highest_but_counts() {
        let mut state = ready_state(1);

        assert!(state.apply_bid_created(&test_bid(11, 1, 600)));
        // 낮은 금액의 알림이 늦게 도착한 경우
        assert!(state.apply_bid_created(&test_bid(10, 1, 500)));

        assert_eq!(state.bid_count, 2);
        assert_eq!(state.highest_bid.as_ref().map(|b| b.id), Some(11));
        assert_eq!(state.highest_bid.as_ref().map(|b| b.bid_amount), Some(600));
    }

    #[test]
    fn duplicate_notification_is_ignored() {
        let mut state = ready_state(1);

        assert!(state.apply_bid_created(&test_bid(10, 1, 500)));
        assert!(!state.apply_bid_created(&test_bid(10, 1, 500)));

        assert_eq!(state.bid_count, 1);
    }

    #[test]
    fn foreign_auction_notification_is_ignored() {
        let mut state = ready_state(1);

        assert!(!state.apply_bid_created(&test_bid(10, 2, 500)));

        assert_eq!(state.bid_count, 0);
        assert!(state.highest_bid.is_none());
    }

    #[test]
    fn notification_before_load_is_ignored() {
        let mut state = ReadState::default();

        assert!(!state.apply_bid_created(&test_bid(10, 1, 500)));

        assert_eq!(state.bid_count, 0);
    }

    #[test]
    fn reset_discards_tracked_state() {
        let mut state = ready_state(1);
        state.apply_bid_created(&test_bid(10, 1, 500));

        state.reset();

        assert!(state.auction.is_none());
        assert!(state.highest_bid.is_none());
        assert_eq!(state.bid_count, 0);
        assert!(state.seen_bid_ids.is_empty());
    }

    #[test]
    fn snapshot_masks_bidder_name() {
        let mut state = ready_state(1);
        state.apply_bid_created(&test_bid(10, 1, 500));

        let snapshot = state.snapshot();
        let highest = snapshot.highest_bid.expect("highest bid");
        assert_eq!(highest.bidder_name, "A*i C*n");
    }
}
