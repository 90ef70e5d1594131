/// 경매 상태 스케줄러
/// 종료 시각이 지난 활성 경매를 비활성으로 전환하고 낙찰 입찰을 확정한다.
/// is_active 플래그를 내리는 책임은 이 스케줄러가 가진다. 입찰 경로는
/// end_time 경과를 자체적으로도 종료로 취급하므로 스케줄러가 멈춰도
/// 늦은 입찰이 들어오지는 않는다.
// region:    --- Imports
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

// endregion: --- Imports

// region:    --- Auction Scheduler
/// 경매 상태 스케줄러
pub struct AuctionScheduler {
    pool: Arc<PgPool>,
}

impl AuctionScheduler {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// 스케줄러 시작
    pub async fn start(&self) {
        let pool = Arc::clone(&self.pool);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1)); // 1초마다 실행
            loop {
                interval.tick().await;
                if let Err(e) = Self::close_ended_auctions(&pool).await {
                    error!(
                        "{:<12} --> 경매 종료 처리 중 오류 발생: {:?}",
                        "Scheduler", e
                    );
                }
            }
        });
    }

    /// 종료 시각이 지난 경매 마감 및 낙찰 확정
    async fn close_ended_auctions(pool: &PgPool) -> Result<(), sqlx::Error> {
        let now = Utc::now();

        // is_active = TRUE 조건이 있어 경매당 정확히 한 번만 마감된다.
        let closed_ids: Vec<i64> = sqlx::query_scalar(
            "UPDATE auctions SET is_active = FALSE, updated_at = $1
             WHERE is_active = TRUE AND end_time <= $1
             RETURNING id",
        )
        .bind(now)
        .fetch_all(pool)
        .await?;

        for auction_id in closed_ids {
            Self::finalize_winner(pool, auction_id).await?;
        }

        debug!("{:<12} --> 경매 종료 점검 완료", "Scheduler");
        Ok(())
    }

    /// 낙찰 확정: 최고 금액 입찰에 is_winner 표시 후 경매에 기록
    /// 수락 금액은 엄격히 증가하므로 동률은 없지만, 정렬은 id로도 고정해 둔다.
    async fn finalize_winner(pool: &PgPool, auction_id: i64) -> Result<(), sqlx::Error> {
        let winner_id: Option<i64> = sqlx::query_scalar(
            "UPDATE bids SET is_winner = TRUE
             WHERE id = (
                 SELECT id FROM bids
                 WHERE auction_id = $1
                 ORDER BY bid_amount DESC, id ASC
                 LIMIT 1
             )
             RETURNING id",
        )
        .bind(auction_id)
        .fetch_optional(pool)
        .await?;

        match winner_id {
            Some(bid_id) => {
                sqlx::query("UPDATE auctions SET winner_id = $1 WHERE id = $2")
                    .bind(bid_id)
                    .bind(auction_id)
                    .execute(pool)
                    .await?;
                info!(
                    "{:<12} --> 경매 {} 마감, 낙찰 입찰 id: {}",
                    "Scheduler", auction_id, bid_id
                );
            }
            None => {
                info!(
                    "{:<12} --> 경매 {} 마감, 입찰 없음",
                    "Scheduler", auction_id
                );
            }
        }
        Ok(())
    }
}
// endregion: --- Auction Scheduler
