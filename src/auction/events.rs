use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum AuctionEvent {
    // 입찰 생성 이벤트
    BidPlaced {
        auction_id: i64,
        bid_amount: i64,
        bidder_name: String,
        bidder_phone: String,
        timestamp: DateTime<Utc>,
    },
}
