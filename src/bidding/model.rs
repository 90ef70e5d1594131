use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 경매 모델
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Auction {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub min_bid_amount: i64,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub image_urls: Vec<String>,
    pub winner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// 입찰 모델
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bid_amount: i64,
    pub bidder_name: String,
    pub bidder_phone: String,
    pub is_winner: bool,
    pub created_at: DateTime<Utc>,
}

/// 공개 응답용 입찰 뷰
/// 전화번호는 제외하고, 입찰자 이름은 마스킹 처리한다.
#[derive(Debug, Clone, Serialize)]
pub struct BidPublic {
    pub id: i64,
    pub auction_id: i64,
    pub bid_amount: i64,
    pub bidder_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Bid> for BidPublic {
    fn from(bid: &Bid) -> Self {
        BidPublic {
            id: bid.id,
            auction_id: bid.auction_id,
            bid_amount: bid.bid_amount,
            bidder_name: mask_bidder_name(&bid.bidder_name),
            created_at: bid.created_at,
        }
    }
}

impl From<Bid> for BidPublic {
    fn from(bid: Bid) -> Self {
        BidPublic::from(&bid)
    }
}

/// 경매 + 입찰 요약 응답
#[derive(Debug, Serialize)]
pub struct AuctionWithBids {
    #[serde(flatten)]
    pub auction: Auction,
    pub highest_bid: Option<BidPublic>,
    pub bid_count: i64,
}

/// 입찰자 이름 마스킹
/// 공백 단위로 나눈 각 부분의 첫 글자와 마지막 글자만 남긴다.
pub fn mask_bidder_name(name: &str) -> String {
    name.trim()
        .split_whitespace()
        .map(|part| {
            let chars: Vec<char> = part.chars().collect();
            if chars.len() <= 2 {
                format!("{}*", chars[0])
            } else {
                let middle = "*".repeat(chars.len() - 2);
                format!("{}{}{}", chars[0], middle, chars[chars.len() - 1])
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
