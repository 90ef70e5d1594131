/// 현재 활성 경매 조회 (가장 최근 생성분)
pub const GET_ACTIVE_AUCTION: &str = r#"
    SELECT id, title, description, min_bid_amount, end_time, is_active, image_urls, winner_id, created_at, updated_at
    FROM auctions
    WHERE is_active = TRUE
    ORDER BY created_at DESC
    LIMIT 1
"#;

/// 경매 단건 조회
pub const GET_AUCTION: &str = r#"
    SELECT id, title, description, min_bid_amount, end_time, is_active, image_urls, winner_id, created_at, updated_at
    FROM auctions
    WHERE id = $1
"#;

/// 가장 최근에 종료된 경매 조회
pub const GET_LATEST_ENDED_AUCTION: &str = r#"
    SELECT id, title, description, min_bid_amount, end_time, is_active, image_urls, winner_id, created_at, updated_at
    FROM auctions
    WHERE is_active = FALSE OR end_time < now()
    ORDER BY end_time DESC
    LIMIT 1
"#;

/// 최고 입찰 조회
pub const GET_HIGHEST_BID: &str = r#"
    SELECT id, auction_id, bid_amount, bidder_name, bidder_phone, is_winner, created_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY bid_amount DESC, id ASC
    LIMIT 1
"#;

/// 입찰 수 조회
pub const GET_BID_COUNT: &str = "SELECT COUNT(*) FROM bids WHERE auction_id = $1";

/// 입찰 id 목록 조회 (읽기 모델 중복 제거용)
pub const GET_BID_IDS: &str = "SELECT id FROM bids WHERE auction_id = $1";

/// 입찰 이력 조회
pub const GET_BID_HISTORY: &str = r#"
    SELECT id, auction_id, bid_amount, bidder_name, bidder_phone, is_winner, created_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY created_at DESC, id DESC
"#;

/// 경매의 현재 이벤트 버전과 낙찰 하한 계산용 최고 수락 금액 조회
/// 프로젝션이 아니라 이벤트 로그를 기준으로 하므로 컨슈머 지연과 무관하게 정확하다.
pub const GET_AUCTION_FLOOR: &str = r#"
    SELECT COALESCE(MAX(version), 0) AS version,
           MAX((data -> 'BidPlaced' ->> 'bid_amount')::BIGINT) AS highest_amount
    FROM events
    WHERE aggregate_id = $1
"#;
