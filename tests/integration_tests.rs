use charity_auction_service::bidding::commands::MIN_INCREMENT;
use charity_auction_service::bidding::model::Auction;
use charity_auction_service::database::DatabaseManager;
use charity_auction_service::query;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

const BASE_URL: &str = "http://localhost:3000";

/// 트레이싱 초기화
fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 데이터베이스 매니저 설정
async fn setup() -> Arc<DatabaseManager> {
    Arc::new(DatabaseManager::new().await)
}

/// 테스트용 경매 생성
async fn create_test_auction(
    db_manager: &DatabaseManager,
    title: String,
    min_bid_amount: i64,
    end_time: DateTime<Utc>,
) -> Auction {
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(
                    "INSERT INTO auctions (title, description, min_bid_amount, end_time, is_active)
                     VALUES ($1, $2, $3, $4, TRUE)
                     RETURNING id, title, description, min_bid_amount, end_time, is_active, image_urls, winner_id, created_at, updated_at",
                )
                .bind(&title)
                .bind("입찰 기능 테스트를 위한 경매입니다.")
                .bind(min_bid_amount)
                .bind(end_time)
                .fetch_one(&mut **tx)
                .await
            })
        })
        .await
        .unwrap()
}

/// 입찰 요청 전송
async fn post_bid(
    client: &Client,
    auction_id: i64,
    bidder_name: &str,
    bid_amount: i64,
) -> (StatusCode, Value) {
    let bid_data = json!({
        "auction_id": auction_id,
        "bidder_name": bidder_name,
        "bidder_phone": "0532 123 45 67",
        "bid_amount": bid_amount
    });

    let response = client
        .post(format!("{}/bid", BASE_URL))
        .json(&bid_data)
        .send()
        .await
        .expect("Failed to send request");

    let status = response.status();
    let body: Value = response.json().await.expect("Failed to parse body");
    (status, body)
}

/// 시작가 입찰 테스트: 첫 입찰은 시작가와 같으면 수락된다
#[tokio::test]
async fn test_place_bid_at_floor() {
    let db_manager = setup().await;
    let client = Client::new();

    let auction = create_test_auction(
        &db_manager,
        "시작가 입찰 테스트 경매".to_string(),
        500,
        Utc::now() + Duration::hours(2),
    )
    .await;

    let (status, body) = post_bid(&client, auction.id, "Ali Can", 500).await;
    assert!(status.is_success(), "응답 본문: {:?}", body);

    // 이벤트 처리 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    let highest = query::handlers::get_highest_bid(&db_manager, auction.id)
        .await
        .unwrap()
        .expect("최고 입찰이 있어야 함");
    assert_eq!(highest.bid_amount, 500);

    let count = query::handlers::get_bid_count(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

/// 하한 미달 거절 테스트: 응답에 현재 하한이 실려야 한다
#[tokio::test]
async fn test_bid_below_floor_rejected() {
    let db_manager = setup().await;
    let client = Client::new();

    let auction = create_test_auction(
        &db_manager,
        "하한 미달 테스트 경매".to_string(),
        500,
        Utc::now() + Duration::hours(2),
    )
    .await;

    let (status, body) = post_bid(&client, auction.id, "Ali Can", 499).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BELOW_FLOOR");
    assert_eq!(body["floor"], 500);
}

/// 최소 증가 단위 테스트: 두 번째 입찰부터 하한은 최고가 + 100
#[tokio::test]
async fn test_min_increment_applies_from_first_bid() {
    let db_manager = setup().await;
    let client = Client::new();

    let auction = create_test_auction(
        &db_manager,
        "최소 증가 단위 테스트 경매".to_string(),
        500,
        Utc::now() + Duration::hours(2),
    )
    .await;

    let (status, body) = post_bid(&client, auction.id, "Ali Can", 500).await;
    assert!(status.is_success(), "응답 본문: {:?}", body);

    // 550은 하한 600에 걸려 거절된다
    let (status, body) = post_bid(&client, auction.id, "Ayşe Yılmaz", 550).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BELOW_FLOOR");
    assert_eq!(body["floor"], 600);

    let (status, body) = post_bid(&client, auction.id, "Ayşe Yılmaz", 600).await;
    assert!(status.is_success(), "응답 본문: {:?}", body);

    // 이벤트 처리 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    let highest = query::handlers::get_highest_bid(&db_manager, auction.id)
        .await
        .unwrap()
        .expect("최고 입찰이 있어야 함");
    assert_eq!(highest.bid_amount, 600);

    let count = query::handlers::get_bid_count(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

/// 입력값 검증 테스트
#[tokio::test]
async fn test_bid_validation_rejected() {
    let db_manager = setup().await;
    let client = Client::new();

    let auction = create_test_auction(
        &db_manager,
        "입력값 검증 테스트 경매".to_string(),
        500,
        Utc::now() + Duration::hours(2),
    )
    .await;

    // 이름이 너무 짧은 경우
    let (status, body) = post_bid(&client, auction.id, "A", 500).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    // 전화번호 형식이 잘못된 경우
    let bid_data = json!({
        "auction_id": auction.id,
        "bidder_name": "Ali Can",
        "bidder_phone": "not-a-phone!",
        "bid_amount": 500
    });
    let response = client
        .post(format!("{}/bid", BASE_URL))
        .json(&bid_data)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// 동시성 입찰 테스트
/// 동시 제출 하에서도 수락 이력이 100 단위 이상 엄격히 증가해야 한다
#[tokio::test]
async fn test_concurrent_bidding() {
    init_tracing();

    let db_manager = setup().await;

    let auction = create_test_auction(
        &db_manager,
        "동시성 입찰 테스트 경매".to_string(),
        10000,
        Utc::now() + Duration::hours(2),
    )
    .await;

    // 50개의 동시 입찰 생성
    let mut handles = vec![];
    for i in 1..=50i64 {
        let client = Client::new();
        let bid_amount = auction.min_bid_amount + i * 1000;
        let auction_id = auction.id;

        let handle = tokio::spawn(async move {
            post_bid(&client, auction_id, "Ali Can", bid_amount).await
        });
        handles.push(handle);
    }

    // 모든 입찰 처리 대기 및 결과 확인
    let mut successful_bids = 0;
    let mut failed_bids = 0;
    for handle in handles {
        let (status, body) = handle.await.unwrap();

        if status == StatusCode::OK {
            successful_bids += 1;
        } else if status == StatusCode::BAD_REQUEST {
            assert_eq!(body["code"], "BELOW_FLOOR", "예상 밖 거절: {:?}", body);
            failed_bids += 1;
        } else {
            panic!("예상 밖 응답: {} {:?}", status, body);
        }
    }

    info!(
        "성공한 입찰 수: {}, 실패한 입찰 수: {}",
        successful_bids, failed_bids
    );
    assert_eq!(successful_bids + failed_bids, 50);
    assert!(successful_bids >= 1);

    // 이벤트 처리 대기
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    // 최고 금액 입찰은 어떤 순서로 도착해도 항상 수락된다
    let highest = query::handlers::get_highest_bid(&db_manager, auction.id)
        .await
        .unwrap()
        .expect("최고 입찰이 있어야 함");
    assert_eq!(highest.bid_amount, auction.min_bid_amount + 50 * 1000);

    // 입찰 수는 수락된 입찰 수와 같다
    let count = query::handlers::get_bid_count(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(count, successful_bids);

    // 수락 이력은 삽입 순서(id 순)대로 100 단위 이상 엄격히 증가한다
    let mut history = query::handlers::get_bid_history(&db_manager, auction.id)
        .await
        .unwrap();
    history.sort_by_key(|bid| bid.id);
    for pair in history.windows(2) {
        assert!(
            pair[1].bid_amount >= pair[0].bid_amount + MIN_INCREMENT,
            "단조 증가 위반: {} 다음에 {}",
            pair[0].bid_amount,
            pair[1].bid_amount
        );
    }
}

/// 경매 사이클 테스트: 종료 시각이 지나면 비활성 전환 및 낙찰 확정
#[tokio::test]
async fn test_auction_lifecycle() {
    let db_manager = setup().await;
    let client = Client::new();

    let auction = create_test_auction(
        &db_manager,
        "경매 사이클 테스트 경매".to_string(),
        500,
        Utc::now() + Duration::seconds(5),
    )
    .await;

    let (status, body) = post_bid(&client, auction.id, "Ali Can", 500).await;
    assert!(status.is_success(), "응답 본문: {:?}", body);

    // 이벤트 처리 및 경매 종료 대기
    tokio::time::sleep(tokio::time::Duration::from_secs(7)).await;

    // 종료 후 상태 확인
    let ended = query::handlers::get_auction(&db_manager, auction.id)
        .await
        .unwrap();
    assert!(!ended.is_active);

    let winner = query::handlers::get_highest_bid(&db_manager, auction.id)
        .await
        .unwrap()
        .expect("낙찰 입찰이 있어야 함");
    assert!(winner.is_winner);
    assert_eq!(ended.winner_id, Some(winner.id));

    // 종료 후 입찰은 거절된다
    let (status, body) = post_bid(&client, auction.id, "Ayşe Yılmaz", 1000).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ALREADY_ENDED");

    // 종료 경매 조회 엔드포인트 확인
    let response = client
        .get(format!("{}/auction/ended/latest", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

/// 읽기 모델 스냅샷 테스트
#[tokio::test]
async fn test_active_auction_snapshot() {
    let db_manager = setup().await;
    let client = Client::new();

    let auction = create_test_auction(
        &db_manager,
        "읽기 모델 테스트 경매".to_string(),
        500,
        Utc::now() + Duration::hours(2),
    )
    .await;

    // 새로 만든 경매를 추적하도록 재적재
    let response = client
        .post(format!("{}/auction/active/refresh", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let (status, body) = post_bid(&client, auction.id, "Ali Can", 500).await;
    assert!(status.is_success(), "응답 본문: {:?}", body);

    // 알림 반영 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    let snapshot: Value = client
        .get(format!("{}/auction/active", BASE_URL))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse body");

    if snapshot["auction"]["id"] == auction.id {
        assert_eq!(snapshot["highest_bid"]["bid_amount"], 500);
        assert!(snapshot["bid_count"].as_i64().unwrap() >= 1);
        // 공개 스냅샷의 입찰자 이름은 마스킹되어 있다
        assert_eq!(snapshot["highest_bid"]["bidder_name"], "A*i C*n");
    }
}
