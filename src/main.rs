// region:    --- Imports
use crate::database::DatabaseManager;
use crate::event_store::EventConsumer;
use crate::message_broker::EVENTS_TOPIC;
use crate::query::read_model::AuctionReadModel;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use message_broker::KafkaManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod auction;
mod bidding;
mod database;
mod event_store;
mod handlers;
mod message_broker;
mod query;
mod scheduler;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::new().await);

    // 데이터베이스 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // Kafka 매니저 생성 및 초기화
    let kafka_manager = Arc::new(KafkaManager::new());
    if let Err(e) = kafka_manager.initialize().await {
        error!("{:<12} --> Kafka 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> Kafka 초기화 성공", "Main");

    // 토픽 생성
    kafka_manager.create_topic(EVENTS_TOPIC, 5, 1).await?;

    // 활성 경매 읽기 모델 생성 및 초기 적재
    let read_model = Arc::new(AuctionReadModel::new(Arc::clone(&db_manager)));
    if let Err(e) = read_model.load().await {
        error!("{:<12} --> 읽기 모델 초기 적재 실패: {:?}", "Main", e);
    }

    // 입찰 이벤트 소비 시작 (프로젝션 + 읽기 모델 갱신)
    let event_consumer = EventConsumer::new(
        db_manager.get_pool(),
        kafka_manager.get_consumer(),
        Arc::clone(&read_model),
    );
    let _consumer_handle = event_consumer.spawn();

    // 경매 마감 스케줄러 시작
    let scheduler = scheduler::AuctionScheduler::new(db_manager.get_pool());
    scheduler.start().await;

    // 입찰 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let routes_all = Router::new()
        .route("/bid", post(handlers::handle_bid))
        .route("/auction/active", get(handlers::handle_get_active_auction))
        .route(
            "/auction/active/refresh",
            post(handlers::handle_refresh_active_auction),
        )
        .route(
            "/auction/ended/latest",
            get(handlers::handle_get_ended_auction),
        )
        .route("/auction/:id", get(handlers::handle_get_auction))
        .route(
            "/auction/:id/highest-bid",
            get(handlers::handle_get_highest_bid),
        )
        .route("/auction/:id/bids", get(handlers::handle_get_bid_history))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 20)) // 동시성을 위한 바디 사이즈 증가(20MB)
        .with_state((db_manager, kafka_manager.get_producer(), read_model));

    // 리스너 생성(로컬 호스트의 3000번 포트를 사용)
    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr().unwrap()
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
