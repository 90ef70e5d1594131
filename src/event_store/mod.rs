// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::bidding::model::Bid;
use crate::message_broker::{KafkaConsumer, KafkaProducer, EVENTS_TOPIC};
use crate::query::read_model::AuctionReadModel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Event Model
/// 이벤트 저장소에 저장되는 이벤트 모델
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Event {
    pub id: i64,
    pub aggregate_id: i64,
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: i64,
}
// endregion: --- Event Model

// region:    --- Event Store

#[derive(Error, Debug)]
pub enum EventStoreError {
    /// 동일 버전에 다른 이벤트가 먼저 기록됨. 호출자가 하한을 다시 읽고 재시도한다.
    #[error("버전 충돌")]
    VersionConflict,
    #[error("이벤트 저장 실패: {0}")]
    Database(#[from] sqlx::Error),
}

/// 이벤트 저장소 트레이트
#[async_trait]
pub trait EventStore {
    /// 이벤트를 조건부로 저장하고 알림 토픽에 발행한다.
    /// 저장된 이벤트 id를 돌려준다.
    async fn append_and_publish_event(&self, event: Event) -> Result<i64, EventStoreError>;
}

/// 이벤트 저장소 구현체
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
    kafka_producer: Arc<KafkaProducer>,
}

impl PostgresEventStore {
    pub fn new(pool: Arc<PgPool>, kafka_producer: Arc<KafkaProducer>) -> Self {
        Self {
            pool,
            kafka_producer,
        }
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append_and_publish_event(&self, mut event: Event) -> Result<i64, EventStoreError> {
        // (aggregate_id, version) 유니크 제약이 경매별 직렬화 지점이다.
        // 같은 버전을 노린 동시 기록 중 정확히 하나만 살아남는다.
        let event_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (aggregate_id, event_type, data, timestamp, version)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_id, version) DO NOTHING
            RETURNING id",
        )
        .bind(event.aggregate_id)
        .bind(&event.event_type)
        .bind(&event.data)
        .bind(event.timestamp)
        .bind(event.version)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or(EventStoreError::VersionConflict)?;

        event.id = event_id;

        // 같은 경매의 이벤트가 같은 파티션에 실리도록 aggregate_id를 키로 쓴다.
        // 저장이 끝난 뒤의 발행 실패는 수락 결과를 뒤집지 않는다. 이벤트 로그가
        // 기준이고, 프로젝션과 읽기 모델은 재적재로 따라잡는다.
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("{:<12} --> 이벤트 직렬화 실패: {:?}", "EventStore", e);
                return Ok(event_id);
            }
        };
        if let Err(e) = self
            .kafka_producer
            .send_message(EVENTS_TOPIC, &event.aggregate_id.to_string(), &payload)
            .await
        {
            error!(
                "{:<12} --> 이벤트 발행 실패 (id: {}): {}",
                "EventStore", event_id, e
            );
        }

        Ok(event_id)
    }
}

// endregion: --- Event Store

// region:    --- Event Consumer

/// 알림 스트림 소비자
/// 수신한 입찰 이벤트를 입찰 프로젝션에 반영하고 읽기 모델에 전달한다.
pub struct EventConsumer {
    pool: Arc<PgPool>,
    kafka_consumer: Arc<KafkaConsumer>,
    read_model: Arc<AuctionReadModel>,
}

/// 소비 태스크 핸들. 구독을 정리할 때 stop()을 호출한다.
pub struct EventConsumerHandle {
    task: tokio::task::JoinHandle<()>,
}

impl EventConsumerHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl EventConsumer {
    pub fn new(
        pool: Arc<PgPool>,
        kafka_consumer: Arc<KafkaConsumer>,
        read_model: Arc<AuctionReadModel>,
    ) -> Self {
        EventConsumer {
            pool,
            kafka_consumer,
            read_model,
        }
    }

    /// 소비 루프를 백그라운드 태스크로 시작
    pub fn spawn(self) -> EventConsumerHandle {
        EventConsumerHandle {
            task: tokio::spawn(async move { self.run().await }),
        }
    }

    async fn run(&self) {
        if let Err(e) = self.kafka_consumer.subscribe(EVENTS_TOPIC) {
            error!("{:<12} --> 토픽 구독 실패: {}", "EventConsume", e);
            return;
        }
        info!(
            "{:<12} --> 이벤트 소비 시작: topic={}",
            "EventConsume", EVENTS_TOPIC
        );

        loop {
            match self.kafka_consumer.recv_event().await {
                Ok(event) => {
                    if let Err(e) = self.process_event(event).await {
                        error!("{:<12} --> 이벤트 처리 오류: {:?}", "EventConsume", e);
                    }
                }
                Err(e) => {
                    // 스트림이 끊기면 빠진 이벤트를 개별 보정할 수 없으므로
                    // 읽기 모델을 통째로 재적재한다.
                    error!("{:<12} --> 스트림 수신 오류: {}", "EventConsume", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    self.read_model.refresh().await;
                }
            }
        }
    }

    /// 이벤트 처리
    async fn process_event(&self, event: Event) -> Result<(), sqlx::Error> {
        match event.event_type.as_str() {
            "BidPlaced" => self.handle_bid_placed(&event).await,
            _ => {
                warn!(
                    "{:<12} --> 알 수 없는 이벤트 타입: {}",
                    "EventConsume", event.event_type
                );
                Ok(())
            }
        }
    }

    /// 입찰 이벤트 처리
    async fn handle_bid_placed(&self, event: &Event) -> Result<(), sqlx::Error> {
        let bid_event: AuctionEvent = serde_json::from_value(event.data.clone())
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        let AuctionEvent::BidPlaced {
            auction_id,
            bid_amount,
            bidder_name,
            bidder_phone,
            timestamp,
        } = bid_event;

        // 입찰 id는 이벤트 id와 같다. 최소 1회 전달이므로 중복 수신은
        // ON CONFLICT로 걸러진다.
        sqlx::query(
            "INSERT INTO bids (id, auction_id, bid_amount, bidder_name, bidder_phone, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING",
        )
        .bind(event.id)
        .bind(auction_id)
        .bind(bid_amount)
        .bind(&bidder_name)
        .bind(&bidder_phone)
        .bind(timestamp)
        .execute(&*self.pool)
        .await?;

        info!(
            "{:<12} --> 입찰 프로젝션 반영: 경매 {} 금액 {}",
            "EventConsume", auction_id, bid_amount
        );

        self.read_model
            .apply_bid_created(Bid {
                id: event.id,
                auction_id,
                bid_amount,
                bidder_name,
                bidder_phone,
                is_winner: false,
                created_at: timestamp,
            })
            .await;

        Ok(())
    }
}

// endregion: --- Event Consumer
