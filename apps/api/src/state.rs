use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::collab::hub::CollabHub;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::mailer::Mailer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Rate-limit counters and the job search cache.
    pub redis: RedisClient,
    pub s3: S3Client,
    pub llm: LlmClient,
    /// Plain HTTP client for OAuth code exchange.
    pub http: reqwest::Client,
    pub config: Config,
    pub mailer: Arc<dyn Mailer>,
    /// Collaboration rooms, shared between the socket endpoint and REST handlers.
    pub hub: CollabHub,
}

#[cfg(test)]
impl AppState {
    /// State whose pool, Redis and S3 clients connect lazily, so routes that
    /// reject before touching a backend can be exercised without one.
    pub fn for_tests() -> Self {
        let config = Config::for_tests();
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        Self::with_test_pool(db)
    }

    /// Same as `for_tests`, but backed by a live pool such as the one
    /// `#[sqlx::test]` hands out.
    pub fn with_test_pool(db: PgPool) -> Self {
        let config = Config::for_tests();
        let redis = RedisClient::open(config.redis_url.clone()).unwrap();
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .endpoint_url(&config.s3_endpoint)
            .build();
        AppState {
            db,
            redis,
            s3: S3Client::from_conf(s3_config),
            llm: LlmClient::new(config.anthropic_api_key.clone()).unwrap(),
            http: reqwest::Client::new(),
            config,
            mailer: Arc::new(crate::mailer::LogMailer),
            hub: CollabHub::default(),
        }
    }
}
