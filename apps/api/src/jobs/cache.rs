//! Redis cache for job search results. Every failure degrades to a miss.

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

pub const TTL_SECS: u64 = 3600;

pub fn search_key(query: &str, location: Option<&str>) -> String {
    format!("jobs:{}:{}", query, location.unwrap_or_default())
}

pub async fn get<T: DeserializeOwned>(redis: &redis::Client, key: &str) -> Option<T> {
    let raw: Option<String> = match redis.get_multiplexed_async_connection().await {
        Ok(mut conn) => match redis::cmd("GET").arg(key).query_async(&mut conn).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Job cache read failed for {key}: {e}");
                return None;
            }
        },
        Err(e) => {
            warn!("Job cache unavailable: {e}");
            return None;
        }
    };

    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(value) => {
            debug!("Job cache hit for {key}");
            Some(value)
        }
        Err(e) => {
            warn!("Discarding unreadable cache entry {key}: {e}");
            None
        }
    }
}

pub async fn put<T: Serialize>(redis: &redis::Client, key: &str, value: &T) {
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(e) => {
            warn!("Could not serialize job cache entry {key}: {e}");
            return;
        }
    };
    let result = async {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("EX")
            .arg(TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await
    }
    .await;
    if let Err(e) = result {
        warn!("Job cache write failed for {key}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_key_layout() {
        assert_eq!(search_key("rust", Some("Berlin")), "jobs:rust:Berlin");
        assert_eq!(search_key("rust", None), "jobs:rust:");
    }
}
