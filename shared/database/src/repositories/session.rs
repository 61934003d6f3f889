//! Session Repository
//!
//! Redis-backed session tokens. Each session is an opaque token mapping to
//! a user id, expiring after the configured TTL.

use uuid::Uuid;

use crate::redis::RedisPool;
use stratus_utils::{NotifyError, NotifyResult};

#[derive(Clone)]
pub struct SessionRepository {
    redis: RedisPool,
}

impl SessionRepository {
    pub fn new(redis: RedisPool) -> Self {
        Self { redis }
    }

    pub async fn create(&self, token: &str, user_id: Uuid, ttl_seconds: u64) -> NotifyResult<()> {
        let mut conn = self.redis.clone();
        let _: () = redis::cmd("SET")
            .arg(session_key(token))
            .arg(user_id.to_string())
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// The user id behind a session token, or `None` when the token is
    /// unknown or expired.
    pub async fn find_user_id(&self, token: &str) -> NotifyResult<Option<Uuid>> {
        let mut conn = self.redis.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(session_key(token))
            .query_async(&mut conn)
            .await?;

        match value {
            Some(raw) => {
                let user_id = raw
                    .parse::<Uuid>()
                    .map_err(|e| NotifyError::internal(format!("corrupt session entry: {}", e)))?;
                Ok(Some(user_id))
            }
            None => Ok(None),
        }
    }

    pub async fn delete(&self, token: &str) -> NotifyResult<()> {
        let mut conn = self.redis.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(session_key(token))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}
