//! One-line wrappers for the common commands.
//!
//! Single-value lookups return `Ok(None)` when the key or field is absent;
//! every other failure is passed through unchanged.

use super::Connection;
use crate::command::{Command, ToArg};
use crate::error::{ErrorKind, Result};
use bytes::Bytes;

impl Connection {
    async fn query(&mut self, mut cmd: Command) -> Result<Command> {
        self.execute(&mut cmd).await?;
        Ok(cmd)
    }

    async fn query_int(&mut self, cmd: Command) -> Result<i64> {
        Ok(self.query(cmd).await?.status())
    }

    async fn query_list(&mut self, cmd: Command) -> Result<Vec<Bytes>> {
        Ok(self.query(cmd).await?.take_data())
    }

    async fn query_value(&mut self, cmd: Command) -> Result<Option<Bytes>> {
        match self.query(cmd).await {
            Ok(mut cmd) => Ok(cmd.take_data().into_iter().next()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        self.query(Command::new("PING")).await.map(drop)
    }

    pub async fn select(&mut self, index: u32) -> Result<()> {
        self.query(Command::new("SELECT").arg(index)).await.map(drop)
    }

    /// Returns the number of keys removed.
    pub async fn del(&mut self, key: impl ToArg) -> Result<i64> {
        self.query_int(Command::new("DEL").arg(key)).await
    }

    /// Remaining time to live in seconds; `-1` without expiry, `-2` if absent.
    pub async fn ttl(&mut self, key: impl ToArg) -> Result<i64> {
        self.query_int(Command::new("TTL").arg(key)).await
    }

    pub async fn expire(&mut self, key: impl ToArg, seconds: u64) -> Result<bool> {
        Ok(self.query_int(Command::new("EXPIRE").arg(key).arg(seconds)).await? == 1)
    }

    pub async fn get(&mut self, key: impl ToArg) -> Result<Option<Bytes>> {
        self.query_value(Command::new("GET").arg(key)).await
    }

    /// Sets `key`; a non-zero `ttl_seconds` uses SETEX.
    pub async fn set(&mut self, key: impl ToArg, value: impl ToArg, ttl_seconds: u64) -> Result<()> {
        let cmd = if ttl_seconds > 0 {
            Command::new("SETEX").arg(key).arg(ttl_seconds).arg(value)
        } else {
            Command::new("SET").arg(key).arg(value)
        };
        self.query(cmd).await.map(drop)
    }

    pub async fn incr(&mut self, key: impl ToArg, by: i64) -> Result<i64> {
        self.query_int(Command::new("INCRBY").arg(key).arg(by)).await
    }

    pub async fn decr(&mut self, key: impl ToArg, by: i64) -> Result<i64> {
        self.query_int(Command::new("DECRBY").arg(key).arg(by)).await
    }

    pub async fn keys(&mut self, pattern: impl ToArg) -> Result<Vec<Bytes>> {
        self.query_list(Command::new("KEYS").arg(pattern)).await
    }

    pub async fn hget(&mut self, key: impl ToArg, field: impl ToArg) -> Result<Option<Bytes>> {
        self.query_value(Command::new("HGET").arg(key).arg(field)).await
    }

    pub async fn hset(&mut self, key: impl ToArg, field: impl ToArg, value: impl ToArg) -> Result<i64> {
        self.query_int(Command::new("HSET").arg(key).arg(field).arg(value))
            .await
    }

    pub async fn hdel(&mut self, key: impl ToArg, field: impl ToArg) -> Result<i64> {
        self.query_int(Command::new("HDEL").arg(key).arg(field)).await
    }

    pub async fn hlen(&mut self, key: impl ToArg) -> Result<i64> {
        self.query_int(Command::new("HLEN").arg(key)).await
    }

    /// Same as [`lpop`](Self::lpop).
    pub async fn pop(&mut self, key: impl ToArg) -> Result<Option<Bytes>> {
        self.lpop(key).await
    }

    pub async fn lpop(&mut self, key: impl ToArg) -> Result<Option<Bytes>> {
        self.query_value(Command::new("LPOP").arg(key)).await
    }

    pub async fn rpop(&mut self, key: impl ToArg) -> Result<Option<Bytes>> {
        self.query_value(Command::new("RPOP").arg(key)).await
    }

    /// Same as [`rpush`](Self::rpush).
    pub async fn push(&mut self, key: impl ToArg, value: impl ToArg) -> Result<i64> {
        self.rpush(key, value).await
    }

    /// Returns the list length after the push.
    pub async fn lpush(&mut self, key: impl ToArg, value: impl ToArg) -> Result<i64> {
        self.query_int(Command::new("LPUSH").arg(key).arg(value)).await
    }

    pub async fn rpush(&mut self, key: impl ToArg, value: impl ToArg) -> Result<i64> {
        self.query_int(Command::new("RPUSH").arg(key).arg(value)).await
    }

    pub async fn lrange(&mut self, key: impl ToArg, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        self.query_list(Command::new("LRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    pub async fn zadd(&mut self, key: impl ToArg, member: impl ToArg, score: f64) -> Result<i64> {
        self.query_int(Command::new("ZADD").arg(key).arg(score).arg(member))
            .await
    }

    pub async fn zrem(&mut self, key: impl ToArg, member: impl ToArg) -> Result<i64> {
        self.query_int(Command::new("ZREM").arg(key).arg(member)).await
    }

    /// Members in rank order. With `with_scores` each member is followed by
    /// its score.
    pub async fn zrange(
        &mut self,
        key: impl ToArg,
        start: i64,
        stop: i64,
        with_scores: bool,
    ) -> Result<Vec<Bytes>> {
        let mut cmd = Command::new("ZRANGE").arg(key).arg(start).arg(stop);
        if with_scores {
            cmd.push("WITHSCORES");
        }
        self.query_list(cmd).await
    }
}
