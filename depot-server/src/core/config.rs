//! 服务配置
//!
//! 所有配置项都可以通过环境变量覆盖：
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | DATABASE_URL | postgres://localhost/depot | PostgreSQL 连接串 |
//! | HTTP_PORT | 9000 | HTTP 服务端口 |
//! | CACHE_URL | redis://127.0.0.1:6379 | Redis 地址 |
//! | CACHE_PASSWORD | (空) | Redis 密码 |
//! | KAFKA_BROKERS | localhost:9092 | Kafka broker 列表（逗号分隔） |
//! | KAFKA_CONSUMER_GROUP | audit-consumer | 消费者组 |
//! | KAFKA_TOPIC | audit_logs | 审计主题 |
//! | AUDIT_FILTER | (空) | stdout 审计过滤关键字 |

/// 服务配置
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL 连接串
    pub database_url: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// Redis 地址
    pub cache_url: String,
    /// Redis 密码（为空表示无认证）
    pub cache_password: String,
    /// Kafka broker 列表
    pub kafka_brokers: Vec<String>,
    /// Kafka 消费者组
    pub kafka_consumer_group: String,
    /// 审计主题
    pub kafka_topic: String,
    /// stdout 审计过滤关键字（空串放行全部事件）
    pub audit_filter: String,
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/depot".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9000),
            cache_url: std::env::var("CACHE_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            cache_password: std::env::var("CACHE_PASSWORD").unwrap_or_default(),
            kafka_brokers: std::env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            kafka_consumer_group: std::env::var("KAFKA_CONSUMER_GROUP")
                .unwrap_or_else(|_| "audit-consumer".into()),
            kafka_topic: std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "audit_logs".into()),
            audit_filter: std::env::var("AUDIT_FILTER").unwrap_or_default(),
        }
    }

    /// Redis 连接 URL（带密码拼接）
    pub fn cache_connection_url(&self) -> String {
        if self.cache_password.is_empty() {
            return self.cache_url.clone();
        }
        // redis://host:port -> redis://:password@host:port
        match self.cache_url.split_once("://") {
            Some((scheme, rest)) => format!("{}://:{}@{}", scheme, self.cache_password, rest),
            None => format!("redis://:{}@{}", self.cache_password, self.cache_url),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_url_gets_password_spliced_in() {
        let config = Config {
            database_url: String::new(),
            http_port: 0,
            cache_url: "redis://cache:6379".into(),
            cache_password: "secret".into(),
            kafka_brokers: vec![],
            kafka_consumer_group: String::new(),
            kafka_topic: String::new(),
            audit_filter: String::new(),
        };
        assert_eq!(config.cache_connection_url(), "redis://:secret@cache:6379");
    }

    #[test]
    fn cache_url_unchanged_without_password() {
        let config = Config {
            database_url: String::new(),
            http_port: 0,
            cache_url: "redis://cache:6379".into(),
            cache_password: String::new(),
            kafka_brokers: vec![],
            kafka_consumer_group: String::new(),
            kafka_topic: String::new(),
            audit_filter: String::new(),
        };
        assert_eq!(config.cache_connection_url(), "redis://cache:6379");
    }
}
