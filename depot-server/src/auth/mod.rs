//! 认证模块：JWT 令牌、密码哈希、请求中间件

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtService};
pub use middleware::require_auth;
