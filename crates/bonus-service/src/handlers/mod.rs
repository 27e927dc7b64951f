//! HTTP 处理器

pub mod bonus;
pub mod health;
