//! HTTP 请求和响应的数据传输对象

pub mod request;
pub mod response;

pub use request::{AdjustRequest, AmountRequest, HistoryParams};
pub use response::{ApiResponse, PageResponse, ReceiptDto};
