//! 数据模型

mod enums;
mod operation;

pub use enums::*;
pub use operation::*;
