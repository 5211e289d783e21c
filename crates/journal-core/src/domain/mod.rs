//! 매매일지 분석을 위한 도메인 모델.

mod filter;
mod normalize;
mod pnl;
mod raw;
mod trade;

pub use filter::*;
pub use normalize::*;
pub use pnl::*;
pub use raw::*;
pub use trade::*;
