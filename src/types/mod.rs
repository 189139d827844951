pub mod ids;
pub mod launch_candidate;
pub mod notification;
pub mod opportunity;
pub mod position;
pub mod strategy;
pub mod trade_job;
pub mod trigger;
pub mod user;
pub mod wallet;

pub use ids::*;
pub use launch_candidate::*;
pub use notification::*;
pub use opportunity::*;
pub use position::*;
pub use strategy::*;
pub use trade_job::*;
pub use trigger::*;
pub use user::*;
pub use wallet::*;
