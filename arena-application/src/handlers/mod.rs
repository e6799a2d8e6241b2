//! 事件处理器：报名流程的下游副作用
mod award_coins;
mod notify;

pub use award_coins::{AWARD_COINS, AwardCoinsHandler};
pub use notify::{SEND_NOTIFICATION, SendNotificationHandler};
