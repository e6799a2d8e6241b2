//! 报名上下文：聚合与服务
mod aggregate;
mod service;

pub use aggregate::{
    EVENT_PAYMENT_VERIFIED, EVENT_REGISTRATION_CREATED, Registration, RegistrationCommand,
    RegistrationEvent, RegistrationState,
};
pub use service::RegistrationService;
