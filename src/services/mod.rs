pub mod events;
pub mod lifecycle;
pub mod loyalty;
pub mod queue;
pub mod quote;
pub mod scheduling;
