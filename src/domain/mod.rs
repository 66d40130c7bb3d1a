//! Domain layer: value objects, the scheduled-order lifecycle and the ports
//! the application layer talks through.

pub mod bill;
pub mod cart;
pub mod catalog;
pub mod money;
pub mod notification;
pub mod order;
pub mod ports;
pub mod scheduled_order;
