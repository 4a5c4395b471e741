//! Domain model: entities, value objects, the tenor policy and the storage
//! ports the application layer depends on.

pub mod customer;
pub mod limit;
pub mod money;
pub mod ports;
pub mod tenor;
pub mod transaction;
