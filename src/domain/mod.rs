//! Domain layer: value objects, entities, and the ports every collaborator is
//! reached through.

pub mod budget;
pub mod compliance;
pub mod document;
pub mod events;
pub mod money;
pub mod party;
pub mod payment;
pub mod ports;
pub mod work_item;
