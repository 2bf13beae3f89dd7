//! Event bus for independently initialised editor subsystems.
//!
//! Events are typed by an explicit [`EventType`] tree. Publishing an event notifies
//! every handler registered on its type and on each ancestor type, each handler as a
//! separate [`Domain::Background`](atelier_worker::Domain::Background) task, so
//! handlers for one event are not ordered relative to each other.
//!
//! On top of the bus, [`JoinRegistration`]s express "run this once all of these
//! things have happened": see [`EventBus::on_event`] and [`EventBus::on_all_of`].
//!
//! # Retry until consumed
//!
//! Event types marked [`EventType::consumable`] are redelivered after every handler
//! of a delivery round has returned, for as long as no handler calls
//! [`Event::consume`]. There is no retry limit: an event that nobody ever consumes is
//! redelivered forever. [`EventBusConfig::redelivery_delay`] spaces the rounds out but
//! never stops them.

mod bus;
mod event;
mod event_type;
mod handler;
mod join;

pub use bus::{EventBus, EventBusConfig, WeakEventBus};
pub use event::Event;
pub use event_type::{EventType, Lineage};
pub use handler::Handler;
pub use join::{AllOfJoinBuilder, JoinRegistration, SingleJoinBuilder};
