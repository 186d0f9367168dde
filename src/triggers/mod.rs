//! Broker consumers driving the asynchronous delivery paths.
//!
//! Each consumer polls one topic in a lease/ack loop. Messages that cannot
//! be decoded or fail validation are poison: they are logged and
//! acknowledged so they never block the topic. Failures of the work itself
//! return the message to the topic head for redelivery.

mod notify_command;
mod subscribe_command;
mod subscribed_event;

pub use notify_command::NotifyCommandConsumer;
pub use subscribe_command::SubscribeCommandConsumer;
pub use subscribed_event::SubscribedEventConsumer;
