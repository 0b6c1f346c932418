//! Order records, status tables and the state machine.

mod events;
mod model;
mod state;
mod state_machine;

pub use events::{OrderEvent, PaymentSucceededData};
pub use model::{
    DEFAULT_CHANNEL, Order, OrderLineItem, OrderNote, PaymentMethod, StageTimestamps,
};
pub use state::{OrderStatus, PaymentStatus, UnknownStatus};
pub use state_machine::{
    OrderStateMachine, StatusPathPolicy, check_payment_transition, check_status_transition,
};
