//! Outbound email pipeline
//!
//! - `template`: `{{var}}` rendering of templates against a contact
//! - `sender`: provider and development senders
//! - `dispatcher`: claims a queued row, delivers it, records the outcome
//! - `queue`: task-queue hand-off with awaitable deliveries
//! - `tracking`: open tracking

mod dispatcher;
mod queue;
mod sender;
mod template;
mod tracking;

pub use dispatcher::{MailDispatcher, SendOutcome};
pub use queue::{wait_all, Delivery, MailQueue};
pub use sender::{
    sender_from_config, with_tracking_pixel, EmailSender, LogSender, OutgoingEmail, ResendSender,
    SendError,
};
pub use template::{RenderedEmail, TemplateRenderer, VariableRenderer};
pub use tracking::{record_open, TRACKING_PIXEL};
