pub mod calendar;
pub mod client;
pub mod config;
pub mod contacts;
pub mod executor;
pub mod logging;
pub mod mail;
pub mod recipes;
pub mod session;
pub mod strategy;

pub use calendar::{Calendar, CalendarApi, CalendarInfo, NewEvent};
pub use client::JmapClient;
pub use config::ClientConfig;
pub use contacts::{Contacts, ContactsApi};
pub use executor::BatchExecutor;
pub use mail::{
    AccountSummary, BodyPart, Email, EmailAddress, Identity, Mail, Mailbox, SearchFilter,
    SendEmail, SentEmail, Thread,
};
pub use session::{Session, SessionCache};
pub use strategy::{first_supported, Candidate};

pub use jmap_core::{JmapError, Rejection, RejectionKind, Result};
