use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::services::booking_builder::BookingRequestBuilder;
use crate::services::deadline::{Clock, DeadlineEvent, DeadlineHandle};
use crate::services::notify::Notifier;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub notifier: Box<dyn Notifier>,
    /// In-progress booking wizards, keyed by draft id. Never persisted.
    pub drafts: Mutex<HashMap<String, BookingRequestBuilder>>,
    /// One running countdown per pending appointment.
    pub monitors: Mutex<HashMap<String, DeadlineHandle>>,
    pub deadline_tx: broadcast::Sender<DeadlineEvent>,
}
