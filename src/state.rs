use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::ai::AiResponder;
use crate::services::intent::Classifier;
use crate::services::notify::NotificationService;
use crate::services::script::ConversationScript;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub ai: AiResponder,
    pub notifier: Box<dyn NotificationService>,
    pub classifier: Box<dyn Classifier>,
    pub script: ConversationScript,
}
