use crate::status::StatusLog;
use crate::storage::store::ConfigStore;

#[derive(Clone)]
pub struct AppState {
    pub store: ConfigStore,
    pub status: StatusLog,
}
