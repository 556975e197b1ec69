//! Mission lifecycle engine.
//!
//! Each public operation runs as one store transaction on the blocking pool
//! and emits its events only after the commit succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;

use shopper_shared::clients::db::run_blocking;
use shopper_shared::errors::{AppError, AppResult, ErrorCode};
use shopper_shared::middleware::record_transition;

use crate::domain::review::RefusalPolicy;
use crate::domain::status::MissionStatus;
use crate::events::EventSink;
use crate::store::{MissionStore, MissionTx};

pub mod assignments;
pub mod auth_service;
pub mod missions;
pub mod reports;
pub mod token_service;
pub mod users;
pub mod views;


#[derive(Clone)]
pub struct MissionService {
    store: Arc<dyn MissionStore>,
    events: Arc<dyn EventSink>,
    policy: RefusalPolicy,
}

impl MissionService {
    pub fn new(store: Arc<dyn MissionStore>, events: Arc<dyn EventSink>, policy: RefusalPolicy) -> Self {
        Self { store, events, policy }
    }

    pub fn policy(&self) -> RefusalPolicy {
        self.policy
    }

    pub(crate) fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Runs `f` inside one transaction; any error rolls everything back.
    pub(crate) async fn in_tx<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut dyn MissionTx) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        run_blocking(move || {
            let mut tx = store.begin()?;
            let out = f(tx.as_mut())?;
            tx.commit()?;
            Ok(out)
        })
        .await
    }

    pub async fn ping(&self) -> AppResult<()> {
        let store = self.store.clone();
        run_blocking(move || store.ping()).await
    }
}

/// Counts a committed mission status change; no-ops when nothing moved.
pub(crate) fn mission_moved(from: MissionStatus, to: MissionStatus) {
    if from != to {
        record_transition("mission", from.as_str(), to.as_str());
    }
}

pub(crate) fn mission_not_found() -> AppError {
    AppError::new(ErrorCode::MissionNotFound, "mission not found")
}

pub(crate) fn report_not_found() -> AppError {
    AppError::new(ErrorCode::ReportNotFound, "report not found")
}

pub(crate) fn user_not_found() -> AppError {
    AppError::new(ErrorCode::UserNotFound, "user not found")
}

/// Field map of a derive-validated body, empty when it passed.
pub(crate) fn field_errors(result: Result<(), validator::ValidationErrors>) -> BTreeMap<String, String> {
    match result.map_err(AppError::from) {
        Err(AppError::Validation(errors)) => errors,
        _ => BTreeMap::new(),
    }
}
