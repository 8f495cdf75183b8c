//! Operator session passed explicitly to every mutation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ServiceError;
use crate::models::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub operator_id: String,
    pub operator_name: String,
    pub role: Role,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Opens a session for an already authenticated operator.
    pub fn login(
        operator_id: impl Into<String>,
        operator_name: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        let session = Self {
            operator_id: operator_id.into(),
            operator_name: operator_name.into(),
            role,
            last_activity: now,
        };
        info!(operator_id = %session.operator_id, role = ?session.role, "session opened");
        session
    }

    pub fn logout(self) {
        info!(operator_id = %self.operator_id, "session closed");
    }

    pub fn operator(&self) -> Operator {
        Operator::new(self.operator_id.clone(), self.operator_name.clone())
    }

    pub fn is_editor(&self) -> bool {
        self.role == Role::Editor
    }

    pub fn require_editor(&self) -> Result<(), ServiceError> {
        if self.is_editor() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} does not have edit rights",
                self.operator_name
            )))
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Whether the session has been inactive for at least `timeout`.
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity >= timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 18, 0, 0).unwrap()
    }

    #[test]
    fn viewer_cannot_edit() {
        let session = Session::login("v1", "Guest", Role::Viewer, start());
        assert_matches!(session.require_editor(), Err(ServiceError::Forbidden(_)));
    }

    #[test]
    fn idle_after_timeout() {
        let mut session = Session::login("e1", "Lee", Role::Editor, start());
        let timeout = Duration::minutes(10);
        assert!(!session.is_idle(start() + Duration::minutes(9), timeout));
        assert!(session.is_idle(start() + Duration::minutes(10), timeout));

        session.touch(start() + Duration::minutes(9));
        assert!(!session.is_idle(start() + Duration::minutes(10), timeout));
    }
}
