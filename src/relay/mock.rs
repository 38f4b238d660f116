use super::{BioUpdate, Outcome, Relay};
use crate::credentials::RevealedToken;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

/// Simulates a successful upstream update without any network I/O.
pub struct MockRelay;

#[async_trait]
impl Relay for MockRelay {
    async fn forward(&self, token: RevealedToken, update: &BioUpdate) -> Outcome {
        drop(token);

        info!("Mock mode: no external request made");

        Outcome::Success(serde_json::json!({
            "status": "ok",
            "bio": update.bio,
            "updated_at": Utc::now().to_rfc3339(),
        }))
    }

    fn is_mock(&self) -> bool {
        true
    }
}
