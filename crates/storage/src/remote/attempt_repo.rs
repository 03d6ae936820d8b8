use async_trait::async_trait;
use quiz_core::model::{AttemptId, ProfileId, UserId, UserStats};
use reqwest::Method;
use tracing::warn;

use super::documents::{AttemptDocument, DocumentList, StatsPatch};
use super::{
    ATTEMPTS_COLLECTION, PROFILES_COLLECTION, RemoteStore, decode_error, status_error,
    transport_error,
};
use crate::repository::{AttemptRecord, AttemptRepository, StorageError};

impl RemoteStore {
    async fn patch_stats(&self, id: &ProfileId, stats: &UserStats) -> Result<(), StorageError> {
        let response = self
            .request(
                Method::PATCH,
                &Self::document_path(PROFILES_COLLECTION, id.as_str()),
            )
            .json(&StatsPatch::from_stats(stats))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        Ok(())
    }

    /// Compensating delete for an attempt whose stats write failed. Best
    /// effort: a failure here leaves an orphan attempt, which the stats
    /// fold of the next successful commit does not count twice.
    async fn discard_attempt(&self, id: &AttemptId) {
        let result = self
            .request(
                Method::DELETE,
                &Self::document_path(ATTEMPTS_COLLECTION, id.as_str()),
            )
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(attempt = %id, status = %response.status(), "could not discard orphan attempt");
            }
            Err(err) => {
                warn!(attempt = %id, error = %err, "could not discard orphan attempt");
            }
        }
    }
}

#[async_trait]
impl AttemptRepository for RemoteStore {
    async fn commit_attempt(
        &self,
        attempt: &AttemptRecord,
        profile_id: &ProfileId,
        stats: &UserStats,
    ) -> Result<AttemptId, StorageError> {
        let response = self
            .request(Method::POST, &Self::documents_path(ATTEMPTS_COLLECTION))
            .json(&AttemptDocument::from_record(attempt))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let document: AttemptDocument = response.json().await.map_err(decode_error)?;
        let attempt_id = document.require_id()?;

        if let Err(err) = self.patch_stats(profile_id, stats).await {
            self.discard_attempt(&attempt_id).await;
            return Err(err);
        }

        Ok(attempt_id)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        let response = self
            .request(Method::GET, &Self::documents_path(ATTEMPTS_COLLECTION))
            .query(&[
                ("userId", user_id.as_str()),
                ("orderBy", "-completedAt"),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let list: DocumentList<AttemptDocument> = response.json().await.map_err(decode_error)?;
        Ok(list
            .documents
            .into_iter()
            .map(AttemptDocument::into_record)
            .collect())
    }
}
