use async_trait::async_trait;
use quiz_core::model::{ProfileId, UserId};
use reqwest::Method;
use tracing::debug;

use super::documents::{DocumentList, ProfileDocument, ProgressionPatch};
use super::{
    PROFILES_COLLECTION, RemoteStore, decode_error, status_error, transport_error,
};
use crate::repository::{ProfileRecord, ProfileRepository, ProgressionRecord, StorageError};

impl RemoteStore {
    async fn create_profile(
        &self,
        user_id: &UserId,
        username: &str,
        email: &str,
    ) -> Result<ProfileRecord, StorageError> {
        let response = self
            .request(Method::POST, &Self::documents_path(PROFILES_COLLECTION))
            .json(&ProfileDocument::for_create(user_id, username, email))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let document: ProfileDocument = response.json().await.map_err(decode_error)?;
        document.into_record()
    }
}

#[async_trait]
impl ProfileRepository for RemoteStore {
    async fn get_or_create(
        &self,
        user_id: &UserId,
        username: &str,
        email: &str,
    ) -> Result<ProfileRecord, StorageError> {
        if let Some(existing) = self.find_by_user(user_id).await? {
            return Ok(existing);
        }

        match self.create_profile(user_id, username, email).await {
            Ok(created) => Ok(created),
            // Another device created the profile between our lookup and the
            // create. The stored record wins over our defaults.
            Err(StorageError::Conflict) => {
                debug!(user = %user_id, "profile creation conflicted, fetching existing");
                self.find_by_user(user_id)
                    .await?
                    .ok_or(StorageError::Conflict)
            }
            Err(other) => Err(other),
        }
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, StorageError> {
        let response = self
            .request(Method::GET, &Self::documents_path(PROFILES_COLLECTION))
            .query(&[("userId", user_id.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let list: DocumentList<ProfileDocument> = response.json().await.map_err(decode_error)?;
        list.documents
            .into_iter()
            .next()
            .map(ProfileDocument::into_record)
            .transpose()
    }

    async fn update_progression(
        &self,
        id: &ProfileId,
        progression: &ProgressionRecord,
    ) -> Result<(), StorageError> {
        let response = self
            .request(
                Method::PATCH,
                &Self::document_path(PROFILES_COLLECTION, id.as_str()),
            )
            .json(&ProgressionPatch::from_record(progression))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        Ok(())
    }

    async fn list_by_score(&self, limit: u32) -> Result<Vec<ProfileRecord>, StorageError> {
        let response = self
            .request(Method::GET, &Self::documents_path(PROFILES_COLLECTION))
            .query(&[("orderBy", "-totalScore"), ("limit", &limit.to_string())])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let list: DocumentList<ProfileDocument> = response.json().await.map_err(decode_error)?;
        list.documents
            .into_iter()
            .map(ProfileDocument::into_record)
            .collect()
    }
}
