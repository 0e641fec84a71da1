//! Firestore-backed card store
//!
//! Cards live under `{user_collection}/{user}/{deck_collection}/{front side}`.
//! Document ids are the raw front side; path segments are percent-encoded
//! once when the request URL is built.

pub mod client;
pub mod document;

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use super::{CardStore, CardStream, Result, StoreError};
use crate::cards::Card;
use crate::user::User;

pub use client::FirestoreClient;
pub use document::{decode_card, encode_card, Document, Value};

/// Collection layout of the Firestore database
#[derive(Debug, Clone)]
pub struct FirestoreCollections {
    pub user_collection: String,
    pub deck_collection: String,
}

/// Card store on top of the Firestore REST API
pub struct FirestoreStore {
    client: FirestoreClient,
    collections: FirestoreCollections,
    user: RwLock<Option<User>>,
}

impl FirestoreStore {
    pub fn new(client: FirestoreClient, collections: FirestoreCollections) -> Self {
        Self {
            client,
            collections,
            user: RwLock::new(None),
        }
    }

    /// Relative path of the current user's deck collection
    fn deck_path(&self) -> Result<String> {
        let user = self
            .user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::UserNotProvided)?;
        Ok(format!(
            "{}/{}/{}",
            self.collections.user_collection,
            urlencoding::encode(user.name()),
            self.collections.deck_collection
        ))
    }

    fn card_path(&self, card: &Card) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.deck_path()?,
            urlencoding::encode(card.front_side())
        ))
    }

    /// Parent document and collection id for `runQuery`
    fn query_target(&self) -> Result<(String, String)> {
        let deck_path = self.deck_path()?;
        Ok(match deck_path.rsplit_once('/') {
            Some((parent, collection_id)) => (parent.to_string(), collection_id.to_string()),
            None => (String::new(), deck_path),
        })
    }
}

#[async_trait]
impl CardStore for FirestoreStore {
    fn set_user(&self, user: &User) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
    }

    async fn query_by_level(&self, min_inclusive: i32, max_inclusive: i32) -> Result<CardStream> {
        let (parent, collection_id) = self.query_target()?;

        let documents = self
            .client
            .run_level_query(&parent, &collection_id, min_inclusive, max_inclusive)
            .await?;

        Ok(stream::iter(documents.into_iter().map(|doc| decode_card(&doc))).boxed())
    }

    async fn upsert(&self, card: &Card) -> Result<()> {
        let path = self.card_path(card)?;
        self.client.patch_document(&path, &encode_card(card)).await
    }

    async fn delete(&self, card: &Card) -> Result<()> {
        let path = self.card_path(card)?;
        self.client.delete_document(&path).await
    }
}
