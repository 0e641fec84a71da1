//! JSON file storage for cards
//!
//! Directory structure:
//! ```text
//! {root}/{user}/
//! └── cards/
//!     └── {card-key}.json   # One card per file
//! ```
//!
//! The card key is a name-based UUID of the front side, so upserting a card
//! with the same front side overwrites the same file.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::fs;
use uuid::Uuid;

use super::{CardStore, CardStream, Result, StoreError};
use crate::cards::{Card, CardBuilder};
use crate::user::User;

/// Card store backed by JSON files
pub struct FileStore {
    /// Base path for all users (e.g., ~/.local/share/decks)
    root: PathBuf,
    user: RwLock<Option<User>>,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            user: RwLock::new(None),
        }
    }

    pub fn for_user(root: PathBuf, user: User) -> Self {
        let store = Self::new(root);
        store.set_user(&user);
        store
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the cards directory for the current user
    fn cards_dir(&self) -> Result<PathBuf> {
        let user = self
            .user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::UserNotProvided)?;
        Ok(self
            .root
            .join(urlencoding::encode(user.name()).as_ref())
            .join("cards"))
    }

    /// Get the path for a specific card
    fn card_path(&self, card: &Card) -> Result<PathBuf> {
        Ok(self.cards_dir()?.join(format!("{}.json", card_key(card.front_side()))))
    }

    async fn read_cards(dir: &Path) -> Result<Vec<Card>> {
        if !fs::try_exists(dir).await? {
            return Ok(Vec::new());
        }

        let mut cards = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                let content = fs::read_to_string(&path).await?;
                cards.push(decode_card(&content)?);
            }
        }
        Ok(cards)
    }
}

/// Stable file key for a front side
pub fn card_key(front_side: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, front_side.as_bytes())
}

fn decode_card(content: &str) -> Result<Card> {
    let card: Card = serde_json::from_str(content)?;
    // Re-validate: the file may have been edited by hand
    CardBuilder::from(&card)
        .build()
        .map_err(|e| StoreError::Decode(e.to_string()))
}

#[async_trait]
impl CardStore for FileStore {
    fn set_user(&self, user: &User) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
    }

    async fn query_by_level(&self, min_inclusive: i32, max_inclusive: i32) -> Result<CardStream> {
        let dir = self.cards_dir()?;
        let cards = Self::read_cards(&dir).await?;
        let matching = cards
            .into_iter()
            .filter(move |card| (min_inclusive..=max_inclusive).contains(&card.level()))
            .map(Ok);
        Ok(stream::iter(matching).boxed())
    }

    async fn upsert(&self, card: &Card) -> Result<()> {
        let dir = self.cards_dir()?;
        fs::create_dir_all(&dir).await?;
        let path = self.card_path(card)?;
        fs::write(&path, serde_json::to_string_pretty(card)?).await?;
        Ok(())
    }

    async fn delete(&self, card: &Card) -> Result<()> {
        let path = self.card_path(card)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
