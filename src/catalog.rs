//! Static card catalog, loaded once at startup

use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use tracing::info;

use crate::net::protocol::{CardDef, CardId};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read card catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid card catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate card id {0}")]
    DuplicateId(CardId),
}

/// Read-only card definitions indexed by id
#[derive(Debug, Default)]
pub struct CardCatalog {
    cards: Vec<CardDef>,
    by_id: HashMap<CardId, usize>,
}

impl CardCatalog {
    /// Parse a JSON array of card definitions
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let cards: Vec<CardDef> = serde_json::from_str(text)?;
        let mut by_id = HashMap::with_capacity(cards.len());
        for (index, card) in cards.iter().enumerate() {
            if by_id.insert(card.id, index).is_some() {
                return Err(CatalogError::DuplicateId(card.id));
            }
        }
        Ok(Self { cards, by_id })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&text)?;
        info!("Loaded {} cards from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn get(&self, id: CardId) -> Option<&CardDef> {
        self.by_id.get(&id).map(|&i| &self.cards[i])
    }

    pub fn by_name(&self, name: &str) -> Option<&CardDef> {
        self.cards.iter().find(|c| c.name == name)
    }

    /// Cards belonging to `set`, in catalog order
    pub fn set_members<'a>(&'a self, set: &'a str) -> impl Iterator<Item = &'a CardDef> + 'a {
        self.cards
            .iter()
            .filter(move |c| c.set.as_deref() == Some(set))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CardDef> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
