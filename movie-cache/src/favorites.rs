use crate::identity::Caller;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_FAVORITES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FavoriteError {
    #[error("invalid movie id '{0}'")]
    InvalidId(String),
    #[error("movie '{0}' is already a favorite")]
    AlreadyFavorite(String),
    #[error("favorites are limited to {MAX_FAVORITES} movies")]
    FavoritesFull,
    #[error("movie '{0}' is not a favorite")]
    NotFavorite(String),
}

/// Ids of the form `tt` followed by at least seven characters.
pub fn is_valid_external_id(external_id: &str) -> bool {
    external_id.starts_with("tt") && external_id.len() >= 9
}

/// Ordered favorite ids of one subject, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteList {
    ids: Vec<String>,
}

impl FavoriteList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, external_id: &str) -> Result<(), FavoriteError> {
        if !is_valid_external_id(external_id) {
            return Err(FavoriteError::InvalidId(external_id.to_string()));
        }
        if self.contains(external_id) {
            return Err(FavoriteError::AlreadyFavorite(external_id.to_string()));
        }
        if self.ids.len() >= MAX_FAVORITES {
            return Err(FavoriteError::FavoritesFull);
        }
        self.ids.push(external_id.to_string());
        Ok(())
    }

    pub fn remove(&mut self, external_id: &str) -> Result<(), FavoriteError> {
        let position = self
            .ids
            .iter()
            .position(|id| id == external_id)
            .ok_or_else(|| FavoriteError::NotFavorite(external_id.to_string()))?;
        self.ids.remove(position);
        Ok(())
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.ids.iter().any(|id| id == external_id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Favorite lists keyed by caller subject, held in process memory.
#[derive(Debug, Default)]
pub struct FavoriteRegistry {
    lists: DashMap<String, FavoriteList>,
}

impl FavoriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, caller: &Caller) -> FavoriteList {
        self.lists
            .get(&caller.subject)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    pub fn add(&self, caller: &Caller, external_id: &str) -> Result<FavoriteList, FavoriteError> {
        let mut list = self.lists.entry(caller.subject.clone()).or_default();
        list.add(external_id)?;
        Ok(list.clone())
    }

    pub fn remove(
        &self,
        caller: &Caller,
        external_id: &str,
    ) -> Result<FavoriteList, FavoriteError> {
        let Some(mut list) = self.lists.get_mut(&caller.subject) else {
            return Err(FavoriteError::NotFavorite(external_id.to_string()));
        };
        list.remove(external_id)?;
        Ok(list.clone())
    }

    pub fn contains(&self, caller: &Caller, external_id: &str) -> bool {
        self.lists
            .get(&caller.subject)
            .is_some_and(|list| list.contains(external_id))
    }
}
