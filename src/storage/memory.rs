// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

use super::{IsPersistent, Storage};

pub(crate) struct Memory<T> {
    data: Arc<RwLock<Option<T>>>,
}

impl<T> Memory<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl<T> IsPersistent for Memory<T> {
    fn is_persistent(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: Send + Sync + Clone> Storage<T> for Memory<T> {
    async fn get(&mut self) -> Result<Option<T>> {
        let guard = self.data.read().await;
        Ok(guard.clone())
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        let mut guard = self.data.write().await;
        *guard = Some(data.clone());
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        let mut guard = self.data.write().await;
        *guard = None;
        Ok(())
    }
}

impl<T> Clone for Memory<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T> Default for Memory<T> {
    fn default() -> Self {
        Self {
            data: Arc::new(RwLock::new(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_contents() -> Result<()> {
        let mut storage = Memory::<String>::new();
        let mut other = storage.clone();

        assert_eq!(storage.get().await?, None);
        storage.update(&"cached".to_owned()).await?;
        assert_eq!(other.get().await?, Some("cached".to_owned()));

        other.clear().await?;
        other.clear().await?;
        assert_eq!(storage.get().await?, None);
        assert!(!storage.is_persistent());
        Ok(())
    }
}
