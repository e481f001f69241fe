// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretVec};
use security_framework::os::macos::{
    keychain::{SecKeychain, SecPreferencesDomain},
    keychain_item::SecKeychainItem,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{self, Result},
    metadata,
};

use super::{IsPersistent, Storage};

const ITEM_NOT_FOUND: i32 = -25300_i32;

/// Credentials kept as generic passwords in the user's login keychain, one
/// item per identity provider host.
pub(crate) struct Keychain {
    delegate: SecKeychain,
    service: String,
    account: String,
}

impl Keychain {
    pub(crate) fn new(url: &url::Url) -> Result<Self> {
        Ok(Self {
            delegate: SecKeychain::default_for_domain(SecPreferencesDomain::User)
                .map_err(error::Storage::from)?,
            service: format!("{}.credential", *metadata::CLIENT_TYPE_ID),
            account: super::account_name(url),
        })
    }

    fn find(&self) -> Result<Option<(SecretVec<u8>, SecKeychainItem)>> {
        match self
            .delegate
            .find_generic_password(&self.service, &self.account)
        {
            Ok((password, item)) => Ok(Some((SecretVec::new(password.to_vec()), item))),
            Err(err) if err.code() == ITEM_NOT_FOUND => Ok(None),
            Err(err) => Err(error::Storage::from(err).into()),
        }
    }
}

impl IsPersistent for Keychain {
    fn is_persistent(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: for<'de> Deserialize<'de> + Send + Serialize + Sync> Storage<T> for Keychain {
    async fn get(&mut self) -> Result<Option<T>> {
        match self.find()? {
            Some((data, _)) => Ok(Some(serde_json::from_slice(data.expose_secret())?)),
            None => Ok(None),
        }
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        let data = SecretVec::new(serde_json::to_vec(data)?);
        self.delegate
            .set_generic_password(&self.service, &self.account, data.expose_secret())
            .map_err(error::Storage::from)?;
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        if let Some((_, item)) = self.find()? {
            item.delete();
        }
        Ok(())
    }
}
