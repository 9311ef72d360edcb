//! Application settings: the canonical cached read

use std::collections::BTreeMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
    TransactionTrait,
};

use crate::entities::{setting, Setting};
use crate::error::Result;

use super::Store;

pub struct Settings<'a> {
    pub(super) store: &'a Store,
}

impl Settings<'_> {
    /// All settings as a name → value map, served from cache when fresh.
    pub async fn all(&self) -> Result<BTreeMap<String, String>> {
        if let Some(cached) = self.store.cache.settings.get(&()) {
            return Ok(cached);
        }

        let map: BTreeMap<String, String> = Setting::find()
            .all(&self.store.db)
            .await?
            .into_iter()
            .map(|setting| (setting.name, setting.value))
            .collect();

        self.store.cache.settings.put((), map.clone());
        Ok(map)
    }

    pub async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.all().await?.get(name).cloned())
    }

    /// Upserts a setting and invalidates the cached map in the same
    /// operation.
    pub async fn set(&self, name: &str, value: &str) -> Result<()> {
        let txn = self.store.db.begin().await?;

        let existing = Setting::find()
            .filter(setting::Column::Name.eq(name))
            .one(&txn)
            .await?;

        match existing {
            Some(setting) => {
                let mut active = setting.into_active_model();
                active.value = Set(value.to_string());
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?;
            }
            None => {
                setting::ActiveModel {
                    name: Set(name.to_string()),
                    value: Set(value.to_string()),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        self.store.cache.settings.invalidate(&());
        Ok(())
    }
}
