//! TLD operations

use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::entities::{tld, Tld};
use crate::error::{DbError, Result};

use super::Store;

pub struct Tlds<'a> {
    pub(super) store: &'a Store,
}

impl Tlds<'_> {
    pub async fn create(&self, name: &str) -> Result<tld::Model> {
        let txn = self.store.db.begin().await?;

        if Tld::find()
            .filter(tld::Column::Name.eq(name))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(DbError::DuplicateKey {
                entity: "tld",
                constraint: "name",
            });
        }

        let model = tld::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<tld::Model> {
        Tld::find_by_id(id)
            .one(&self.store.db)
            .await?
            .ok_or_else(|| DbError::not_found("tld", id))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<tld::Model> {
        Tld::find()
            .filter(tld::Column::Name.eq(name))
            .one(&self.store.db)
            .await?
            .ok_or_else(|| DbError::not_found("tld", name))
    }

    pub async fn list(&self) -> Result<Vec<tld::Model>> {
        Ok(Tld::find()
            .order_by_asc(tld::Column::Id)
            .all(&self.store.db)
            .await?)
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        let txn = self.store.db.begin().await?;
        let tld = Tld::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("tld", id))?;
        tld.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}
