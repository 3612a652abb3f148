//! Record extraction from a single rendered feed item.
//!
//! Extraction is all-or-nothing: if any required element or attribute is
//! absent the item yields [`ExtractError::IncompleteRecord`] and no partial
//! record is ever produced.

use crate::browser::ItemHandle;
use crate::markup::{BadgeKind, Markup};
use crate::types::{Account, ExtractError, Record};

/// Maps one item subtree onto a [`Record`] using a [`Markup`].
#[derive(Clone, Copy)]
pub struct Extractor<'a> {
    markup: &'a dyn Markup,
}

impl<'a> Extractor<'a> {
    pub fn new(markup: &'a dyn Markup) -> Self {
        Self { markup }
    }

    /// Extract every field of `item`. Fields live in disjoint subtrees and
    /// are read concurrently.
    pub async fn extract(&self, item: &dyn ItemHandle) -> Result<Record, ExtractError> {
        let (account, posted_at, tags, like_count, reply_count, repost_count, body) = futures::try_join!(
            self.account(item),
            self.posted_at(item),
            self.tags(item),
            self.badge(item, BadgeKind::Like),
            self.badge(item, BadgeKind::Reply),
            self.badge(item, BadgeKind::Repost),
            self.body(item),
        )?;

        Ok(Record {
            account,
            posted_at,
            tags,
            like_count,
            reply_count,
            repost_count,
            body,
        })
    }

    async fn account(&self, item: &dyn ItemHandle) -> Result<Account, ExtractError> {
        let account = require(item.find(self.markup.account()).await?, "account")?;

        let display_name = require(
            account.find(self.markup.display_name()).await?,
            "account.fullname",
        )?
        .text()
        .await?;
        let link = require(
            account
                .attribute(self.markup.profile_link_attribute())
                .await?,
            "account.href",
        )?;
        let id = require(
            account.attribute(self.markup.user_id_attribute()).await?,
            "account.id",
        )?;

        Ok(Account {
            display_name,
            handle: profile_path(&link),
            id,
        })
    }

    async fn posted_at(&self, item: &dyn ItemHandle) -> Result<String, ExtractError> {
        let timestamp = require(item.find(self.markup.timestamp()).await?, "date")?;
        require(
            timestamp
                .attribute(self.markup.timestamp_attribute())
                .await?,
            "date",
        )
    }

    async fn tags(&self, item: &dyn ItemHandle) -> Result<Vec<String>, ExtractError> {
        let mut tags = Vec::new();
        for tag in item.find_all(self.markup.hashtag()).await? {
            tags.push(tag.text().await?);
        }
        Ok(tags)
    }

    async fn badge(&self, item: &dyn ItemHandle, kind: BadgeKind) -> Result<String, ExtractError> {
        let selector = self.markup.badge(kind);
        let badge = require(item.find(&selector).await?, kind.field())?;
        Ok(badge.text().await?)
    }

    async fn body(&self, item: &dyn ItemHandle) -> Result<String, ExtractError> {
        let body = require(item.find(self.markup.body()).await?, "text")?;
        Ok(body.text().await?)
    }
}

fn require<T>(found: Option<T>, field: &'static str) -> Result<T, ExtractError> {
    found.ok_or(ExtractError::IncompleteRecord { field })
}

/// Last path segment of a profile link, prefixed with `/`.
pub fn profile_path(link: &str) -> String {
    let last = link.rsplit('/').next().unwrap_or_default();
    format!("/{last}")
}
