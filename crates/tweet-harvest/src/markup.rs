//! Where each record field lives in the rendered feed.
//!
//! The extractor never hard-codes a selector; it asks a [`Markup`]
//! implementation. A change in the site's markup is absorbed by swapping
//! or reconfiguring that implementation.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The three counters shown under each post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeKind {
    Like,
    Reply,
    Repost,
}

impl BadgeKind {
    /// Field name reported when this badge is missing.
    pub fn field(self) -> &'static str {
        match self {
            BadgeKind::Like => "likes",
            BadgeKind::Reply => "replies",
            BadgeKind::Repost => "retweets",
        }
    }
}

/// Selector capability: one locator per record field.
pub trait Markup: Send + Sync {
    /// Selector matching every feed item in the document.
    fn item(&self) -> &str;
    /// Account block inside an item.
    fn account(&self) -> &str;
    /// Display name. Matched only among the descendants of the element
    /// found by [`Markup::account`], never across the whole item.
    fn display_name(&self) -> &str;
    /// Attribute of the account block holding the profile link.
    fn profile_link_attribute(&self) -> &str;
    /// Attribute of the account block holding the numeric user id.
    fn user_id_attribute(&self) -> &str;
    fn timestamp(&self) -> &str;
    /// Attribute of the timestamp element holding the displayed date.
    fn timestamp_attribute(&self) -> &str;
    fn hashtag(&self) -> &str;
    fn badge(&self, kind: BadgeKind) -> String;
    fn body(&self) -> &str;
}

/// Plain selector strings, loadable from JSON.
///
/// The default matches the classic (pre-2019) timeline markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub item: String,
    pub account: String,
    /// Looked up inside the `account` element.
    pub display_name: String,
    pub profile_link_attribute: String,
    pub user_id_attribute: String,
    pub timestamp: String,
    pub timestamp_attribute: String,
    pub hashtag: String,
    /// Badge selector with `{kind}` standing for the per-kind discriminator.
    pub badge_template: String,
    pub like_discriminator: String,
    pub reply_discriminator: String,
    pub repost_discriminator: String,
    pub body: String,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            item: ".tweet".into(),
            account: ".account-group".into(),
            display_name: ".fullname".into(),
            profile_link_attribute: "href".into(),
            user_id_attribute: "data-user-id".into(),
            timestamp: ".tweet-timestamp".into(),
            timestamp_attribute: "title".into(),
            hashtag: ".twitter-hashtag".into(),
            badge_template: ".ProfileTweet-action--{kind} .ProfileTweet-actionCountForPresentation"
                .into(),
            like_discriminator: "favorite".into(),
            reply_discriminator: "reply".into(),
            repost_discriminator: "retweet".into(),
            body: ".tweet-text".into(),
        }
    }
}

impl SelectorSet {
    /// Load a selector set from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(std::io::Error::other)
    }
}

impl Markup for SelectorSet {
    fn item(&self) -> &str {
        &self.item
    }

    fn account(&self) -> &str {
        &self.account
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn profile_link_attribute(&self) -> &str {
        &self.profile_link_attribute
    }

    fn user_id_attribute(&self) -> &str {
        &self.user_id_attribute
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn timestamp_attribute(&self) -> &str {
        &self.timestamp_attribute
    }

    fn hashtag(&self) -> &str {
        &self.hashtag
    }

    fn badge(&self, kind: BadgeKind) -> String {
        let discriminator = match kind {
            BadgeKind::Like => &self.like_discriminator,
            BadgeKind::Reply => &self.reply_discriminator,
            BadgeKind::Repost => &self.repost_discriminator,
        };
        self.badge_template.replace("{kind}", discriminator)
    }

    fn body(&self) -> &str {
        &self.body
    }
}
