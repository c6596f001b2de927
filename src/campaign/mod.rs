//! Campaign domain records.

pub mod model;

pub use model::{
    Campaign, CampaignStats, CampaignValidation, ContentItem, ContentStatus, Keyword,
    KeywordStatus, NewCampaign, NewContent, Platform,
};
