//! Headline sentiment labelling.
//!
//! Two strategies sit behind [`SentimentLabeler`]: a keyword matcher that can say "neutral" and
//! a linear classifier that only ever answers positive or negative. Neutral news carries no
//! weight in the score, so switching strategy shifts the score distribution; which one is
//! better calibrated is still open.

pub mod classifier;
pub mod keyword;

use crate::config::Settings;
use crate::domain::news::{NewsItem, RawArticle, Sentiment};
use crate::error::CoreError;

pub use classifier::ClassifierLabeler;
pub use keyword::KeywordLabeler;

pub trait SentimentLabeler: Send + Sync {
    fn name(&self) -> &'static str;

    fn label(&self, headline: &str) -> Sentiment;

    /// Whether this strategy can ever return [`Sentiment::Neutral`].
    fn emits_neutral(&self) -> bool;

    fn label_article(&self, raw: RawArticle) -> NewsItem {
        let sentiment = self.label(&raw.title);
        NewsItem::from_raw(raw, sentiment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Keyword,
    Classifier,
}

impl Strategy {
    pub fn parse(raw: Option<&str>) -> Result<Self, CoreError> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("keyword") | Some("keywords") => Ok(Strategy::Keyword),
            Some("classifier") | Some("model") => Ok(Strategy::Classifier),
            Some(other) => Err(CoreError::InvalidInput(format!(
                "unknown SENTIMENT_STRATEGY: {other}"
            ))),
        }
    }
}

/// Builds the configured labeler. A classifier whose model cannot be loaded fails here, once,
/// rather than on every headline.
pub fn from_settings(settings: &Settings) -> Result<Box<dyn SentimentLabeler>, CoreError> {
    match Strategy::parse(settings.sentiment_strategy.as_deref())? {
        Strategy::Keyword => Ok(Box::new(KeywordLabeler::default())),
        Strategy::Classifier => {
            let path = settings.sentiment_model_path.as_deref().ok_or_else(|| {
                CoreError::DependencyUnavailable(
                    "SENTIMENT_MODEL_PATH is required for the classifier strategy".to_string(),
                )
            })?;
            let labeler = ClassifierLabeler::from_path(path)?;
            tracing::warn!(
                path,
                "classifier sentiment strategy selected; it never labels headlines neutral"
            );
            Ok(Box::new(labeler))
        }
    }
}
