use crate::domain::news::Sentiment;
use crate::sentiment::SentimentLabeler;

pub const NEGATIVE_KEYWORDS: &[&str] = &["loss", "down", "lawsuit", "fraud", "resign"];
pub const POSITIVE_KEYWORDS: &[&str] = &["profit", "up", "record", "raises", "growth"];

/// Case-insensitive substring matcher. Negative keywords win when both sides match.
#[derive(Debug, Clone)]
pub struct KeywordLabeler {
    negative: Vec<String>,
    positive: Vec<String>,
}

impl KeywordLabeler {
    pub fn new<N, P>(negative: N, positive: P) -> Self
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        fn normalize<I>(words: I) -> Vec<String>
        where
            I: IntoIterator,
            I::Item: AsRef<str>,
        {
            words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        }

        Self {
            negative: normalize(negative),
            positive: normalize(positive),
        }
    }
}

impl Default for KeywordLabeler {
    fn default() -> Self {
        Self::new(NEGATIVE_KEYWORDS, POSITIVE_KEYWORDS)
    }
}

impl SentimentLabeler for KeywordLabeler {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn label(&self, headline: &str) -> Sentiment {
        let lower = headline.to_lowercase();
        if self.negative.iter().any(|k| lower.contains(k.as_str())) {
            Sentiment::Negative
        } else if self.positive.iter().any(|k| lower.contains(k.as_str())) {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        }
    }

    fn emits_neutral(&self) -> bool {
        true
    }
}
