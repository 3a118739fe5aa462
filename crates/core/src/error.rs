use thiserror::Error;

/// Failures surfaced to callers of the scoring pipeline.
///
/// Missing optional inputs (a null revenue, no news yet) are not errors: they degrade to
/// neutral contributions. Only a wholly missing entity, a malformed label or an unusable
/// dependency end up here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn company_not_found(ticker: &str) -> Self {
        CoreError::NotFound(format!("company {ticker}"))
    }

    pub fn financials_not_found(ticker: &str) -> Self {
        CoreError::NotFound(format!("financials for company {ticker}"))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
