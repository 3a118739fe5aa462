pub mod company;
pub mod financials;
pub mod news;
pub mod score;
