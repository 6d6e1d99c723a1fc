mod summarizer;

pub use summarizer::SummaryClient;
