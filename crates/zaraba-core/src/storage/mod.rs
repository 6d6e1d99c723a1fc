mod article_repo;
mod database;
mod dedup;
mod models;
mod wire_repo;

pub use article_repo::ArticleRepository;
pub use database::Database;
pub use dedup::{DedupGate, GateOutcome, WireGateOutcome};
pub use models::{Article, NewArticle, NewWireArticle, WireArticle};
pub use wire_repo::WireRepository;
