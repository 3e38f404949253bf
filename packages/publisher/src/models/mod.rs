pub mod article;
pub mod validation;

pub use article::{Article, ArticleInput, ArticleSummary, BannerUpload, NewArticle};
pub use validation::ArticleValidator;
