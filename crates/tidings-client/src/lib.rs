pub mod assembly;
pub mod feed;
pub mod fetcher;
pub mod html;
pub mod telegram;
pub mod translate;

pub use assembly::{LivePipeline, build_pipeline};
pub use feed::FeedReader;
pub use fetcher::ReqwestFetcher;
pub use html::HtmlHeadlineReader;
pub use telegram::TelegramPublisher;
pub use translate::{GoogleWebProvider, LibreTranslateProvider};
