mod router;
mod state;

pub use router::{build_router, CRAWL_FAILED_BODY, NO_CRAWLER_BODY};
pub use state::ServeState;
