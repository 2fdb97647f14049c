pub mod crawl;
pub mod report;
pub mod status;

pub mod util;
