//! Search engine adapters.

// International engines
mod bing;
mod google;

// Chinese engines
mod baidu;
mod sogou;

pub use bing::Bing;
pub use google::Google;

pub use baidu::Baidu;
pub use sogou::Sogou;
