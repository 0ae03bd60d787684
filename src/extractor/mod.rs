// src/extractor/mod.rs

pub mod captions;
pub mod fallback;
pub mod interceptor;
pub mod validate;

pub use captions::parse_captions;
pub use fallback::{FallbackScraper, FallbackStrategy};
pub use interceptor::CaptionInterceptor;
pub use validate::validate_transcript;
