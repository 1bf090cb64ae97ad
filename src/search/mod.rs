//! Search endpoint access
//!
//! This module contains everything on the pagination side of a harvest:
//! - The immutable search query and its wire parameters
//! - Result stub decoding
//! - The page iterator and its termination rule

mod pager;
mod query;
mod stub;

pub use pager::{decode_page, page_offset, PageIterator, PageResult, SearchPage};
pub use query::{RatingRange, SearchQuery, SortKey};
pub use stub::{is_falsy, ResultStub};

/// Number of results per search page; offsets advance by this amount
pub const PAGE_SIZE: u64 = 20;
