//! Index-stable containers.
//!
//! - [`FreeListMap`] hands out integer ids and recycles released ids before
//!   growing, so handles stay valid across insert/remove churn.
//! - [`RenderBucket`] keeps a dense list whose elements remember their own
//!   position, giving O(1) removal without invalidating other elements' indices.

mod free_list;
mod render_bucket;

pub use free_list::{FreeListError, FreeListMap};
pub use render_bucket::{RenderBucket, RenderIndexed};
