//! Pure text parsers for hoster pages
//!
//! JavaScript deobfuscation and media URL extraction. Nothing in here
//! performs I/O.

pub mod packed;
pub mod video_url;

pub use packed::{contains_packed_js, unpack_all_packed_js, unpack_packed_js};
pub use video_url::{extract_video_url, find_direct_hls};
