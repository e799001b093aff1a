//! Utility functions for ids, timestamps, durations and parameter parsing.

mod duration;
mod ids;
mod params;
mod timestamps;

pub use duration::{parse_duration, DurationError};
pub use ids::{generate_id, generate_uuid};
pub use params::{delete_empty_and_trim, parse_bool, parse_key_values, split_list};
pub use timestamps::{iso_timestamp, now_nanos};
