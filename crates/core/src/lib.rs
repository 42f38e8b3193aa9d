//! Shared data model for the reclaim workspace.
//!
//! Everything here is plain data with no async runtime dependency:
//!
//! - [`Area`] / [`AreaType`] / [`AreaFlag`]: a typed storage location.
//! - [`AreaSnapshot`]: the deduplicated set of areas of one generation.
//! - [`AreaInfo`]: the ownership record of one classified path.
//! - [`ToolType`]: the closed set of cleaning tools that submit tasks.

pub mod area;
pub mod area_info;
pub mod error;
pub mod snapshot;
pub mod tool;
pub mod types;

pub use area::{Area, AreaFlag, AreaType};
pub use area_info::AreaInfo;
pub use error::CoreError;
pub use snapshot::AreaSnapshot;
pub use tool::ToolType;
