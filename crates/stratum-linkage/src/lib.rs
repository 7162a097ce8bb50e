//! Cross-source record linkage for version-control and issue-tracker exports.
//!
//! The two sources share no identifier, so every raw change and every tracker
//! changeset descriptor is reduced to the same normalized key built from the
//! comment, author, and timestamp. The crate is laid out in pipeline order:
//!
//! - [`normalize`]: key construction and timestamp canonicalization
//! - [`grouper`]: monthly JSON exports folded into changeset groups
//! - [`tracker`]: positional readers for the defect, story, feature, and issue CSVs
//! - [`attribution`]: tracker rows matched to groups, leftovers attributed by ticket id
//! - [`files`]: raw identifiers expanded to file paths through an external lister
//! - [`pipeline`]: the above wired together for one export directory

pub mod attribution;
pub mod files;
pub mod grouper;
pub mod normalize;
pub mod pipeline;
pub mod tracker;
