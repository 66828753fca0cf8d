//! The replicated text and its supporting structures.

pub mod op;
pub mod primitives;
pub mod rga_split;
pub mod text;

pub use op::EditOp;
pub use rga_split::ContentChange;
pub use rga_split::LatestCreatedAtMap;
pub use rga_split::RgaTreeSplit;
pub use rga_split::RunNode;
pub use text::Text;
