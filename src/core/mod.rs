pub mod traits;

pub use traits::{CRUDResource, FieldStatistics, MergeIntoActiveModel, PrimaryKeyOf};
