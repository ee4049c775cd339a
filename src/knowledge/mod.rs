pub mod entities;
pub mod export;
pub mod index;
pub mod search;
pub mod stats;
pub mod store;
pub mod tags;
pub mod transaction;
pub mod types;

pub use search::{search, SearchConfig, SearchFilters, SearchKind, SearchRequest, SearchResponse};
pub use store::{
    add_error_record, add_lesson, add_pattern, add_session, delete_entry, increment_error_count,
    update_error_record, update_lesson, update_pattern,
};
pub use types::{EntityId, EntityKind, IndexedKind, LessonCategory};
