//! Editor features computed from a document snapshot and its grammars.

pub mod code_actions;
pub mod idref;
pub mod linked_editing;
pub mod links;

pub use code_actions::{close_start_tag_fixes, unexpected_element_fixes};
pub use idref::{idref_completions, idref_definitions, idref_highlights};
pub use linked_editing::linked_editing_ranges;
pub use links::document_links;
