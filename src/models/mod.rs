pub mod autosave;
pub mod preview;
pub mod snippet;
pub mod template;

pub use autosave::{Autosave, AutosaveSlot};
pub use preview::render_document;
pub use snippet::{
    Snippet, SnippetDraft, SnippetPatch, UNTITLED, generate_id, is_generated_id, next_timestamp,
};
pub use template::{Template, TemplateCatalog};
