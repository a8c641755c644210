//! Application services wiring the domain to the backend ports.
pub mod admin;
pub mod blog_editor;
pub mod cart_store;
pub mod catalog;
pub mod contact;
pub mod optimistic;
pub mod search;
pub mod session_guard;

pub use admin::AdminConsole;
pub use blog_editor::{BlogEditor, EditableFields, InFlightSaves, SaveOutcome};
pub use cart_store::{CartSessions, CartStore};
pub use catalog::{CatalogService, DetailLoader, PageState, ProductDetail};
pub use contact::ContactService;
pub use optimistic::optimistic_update;
pub use search::{SearchResults, SearchService, SeeAllTarget};
pub use session_guard::{Access, AccessWatch, AdminAccessPolicy, DenyReason, SessionGuard};
