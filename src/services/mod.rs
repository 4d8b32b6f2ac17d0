pub mod about;
pub mod gallery;
pub mod posts;
pub mod session;

pub use about::{AboutCache, AboutService};
pub use gallery::GalleryService;
pub use posts::PostService;
pub use session::{SessionService, SessionStore};
