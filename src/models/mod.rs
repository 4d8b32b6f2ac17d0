pub mod about;
pub mod gallery;
pub mod post;

pub use about::*;
pub use gallery::*;
pub use post::*;
