pub mod media;
pub mod message;
pub mod user;

pub use media::*;
pub use message::*;
pub use user::*;
