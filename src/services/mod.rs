pub mod auth;
pub mod contact;
pub mod dashboard;
pub mod media;
pub mod user;

pub use auth::AuthService;
pub use contact::ContactService;
pub use dashboard::DashboardService;
pub use media::{BatchOutcome, IncomingFile, MediaService};
pub use user::UserService;
