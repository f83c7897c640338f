pub mod profile;
pub mod role;
pub mod user;

pub use profile::UserProfileDto;
pub use role::UserRole;
pub use user::User;
