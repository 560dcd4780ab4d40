mod login;
mod session;

pub use login::post as login;
pub use session::logout;
pub use session::me;
