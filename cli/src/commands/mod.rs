mod cat;
mod extract;
mod info;
mod list;

pub use cat::run as cat;
pub use extract::run as extract;
pub use info::run as info;
pub use list::run as list;
