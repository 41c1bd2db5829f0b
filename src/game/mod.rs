pub mod constants;
pub mod mailbox;
pub mod speed;
pub mod sync;
