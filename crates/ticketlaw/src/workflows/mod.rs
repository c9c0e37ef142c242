pub mod billing;
pub mod cases;
pub mod messages;
