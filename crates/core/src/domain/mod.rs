pub mod conversation;
pub mod tool;
pub mod turn;
