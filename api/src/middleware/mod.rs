pub mod accept;
pub mod cors;
