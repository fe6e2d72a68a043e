pub mod health;
pub mod rest;
