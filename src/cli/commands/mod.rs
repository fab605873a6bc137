pub mod health;
pub mod template;
