pub mod openai;
pub mod reddit;
pub mod web;
