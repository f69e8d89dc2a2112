pub mod analyses;
pub mod sse;
