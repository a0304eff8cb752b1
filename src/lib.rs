pub mod chunking;
pub mod document;
pub mod engine;
pub mod index;
pub mod openai;
pub mod provider;
pub mod session;
pub mod spreadsheet;
