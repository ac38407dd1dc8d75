pub mod analyzer;
pub mod buzzwords;
pub mod grading;
pub mod handlers;
pub mod navigation;
pub mod prompts;
pub mod registry;
pub mod service;
pub mod session;
pub mod session_store;
pub mod topic_tree;
pub mod worker;
