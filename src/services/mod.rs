pub mod ai_service;
pub mod batch_validator;
pub mod duplicate_service;
pub mod eval_service;
pub mod extractors;
pub mod generation_service;
pub mod lexicon;
pub mod native_evaluators;
pub mod pending_question_service;
pub mod prompt_service;
pub mod question_repository;
pub mod question_service;
pub mod question_store;
pub mod similarity;
