pub mod question;
pub mod topic;
pub mod verdict;
