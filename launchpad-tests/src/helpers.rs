pub mod env_builder;
pub mod fake_tools;
pub mod git_fixture;
