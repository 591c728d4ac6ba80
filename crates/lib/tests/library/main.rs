mod common;
mod execute_tests;
mod resolve_tests;
