mod common;
mod system_tests;
