
mod capture_tests;
