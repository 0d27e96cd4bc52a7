mod constraint_tests;
mod optimizer_tests;
