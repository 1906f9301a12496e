mod append_test;
mod common;
mod dedupe_test;
mod merge_test;
mod sweep_test;
