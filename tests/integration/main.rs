//! Integration tests for Tender-Harvest
//!
//! Each module runs harvest passes against a wiremock site and inspects the
//! resulting table and folders.

mod crawl_tests;
