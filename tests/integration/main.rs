//! Integration tests against a real PostgreSQL database.
//!
//! Run with `DATABASE_URL` pointing at a disposable database and
//! `cargo test --test integration -- --ignored`.

mod helpers;

mod aggregation_test;
mod listener_test;
mod store_test;
