//! newscat: ingest news feeds, classify each entry by topic, store it once.
//!
//! Entries flow one way: a feed source yields [`feed::RawEntry`] values, the
//! [`pipeline::Pipeline`] sanitizes, dates, classifies and deduplicates them,
//! and [`storage::Database`] persists the survivors in one transaction per
//! source.

pub mod classify;
pub mod config;
pub mod feed;
pub mod normalize;
pub mod pipeline;
pub mod storage;
pub mod util;
