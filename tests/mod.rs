//! Test suite for planner-sync
//!
//! This module organizes all tests

pub mod property;
