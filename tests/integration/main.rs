//! Integration tests

mod calibration_test;
mod config_test;
mod engine_test;
mod position_test;
