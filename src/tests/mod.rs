pub mod common;

mod generator_rate_limit;
