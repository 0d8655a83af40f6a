pub mod market;
pub mod web;
