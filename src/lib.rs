//! Meteor - An age-segmented reading platform
//!
//! This library provides the core functionality for Meteor: books and their
//! ordered chapters, reader activities, events, feedback and questions, all
//! filtered to the age group of the signed-in reader.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
