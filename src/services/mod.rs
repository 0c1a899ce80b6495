//! Collaborator boundaries: geocoding provider and report narrator.

pub mod geocoder;
pub mod narrator;
