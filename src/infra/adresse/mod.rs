mod client;

pub use client::{AdresseGeocoder, GeocoderStats};
