pub mod adresse;
pub mod anthropic;
