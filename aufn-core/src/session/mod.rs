pub mod capture;
pub mod recording;
