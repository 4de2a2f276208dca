pub mod audio_device;
pub mod capture_delegate;
pub mod encoder;
pub mod processor;
pub mod preference_store;
