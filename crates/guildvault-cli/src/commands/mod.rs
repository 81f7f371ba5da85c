pub mod archive;
pub mod status;
